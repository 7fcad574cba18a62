use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use raidbook_core::actions::RaidAction;
use raidbook_core::domain::raid::Role;
use raidbook_core::domain::signup::ParticipantId;
use raidbook_core::finalize::PageDirection;

use crate::{
    blocks::MessageTemplate,
    commands::{
        normalize_command, CommandParseError, CommandRouteError, CommandRouter, RaidCommandService,
        SlashCommandPayload,
    },
    views,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    /// Where ephemeral replies for this interaction are posted.
    pub response_url: Option<String>,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    FileShared(FileSharedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::FileShared(_) => SlackEventType::FileShared,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }

    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.channel_id),
            Self::BlockAction(event) => Some(&event.channel_id),
            Self::FileShared(event) => Some(&event.channel_id),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::SlashCommand(payload) => Some(&payload.user_id),
            Self::BlockAction(event) => Some(&event.user_id),
            Self::FileShared(event) => Some(&event.user_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    FileShared,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub message_ts: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub action_id: String,
    /// Button value or the selected option of a menu.
    pub value: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSharedEvent {
    pub channel_id: String,
    pub user_id: String,
    pub file_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

/// Reply visible only to the user who triggered the interaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EphemeralReply {
    Post(MessageTemplate),
    /// Replaces the ephemeral message the interaction came from.
    Replace(MessageTemplate),
    /// Removes the ephemeral message the interaction came from.
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(EphemeralReply),
    Processed,
    Ignored,
}

impl From<Option<EphemeralReply>> for HandlerResult {
    fn from(reply: Option<EphemeralReply>) -> Self {
        match reply {
            Some(reply) => Self::Responded(reply),
            None => Self::Processed,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("block action handler failure: {0}")]
    BlockAction(String),
    #[error("file upload handler failure: {0}")]
    FileShared(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers the slash command, block action and file upload handlers, all backed by
/// the same service.
pub fn raid_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: RaidCommandService + BlockActionService + FileSharedService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(service.clone()));
    dispatcher.register(BlockActionHandler::new(service.clone()));
    dispatcher.register(FileSharedHandler::new(service));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: RaidCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: RaidCommandService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = normalize_command(payload.clone())?;
        let message = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(EphemeralReply::Post(message)))
    }
}

/// A block action resolved from its `action_id` and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractiveAction {
    Apply(RaidAction),
    ShowSignupPanel,
    ConfirmSignup,
    PromptDelete,
    CancelDelete,
    PromptReserveLimits,
    PromptImportUpload,
}

fn role_and_rest(rest: &str) -> Option<(Role, &str)> {
    let (role, rest) = rest.split_once('_')?;
    Some((Role::from_key(role)?, rest))
}

fn reserve_item(event: &BlockActionEvent) -> Option<u32> {
    event.value.as_deref()?.trim().parse().ok()
}

pub fn parse_block_action(event: &BlockActionEvent) -> Option<InteractiveAction> {
    let id = event.action_id.as_str();
    let apply = |action: RaidAction| Some(InteractiveAction::Apply(action));

    match id {
        views::MANAGE_SIGNUP | views::SIGNUP_CHANGE => return Some(InteractiveAction::ShowSignupPanel),
        views::SIGNUP_CONFIRM => return Some(InteractiveAction::ConfirmSignup),
        views::DELETE_SIGNUP => return Some(InteractiveAction::PromptDelete),
        views::DELETE_SIGNUP_CONFIRM => return apply(RaidAction::DeleteSignup),
        views::DELETE_SIGNUP_CANCEL => return Some(InteractiveAction::CancelDelete),
        views::SET_RESERVE_LIMITS => return Some(InteractiveAction::PromptReserveLimits),
        views::CLOSE_RAID => return apply(RaidAction::Close),
        views::FINALIZE_BACK => return apply(RaidAction::FinalizeBack),
        views::FINALIZE_CONFIRM => return apply(RaidAction::FinalizeConfirm),
        views::PUBLISH => return apply(RaidAction::Publish),
        views::EXPORT_FULL => return apply(RaidAction::ExportFull),
        views::EXPORT_ROSTER => return apply(RaidAction::ExportRoster),
        views::UPLOAD_IMPORT => return Some(InteractiveAction::PromptImportUpload),
        views::DOWNLOAD_IMPORT => return apply(RaidAction::DownloadImportBlob),
        views::SELECT_CLASS | views::SELECT_SPEC | views::SELECT_STATUS => {
            let field = id.trim_start_matches("signup_").to_owned();
            let value = event.value.clone()?;
            return apply(RaidAction::SelectField { field, value });
        }
        _ => {}
    }

    if let Some(role) = id.strip_prefix(views::FINALIZE_PREFIX) {
        return apply(RaidAction::FinalizeOpen(Role::from_key(role)?));
    }
    if let Some(rest) = id.strip_prefix(views::SLOT_PREFIX) {
        let (role, user) = role_and_rest(rest)?;
        if user.is_empty() {
            return None;
        }
        return apply(RaidAction::ToggleSlot { role, participant: ParticipantId::new(user) });
    }
    if let Some(rest) = id.strip_prefix(views::PAGE_PREFIX) {
        let (role, direction) = role_and_rest(rest)?;
        return apply(RaidAction::Page { role, direction: PageDirection::parse(direction)? });
    }
    if id.starts_with(views::RESERVE_ADD) {
        return apply(RaidAction::AddReserve { item_id: reserve_item(event)? });
    }
    if id.starts_with(views::RESERVE_REMOVE) {
        return apply(RaidAction::RemoveReserve { item_id: reserve_item(event)? });
    }

    None
}

#[async_trait]
pub trait BlockActionService: Send + Sync {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        action: InteractiveAction,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError>;
}

pub struct BlockActionHandler<S> {
    service: S,
}

impl<S> BlockActionHandler<S>
where
    S: BlockActionService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for BlockActionHandler<S>
where
    S: BlockActionService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(action) = parse_block_action(event) else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.handle_block_action(event, action, ctx).await?;
        Ok(HandlerResult::from(reply))
    }
}

#[async_trait]
pub trait FileSharedService: Send + Sync {
    async fn handle_file_shared(
        &self,
        event: &FileSharedEvent,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError>;
}

pub struct FileSharedHandler<S> {
    service: S,
}

impl<S> FileSharedHandler<S>
where
    S: FileSharedService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for FileSharedHandler<S>
where
    S: FileSharedService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::FileShared
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::FileShared(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.handle_file_shared(event, ctx).await?;
        Ok(HandlerResult::from(reply))
    }
}

#[async_trait]
impl<T> BlockActionService for Arc<T>
where
    T: BlockActionService + ?Sized,
{
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        action: InteractiveAction,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError> {
        self.as_ref().handle_block_action(event, action, ctx).await
    }
}

#[async_trait]
impl<T> FileSharedService for Arc<T>
where
    T: FileSharedService + ?Sized,
{
    async fn handle_file_shared(
        &self,
        event: &FileSharedEvent,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError> {
        self.as_ref().handle_file_shared(event, ctx).await
    }
}
