//! Raid orchestration behind the Slack handlers.
//!
//! Every request loads the channel's raid, applies one [`RaidAction`], saves the result
//! with a version check and re-renders the channel messages. Concurrent writers lose the
//! compare-and-swap and are retried from a fresh load.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use raidbook_core::actions::{
    apply_action, suggest_reserves, ActionOutcome, Actor, MessageKind, RaidAction, Reply,
    SuggestionMode, ViewHint, NO_PERMISSION, NO_RAID,
};
use raidbook_core::audit::{AuditEvent, AuditOutcome, AuditSink};
use raidbook_core::config::RaidConfig;
use raidbook_core::domain::raid::{ChannelId, Raid, RaidId};
use raidbook_core::errors::{ApplicationError, DomainError};
use raidbook_core::items::ItemCatalog;
use raidbook_core::lifecycle::MAX_IMPORT_FILE_BYTES;
use raidbook_db::{RaidRepository, RepositoryError};
use raidbook_slack::blocks::{self, MessageTemplate};
use raidbook_slack::commands::{CommandEnvelope, CommandIntent, CommandRouteError, RaidCommandService};
use raidbook_slack::events::{
    BlockActionEvent, BlockActionService, EphemeralReply, EventContext, EventHandlerError,
    FileSharedEvent, FileSharedService, InteractiveAction,
};
use raidbook_slack::views;
use raidbook_slack::web::{SlackWebApi, WebApiError};

const SIGNUP_PANEL_HEADING: &str = "Pick class, spec and status for";

pub struct RaidService {
    repository: Arc<dyn RaidRepository>,
    slack: Arc<dyn SlackWebApi>,
    catalog: Arc<ItemCatalog>,
    audit: Arc<dyn AuditSink>,
    config: RaidConfig,
}

struct Request<'a> {
    channel: ChannelId,
    actor: Actor,
    correlation_id: &'a str,
}

/// How the result of a button press is shown to the person who pressed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReplyShape {
    PostFinalize,
    ReplaceFinalize,
    Dismiss,
    ReplaceSignupPanel,
    ReplaceNotice,
    PostNotice,
}

impl ReplyShape {
    fn of(action: &RaidAction) -> Self {
        match action {
            RaidAction::FinalizeOpen(_) => Self::PostFinalize,
            RaidAction::ToggleSlot { .. } | RaidAction::Page { .. } => Self::ReplaceFinalize,
            RaidAction::FinalizeBack => Self::Dismiss,
            RaidAction::SelectField { .. } => Self::ReplaceSignupPanel,
            RaidAction::DeleteSignup
            | RaidAction::AddReserve { .. }
            | RaidAction::RemoveReserve { .. } => Self::ReplaceNotice,
            _ => Self::PostNotice,
        }
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

fn integration(error: WebApiError) -> ApplicationError {
    ApplicationError::Integration(error.to_string())
}

impl RaidService {
    pub fn new(
        repository: Arc<dyn RaidRepository>,
        slack: Arc<dyn SlackWebApi>,
        catalog: Arc<ItemCatalog>,
        audit: Arc<dyn AuditSink>,
        config: RaidConfig,
    ) -> Self {
        Self { repository, slack, catalog, audit, config }
    }

    fn request<'a>(
        &self,
        channel_id: &str,
        user_id: &str,
        user_name: &str,
        correlation_id: &'a str,
    ) -> Request<'a> {
        Request {
            channel: ChannelId::new(channel_id),
            actor: Actor::new(user_id, user_name, self.config.is_admin(user_id)),
            correlation_id,
        }
    }

    fn audit(
        &self,
        request: &Request<'_>,
        raid_id: Option<RaidId>,
        action: &RaidAction,
        outcome: AuditOutcome,
        detail: Option<String>,
    ) {
        let mut event = AuditEvent::new(
            raid_id,
            Some(request.channel.clone()),
            request.correlation_id,
            format!("raid.{}", action.name()),
            action.category(),
            request.actor.user_id.as_str(),
            outcome,
        );
        if let Some(detail) = detail {
            event = event.with_metadata("detail", detail);
        }
        self.audit.emit(event);
    }

    async fn load(&self, request: &Request<'_>) -> Result<Raid, ApplicationError> {
        self.repository
            .find_by_channel(&request.channel)
            .await
            .map_err(persistence)?
            .ok_or_else(|| DomainError::not_found(NO_RAID).into())
    }

    fn require_admin(request: &Request<'_>) -> Result<(), ApplicationError> {
        if request.actor.is_admin {
            Ok(())
        } else {
            Err(DomainError::permission_denied(NO_PERMISSION).into())
        }
    }

    /// Load, apply and save, retrying when another writer saved first.
    async fn perform(
        &self,
        request: &Request<'_>,
        action: RaidAction,
    ) -> Result<ActionOutcome, ApplicationError> {
        let attempts = self.config.max_save_attempts.max(1);

        for attempt in 1..=attempts {
            let current = self.repository.find_by_channel(&request.channel).await.map_err(persistence)?;
            let raid_id = current.as_ref().map(|raid| raid.id.clone());

            let mut outcome = match apply_action(
                current,
                &request.channel,
                action.clone(),
                &request.actor,
                &self.catalog,
            ) {
                Ok(outcome) => outcome,
                Err(error) => {
                    self.audit(request, raid_id, &action, AuditOutcome::Rejected, Some(error.to_string()));
                    return Err(error.into());
                }
            };

            if !outcome.changed {
                self.audit(request, raid_id, &action, AuditOutcome::Success, None);
                return Ok(outcome);
            }

            let saved = if action.replaces_raid() {
                self.repository.upsert_create(outcome.raid).await
            } else {
                self.repository.save(outcome.raid).await
            };

            match saved {
                Ok(raid) => {
                    self.audit(request, Some(raid.id.clone()), &action, AuditOutcome::Success, None);
                    outcome.raid = raid;
                    return Ok(outcome);
                }
                Err(RepositoryError::Conflict { expected, .. }) if attempt < attempts => {
                    warn!(
                        event_name = "raid.save.conflict",
                        correlation_id = request.correlation_id,
                        channel_id = request.channel.as_str(),
                        action = action.name(),
                        attempt,
                        expected_version = expected,
                        "raid changed concurrently; retrying"
                    );
                }
                Err(error) => {
                    self.audit(request, raid_id, &action, AuditOutcome::Failed, Some(error.to_string()));
                    return Err(persistence(error));
                }
            }
        }

        Err(ApplicationError::Persistence(format!(
            "raid in channel {} kept changing",
            request.channel.as_str()
        )))
    }

    /// [`Self::perform`] plus the channel message side effects.
    async fn apply(
        &self,
        request: &Request<'_>,
        action: RaidAction,
    ) -> Result<ActionOutcome, ApplicationError> {
        let creates = action.replaces_raid();
        let publishes = matches!(action, RaidAction::Publish);
        let outcome = self.perform(request, action).await?;

        if creates {
            self.post_and_record(request, &outcome.raid, MessageKind::Raid).await?;
        } else if outcome.changed && outcome.view != ViewHint::Unchanged {
            self.refresh_messages(&outcome.raid).await;
        }

        if publishes && outcome.raid.published_message_id.is_none() {
            self.post_and_record(request, &outcome.raid, MessageKind::Published).await?;
        }

        Ok(outcome)
    }

    async fn post_and_record(
        &self,
        request: &Request<'_>,
        raid: &Raid,
        kind: MessageKind,
    ) -> Result<(), ApplicationError> {
        let message = match kind {
            MessageKind::Raid => views::render_open_view(raid, true),
            MessageKind::Published => views::render_published_view(raid, true),
        };
        let ts = self.slack.post_message(raid.channel_id.as_str(), &message).await.map_err(integration)?;
        self.perform(request, RaidAction::RecordMessage { kind, message_id: ts }).await?;
        Ok(())
    }

    /// Channel messages are shared by everyone, so they always carry the admin controls;
    /// the actions behind them are checked when pressed.
    async fn refresh_messages(&self, raid: &Raid) {
        if let Some(ts) = raid.message_id.as_deref() {
            self.update_message(raid, ts, views::render_open_view(raid, true)).await;
        }
        if let (true, Some(ts)) = (raid.is_published(), raid.published_message_id.as_deref()) {
            self.update_message(raid, ts, views::render_published_view(raid, true)).await;
        }
    }

    async fn update_message(&self, raid: &Raid, ts: &str, message: MessageTemplate) {
        if let Err(error) = self.slack.update_message(raid.channel_id.as_str(), ts, &message).await {
            warn!(
                event_name = "egress.slack.update_failed",
                channel_id = raid.channel_id.as_str(),
                ts,
                error = %error,
                "failed to refresh raid message"
            );
        }
    }

    async fn reply_message(
        &self,
        request: &Request<'_>,
        reply: Reply,
    ) -> Result<Option<MessageTemplate>, ApplicationError> {
        match reply {
            Reply::None => Ok(None),
            Reply::Notice(text) => Ok(Some(blocks::notice_message(&text))),
            Reply::Reserves(summary) => Ok(Some(views::render_reserves(&summary))),
            Reply::Export { filename, content } => {
                self.deliver_file(request, &filename, content.as_bytes()).await.map(Some)
            }
            Reply::ImportFile(file) => self.deliver_file(request, &file.filename, &file.data).await.map(Some),
        }
    }

    /// Files go to the requester's direct messages.
    async fn deliver_file(
        &self,
        request: &Request<'_>,
        filename: &str,
        content: &[u8],
    ) -> Result<MessageTemplate, ApplicationError> {
        let channel = self
            .slack
            .open_direct_channel(request.actor.user_id.as_str())
            .await
            .map_err(integration)?;
        self.slack.upload_file(&channel, filename, content, filename).await.map_err(integration)?;
        Ok(blocks::notice_message(&format!("Sent `{filename}` to your direct messages.")))
    }

    fn error_reply(&self, request: &Request<'_>, error: ApplicationError) -> MessageTemplate {
        if !matches!(error, ApplicationError::Domain(_)) {
            warn!(
                correlation_id = request.correlation_id,
                channel_id = request.channel.as_str(),
                user_id = request.actor.user_id.as_str(),
                error = %error,
                "raid request failed"
            );
        }
        let error = error.into_interface(request.correlation_id);
        blocks::error_message(error.user_message(), error.correlation_id())
    }

    async fn run_command(
        &self,
        request: &Request<'_>,
        action: RaidAction,
    ) -> Result<MessageTemplate, ApplicationError> {
        let submits = matches!(action, RaidAction::SubmitSignup { .. });
        let outcome = self.apply(request, action).await?;

        if submits {
            if let Some(signup) = outcome.raid.signup(&request.actor.user_id) {
                return Ok(views::render_signup_panel(signup, SIGNUP_PANEL_HEADING));
            }
        }
        Ok(self
            .reply_message(request, outcome.reply)
            .await?
            .unwrap_or_else(|| blocks::notice_message("Done.")))
    }

    async fn suggest(
        &self,
        request: &Request<'_>,
        mode: SuggestionMode,
        query: &str,
    ) -> Result<MessageTemplate, ApplicationError> {
        let raid = self.load(request).await?;
        let suggestions =
            suggest_reserves(Some(&raid), &request.actor.user_id, mode, query, &self.catalog);
        let action_id = match mode {
            SuggestionMode::Add => views::RESERVE_ADD,
            SuggestionMode::Remove => views::RESERVE_REMOVE,
        };
        Ok(views::render_item_suggestions(&suggestions, action_id))
    }

    async fn interact(
        &self,
        request: &Request<'_>,
        action: InteractiveAction,
    ) -> Result<EphemeralReply, ApplicationError> {
        let user = &request.actor.user_id;
        match action {
            InteractiveAction::Apply(action) => self.interact_apply(request, action).await,
            InteractiveAction::ShowSignupPanel => {
                let raid = self.load(request).await?;
                let message = match raid.signup(user) {
                    _ if raid.locked => blocks::notice_message("Raid is closed."),
                    Some(signup) => views::render_signup_panel(signup, SIGNUP_PANEL_HEADING),
                    None => blocks::notice_message("Use `/raid signup <character>` to sign up first."),
                };
                Ok(EphemeralReply::Post(message))
            }
            InteractiveAction::ConfirmSignup => {
                let raid = self.load(request).await?;
                let signup =
                    raid.signup(user).ok_or_else(|| DomainError::not_found("You are not signed up."))?;
                if signup.class_name.is_none() || signup.spec.is_none() {
                    return Ok(EphemeralReply::Post(blocks::notice_message("Pick a class and spec first.")));
                }
                Ok(EphemeralReply::Replace(views::render_signup_summary(&raid, signup)))
            }
            InteractiveAction::PromptDelete => {
                let raid = self.load(request).await?;
                let message = match raid.signup(user) {
                    Some(_) => views::render_delete_prompt(),
                    None => blocks::notice_message("You are not signed up."),
                };
                Ok(EphemeralReply::Post(message))
            }
            InteractiveAction::CancelDelete => Ok(EphemeralReply::Delete),
            InteractiveAction::PromptReserveLimits => {
                Self::require_admin(request)?;
                Ok(EphemeralReply::Post(blocks::notice_message(
                    "Set the limits with `/raid limits <tanks> <healers> <dps>`.",
                )))
            }
            InteractiveAction::PromptImportUpload => {
                Self::require_admin(request)?;
                Ok(EphemeralReply::Post(blocks::notice_message(
                    "Share the `.txt` import file in this channel. Files up to 2 MB are attached to the published roster.",
                )))
            }
        }
    }

    async fn interact_apply(
        &self,
        request: &Request<'_>,
        action: RaidAction,
    ) -> Result<EphemeralReply, ApplicationError> {
        let shape = ReplyShape::of(&action);
        let outcome = self.apply(request, action).await?;
        let is_admin = request.actor.is_admin;

        let reply = match (shape, outcome.view) {
            (ReplyShape::PostFinalize, ViewHint::Finalize { role, page }) => {
                EphemeralReply::Post(views::render_finalize_view(&outcome.raid, role, page, is_admin))
            }
            (ReplyShape::ReplaceFinalize, ViewHint::Finalize { role, page }) => {
                EphemeralReply::Replace(views::render_finalize_view(&outcome.raid, role, page, is_admin))
            }
            (ReplyShape::Dismiss, _) => EphemeralReply::Delete,
            (ReplyShape::ReplaceSignupPanel, _) => match outcome.raid.signup(&request.actor.user_id) {
                Some(signup) => {
                    EphemeralReply::Replace(views::render_signup_panel(signup, SIGNUP_PANEL_HEADING))
                }
                None => EphemeralReply::Post(blocks::notice_message("You are not signed up.")),
            },
            (shape, _) => {
                let message = self
                    .reply_message(request, outcome.reply)
                    .await?
                    .unwrap_or_else(|| blocks::notice_message("Done."));
                if shape == ReplyShape::ReplaceNotice {
                    EphemeralReply::Replace(message)
                } else {
                    EphemeralReply::Post(message)
                }
            }
        };
        Ok(reply)
    }

    /// Attaches a shared `.txt` file to the published roster. Returns `None` when the
    /// file is not meant as an import.
    async fn import_shared_file(
        &self,
        request: &Request<'_>,
        file_id: &str,
    ) -> Result<Option<MessageTemplate>, ApplicationError> {
        let raid = self.repository.find_by_channel(&request.channel).await.map_err(persistence)?;
        if !raid.is_some_and(|raid| raid.is_published()) {
            return Ok(None);
        }

        let file = self.slack.file_info(file_id).await.map_err(integration)?;
        if !file.name.to_ascii_lowercase().ends_with(".txt") {
            return Ok(None);
        }
        if file.size > MAX_IMPORT_FILE_BYTES as u64 {
            return Err(DomainError::capacity_exceeded("File is larger than 2 MB.").into());
        }

        let data = self.slack.download_file(&file.url_private).await.map_err(integration)?;
        let outcome =
            self.apply(request, RaidAction::UploadImportBlob { filename: file.name, data }).await?;
        self.reply_message(request, outcome.reply).await
    }
}

#[async_trait]
impl RaidCommandService for RaidService {
    async fn execute(
        &self,
        intent: CommandIntent,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let request = self.request(
            &envelope.channel_id,
            &envelope.user_id,
            &envelope.user_name,
            &envelope.request_id,
        );
        let result = match intent {
            CommandIntent::Apply(action) => self.run_command(&request, action).await,
            CommandIntent::Suggest { mode, query } => self.suggest(&request, mode, &query).await,
        };
        Ok(result.unwrap_or_else(|error| self.error_reply(&request, error)))
    }
}

#[async_trait]
impl BlockActionService for RaidService {
    async fn handle_block_action(
        &self,
        event: &BlockActionEvent,
        action: InteractiveAction,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError> {
        let request =
            self.request(&event.channel_id, &event.user_id, &event.user_name, &ctx.correlation_id);
        let reply = match self.interact(&request, action).await {
            Ok(reply) => reply,
            Err(error) => EphemeralReply::Post(self.error_reply(&request, error)),
        };
        Ok(Some(reply))
    }
}

#[async_trait]
impl FileSharedService for RaidService {
    async fn handle_file_shared(
        &self,
        event: &FileSharedEvent,
        ctx: &EventContext,
    ) -> Result<Option<EphemeralReply>, EventHandlerError> {
        let request = self.request(&event.channel_id, &event.user_id, &event.user_id, &ctx.correlation_id);
        if !request.actor.is_admin {
            return Ok(None);
        }

        let message = match self.import_shared_file(&request, &event.file_id).await {
            Ok(Some(message)) => message,
            Ok(None) => return Ok(None),
            Err(error) => self.error_reply(&request, error),
        };
        self.slack
            .post_ephemeral(&event.channel_id, &event.user_id, &message)
            .await
            .map_err(|error| EventHandlerError::FileShared(error.to_string()))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use raidbook_core::actions::{RaidAction, SuggestionMode};
    use raidbook_core::audit::{AuditOutcome, InMemoryAuditSink};
    use raidbook_core::config::RaidConfig;
    use raidbook_core::domain::raid::{ChannelId, Raid, Role, RoleCounts};
    use raidbook_core::domain::signup::{ClassName, ParticipantId, Spec};
    use raidbook_core::finalize::PageDirection;
    use raidbook_core::items::{Item, ItemCatalog};
    use raidbook_db::{InMemoryRaidRepository, RaidRepository, RepositoryError};
    use raidbook_slack::blocks::MessageTemplate;
    use raidbook_slack::commands::{CommandEnvelope, CommandFamily, CommandIntent, RaidCommandService};
    use raidbook_slack::events::{
        BlockActionEvent, BlockActionService, EphemeralReply, EventContext, FileSharedEvent,
        FileSharedService, InteractiveAction,
    };
    use raidbook_slack::web::{InMemorySlackWebApi, WebApiCall};

    use super::RaidService;

    const ADMIN: &str = "UADMIN";
    const CHANNEL: &str = "C1";

    /// Fails the first `conflicts` saves as if another writer got there first.
    struct ContendedRepository {
        inner: InMemoryRaidRepository,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl RaidRepository for ContendedRepository {
        async fn find_by_channel(&self, channel_id: &ChannelId) -> Result<Option<Raid>, RepositoryError> {
            self.inner.find_by_channel(channel_id).await
        }

        async fn save(&self, raid: Raid) -> Result<Raid, RepositoryError> {
            let remaining = self.conflicts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.conflicts.store(remaining - 1, Ordering::SeqCst);
                return Err(RepositoryError::Conflict {
                    channel_id: raid.channel_id.0.clone(),
                    expected: raid.version,
                });
            }
            self.inner.save(raid).await
        }

        async fn upsert_create(&self, raid: Raid) -> Result<Raid, RepositoryError> {
            self.inner.upsert_create(raid).await
        }

        async fn list_channels(&self) -> Result<Vec<ChannelId>, RepositoryError> {
            self.inner.list_channels().await
        }
    }

    struct Harness {
        service: RaidService,
        repository: Arc<dyn RaidRepository>,
        slack: Arc<InMemorySlackWebApi>,
        audit: InMemoryAuditSink,
    }

    fn harness_with(repository: Arc<dyn RaidRepository>) -> Harness {
        let slack = Arc::new(InMemorySlackWebApi::new());
        let audit = InMemoryAuditSink::default();
        let catalog = ItemCatalog::new(vec![
            Item { id: 19019, name: "Thunderfury".to_owned() },
            Item { id: 17076, name: "Bonereaver's Edge".to_owned() },
        ]);
        let service = RaidService::new(
            repository.clone(),
            slack.clone(),
            Arc::new(catalog),
            Arc::new(audit.clone()),
            RaidConfig { admin_user_ids: vec![ADMIN.to_owned()], max_save_attempts: 3 },
        );
        Harness { service, repository, slack, audit }
    }

    fn harness() -> Harness {
        harness_with(Arc::new(InMemoryRaidRepository::default()))
    }

    fn envelope(user_id: &str) -> CommandEnvelope {
        CommandEnvelope {
            family: CommandFamily::Raid,
            verb: "test".to_owned(),
            args: String::new(),
            channel_id: CHANNEL.to_owned(),
            user_id: user_id.to_owned(),
            user_name: user_id.to_lowercase(),
            trigger_ts: "1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    fn block_event(user_id: &str) -> BlockActionEvent {
        BlockActionEvent {
            channel_id: CHANNEL.to_owned(),
            message_ts: None,
            user_id: user_id.to_owned(),
            user_name: user_id.to_lowercase(),
            action_id: "test".to_owned(),
            value: None,
            request_id: None,
        }
    }

    impl Harness {
        async fn command(&self, user_id: &str, action: RaidAction) -> MessageTemplate {
            self.service
                .execute(CommandIntent::Apply(action), &envelope(user_id))
                .await
                .expect("command replies are never errors")
        }

        async fn press(&self, user_id: &str, action: InteractiveAction) -> EphemeralReply {
            self.service
                .handle_block_action(&block_event(user_id), action, &EventContext::default())
                .await
                .expect("block action")
                .expect("reply")
        }

        async fn stored(&self) -> Raid {
            self.repository
                .find_by_channel(&ChannelId::new(CHANNEL))
                .await
                .expect("find")
                .expect("raid stored")
        }

        async fn create(&self) {
            self.command(
                ADMIN,
                RaidAction::Create { name: "Molten Core".to_owned(), slots: RoleCounts::new(1, 1, 2) },
            )
            .await;
        }

        async fn seed_published(&self) {
            let mut raid = Raid::create(ChannelId::new(CHANNEL), "Molten Core", RoleCounts::new(1, 1, 1));
            raid.submit_signup(&ParticipantId::new("U1"), "Thrall").expect("signup");
            let signup = raid.signups.get_mut(&ParticipantId::new("U1")).expect("U1");
            signup.class_name = Some(ClassName::Shaman);
            signup.spec = Some(Spec::Healer);
            raid.close().expect("close");
            raid.final_selection.get_mut(Role::Healers).push(ParticipantId::new("U1"));
            raid.confirm_roster().expect("confirm");
            raid.publish().expect("publish");
            self.repository.save(raid).await.expect("seed");
        }
    }

    #[tokio::test]
    async fn create_posts_the_raid_message_and_records_its_timestamp() {
        let h = harness();
        let reply = h
            .command(
                ADMIN,
                RaidAction::Create { name: "Molten Core".to_owned(), slots: RoleCounts::new(1, 1, 2) },
            )
            .await;
        assert!(reply.text().contains("Molten Core"));

        let calls = h.slack.calls();
        let Some(WebApiCall::PostMessage { channel_id, ts, .. }) = calls.first() else {
            panic!("expected the raid message to be posted, got {calls:?}");
        };
        assert_eq!(channel_id, CHANNEL);
        assert_eq!(h.stored().await.message_id.as_deref(), Some(ts.as_str()));
    }

    #[tokio::test]
    async fn non_admins_get_a_rejection_with_correlation_id() {
        let h = harness();
        let reply = h
            .command("U1", RaidAction::Create { name: "MC".to_owned(), slots: RoleCounts::new(1, 1, 1) })
            .await;
        let text = reply.text();
        assert!(text.contains("No permission."));
        assert!(text.contains("Correlation ID: req-1"));

        let events = h.audit.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].outcome, AuditOutcome::Rejected);
        assert!(h.slack.calls().is_empty());
    }

    #[tokio::test]
    async fn signup_panel_flow_updates_the_channel_message() {
        let h = harness();
        h.create().await;

        let panel = h.command("U1", RaidAction::SubmitSignup { char_name: "Thrall".to_owned() }).await;
        assert!(panel.action_ids().contains(&"signup_className"));

        let reply = h
            .press(
                "U1",
                InteractiveAction::Apply(RaidAction::SelectField {
                    field: "className".to_owned(),
                    value: "Shaman".to_owned(),
                }),
            )
            .await;
        assert!(matches!(reply, EphemeralReply::Replace(_)));

        let early = h.press("U1", InteractiveAction::ConfirmSignup).await;
        assert!(matches!(early, EphemeralReply::Post(message) if message.text().contains("class and spec")));

        h.press(
            "U1",
            InteractiveAction::Apply(RaidAction::SelectField {
                field: "spec".to_owned(),
                value: "Healer".to_owned(),
            }),
        )
        .await;
        let summary = h.press("U1", InteractiveAction::ConfirmSignup).await;
        assert!(matches!(summary, EphemeralReply::Replace(message) if message.text().contains("Thrall")));

        let updates = h
            .slack
            .calls()
            .into_iter()
            .filter(|call| matches!(call, WebApiCall::UpdateMessage { .. }))
            .count();
        assert_eq!(updates, 3, "signup and both selections refresh the raid message");
    }

    #[tokio::test]
    async fn finalize_views_are_posted_replaced_and_dismissed() {
        let h = harness();
        h.create().await;
        h.command("U1", RaidAction::SubmitSignup { char_name: "Thrall".to_owned() }).await;
        for (field, value) in [("className", "Shaman"), ("spec", "Healer")] {
            h.press(
                "U1",
                InteractiveAction::Apply(RaidAction::SelectField {
                    field: field.to_owned(),
                    value: value.to_owned(),
                }),
            )
            .await;
        }
        h.command(ADMIN, RaidAction::Close).await;

        let opened = h.press(ADMIN, InteractiveAction::Apply(RaidAction::FinalizeOpen(Role::Healers))).await;
        assert!(matches!(opened, EphemeralReply::Post(message) if message.action_ids().contains(&"slot_healers_U1")));

        let toggled = h
            .press(
                ADMIN,
                InteractiveAction::Apply(RaidAction::ToggleSlot {
                    role: Role::Healers,
                    participant: ParticipantId::new("U1"),
                }),
            )
            .await;
        assert!(matches!(toggled, EphemeralReply::Replace(_)));
        assert_eq!(h.stored().await.final_selection.get(Role::Healers), &[ParticipantId::new("U1")]);

        let paged = h
            .press(
                ADMIN,
                InteractiveAction::Apply(RaidAction::Page { role: Role::Healers, direction: PageDirection::Next }),
            )
            .await;
        assert!(matches!(paged, EphemeralReply::Replace(_)));

        let back = h.press(ADMIN, InteractiveAction::Apply(RaidAction::FinalizeBack)).await;
        assert_eq!(back, EphemeralReply::Delete);

        let denied = h.press("U1", InteractiveAction::Apply(RaidAction::FinalizeOpen(Role::Dps))).await;
        assert!(matches!(denied, EphemeralReply::Post(message) if message.text().contains("No permission.")));
    }

    #[tokio::test]
    async fn save_conflicts_are_retried_until_attempts_run_out() {
        let repository = Arc::new(ContendedRepository {
            inner: InMemoryRaidRepository::default(),
            conflicts: AtomicU32::new(0),
        });
        let h = harness_with(repository.clone());
        h.create().await;

        repository.conflicts.store(2, Ordering::SeqCst);
        h.command("U1", RaidAction::SubmitSignup { char_name: "Thrall".to_owned() }).await;
        assert!(h.stored().await.signup(&ParticipantId::new("U1")).is_some());

        repository.conflicts.store(3, Ordering::SeqCst);
        let reply = h.command("U2", RaidAction::SubmitSignup { char_name: "Jaina".to_owned() }).await;
        assert!(reply.text().contains("temporarily unavailable"));
        assert!(h.stored().await.signup(&ParticipantId::new("U2")).is_none());
    }

    #[tokio::test]
    async fn exports_are_delivered_to_direct_messages() {
        let h = harness();
        h.create().await;
        h.command(ADMIN, RaidAction::Close).await;

        let reply = h.press(ADMIN, InteractiveAction::Apply(RaidAction::ExportFull)).await;
        assert!(matches!(reply, EphemeralReply::Post(message) if message.text().contains("direct messages")));

        let uploaded = h.slack.calls().into_iter().any(|call| {
            matches!(call, WebApiCall::UploadFile { channel_id, .. } if channel_id == "D-UADMIN")
        });
        assert!(uploaded);
    }

    #[tokio::test]
    async fn publish_posts_the_published_roster_once() {
        let h = harness();
        h.seed_published().await;
        let mut raid = h.stored().await;
        raid.published_at = None;
        h.repository.save(raid).await.expect("unpublish");

        h.press(ADMIN, InteractiveAction::Apply(RaidAction::Publish)).await;
        let stored = h.stored().await;
        assert!(stored.is_published());
        assert!(stored.published_message_id.is_some());
    }

    #[tokio::test]
    async fn shared_import_files_attach_to_published_raids_for_admins() {
        let h = harness();
        h.seed_published().await;
        h.slack.share_file("F1", "import.txt", b"R:MC".to_vec());
        h.slack.share_file("F2", "screenshot.png", vec![1, 2, 3]);

        let event = |user: &str, file: &str| FileSharedEvent {
            channel_id: CHANNEL.to_owned(),
            user_id: user.to_owned(),
            file_id: file.to_owned(),
        };

        h.service.handle_file_shared(&event("U1", "F1"), &EventContext::default()).await.expect("ignored");
        h.service.handle_file_shared(&event(ADMIN, "F2"), &EventContext::default()).await.expect("ignored");
        assert!(h.stored().await.import_string_file.is_none());
        assert!(h.slack.calls().is_empty());

        h.service.handle_file_shared(&event(ADMIN, "F1"), &EventContext::default()).await.expect("import");
        let stored = h.stored().await;
        assert_eq!(stored.import_string_file.as_ref().map(|file| file.data.clone()), Some(b"R:MC".to_vec()));
        assert!(h
            .slack
            .calls()
            .iter()
            .any(|call| matches!(call, WebApiCall::PostEphemeral { user_id, .. } if user_id == ADMIN)));
    }

    #[tokio::test]
    async fn reserve_commands_suggest_catalog_items() {
        let h = harness();
        h.create().await;
        h.command(ADMIN, RaidAction::SetSoftReserveLimits(RoleCounts::new(1, 1, 2))).await;
        h.command("U1", RaidAction::SubmitSignup { char_name: "Thrall".to_owned() }).await;
        for (field, value) in [("className", "Warrior"), ("spec", "DPS")] {
            h.press(
                "U1",
                InteractiveAction::Apply(RaidAction::SelectField {
                    field: field.to_owned(),
                    value: value.to_owned(),
                }),
            )
            .await;
        }

        let picker = h
            .service
            .execute(
                CommandIntent::Suggest { mode: SuggestionMode::Add, query: "thunder".to_owned() },
                &envelope("U1"),
            )
            .await
            .expect("suggest");
        assert_eq!(picker.action_ids(), vec!["sr_add_0"]);

        let added = h.press("U1", InteractiveAction::Apply(RaidAction::AddReserve { item_id: 19019 })).await;
        assert!(matches!(added, EphemeralReply::Replace(message) if message.text().contains("Thunderfury")));
    }
}
