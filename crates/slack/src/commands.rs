use async_trait::async_trait;
use thiserror::Error;

use raidbook_core::actions::{RaidAction, SuggestionMode};
use raidbook_core::domain::raid::RoleCounts;

use crate::blocks::{self, MessageTemplate};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandFamily {
    Raid,
    SoftReserve,
}

impl CommandFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raid => "raid",
            Self::SoftReserve => "sr",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub family: CommandFamily,
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaidCommand {
    Create { name: String, slots: RoleCounts },
    Signup { char_name: String },
    Close,
    Limits(RoleCounts),
    Help,
    Usage { usage: &'static str },
    Unknown { verb: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReserveCommand {
    Add { query: String },
    Remove { query: String },
    List,
    Clear,
    Help,
    Unknown { verb: String },
}

/// What a parsed command asks the service to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandIntent {
    Apply(RaidAction),
    Suggest { mode: SuggestionMode, query: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

const CREATE_USAGE: &str = "/raid create <name> <tanks> <healers> <dps>";
const SIGNUP_USAGE: &str = "/raid signup <character name>";
const LIMITS_USAGE: &str = "/raid limits <tanks> <healers> <dps>";

pub fn normalize_command(payload: SlashCommandPayload) -> Result<CommandEnvelope, CommandParseError> {
    let family = match payload.command.as_str() {
        "/raid" => CommandFamily::Raid,
        "/sr" | "/softreserve" => CommandFamily::SoftReserve,
        _ => return Err(CommandParseError::UnsupportedCommand(payload.command)),
    };

    let text = payload.text.trim();
    let (verb, args) = match text.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (text, ""),
    };
    let verb = if verb.is_empty() { "help".to_owned() } else { verb.to_ascii_lowercase() };

    Ok(CommandEnvelope {
        family,
        verb,
        args: args.to_owned(),
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        user_name: payload.user_name,
        trigger_ts: payload.trigger_ts,
        request_id: payload.request_id,
    })
}

fn parse_counts(tokens: &[&str]) -> Option<RoleCounts> {
    match tokens {
        [tanks, healers, dps] => {
            Some(RoleCounts::new(tanks.parse().ok()?, healers.parse().ok()?, dps.parse().ok()?))
        }
        _ => None,
    }
}

/// Splits `<name> <t> <h> <d>`, keeping the name's text as typed.
fn split_name_and_counts(args: &str) -> Option<(&str, RoleCounts)> {
    let mut rest = args.trim();
    let mut counts = [""; 3];
    for slot in counts.iter_mut().rev() {
        let (head, token) = rest.rsplit_once(char::is_whitespace)?;
        *slot = token;
        rest = head.trim_end();
    }
    if rest.is_empty() {
        return None;
    }
    Some((rest, parse_counts(&counts)?))
}

pub fn parse_raid_command(verb: &str, args: &str) -> RaidCommand {
    match verb {
        "create" => match split_name_and_counts(args) {
            Some((name, slots)) => RaidCommand::Create { name: name.to_owned(), slots },
            None => RaidCommand::Usage { usage: CREATE_USAGE },
        },
        "signup" | "join" => {
            if args.is_empty() {
                RaidCommand::Usage { usage: SIGNUP_USAGE }
            } else {
                RaidCommand::Signup { char_name: args.to_owned() }
            }
        }
        "close" | "lock" => RaidCommand::Close,
        "limits" | "sr" => {
            let tokens: Vec<&str> = args.split_whitespace().collect();
            match parse_counts(&tokens) {
                Some(limits) => RaidCommand::Limits(limits),
                None => RaidCommand::Usage { usage: LIMITS_USAGE },
            }
        }
        "help" => RaidCommand::Help,
        _ => RaidCommand::Unknown { verb: verb.to_owned() },
    }
}

pub fn parse_reserve_command(verb: &str, args: &str) -> ReserveCommand {
    match verb {
        "add" => ReserveCommand::Add { query: args.to_owned() },
        "remove" | "rm" => ReserveCommand::Remove { query: args.to_owned() },
        "list" => ReserveCommand::List,
        "clear" => ReserveCommand::Clear,
        "help" => ReserveCommand::Help,
        _ => ReserveCommand::Unknown { verb: verb.to_owned() },
    }
}

fn item_id(query: &str) -> Option<u32> {
    query.trim().parse::<u32>().ok().filter(|id| *id > 0)
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: RaidCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(&self, envelope: CommandEnvelope) -> Result<MessageTemplate, CommandRouteError> {
        let intent = match envelope.family {
            CommandFamily::Raid => match parse_raid_command(&envelope.verb, &envelope.args) {
                RaidCommand::Create { name, slots } => CommandIntent::Apply(RaidAction::Create { name, slots }),
                RaidCommand::Signup { char_name } => {
                    CommandIntent::Apply(RaidAction::SubmitSignup { char_name })
                }
                RaidCommand::Close => CommandIntent::Apply(RaidAction::Close),
                RaidCommand::Limits(limits) => {
                    CommandIntent::Apply(RaidAction::SetSoftReserveLimits(limits))
                }
                RaidCommand::Help => return Ok(blocks::help_message()),
                RaidCommand::Usage { usage } => {
                    return Ok(blocks::notice_message(&format!("Usage: `{usage}`")))
                }
                RaidCommand::Unknown { verb } => return Ok(unsupported(&envelope, &verb)),
            },
            CommandFamily::SoftReserve => match parse_reserve_command(&envelope.verb, &envelope.args) {
                ReserveCommand::Add { query } => match item_id(&query) {
                    Some(item_id) => CommandIntent::Apply(RaidAction::AddReserve { item_id }),
                    None => CommandIntent::Suggest { mode: SuggestionMode::Add, query },
                },
                ReserveCommand::Remove { query } => match item_id(&query) {
                    Some(item_id) => CommandIntent::Apply(RaidAction::RemoveReserve { item_id }),
                    None => CommandIntent::Suggest { mode: SuggestionMode::Remove, query },
                },
                ReserveCommand::List => CommandIntent::Apply(RaidAction::ListReserves),
                ReserveCommand::Clear => CommandIntent::Apply(RaidAction::ClearReserves),
                ReserveCommand::Help => return Ok(blocks::help_message()),
                ReserveCommand::Unknown { verb } => return Ok(unsupported(&envelope, &verb)),
            },
        };

        self.service.execute(intent, &envelope).await
    }
}

fn unsupported(envelope: &CommandEnvelope, verb: &str) -> MessageTemplate {
    let family = envelope.family.as_str();
    blocks::error_message(
        &format!("Unsupported command `/{family} {verb}`. Try `/{family} help`."),
        &envelope.request_id,
    )
}

#[async_trait]
pub trait RaidCommandService: Send + Sync {
    async fn execute(
        &self,
        intent: CommandIntent,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

#[async_trait]
impl<T> RaidCommandService for std::sync::Arc<T>
where
    T: RaidCommandService + ?Sized,
{
    async fn execute(
        &self,
        intent: CommandIntent,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        self.as_ref().execute(intent, envelope).await
    }
}
