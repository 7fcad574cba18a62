use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use raidbook_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    let field = |key, env_key, value: String| Field { key, env_key, value };
    let admins = if config.raid.admin_user_ids.is_empty() {
        "<none>".to_string()
    } else {
        config.raid.admin_user_ids.join(",")
    };

    vec![
        field("database.url", "RAIDBOOK_DATABASE_URL", config.database.url.clone()),
        field(
            "database.max_connections",
            "RAIDBOOK_DATABASE_MAX_CONNECTIONS",
            config.database.max_connections.to_string(),
        ),
        field(
            "database.timeout_secs",
            "RAIDBOOK_DATABASE_TIMEOUT_SECS",
            config.database.timeout_secs.to_string(),
        ),
        field(
            "slack.app_token",
            "RAIDBOOK_SLACK_APP_TOKEN",
            redact_token(config.slack.app_token.expose_secret()),
        ),
        field(
            "slack.bot_token",
            "RAIDBOOK_SLACK_BOT_TOKEN",
            redact_token(config.slack.bot_token.expose_secret()),
        ),
        field(
            "items.catalog_path",
            "RAIDBOOK_ITEMS_CATALOG_PATH",
            config
                .items
                .catalog_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |path| path.display().to_string()),
        ),
        field("raid.admin_user_ids", "RAIDBOOK_RAID_ADMIN_USER_IDS", admins),
        field(
            "raid.max_save_attempts",
            "RAIDBOOK_RAID_MAX_SAVE_ATTEMPTS",
            config.raid.max_save_attempts.to_string(),
        ),
        field(
            "server.bind_address",
            "RAIDBOOK_SERVER_BIND_ADDRESS",
            config.server.bind_address.clone(),
        ),
        field(
            "server.health_check_port",
            "RAIDBOOK_SERVER_HEALTH_CHECK_PORT",
            config.server.health_check_port.to_string(),
        ),
        field(
            "server.graceful_shutdown_secs",
            "RAIDBOOK_SERVER_GRACEFUL_SHUTDOWN_SECS",
            config.server.graceful_shutdown_secs.to_string(),
        ),
        field("logging.level", "RAIDBOOK_LOGGING_LEVEL", config.logging.level.clone()),
        field("logging.format", "RAIDBOOK_LOGGING_FORMAT", format!("{:?}", config.logging.format)),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["raidbook.toml", "config/raidbook.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps the token family prefix (`xapp`, `xoxb`) and hides the rest.
pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
