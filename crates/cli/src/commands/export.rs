use raidbook_core::domain::raid::ChannelId;
use raidbook_core::export::ExportKind;
use raidbook_db::{RaidRepository, SqlRaidRepository};

use crate::commands::{exit, load_config, open_store, runtime, CommandResult};

/// Prints the import string for the raid stored against `channel_id`.
pub fn run(channel_id: &str, kind: ExportKind) -> CommandResult {
    let config = match load_config("export") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("export") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_store("export", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };

        let channel = ChannelId::new(channel_id.trim());
        let found = SqlRaidRepository::new(pool.clone()).find_by_channel(&channel).await;
        pool.close().await;

        match found {
            Ok(Some(raid)) if raid.locked => CommandResult::success("export", kind.render(&raid)),
            Ok(Some(raid)) => CommandResult::failure(
                "export",
                "invalid_state",
                format!("raid `{}` has not been finalized", raid.name),
                exit::NOT_FOUND,
            ),
            Ok(None) => CommandResult::failure(
                "export",
                "not_found",
                format!("no raid stored for channel {}", channel.as_str()),
                exit::NOT_FOUND,
            ),
            Err(error) => CommandResult::failure(
                "export",
                "db_query",
                error.to_string(),
                exit::DB_CONNECTIVITY,
            ),
        }
    })
}
