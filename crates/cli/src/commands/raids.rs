use raidbook_db::{RaidRepository, SqlRaidRepository};

use crate::commands::{exit, load_config, open_store, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("raids") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("raids") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        let pool = match open_store("raids", &config).await {
            Ok(pool) => pool,
            Err(failure) => return failure,
        };

        let channels = SqlRaidRepository::new(pool.clone()).list_channels().await;
        pool.close().await;

        match channels {
            Ok(channels) if channels.is_empty() => {
                CommandResult::success("raids", "no raids stored")
            }
            Ok(channels) => {
                let lines: Vec<&str> = channels.iter().map(|channel| channel.as_str()).collect();
                CommandResult::success("raids", lines.join("\n"))
            }
            Err(error) => {
                CommandResult::failure("raids", "db_query", error.to_string(), exit::DB_CONNECTIVITY)
            }
        }
    })
}
