use crate::commands::{load_config, open_store, runtime, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("migrate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    runtime.block_on(async {
        match open_store("migrate", &config).await {
            Ok(pool) => {
                pool.close().await;
                CommandResult::success("migrate", "applied pending migrations")
            }
            Err(failure) => failure,
        }
    })
}
