use crate::commands::{block_on, load_config, open_database, CommandResult, Failure};
use affinity_core::config::ConfigOverrides;

pub fn run() -> CommandResult {
    let result = load_config(ConfigOverrides::default()).and_then(|config| {
        block_on(async {
            let pool = open_database(&config).await?;
            pool.close().await;
            Ok::<_, Failure>(())
        })
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::from_failure("migrate", failure),
    }
}
