use statusquo_db::repositories::{InstallationRepository, SqlInstallationRepository};

use crate::commands::{load_config, open_database, runtime, CommandResult, StepFailure};

/// Preflight for `statusquo-server`: config, schema, and the installation registry.
pub fn run() -> CommandResult {
    let config = match load_config("start") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let runtime = match runtime("start") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let installations = SqlInstallationRepository::new(pool.clone())
            .list_all()
            .await
            .map_err(|error| ("installation_registry", error.to_string(), 4u8));
        pool.close().await;
        Ok::<usize, StepFailure>(installations?.len())
    });

    match result {
        Ok(count) => {
            let broadcast = if config.broadcast.enabled {
                format!(
                    "daily broadcast at {:02}:{:02} local",
                    config.broadcast.hour, config.broadcast.minute
                )
            } else {
                "daily broadcast disabled".to_string()
            };
            CommandResult::success(
                "start",
                format!(
                    "preflight passed: {count} installation(s), {broadcast}, \
                     server will bind {}:{}",
                    config.server.bind_address, config.server.port
                ),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("start", error_class, message, exit_code)
        }
    }
}
