use crate::commands::{
    build_context, init_logging, load_config, open_database, runtime, CommandResult,
};

pub fn run() -> CommandResult {
    let config = match load_config("reconcile") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config);

    let runtime = match runtime("reconcile") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let context = build_context(&config, pool.clone())?;
        let report = context
            .moderation()
            .reconcile()
            .await
            .map_err(|error| ("reconcile", error.to_string(), 7u8));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success(
            "reconcile",
            format!(
                "scanned {} claimed quote(s), finished {} interrupted decision(s)",
                report.scanned, report.resolved
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("reconcile", error_class, message, exit_code)
        }
    }
}
