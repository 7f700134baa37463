use statusquo_engine::BroadcastSummary;

use crate::commands::{
    build_context, init_logging, load_config, open_database, runtime, CommandResult,
};

pub fn run() -> CommandResult {
    let config = match load_config("broadcast") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config);

    let runtime = match runtime("broadcast") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let context = build_context(&config, pool.clone())?;
        let summary = context
            .broadcaster()
            .run()
            .await
            .map_err(|error| ("installation_registry", error.to_string(), 7u8));
        pool.close().await;
        summary
    });

    match result {
        Ok(summary) => CommandResult::success("broadcast", render_summary(&summary)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("broadcast", error_class, message, exit_code)
        }
    }
}

pub(crate) fn render_summary(summary: &BroadcastSummary) -> String {
    format!(
        "processed={} updated={} failed={} refresh_failed={} skipped_no_token={} timed_out={}",
        summary.processed,
        summary.updated,
        summary.failed,
        summary.refresh_failed,
        summary.skipped_no_token,
        summary.timed_out,
    )
}
