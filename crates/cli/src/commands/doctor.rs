use secrecy::ExposeSecret;
use serde::Serialize;
use statusquo_core::config::{AppConfig, LoadOptions};
use statusquo_db::connect_with_settings;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

impl CheckStatus {
    fn marker(self) -> &'static str {
        match self {
            Self::Pass => "ok",
            Self::Fail => "fail",
            Self::Skipped => "skip",
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Checks that only make sense once the configuration has loaded.
const DEPENDENT_CHECKS: [&str; 2] = ["slack_credentials", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if !json_output {
        return render_human(&report);
    }
    serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        serde_json::json!({
            "overall_status": "fail",
            "summary": "doctor serialization failed",
            "error": error.to_string(),
        })
        .to_string()
    })
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_slack_credentials(&config),
            check_database_connectivity(&config),
        ],
        Err(error) => std::iter::once(DoctorCheck::fail("config_validation", error.to_string()))
            .chain(DEPENDENT_CHECKS.into_iter().map(|name| DoctorCheck {
                name,
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            }))
            .collect(),
    };

    let failed = checks.iter().filter(|check| check.status != CheckStatus::Pass).count();
    let (overall_status, summary) = if failed == 0 {
        (CheckStatus::Pass, "doctor: all readiness checks passed".to_string())
    } else {
        (CheckStatus::Fail, format!("doctor: {failed} of {} checks did not pass", checks.len()))
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_slack_credentials(config: &AppConfig) -> DoctorCheck {
    let slack = &config.slack;
    let bot_token_ok = slack.bot_token.expose_secret().starts_with("xoxb-");
    let problems: Vec<&str> = [
        (!bot_token_ok, "bot token is not an `xoxb-` token"),
        (slack.client_id.trim().is_empty(), "client id is empty"),
        (slack.client_secret.expose_secret().trim().is_empty(), "client secret is empty"),
    ]
    .into_iter()
    .filter_map(|(failed, problem)| failed.then_some(problem))
    .collect();

    if !problems.is_empty() {
        return DoctorCheck::fail("slack_credentials", problems.join("; "));
    }

    let review = match slack.review_channel.as_deref() {
        Some(channel) => format!("submissions are posted to {channel}"),
        None => "no review channel, submissions are only visible through the admin API"
            .to_string(),
    };
    DoctorCheck::pass(
        "slack_credentials",
        format!("bot token and OAuth client configured; {review}"),
    )
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let reachability = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let answered = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|error| format!("database query failed: {error}"));
        pool.close().await;
        answered.map(|_| ())
    });

    match reachability {
        Ok(()) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    std::iter::once(report.summary.clone())
        .chain(report.checks.iter().map(|check| {
            format!("- [{}] {}: {}", check.status.marker(), check.name, check.details)
        }))
        .collect::<Vec<_>>()
        .join("\n")
}
