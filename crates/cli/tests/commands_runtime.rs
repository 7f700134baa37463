use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use statusquo_cli::commands::{broadcast, config, doctor, migrate, reconcile, start};

const VALID_ENV: &[(&str, &str)] = &[
    ("STATUSQUO_SLACK_BOT_TOKEN", "xoxb-test"),
    ("STATUSQUO_SLACK_CLIENT_ID", "123.456"),
    ("STATUSQUO_SLACK_CLIENT_SECRET", "shh"),
    ("STATUSQUO_DATABASE_URL", "sqlite::memory:"),
    ("STATUSQUO_DATABASE_MAX_CONNECTIONS", "1"),
];

#[test]
fn start_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = start::run();
        assert_eq!(result.exit_code, 0, "expected successful start preflight");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("0 installation(s)"));
        assert!(message.contains("daily broadcast at 09:00 local"));
    });
}

#[test]
fn start_returns_config_failure_without_credentials() {
    with_env(&[], || {
        let result = start::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "start");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn broadcast_over_an_empty_registry_reports_zero_work() {
    with_env(VALID_ENV, || {
        let result = broadcast::run();
        assert_eq!(result.exit_code, 0, "expected successful broadcast run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "broadcast");
        assert_eq!(
            payload["message"],
            "processed=0 updated=0 failed=0 refresh_failed=0 skipped_no_token=0 timed_out=0"
        );
    });
}

#[test]
fn reconcile_over_an_empty_queue_resolves_nothing() {
    with_env(VALID_ENV, || {
        let result = reconcile::run();
        assert_eq!(result.exit_code, 0, "expected successful reconcile run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "reconcile");
        assert_eq!(
            payload["message"],
            "scanned 0 claimed quote(s), finished 0 interrupted decision(s)"
        );
    });
}

#[test]
fn broadcast_rejects_a_user_token_as_bot_token() {
    with_env(
        &[
            ("STATUSQUO_SLACK_BOT_TOKEN", "xoxp-user"),
            ("STATUSQUO_SLACK_CLIENT_ID", "123.456"),
            ("STATUSQUO_SLACK_CLIENT_SECRET", "shh"),
            ("STATUSQUO_DATABASE_URL", "sqlite::memory:"),
        ],
        || {
            let result = broadcast::run();
            assert_eq!(result.exit_code, 2);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(VALID_ENV, || {
        let output = config::run();

        assert!(output.contains(
            "- slack.bot_token = xoxb-*** (source: env (STATUSQUO_SLACK_BOT_TOKEN))"
        ));
        assert!(output.contains("- slack.client_secret = <redacted>"));
        assert!(output.contains("- broadcast.hour = 9 (source: default)"));
        assert!(!output.contains("shh"));
    });
}

#[test]
fn doctor_json_reports_every_check() {
    with_env(VALID_ENV, || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks array")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(names, ["config_validation", "slack_credentials", "database_connectivity"]);
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PORT",
        "STATUSQUO_ADMIN_TOKEN",
        "STATUSQUO_BROADCAST_CONCURRENCY",
        "STATUSQUO_BROADCAST_DEADLINE_SECS",
        "STATUSQUO_BROADCAST_ENABLED",
        "STATUSQUO_BROADCAST_HOUR",
        "STATUSQUO_BROADCAST_MINUTE",
        "STATUSQUO_DATABASE_MAX_CONNECTIONS",
        "STATUSQUO_DATABASE_TIMEOUT_SECS",
        "STATUSQUO_DATABASE_URL",
        "STATUSQUO_LIMITS_MAX_DAILY",
        "STATUSQUO_LIMITS_MAX_PENDING",
        "STATUSQUO_LIMITS_MAX_UPDATES",
        "STATUSQUO_LIMITS_WINDOW_MINUTES",
        "STATUSQUO_LOGGING_FORMAT",
        "STATUSQUO_LOGGING_LEVEL",
        "STATUSQUO_LOG_FORMAT",
        "STATUSQUO_LOG_LEVEL",
        "STATUSQUO_SERVER_BIND_ADDRESS",
        "STATUSQUO_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "STATUSQUO_SERVER_PORT",
        "STATUSQUO_SLACK_API_BASE_URL",
        "STATUSQUO_SLACK_BOT_TOKEN",
        "STATUSQUO_SLACK_CLIENT_ID",
        "STATUSQUO_SLACK_CLIENT_SECRET",
        "STATUSQUO_SLACK_INSTALL_URL",
        "STATUSQUO_SLACK_REQUEST_TIMEOUT_SECS",
        "STATUSQUO_SLACK_REVIEW_CHANNEL",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
