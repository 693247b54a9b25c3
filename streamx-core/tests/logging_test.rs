//! Logging setup integration tests.

use std::sync::Once;
use streamx_core::logging::{LogConfig, LogFormat, LogLevel, try_init_logging};

static INIT: Once = Once::new();

fn setup_logging() {
    INIT.call_once(|| {
        let _ = try_init_logging(&LogConfig::test());
    });
}

#[test]
fn test_log_config_default() {
    let config = LogConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Pretty);
    assert!(config.show_target);
    assert!(!config.show_thread_ids);
}

#[test]
fn test_log_config_development() {
    let config = LogConfig::development();
    assert_eq!(config.level, LogLevel::Debug);
    assert_eq!(config.format, LogFormat::Pretty);
    assert!(config.show_span_events);
}

#[test]
fn test_log_config_production() {
    let config = LogConfig::production();
    assert_eq!(config.format, LogFormat::Json);
    assert!(config.show_thread_ids);
}

#[test]
fn test_custom_log_config() {
    let config = LogConfig {
        level: LogLevel::Trace,
        format: LogFormat::Compact,
        show_thread_ids: true,
        show_target: false,
        show_span_events: false,
    };
    assert_eq!(config.level.to_string(), "trace");
    assert!(!config.show_target);
}

#[test]
fn test_second_init_is_rejected() {
    setup_logging();
    assert!(try_init_logging(&LogConfig::test()).is_err());
}

#[test]
fn test_session_events_log_without_panicking() {
    use tracing::{debug, error, info, warn};

    setup_logging();

    info!(client = "linear/default", conn = 0, topics = 3, "reconnected, resubscribing");
    warn!(symbol = "BTC/USDT", expected = 41, got = 40, "update id went backwards");
    error!(client = "private/main", error = "timeout", "re-login after reconnect failed");
    debug!(frame = r#"{"op":"pong"}"#, "dropped frame");
}
