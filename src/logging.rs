//! Tracing subscriber setup for the binary.

use crate::domain::error::JournalError;

/// Environment variable that overrides the configured log filter.
pub const LOG_ENV: &str = "TRADEJOURNAL_LOG";

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays clean. Calling this twice leaves the first subscriber in place.
pub fn init_tracing(log_level: &str, log_format: &str) -> Result<(), JournalError> {
    let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter).map_err(|err| {
        JournalError::ConfigInvalid {
            section: "log".to_string(),
            key: "level".to_string(),
            reason: format!("invalid log filter '{filter}': {err}"),
        }
    })?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let result = if log_format.trim().eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_a_config_error() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        let err = init_tracing("tradejournal=loud", "text").unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "level"));
    }

    #[test]
    fn repeated_init_is_harmless() {
        if std::env::var(LOG_ENV).is_ok() {
            return;
        }
        assert!(init_tracing("warn", "text").is_ok());
        assert!(init_tracing("warn", "json").is_ok());
    }
}
