//! Configuration validation.
//!
//! Validates journal config fields before any log is imported or charted.

use crate::domain::error::JournalError;
use crate::domain::pnl_series::ViewMode;
use crate::domain::reconstructor::OpenPolicy;
use crate::ports::config_port::ConfigPort;

pub const STORE_BACKENDS: &[&str] = &["sqlite", "csv"];
pub const LOG_FORMATS: &[&str] = &["text", "json"];

pub fn validate_journal_config(config: &dyn ConfigPort) -> Result<(), JournalError> {
    validate_commission(config)?;
    validate_open_policy(config)?;
    validate_view_mode(config)?;
    validate_store(config)?;
    validate_log(config)?;
    validate_point_values(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> JournalError {
    JournalError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), JournalError> {
    let Some(raw) = config.get_string("journal", "commission_per_trade") else {
        return Ok(());
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(()),
        Ok(_) => Err(invalid(
            "journal",
            "commission_per_trade",
            "commission_per_trade must be non-negative",
        )),
        Err(_) => Err(invalid(
            "journal",
            "commission_per_trade",
            format!("'{raw}' is not a number"),
        )),
    }
}

fn validate_open_policy(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if let Some(raw) = config.get_string("journal", "open_policy") {
        raw.parse::<OpenPolicy>()
            .map_err(|e| invalid("journal", "open_policy", e))?;
    }
    Ok(())
}

fn validate_view_mode(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if let Some(raw) = config.get_string("journal", "view_mode") {
        raw.parse::<ViewMode>()
            .map_err(|e| invalid("journal", "view_mode", e))?;
    }
    Ok(())
}

fn validate_store(config: &dyn ConfigPort) -> Result<(), JournalError> {
    let backend = config
        .get_string("store", "backend")
        .unwrap_or_else(|| "sqlite".to_string())
        .to_lowercase();
    if !STORE_BACKENDS.contains(&backend.as_str()) {
        return Err(invalid(
            "store",
            "backend",
            format!("expected one of {}", STORE_BACKENDS.join(", ")),
        ));
    }
    if backend == "csv" && config.get_string("store", "csv_path").is_none() {
        return Err(JournalError::ConfigMissing {
            section: "store".to_string(),
            key: "csv_path".to_string(),
        });
    }
    if backend == "sqlite" {
        if config.get_string("sqlite", "path").is_none() {
            return Err(JournalError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            });
        }
        if config.get_int("sqlite", "pool_size", 4) < 1 {
            return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
        }
    }
    Ok(())
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), JournalError> {
    if let Some(format) = config.get_string("log", "format") {
        if !LOG_FORMATS.contains(&format.trim().to_lowercase().as_str()) {
            return Err(invalid(
                "log",
                "format",
                format!("expected one of {}", LOG_FORMATS.join(", ")),
            ));
        }
    }
    Ok(())
}

fn validate_point_values(config: &dyn ConfigPort) -> Result<(), JournalError> {
    for root in config.section_keys("point_values") {
        let raw = config.get_string("point_values", &root).unwrap_or_default();
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => {}
            _ => {
                return Err(invalid(
                    "point_values",
                    &root,
                    "point value must be a positive number",
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[journal]
commission_per_trade = 2.5
open_policy = queue
view_mode = yearly

[store]
backend = sqlite

[sqlite]
path = journal.db

[log]
format = json

[point_values]
XYZ = 12.5
"#;

    #[test]
    fn valid_config_passes() {
        assert!(validate_journal_config(&config(VALID)).is_ok());
    }

    #[test]
    fn negative_commission_rejected() {
        let err = validate_journal_config(&config(
            "[journal]\ncommission_per_trade = -1\n[sqlite]\npath = x.db\n",
        ))
        .unwrap_err();
        assert!(
            matches!(err, JournalError::ConfigInvalid { key, .. } if key == "commission_per_trade")
        );
    }

    #[test]
    fn non_numeric_commission_rejected() {
        let err = validate_journal_config(&config(
            "[journal]\ncommission_per_trade = lots\n[sqlite]\npath = x.db\n",
        ))
        .unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { .. }));
    }

    #[test]
    fn unknown_open_policy_rejected() {
        let err = validate_journal_config(&config(
            "[journal]\nopen_policy = lifo\n[sqlite]\npath = x.db\n",
        ))
        .unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "open_policy"));
    }

    #[test]
    fn unknown_view_mode_rejected() {
        let err = validate_journal_config(&config(
            "[journal]\nview_mode = weekly\n[sqlite]\npath = x.db\n",
        ))
        .unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "view_mode"));
    }

    #[test]
    fn sqlite_backend_requires_path() {
        let err = validate_journal_config(&config("[journal]\n")).unwrap_err();
        assert!(
            matches!(err, JournalError::ConfigMissing { section, key } if section == "sqlite" && key == "path")
        );
    }

    #[test]
    fn csv_backend_requires_csv_path() {
        let err = validate_journal_config(&config("[store]\nbackend = csv\n")).unwrap_err();
        assert!(matches!(err, JournalError::ConfigMissing { key, .. } if key == "csv_path"));

        let ok = config("[store]\nbackend = csv\ncsv_path = trades.csv\n");
        assert!(validate_journal_config(&ok).is_ok());
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = validate_journal_config(&config("[store]\nbackend = redis\n")).unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn unknown_log_format_rejected() {
        let err = validate_journal_config(&config(
            "[sqlite]\npath = x.db\n[log]\nformat = xml\n",
        ))
        .unwrap_err();
        assert!(matches!(err, JournalError::ConfigInvalid { key, .. } if key == "format"));
    }

    #[test]
    fn bad_point_value_rejected() {
        let err = validate_journal_config(&config(
            "[sqlite]\npath = x.db\n[point_values]\nXYZ = 0\n",
        ))
        .unwrap_err();
        assert!(
            matches!(err, JournalError::ConfigInvalid { section, .. } if section == "point_values")
        );
    }
}
