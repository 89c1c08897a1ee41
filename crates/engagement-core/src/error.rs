use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the engagement pipeline.
#[derive(Error, Debug)]
pub enum EngagementError {
    /// The event log could not be opened.
    #[error("Input file not found or unreadable {path}: {source}")]
    MissingInputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record had an unparseable amount, an empty identifier or the wrong
    /// number of fields. Recovered locally: the row is skipped and counted,
    /// never propagated.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: u64, reason: String },

    /// A record carried an event label outside the configured kind map.
    /// Recovered locally like [`EngagementError::MalformedRow`].
    #[error("Unrecognized event kind {label:?} at line {line}")]
    UnrecognizedEventKind { line: u64, label: String },

    /// A ranking was requested for a metric key that does not exist.
    #[error("Invalid metric key: {0}")]
    InvalidMetricKey(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The delimited reader or writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed or written.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the engagement crates.
pub type Result<T> = std::result::Result<T, EngagementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_missing_input_file() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = EngagementError::MissingInputFile {
            path: PathBuf::from("/data/steam-200k.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Input file not found"));
        assert!(msg.contains("/data/steam-200k.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_malformed_row() {
        let err = EngagementError::MalformedRow {
            line: 12,
            reason: "amount \"abc\" is not a number".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed row at line 12: amount \"abc\" is not a number"
        );
    }

    #[test]
    fn test_error_display_unrecognized_kind() {
        let err = EngagementError::UnrecognizedEventKind {
            line: 3,
            label: "Purchase".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized event kind \"Purchase\" at line 3"
        );
    }

    #[test]
    fn test_error_display_invalid_metric_key() {
        let err = EngagementError::InvalidMetricKey("fun_factor".to_string());
        assert_eq!(err.to_string(), "Invalid metric key: fun_factor");
    }

    #[test]
    fn test_error_display_config() {
        let err = EngagementError::Config("weights must not all be zero".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: weights must not all be zero"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EngagementError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: EngagementError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
