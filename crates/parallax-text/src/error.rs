//! Text-processing error types.

use thiserror::Error;

/// Errors from rule loading and text processing.
#[derive(Debug, Error)]
pub enum TextError {
    /// A rule file could not be read.
    #[error("Failed to read rule file '{path}': {reason}")]
    RuleFile {
        /// Path as given in configuration
        path: String,
        /// Underlying I/O failure
        reason: String,
    },

    /// A rule pattern failed to compile.
    #[error("Invalid rule pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern text
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// Rule file parsed but is not the expected shape.
    #[error("Malformed rule file: {0}")]
    Serialization(String),
}

/// Result type for text operations.
pub type TextResult<T> = Result<T, TextError>;

impl From<serde_json::Error> for TextError {
    fn from(err: serde_json::Error) -> Self {
        TextError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_file_display() {
        let err = TextError::RuleFile {
            path: "/etc/rules.json".to_string(),
            reason: "No such file".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("/etc/rules.json"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn test_invalid_pattern_display() {
        let err = TextError::InvalidPattern {
            pattern: "([unclosed".to_string(),
            reason: "unclosed group".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("([unclosed"));
    }

    #[test]
    fn test_from_serde_json() {
        let json_err = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let err: TextError = json_err.into();
        assert!(matches!(err, TextError::Serialization(_)));
    }
}
