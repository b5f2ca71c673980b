use thiserror::Error;

/// Recoverable failures while converting a single question record.
///
/// The orchestrator catches any of these, captures the offending record as a
/// malformed entry, and continues with the next question. Nothing in this
/// enum ever aborts a whole run.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("missing field: {key}")]
    FieldMissing { key: String },

    #[error("unexpected shape for {key}: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("attachment {name}: payload is not valid base64: {source}")]
    DecodeError {
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("cloze question has {count} blanks, only {max} placeholder symbols are available")]
    TooManyBlanks { count: usize, max: usize },
}

impl ConvertError {
    pub fn missing(key: impl Into<String>) -> Self {
        ConvertError::FieldMissing { key: key.into() }
    }

    pub fn mismatch(key: impl Into<String>, expected: &'static str) -> Self {
        ConvertError::TypeMismatch {
            key: key.into(),
            expected,
        }
    }
}
