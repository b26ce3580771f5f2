//! Error type shared by every stage of the digest pipeline.
//!
//! Remote-call failures are deliberately flat: whatever endpoint failed, the
//! caller gets one [`DigestError::Api`] with a human-readable context and the
//! raw response payload that lacked the expected success field.

use thiserror::Error;

/// Errors raised while configuring, composing, rendering or publishing.
#[derive(Debug, Error)]
pub enum DigestError {
    /// A required credential was not found in the environment.
    #[error("missing credential: {0} is not set")]
    MissingCredential(&'static str),

    /// A configuration value is present but unusable.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    /// A remote API answered without the field that signals success.
    #[error("{context} failed: {payload}")]
    Api { context: String, payload: String },

    /// The article directory does not contain what the publisher needs.
    #[error("article error: {0}")]
    Article(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

impl DigestError {
    /// Builds an [`DigestError::Api`] from a context label and any payload.
    pub fn api(context: impl Into<String>, payload: impl ToString) -> Self {
        Self::Api {
            context: context.into(),
            payload: payload.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_carries_payload() {
        let err = DigestError::api("draft creation", r#"{"errcode":40007}"#);
        assert_eq!(err.to_string(), r#"draft creation failed: {"errcode":40007}"#);
    }

    #[test]
    fn missing_credential_names_variable() {
        let err = DigestError::MissingCredential("ANTHROPIC_API_KEY");
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
