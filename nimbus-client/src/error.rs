/// Error types for the Nimbus datastore client
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Malformed caller input; nothing was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Network or HTTP failure reported by the request sender.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response body carrying an `error` field.
    #[error("Service error{}: {message}", code.map(|c| format!(" {}", c)).unwrap_or_default())]
    Service {
        code: Option<i64>,
        message: String,
    },

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Build a service error from the `error` field of a response body.
    ///
    /// The field is usually `{code, message, errors}`, but a bare string is
    /// accepted as the message.
    pub fn from_error_body(error: &serde_json::Value) -> Self {
        match error {
            serde_json::Value::String(message) => ClientError::Service {
                code: None,
                message: message.clone(),
            },
            other => ClientError::Service {
                code: other.get("code").and_then(serde_json::Value::as_i64),
                message: other
                    .get("message")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            },
        }
    }

    /// Returns a stable error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "VALIDATION_ERROR",
            ClientError::Encoding(_) => "ENCODING_ERROR",
            ClientError::Decoding(_) => "DECODING_ERROR",
            ClientError::Transport(_) => "TRANSPORT_ERROR",
            ClientError::Service { .. } => "SERVICE_ERROR",
            ClientError::Unimplemented(_) => "UNIMPLEMENTED",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// This layer never retries; the classification is for callers that do.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Service { code: Some(code), .. } => {
                matches!(code, 409 | 429 | 500 | 502 | 503 | 504)
            }
            ClientError::Service { code: None, .. } => false,
            ClientError::Validation(_)
            | ClientError::Encoding(_)
            | ClientError::Decoding(_)
            | ClientError::Unimplemented(_)
            | ClientError::Config(_) => false,
        }
    }
}

impl From<nimbus_core::Error> for ClientError {
    fn from(err: nimbus_core::Error) -> Self {
        match err {
            nimbus_core::Error::Validation(msg) => ClientError::Validation(msg),
            nimbus_core::Error::Encoding(msg) => ClientError::Encoding(msg),
            nimbus_core::Error::Decoding(msg) => ClientError::Decoding(msg),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decoding(err.to_string())
    }
}
