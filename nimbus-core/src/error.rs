use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed caller input, detected before anything is sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A local value that has no wire representation.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A wire shape that cannot be turned back into a local value.
    #[error("Decoding error: {0}")]
    Decoding(String),
}

impl Error {
    /// Returns a stable error code for this error variant.
    /// These codes are stable and can be used by clients for error classification.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Encoding(_) => "ENCODING_ERROR",
            Error::Decoding(_) => "DECODING_ERROR",
        }
    }

    /// Adds context to an error while keeping its variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use nimbus_core::Error;
    ///
    /// let err = Error::Validation("dataset id is empty".to_string())
    ///     .with_context("encoding key");
    /// assert_eq!(err.to_string(), "Validation error: encoding key: dataset id is empty");
    /// ```
    pub fn with_context(self, context: &str) -> Error {
        match self {
            Error::Validation(msg) => Error::Validation(format!("{}: {}", context, msg)),
            Error::Encoding(msg) => Error::Encoding(format!("{}: {}", context, msg)),
            Error::Decoding(msg) => Error::Decoding(format!("{}: {}", context, msg)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
