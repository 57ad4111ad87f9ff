use thiserror::Error;

/// Errors produced while handling inbound messages or talking to the platform API.
#[derive(Debug, Error)]
pub enum Error {
    /// The inbound body is not a well-formed `<xml>` envelope.
    #[error("malformed message: {0}")]
    Parse(String),

    /// Signature check failed.
    #[error("invalid request")]
    InvalidRequest,

    /// A typed projection was requested on a message of another kind.
    #[error("cannot convert {actual} into {expected}")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// An outbound message could not be rendered, e.g. its header names a
    /// different message kind than its payload.
    #[error("failed to render message: {0}")]
    Render(String),

    /// The platform answered with an HTTP error status; `body` is passed through untouched.
    #[error("{status}:{body}")]
    Api { status: u16, body: String },

    /// The platform accepted the call but reported a nonzero `errcode`.
    #[error("{message}")]
    Protocol { code: i64, message: String },

    #[error("malformed platform response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("platform request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Error raised by an application-supplied handler, returned as is.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl From<std::fmt::Error> for Error {
    fn from(e: std::fmt::Error) -> Self {
        Self::Render(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
