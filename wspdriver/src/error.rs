use thiserror::Error;

/// Substring the browser transport puts in its error when an input rejects
/// characters outside the Basic Multilingual Plane.
pub const NON_BMP_MARKER: &str = "BMP";

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("login timed out: {0}")]
    LoginTimeout(String),

    #[error("unknown message type: {0:?}")]
    UnknownMessageType(String),

    #[error("unparseable message metadata: {0:?}")]
    MetadataParse(String),

    #[error("element not found: {0}")]
    MissingElement(&'static str),

    #[error("avatar not found")]
    AvatarNotFound,

    #[error("characters outside the Basic Multilingual Plane are not supported")]
    NonBmpUnicodeNotSupported,

    #[error("session stopped")]
    Cancelled,

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid login code: {0}")]
    LoginCode(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl DriverError {
    /// Wraps a transport error, recognising the non-BMP rejection raised by
    /// text inputs.
    pub fn from_transport(err: anyhow::Error) -> Self {
        if format!("{err:#}").contains(NON_BMP_MARKER) {
            DriverError::NonBmpUnicodeNotSupported
        } else {
            DriverError::Transport(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;
