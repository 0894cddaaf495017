//! Error types for the TIDAL API layer

use super::models::AlbumId;

/// Transport-level failure of a single request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Received empty response")]
    EmptyBody,

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Not logged in")]
    Unauthorized,
}

/// A JSON payload or item that does not have the expected shape
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("{0} is not an object")]
    NotObject(&'static str),

    #[error("{what} is missing {field}")]
    MissingField { what: &'static str, field: &'static str },

    #[error("track album id is wrong ({found} != {expected})")]
    WrongAlbum { expected: AlbumId, found: AlbumId },

    #[error("invalid duration for song")]
    InvalidDuration,

    #[error("item missing type or album")]
    UnknownItem,
}

/// Failure while logging in
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoginError {
    #[error("Missing username, password or API token")]
    MissingCredentials,

    #[error("Login request failed: {0}")]
    Request(#[from] FetchError),

    #[error("Login reply is missing {0}")]
    IncompleteReply(&'static str),
}
