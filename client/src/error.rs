//! Error types shared by the remote client and the filesystem layer.

use std::io;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by a [`RemoteObjectClient`](crate::remote::RemoteObjectClient).
///
/// The client never retries; callers decide what a failure means.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The store answered 404 for the given object id.
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("remote store returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Connection, TLS or protocol failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A payload could not be encoded or decoded.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The operation context was cancelled before the call completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation context deadline passed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// An endpoint URL could not be built from the configured base.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// The blocking runtime could not be created.
    #[error("runtime error: {0}")]
    Runtime(#[from] io::Error),
}

/// Errors returned by the filesystem façade and its handles.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The operation or flag combination is not implemented by this layer.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("file handle is closed")]
    Closed,

    #[error(transparent)]
    Remote(RemoteError),
}

pub type FsResult<T> = Result<T, FsError>;

impl From<RemoteError> for FsError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(id) => FsError::NotFound(id),
            other => FsError::Remote(other),
        }
    }
}

impl FsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound(_))
    }

    /// HTTP status a directory-protocol server should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            FsError::NotFound(_) => StatusCode::NOT_FOUND,
            FsError::AlreadyExists(_) => StatusCode::CONFLICT,
            FsError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            FsError::Closed => StatusCode::BAD_REQUEST,
            FsError::Remote(RemoteError::DeadlineExceeded) => StatusCode::GATEWAY_TIMEOUT,
            FsError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NotFound(_) => io::ErrorKind::NotFound,
            FsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            FsError::Unsupported(_) => io::ErrorKind::Unsupported,
            FsError::Closed => io::ErrorKind::BrokenPipe,
            FsError::Remote(RemoteError::DeadlineExceeded) => io::ErrorKind::TimedOut,
            FsError::Remote(RemoteError::Cancelled) => io::ErrorKind::Interrupted,
            FsError::Remote(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
