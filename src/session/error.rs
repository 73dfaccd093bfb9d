//! Session error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::session::codec::CodecError;

/// Errors raised by stores, the registry and the session helpers.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session name is not a valid cookie name.
    #[error("sessions: invalid character in cookie name: {0}")]
    InvalidName(String),

    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reading, writing or removing a session file failed.
    #[error("sessions: persistence error on {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The session has no store to save through.
    #[error("sessions: missing store for session {0:?}")]
    MissingStore(String),

    /// The session was still locked when the batch was saved.
    #[error("sessions: session {0:?} is still locked; release it before saving")]
    Locked(String),

    /// A handler asked for a store that is not configured.
    #[error("sessions: no store configured under {0:?}")]
    UnknownStore(String),

    /// Saving one session of a batch failed.
    #[error("sessions: error saving session {name:?} -- {source}")]
    Save {
        name: String,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// The codec error at the root of this error, if any.
    pub fn codec(&self) -> Option<&CodecError> {
        match self {
            SessionError::Codec(e) => Some(e),
            SessionError::Save { source, .. } => source.codec(),
            _ => None,
        }
    }
}

/// Errors collected from a batch of independent operations.
///
/// Renders as `(0 errors)` when empty, the sole message when it holds one
/// error, and `"<first> (and N other errors)"` otherwise.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<SessionError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SessionError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[SessionError] {
        &self.errors
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.as_slice() {
            [] => write!(f, "(0 errors)"),
            [only] => write!(f, "{}", only),
            [first, _] => write!(f, "{} (and 1 other error)", first),
            [first, rest @ ..] => write!(f, "{} (and {} other errors)", first, rest.len()),
        }
    }
}

impl std::error::Error for MultiError {}

impl IntoIterator for MultiError {
    type Item = SessionError;
    type IntoIter = std::vec::IntoIter<SessionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
