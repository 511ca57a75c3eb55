//! Client error taxonomy.

use crate::protocol::messages::{MessageType, StatusCode};
use crate::protocol::types::OpKind;
use crate::protocol::ParseError;
use std::time::Duration;

/// Errors surfaced by the Kinetic client.
#[derive(Debug, thiserror::Error)]
pub enum KineticError {
    /// Drive answered NOT_FOUND, or a GET announced a zero-length value
    #[error("object not found")]
    ObjectNotFound,

    /// The inbound stream could not be parsed as a PDU
    #[error("malformed PDU: {0}")]
    MalformedPdu(#[from] ParseError),

    /// The GET value ended before (or ran past) its announced length
    #[error("truncated value: expected {expected} bytes, received {received}")]
    TruncatedValue { expected: usize, received: usize },

    /// The drive slot has never completed a handshake
    #[error("session for drive {0} is not ready")]
    SessionNotReady(usize),

    /// Socket-level failure
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// No response arrived within the operation timeout
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success status other than NOT_FOUND, with the drive's message
    #[error("drive error ({code:?}): {message}")]
    Drive { code: StatusCode, message: String },

    /// A response arrived that does not answer the pending request
    #[error("unexpected {received:?} while awaiting {expected:?}")]
    UnexpectedResponse {
        expected: Option<OpKind>,
        received: Option<MessageType>,
    },

    /// A second request was started while one is still outstanding
    #[error("session already has a pending {0} request")]
    SessionBusy(OpKind),

    /// No configured drive matches the index or key
    #[error("unknown drive: {0}")]
    UnknownDrive(String),

    /// The requested byte range does not fit the stored value
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// The value cannot be sent in a single PUT
    #[error("value of {size} bytes exceeds the {max}-byte limit")]
    ValueTooLarge { size: usize, max: usize },
}

impl KineticError {
    /// Returns true when the session can no longer be trusted and must be
    /// torn down before the next request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KineticError::MalformedPdu(_)
                | KineticError::TruncatedValue { .. }
                | KineticError::Transport(_)
                | KineticError::Timeout(_)
                | KineticError::UnexpectedResponse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, KineticError>;
