//! Kinetic PDU Types
//!
//! A Protocol Data Unit is one framed message on a drive connection:
//!
//! ```text
//! +-------+---------------------+---------------------+------------------+-----------------+
//! | magic | message_len (u32)   | value_len (u32)     | structured msg   | raw value       |
//! | 'F'   | big-endian          | big-endian          | message_len bytes| value_len bytes |
//! +-------+---------------------+---------------------+------------------+-----------------+
//!   1 byte       4 bytes               4 bytes
//!               ← fixed 9-byte header →
//! ```
//!
//! The value segment is only present on PUT requests and GET responses.

use crate::error::KineticError;
use crate::protocol::messages::{MessageType, StatusCode, Synchronization};
use bytes::Bytes;
use std::fmt;

pub use crate::protocol::messages::LogType;

/// Magic byte opening every PDU
pub const MAGIC: u8 = b'F';

/// Size of the fixed frame header
pub const HEADER_SIZE: usize = 9;

/// Largest structured message accepted from a drive (1 MiB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest value segment accepted from a drive (64 MiB)
pub const MAX_VALUE_SIZE: usize = 64 * 1024 * 1024;

/// The fixed 9-byte header preceding every PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Length of the structured message segment
    pub message_len: u32,
    /// Length of the raw value segment (0 for metadata-only PDUs)
    pub value_len: u32,
}

impl FrameHeader {
    pub fn new(message_len: u32, value_len: u32) -> Self {
        Self {
            message_len,
            value_len,
        }
    }

    /// Serializes the header into its wire representation.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = MAGIC;
        out[1..5].copy_from_slice(&self.message_len.to_be_bytes());
        out[5..9].copy_from_slice(&self.value_len.to_be_bytes());
        out
    }

    /// Total frame size, header included.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.message_len as usize + self.value_len as usize
    }
}

/// The kind of request awaiting a response on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Put,
    Get,
    Delete,
    GetLog,
}

impl OpKind {
    /// Message type sent on the wire for this request.
    pub fn request_type(self) -> MessageType {
        match self {
            OpKind::Put => MessageType::Put,
            OpKind::Get => MessageType::Get,
            OpKind::Delete => MessageType::Delete,
            OpKind::GetLog => MessageType::GetLog,
        }
    }

    /// Message type the drive answers this request with.
    pub fn response_type(self) -> MessageType {
        match self {
            OpKind::Put => MessageType::PutResponse,
            OpKind::Get => MessageType::GetResponse,
            OpKind::Delete => MessageType::DeleteResponse,
            OpKind::GetLog => MessageType::GetLogResponse,
        }
    }

    /// Maps a response message type back to the request kind it answers.
    pub fn from_response(message_type: MessageType) -> Option<OpKind> {
        match message_type {
            MessageType::PutResponse => Some(OpKind::Put),
            MessageType::GetResponse => Some(OpKind::Get),
            MessageType::DeleteResponse => Some(OpKind::Delete),
            MessageType::GetLogResponse => Some(OpKind::GetLog),
            _ => None,
        }
    }

    /// Maps a request message type to its kind.
    pub fn from_request(message_type: MessageType) -> Option<OpKind> {
        match message_type {
            MessageType::Put => Some(OpKind::Put),
            MessageType::Get => Some(OpKind::Get),
            MessageType::Delete => Some(OpKind::Delete),
            MessageType::GetLog => Some(OpKind::GetLog),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Put => write!(f, "PUT"),
            OpKind::Get => write!(f, "GET"),
            OpKind::Delete => write!(f, "DELETE"),
            OpKind::GetLog => write!(f, "GETLOG"),
        }
    }
}

/// Durability options for PUT and DELETE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    pub synchronization: Synchronization,
    /// Skip the drive's version check
    pub force: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            synchronization: Synchronization::WriteThrough,
            force: false,
        }
    }
}

impl WriteOptions {
    pub fn new(synchronization: Synchronization, force: bool) -> Self {
        Self {
            synchronization,
            force,
        }
    }
}

/// Capacity log reported by a drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCapacity {
    pub nominal_capacity_bytes: u64,
    /// Fraction of the drive in use, between 0.0 and 1.0
    pub portion_full: f32,
}

/// A decoded PDU.
///
/// Built once by the codec and never mutated afterwards. Responses carry the
/// request sequence in `ack_sequence`; requests carry their own in `sequence`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// `None` for the drive's unsolicited handshake
    pub message_type: Option<MessageType>,
    pub status: StatusCode,
    /// Drive-supplied text accompanying a non-success status
    pub status_message: Option<String>,
    pub connection_id: u64,
    pub cluster_version: u64,
    pub sequence: u64,
    pub ack_sequence: Option<u64>,
    pub key: Option<Bytes>,
    pub tag: Option<Bytes>,
    pub synchronization: Option<Synchronization>,
    pub force: bool,
    pub log_types: Vec<LogType>,
    pub capacity: Option<DriveCapacity>,
    /// Length of the raw value segment following the structured message
    pub value_len: u32,
}

impl Pdu {
    /// Returns true for the unsolicited status PDU a drive sends on connect.
    pub fn is_handshake(&self) -> bool {
        self.message_type.is_none()
    }

    /// Maps the status code onto the client's error taxonomy.
    pub fn outcome(&self) -> Result<(), KineticError> {
        match self.status {
            StatusCode::Success => Ok(()),
            StatusCode::NotFound => Err(KineticError::ObjectNotFound),
            code => Err(KineticError::Drive {
                code,
                message: self
                    .status_message
                    .clone()
                    .unwrap_or_else(|| format!("{:?}", code)),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdu_with_status(status: StatusCode, message: Option<&str>) -> Pdu {
        Pdu {
            message_type: Some(MessageType::PutResponse),
            status,
            status_message: message.map(str::to_string),
            connection_id: 1,
            cluster_version: 0,
            sequence: 0,
            ack_sequence: Some(0),
            key: None,
            tag: None,
            synchronization: None,
            force: false,
            log_types: Vec::new(),
            capacity: None,
            value_len: 0,
        }
    }

    #[test]
    fn test_header_encode() {
        let header = FrameHeader::new(0x0102_0304, 5);
        assert_eq!(header.encode(), [b'F', 1, 2, 3, 4, 0, 0, 0, 5]);
        assert_eq!(header.frame_len(), 9 + 0x0102_0304 + 5);
    }

    #[test]
    fn test_success_has_no_error() {
        assert!(pdu_with_status(StatusCode::Success, None).outcome().is_ok());
    }

    #[test]
    fn test_not_found_maps_to_object_not_found() {
        let err = pdu_with_status(StatusCode::NotFound, Some("no such key"))
            .outcome()
            .unwrap_err();
        assert!(matches!(err, KineticError::ObjectNotFound));
    }

    #[test]
    fn test_other_status_keeps_drive_message() {
        let err = pdu_with_status(StatusCode::NoSpace, Some("drive is full"))
            .outcome()
            .unwrap_err();
        match err {
            KineticError::Drive { code, message } => {
                assert_eq!(code, StatusCode::NoSpace);
                assert_eq!(message, "drive is full");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_op_kind_response_mapping() {
        for kind in [OpKind::Put, OpKind::Get, OpKind::Delete, OpKind::GetLog] {
            assert_eq!(OpKind::from_response(kind.response_type()), Some(kind));
            assert_eq!(OpKind::from_request(kind.request_type()), Some(kind));
        }
        assert_eq!(OpKind::from_response(MessageType::Put), None);
    }
}
