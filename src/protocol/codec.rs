//! PDU Codec
//!
//! Turns requests into framed bytes and structured-message segments back
//! into [`Pdu`]s. Encoding is where the session identity (sequence,
//! connection ID, cluster version) and the credentials meet the payload:
//!
//! 1. Build a `Command` for the operation
//! 2. Serialize it and sign `be_u32(len) || commandBytes` with HMAC-SHA1
//! 3. Wrap both in an `Envelope`, prefix the 9-byte header, append the value
//!
//! Decoding never touches the socket. The caller hands over exactly
//! `message_len` bytes, usually via [`crate::protocol::PduParser`].

use crate::protocol::messages::{
    Algorithm, AuthType, Body, Command, Envelope, GetLog, Header, HmacAuth, KeyValue, LogType,
    MessageType, StatusCode, Synchronization,
};
use crate::protocol::parser::{ParseError, ParseResult};
use crate::protocol::types::{
    DriveCapacity, FrameHeader, OpKind, Pdu, WriteOptions, HEADER_SIZE,
};
use bytes::{BufMut, Bytes, BytesMut};
use hmac::{Hmac, Mac};
use prost::Message as _;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Identity and shared secret used to sign requests and tag values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identity: i64,
    pub secret: Bytes,
}

impl Default for Credentials {
    /// The factory identity shipped on Kinetic drives.
    fn default() -> Self {
        Self {
            identity: 1,
            secret: Bytes::from_static(b"asdfasdf"),
        }
    }
}

/// Session fields stamped onto every outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStamp {
    pub sequence: u64,
    pub connection_id: u64,
    pub cluster_version: u64,
}

/// An outbound request, borrowed from the caller for the duration of encoding.
#[derive(Debug, Clone, Copy)]
pub enum Request<'a> {
    Put {
        key: &'a [u8],
        value: &'a [u8],
        tag: &'a [u8],
        options: WriteOptions,
    },
    Get {
        key: &'a [u8],
    },
    Delete {
        key: &'a [u8],
        options: WriteOptions,
    },
    GetLog {
        types: &'a [LogType],
    },
}

impl Request<'_> {
    pub fn kind(&self) -> OpKind {
        match self {
            Request::Put { .. } => OpKind::Put,
            Request::Get { .. } => OpKind::Get,
            Request::Delete { .. } => OpKind::Delete,
            Request::GetLog { .. } => OpKind::GetLog,
        }
    }

    /// Raw value segment sent after the structured message.
    fn value(&self) -> &[u8] {
        match self {
            Request::Put { value, .. } => value,
            _ => &[],
        }
    }

    fn body(&self) -> Body {
        match *self {
            Request::Put {
                key, tag, options, ..
            } => Body {
                key_value: Some(KeyValue {
                    key: Some(key.to_vec()),
                    tag: Some(tag.to_vec()),
                    algorithm: Some(Algorithm::Sha1 as i32),
                    force: Some(options.force),
                    synchronization: Some(options.synchronization as i32),
                    ..Default::default()
                }),
                get_log: None,
            },
            Request::Get { key } => Body {
                key_value: Some(KeyValue {
                    key: Some(key.to_vec()),
                    ..Default::default()
                }),
                get_log: None,
            },
            Request::Delete { key, options } => Body {
                key_value: Some(KeyValue {
                    key: Some(key.to_vec()),
                    force: Some(options.force),
                    synchronization: Some(options.synchronization as i32),
                    ..Default::default()
                }),
                get_log: None,
            },
            Request::GetLog { types } => Body {
                key_value: None,
                get_log: Some(GetLog {
                    types: types.iter().map(|t| *t as i32).collect(),
                    capacity: None,
                }),
            },
        }
    }
}

/// Computes the 20-byte integrity tag stored alongside a value.
pub fn integrity_tag(secret: &[u8], value: &[u8]) -> ParseResult<Bytes> {
    let mut mac = new_mac(secret)?;
    mac.update(value);
    Ok(Bytes::copy_from_slice(&mac.finalize().into_bytes()))
}

/// Computes the request HMAC over the serialized command.
pub fn command_hmac(secret: &[u8], command_bytes: &[u8]) -> ParseResult<Vec<u8>> {
    let len = u32::try_from(command_bytes.len())
        .map_err(|_| ParseError::Encode("command exceeds 4 GiB".to_string()))?;
    let mut mac = new_mac(secret)?;
    mac.update(&len.to_be_bytes());
    mac.update(command_bytes);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn new_mac(secret: &[u8]) -> ParseResult<HmacSha1> {
    <HmacSha1 as Mac>::new_from_slice(secret).map_err(|e| ParseError::Encode(e.to_string()))
}

/// Encodes a request into a complete frame: header, signed envelope, value.
pub fn encode(
    request: &Request<'_>,
    stamp: &SessionStamp,
    credentials: &Credentials,
) -> ParseResult<Bytes> {
    let command = Command {
        header: Some(Header {
            cluster_version: Some(to_wire("cluster_version", stamp.cluster_version)?),
            connection_id: Some(to_wire("connection_id", stamp.connection_id)?),
            sequence: Some(to_wire("sequence", stamp.sequence)?),
            message_type: Some(request.kind().request_type() as i32),
            ..Default::default()
        }),
        body: Some(request.body()),
        status: None,
    };

    let envelope = sign(&command, credentials)?;
    frame(&envelope, request.value())
}

/// Wraps a command in an HMAC-authenticated envelope.
pub fn sign(command: &Command, credentials: &Credentials) -> ParseResult<Envelope> {
    let command_bytes = command.encode_to_vec();
    let hmac = command_hmac(&credentials.secret, &command_bytes)?;
    Ok(Envelope {
        auth_type: Some(AuthType::HmacAuth as i32),
        hmac_auth: Some(HmacAuth {
            identity: Some(credentials.identity),
            hmac: Some(hmac),
        }),
        command_bytes: Some(command_bytes),
    })
}

/// Wraps a command in an unauthenticated envelope, as drives do for the
/// status they push on connect.
pub fn unsolicited(command: &Command) -> Envelope {
    Envelope {
        auth_type: Some(AuthType::UnsolicitedStatus as i32),
        hmac_auth: None,
        command_bytes: Some(command.encode_to_vec()),
    }
}

/// Checks an envelope's HMAC against the given credentials.
pub fn verify(envelope: &Envelope, credentials: &Credentials) -> bool {
    let Some(auth) = &envelope.hmac_auth else {
        return false;
    };
    if auth.identity != Some(credentials.identity) {
        return false;
    }
    let (Some(expected), Some(command_bytes)) = (&auth.hmac, &envelope.command_bytes) else {
        return false;
    };
    match command_hmac(&credentials.secret, command_bytes) {
        Ok(actual) => actual == *expected,
        Err(_) => false,
    }
}

/// Prefixes the 9-byte header and appends the raw value.
pub fn frame(envelope: &Envelope, value: &[u8]) -> ParseResult<Bytes> {
    let message = envelope.encode_to_vec();
    let message_len = u32::try_from(message.len())
        .map_err(|_| ParseError::Encode("structured message exceeds 4 GiB".to_string()))?;
    let value_len = u32::try_from(value.len())
        .map_err(|_| ParseError::Encode("value exceeds 4 GiB".to_string()))?;

    let header = FrameHeader::new(message_len, value_len);
    let mut out = BytesMut::with_capacity(header.frame_len());
    out.put_slice(&header.encode());
    out.put_slice(&message);
    out.put_slice(value);
    debug_assert_eq!(out.len(), HEADER_SIZE + message.len() + value.len());
    Ok(out.freeze())
}

/// Decodes the envelope and the command it carries.
pub fn decode_envelope(message: &[u8]) -> ParseResult<(Envelope, Command)> {
    let envelope = Envelope::decode(message).map_err(|e| ParseError::Decode(e.to_string()))?;
    let command_bytes = envelope
        .command_bytes
        .as_deref()
        .ok_or(ParseError::MissingField("command_bytes"))?;
    let command =
        Command::decode(command_bytes).map_err(|e| ParseError::Decode(e.to_string()))?;
    Ok((envelope, command))
}

/// Decodes a structured-message segment into a [`Pdu`].
///
/// `message` must hold exactly `header.message_len` bytes.
pub fn decode(header: &FrameHeader, message: &[u8]) -> ParseResult<Pdu> {
    if message.len() != header.message_len as usize {
        return Err(ParseError::LengthMismatch {
            declared: header.message_len as usize,
            actual: message.len(),
        });
    }

    let (_, command) = decode_envelope(message)?;
    let wire_header = command.header.unwrap_or_default();

    let message_type = match wire_header.message_type {
        None => None,
        Some(raw) => Some(
            MessageType::try_from(raw).map_err(|_| ParseError::UnknownMessageType(raw))?,
        ),
    };

    let (status, status_message) = match command.status {
        Some(status) => (
            status
                .code
                .map(|raw| StatusCode::try_from(raw).unwrap_or(StatusCode::InvalidStatusCode))
                .unwrap_or(StatusCode::NotAttempted),
            status.status_message.filter(|m| !m.is_empty()),
        ),
        None => (StatusCode::NotAttempted, None),
    };

    let body = command.body.unwrap_or_default();
    let key_value = body.key_value.unwrap_or_default();
    let (log_types, capacity) = match body.get_log {
        Some(log) => (
            log.types
                .iter()
                .filter_map(|raw| LogType::try_from(*raw).ok())
                .collect(),
            log.capacity.map(|c| DriveCapacity {
                nominal_capacity_bytes: c.nominal_capacity_in_bytes.unwrap_or(0),
                portion_full: c.portion_full.unwrap_or(0.0),
            }),
        ),
        None => (Vec::new(), None),
    };

    Ok(Pdu {
        message_type,
        status,
        status_message,
        connection_id: from_wire("connection_id", wire_header.connection_id)?,
        cluster_version: from_wire("cluster_version", wire_header.cluster_version)?,
        sequence: from_wire("sequence", wire_header.sequence)?,
        ack_sequence: wire_header
            .ack_sequence
            .map(|v| from_wire("ack_sequence", Some(v)))
            .transpose()?,
        key: key_value.key.map(Bytes::from),
        tag: key_value.tag.map(Bytes::from),
        synchronization: key_value
            .synchronization
            .and_then(|raw| Synchronization::try_from(raw).ok()),
        force: key_value.force.unwrap_or(false),
        log_types,
        capacity,
        value_len: header.value_len,
    })
}

fn to_wire(field: &'static str, value: u64) -> ParseResult<i64> {
    i64::try_from(value).map_err(|_| ParseError::FieldOutOfRange(field))
}

fn from_wire(field: &'static str, value: Option<i64>) -> ParseResult<u64> {
    match value {
        None => Ok(0),
        Some(v) => u64::try_from(v).map_err(|_| ParseError::FieldOutOfRange(field)),
    }
}
