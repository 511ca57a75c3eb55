//! Incremental PDU Parser
//!
//! TCP hands us bytes in arbitrary pieces, so the parser is resumable. It
//! reads from a buffer and returns either:
//! - `Ok(Some((pdu, consumed)))` - a header and its structured message were
//!   available; `consumed` bytes (header + message) were used
//! - `Ok(None)` - need more data
//! - `Err(ParseError)` - the stream is not a valid Kinetic PDU
//!
//! Once the 9 header bytes have been seen the parsed header is retained, so a
//! structured message that trickles in over several reads does not cause the
//! header to be re-validated. The raw value segment is NOT consumed here; the
//! caller learns its length from [`Pdu::value_len`] and reads it separately
//! (see the correlator's chunk handling).

use crate::protocol::codec;
use crate::protocol::messages::MessageType;
use crate::protocol::types::{FrameHeader, Pdu, HEADER_SIZE, MAGIC, MAX_MESSAGE_SIZE, MAX_VALUE_SIZE};
use thiserror::Error;

/// Errors that can occur while framing or decoding a PDU.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// First header byte is not the Kinetic magic
    #[error("bad magic byte: {0:#04x}")]
    BadMagic(u8),

    /// Structured message larger than the client accepts
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Value segment larger than the client accepts
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Header length disagrees with the bytes handed to the decoder
    #[error("length mismatch: header declares {declared} bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Protobuf decoding failed
    #[error("decode error: {0}")]
    Decode(String),

    /// A required field is absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A numeric field does not fit its domain type
    #[error("field out of range: {0}")]
    FieldOutOfRange(&'static str),

    /// Message type not known to this client
    #[error("unknown message type: {0}")]
    UnknownMessageType(i32),

    /// A value segment is attached to a PDU that must not carry one
    #[error("unexpected {value_len}-byte value on {message_type:?}")]
    UnexpectedValue {
        message_type: Option<MessageType>,
        value_len: u32,
    },

    /// Request could not be encoded
    #[error("encode error: {0}")]
    Encode(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A resumable PDU parser.
///
/// # Example
///
/// ```ignore
/// use kinetic::protocol::PduParser;
/// use bytes::BytesMut;
///
/// let mut parser = PduParser::new();
/// let mut buffer = BytesMut::new();
/// // ... append socket reads to `buffer` ...
/// if let Some((pdu, consumed)) = parser.parse(&buffer)? {
///     let _ = buffer.split_to(consumed);
///     println!("{:?} with {} value bytes to follow", pdu.message_type, pdu.value_len);
/// }
/// ```
#[derive(Debug, Default)]
pub struct PduParser {
    /// Header of the PDU currently being assembled
    header: Option<FrameHeader>,
}

impl PduParser {
    pub fn new() -> Self {
        Self { header: None }
    }

    /// Returns true when a header has been read but its message has not.
    pub fn is_mid_frame(&self) -> bool {
        self.header.is_some()
    }

    /// Attempts to parse the next header and structured message from `buf`.
    pub fn parse(&mut self, buf: &[u8]) -> ParseResult<Option<(Pdu, usize)>> {
        let header = match self.header {
            Some(header) => header,
            None => match parse_header(buf)? {
                Some(header) => {
                    self.header = Some(header);
                    header
                }
                None => return Ok(None),
            },
        };

        let message_end = HEADER_SIZE + header.message_len as usize;
        if buf.len() < message_end {
            return Ok(None);
        }

        // The header is spent whether or not the message decodes.
        self.header = None;
        let pdu = codec::decode(&header, &buf[HEADER_SIZE..message_end])?;
        Ok(Some((pdu, message_end)))
    }

    /// Forgets any partially parsed header.
    pub fn reset(&mut self) {
        self.header = None;
    }
}

/// Parses and validates the fixed 9-byte header.
///
/// Returns `Ok(None)` when fewer than 9 bytes are available.
pub fn parse_header(buf: &[u8]) -> ParseResult<Option<FrameHeader>> {
    if buf.len() < HEADER_SIZE {
        return Ok(None);
    }

    if buf[0] != MAGIC {
        return Err(ParseError::BadMagic(buf[0]));
    }

    let message_len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);
    let value_len = u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]);

    if message_len as usize > MAX_MESSAGE_SIZE {
        return Err(ParseError::MessageTooLarge {
            size: message_len as usize,
            max: MAX_MESSAGE_SIZE,
        });
    }

    if value_len as usize > MAX_VALUE_SIZE {
        return Err(ParseError::ValueTooLarge {
            size: value_len as usize,
            max: MAX_VALUE_SIZE,
        });
    }

    Ok(Some(FrameHeader::new(message_len, value_len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{encode, Credentials, Request, SessionStamp};

    fn get_frame(sequence: u64) -> Vec<u8> {
        let stamp = SessionStamp {
            sequence,
            connection_id: 10,
            cluster_version: 0,
        };
        encode(&Request::Get { key: b"a:1:0" }, &stamp, &Credentials::default())
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_parse_complete_frame() {
        let frame = get_frame(3);
        let (pdu, consumed) = PduParser::new().parse(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(pdu.message_type, Some(MessageType::Get));
        assert_eq!(pdu.sequence, 3);
    }

    #[test]
    fn test_parse_short_header_is_incomplete() {
        let frame = get_frame(0);
        let mut parser = PduParser::new();
        assert!(parser.parse(&frame[..HEADER_SIZE - 1]).unwrap().is_none());
        assert!(!parser.is_mid_frame());
    }

    #[test]
    fn test_parse_retains_header_across_reads() {
        let frame = get_frame(0);
        let mut parser = PduParser::new();

        assert!(parser.parse(&frame[..HEADER_SIZE + 2]).unwrap().is_none());
        assert!(parser.is_mid_frame());

        let (pdu, consumed) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(consumed, frame.len());
        assert_eq!(pdu.connection_id, 10);
        assert!(!parser.is_mid_frame());
    }

    #[test]
    fn test_parse_byte_by_byte() {
        let frame = get_frame(11);
        let mut parser = PduParser::new();
        for end in 0..frame.len() {
            assert!(parser.parse(&frame[..end]).unwrap().is_none());
        }
        let (pdu, _) = parser.parse(&frame).unwrap().unwrap();
        assert_eq!(pdu.sequence, 11);
    }

    #[test]
    fn test_parse_leaves_following_bytes() {
        let mut stream = get_frame(1);
        let first_len = stream.len();
        stream.extend_from_slice(&get_frame(2));

        let mut parser = PduParser::new();
        let (first, consumed) = parser.parse(&stream).unwrap().unwrap();
        assert_eq!(consumed, first_len);
        assert_eq!(first.sequence, 1);

        let (second, _) = parser.parse(&stream[consumed..]).unwrap().unwrap();
        assert_eq!(second.sequence, 2);
    }

    #[test]
    fn test_bad_magic() {
        let mut frame = get_frame(0);
        frame[0] = b'G';
        assert_eq!(PduParser::new().parse(&frame), Err(ParseError::BadMagic(b'G')));
    }

    #[test]
    fn test_oversized_message_rejected() {
        let header = FrameHeader::new((MAX_MESSAGE_SIZE + 1) as u32, 0).encode();
        assert!(matches!(
            parse_header(&header),
            Err(ParseError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_oversized_value_rejected() {
        let header = FrameHeader::new(10, (MAX_VALUE_SIZE + 1) as u32).encode();
        assert!(matches!(
            parse_header(&header),
            Err(ParseError::ValueTooLarge { .. })
        ));
    }
}
