//! Kinetic Protocol Implementation
//!
//! Framing, structured messages and the PDU codec for the Kinetic drive
//! protocol.
//!
//! ## Modules
//!
//! - `types`: frame header, [`Pdu`] and request options
//! - `messages`: protobuf definitions of the structured message segment
//! - `codec`: request encoding, HMAC signing and PDU decoding
//! - `parser`: resumable parser for inbound header + message segments
//!
//! ## Example
//!
//! ```ignore
//! use kinetic::protocol::{codec, Credentials, PduParser, Request, SessionStamp};
//!
//! let stamp = SessionStamp { sequence: 0, connection_id: 42, cluster_version: 0 };
//! let frame = codec::encode(&Request::Get { key: b"host:8123:0" }, &stamp, &Credentials::default())?;
//!
//! let (pdu, consumed) = PduParser::new().parse(&frame)?.unwrap();
//! assert_eq!(consumed, frame.len());
//! ```

pub mod codec;
pub mod messages;
pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{Credentials, Request, SessionStamp};
pub use messages::{MessageType, StatusCode, Synchronization};
pub use parser::{parse_header, ParseError, ParseResult, PduParser};
pub use types::{
    DriveCapacity, FrameHeader, LogType, OpKind, Pdu, WriteOptions, HEADER_SIZE, MAGIC,
    MAX_MESSAGE_SIZE, MAX_VALUE_SIZE,
};
