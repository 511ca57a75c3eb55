//! Request/Response Correlator
//!
//! One correlator per session pairs inbound PDUs with the single request
//! outstanding on that session. It is a pure state machine over the
//! session's read buffer; the caller appends socket reads and calls
//! [`Correlator::advance`] until an [`Event`] comes out.
//!
//! ```text
//!            begin(kind)               header of non-GET response
//!   Idle ───────────────> AwaitingHeader ─────────────────────────> Idle
//!                               │
//!                               │ GET response, value_len > 0
//!                               ▼
//!                         AwaitingChunk ── value complete ────────> Idle
//!                          (reads appended until value_len)
//! ```
//!
//! Unsolicited PDUs (no message type) are reported in any phase outside
//! `AwaitingChunk` and never resolve the pending request. A response that
//! does not match the pending request is a protocol error; it is never
//! handed to an unrelated caller.

use crate::connection::reassembly::ChunkReassembler;
use crate::error::KineticError;
use crate::protocol::{OpKind, ParseError, Pdu, PduParser};
use bytes::{Bytes, BytesMut};
use std::io;

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Metadata-only response (PUT, DELETE, GETLOG)
    Ack(Pdu),
    /// GET response with its reassembled value
    Value { pdu: Pdu, value: Bytes },
}

/// Something the caller must act on.
#[derive(Debug)]
pub enum Event {
    /// A status PDU the drive sent on its own, such as the connect handshake
    Unsolicited(Pdu),
    /// The pending request finished, successfully or with a drive error
    Resolved(Result<Resolution, KineticError>),
}

/// Observable phase of a correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingHeader,
    AwaitingChunk,
}

#[derive(Debug)]
enum State {
    Idle,
    AwaitingHeader(OpKind),
    AwaitingChunk {
        pdu: Pdu,
        reassembler: ChunkReassembler,
    },
}

/// Single-flight response correlator for one session.
#[derive(Debug)]
pub struct Correlator {
    state: State,
    parser: PduParser,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            parser: PduParser::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::AwaitingHeader(_) => Phase::AwaitingHeader,
            State::AwaitingChunk { .. } => Phase::AwaitingChunk,
        }
    }

    /// The request kind awaiting a response, if any.
    pub fn pending(&self) -> Option<OpKind> {
        match self.state {
            State::Idle => None,
            State::AwaitingHeader(kind) => Some(kind),
            State::AwaitingChunk { .. } => Some(OpKind::Get),
        }
    }

    /// Announced length of the GET value being received, if any.
    pub fn pending_chunk_size(&self) -> Option<u64> {
        match &self.state {
            State::AwaitingChunk { reassembler, .. } => Some(reassembler.expected() as u64),
            _ => None,
        }
    }

    /// Registers the request about to be written.
    pub fn begin(&mut self, kind: OpKind) -> Result<(), KineticError> {
        match self.pending() {
            None => {
                self.state = State::AwaitingHeader(kind);
                Ok(())
            }
            Some(pending) => Err(KineticError::SessionBusy(pending)),
        }
    }

    /// Consumes whatever `buf` holds and reports the next event, or `None`
    /// when more bytes are needed.
    ///
    /// An `Err` means the stream can no longer be trusted.
    pub fn advance(&mut self, buf: &mut BytesMut) -> Result<Option<Event>, KineticError> {
        if let State::AwaitingChunk { .. } = self.state {
            return self.advance_chunk(buf);
        }

        let Some((pdu, consumed)) = self.parser.parse(buf)? else {
            return Ok(None);
        };
        let _ = buf.split_to(consumed);

        let Some(message_type) = pdu.message_type else {
            if pdu.value_len != 0 {
                return Err(unexpected_value(&pdu));
            }
            return Ok(Some(Event::Unsolicited(pdu)));
        };

        let pending = self.pending();
        let kind = match pending {
            Some(kind) if OpKind::from_response(message_type) == Some(kind) => kind,
            _ => {
                return Err(KineticError::UnexpectedResponse {
                    expected: pending,
                    received: Some(message_type),
                })
            }
        };

        if kind != OpKind::Get {
            if pdu.value_len != 0 {
                return Err(unexpected_value(&pdu));
            }
            self.state = State::Idle;
            let result = pdu.outcome().map(|()| Resolution::Ack(pdu));
            return Ok(Some(Event::Resolved(result)));
        }

        if pdu.value_len == 0 {
            // A zero-length GET body means the object is absent.
            self.state = State::Idle;
            let result = pdu
                .outcome()
                .and_then(|()| Err(KineticError::ObjectNotFound));
            return Ok(Some(Event::Resolved(result)));
        }

        let reassembler = ChunkReassembler::new(pdu.value_len as usize);
        self.state = State::AwaitingChunk { pdu, reassembler };
        self.advance_chunk(buf)
    }

    fn advance_chunk(&mut self, buf: &mut BytesMut) -> Result<Option<Event>, KineticError> {
        let complete = match &mut self.state {
            State::AwaitingChunk { reassembler, .. } => {
                let take = reassembler.remaining().min(buf.len());
                if take > 0 {
                    reassembler.push(buf.split_to(take).freeze())?;
                }
                reassembler.is_complete()
            }
            _ => return Ok(None),
        };
        if !complete {
            return Ok(None);
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::AwaitingChunk { pdu, reassembler } => {
                let value = reassembler.finish()?;
                let result = pdu.outcome().map(|()| Resolution::Value { pdu, value });
                Ok(Some(Event::Resolved(result)))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }

    /// The error to report when the drive closes the stream now.
    pub fn on_eof(&self) -> KineticError {
        match &self.state {
            State::AwaitingChunk { reassembler, .. } => reassembler.truncated(),
            _ => KineticError::Transport(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "drive closed the connection",
            )),
        }
    }
}

fn unexpected_value(pdu: &Pdu) -> KineticError {
    KineticError::MalformedPdu(ParseError::UnexpectedValue {
        message_type: pdu.message_type,
        value_len: pdu.value_len,
    })
}
