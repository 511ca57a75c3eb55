//! GET value reassembly.
//!
//! A GET response announces its value length in the frame header; the value
//! itself arrives over as many socket reads as TCP likes. Each read is kept
//! as a `Bytes` chunk and concatenated once the announced total is reached.

use crate::error::KineticError;
use bytes::{BufMut, Bytes, BytesMut};

/// Accumulates the value of one GET response.
#[derive(Debug)]
pub struct ChunkReassembler {
    expected: usize,
    received: usize,
    chunks: Vec<Bytes>,
}

impl ChunkReassembler {
    /// Starts a reassembly for a value of `expected` bytes.
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            received: 0,
            chunks: Vec::new(),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn received(&self) -> usize {
        self.received
    }

    /// Bytes still missing.
    pub fn remaining(&self) -> usize {
        self.expected - self.received
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.expected
    }

    /// Appends one chunk. Receiving past the announced length is an error.
    pub fn push(&mut self, chunk: Bytes) -> Result<(), KineticError> {
        if chunk.len() > self.remaining() {
            return Err(KineticError::TruncatedValue {
                expected: self.expected,
                received: self.received + chunk.len(),
            });
        }
        if !chunk.is_empty() {
            self.received += chunk.len();
            self.chunks.push(chunk);
        }
        Ok(())
    }

    /// Returns the full value, or `TruncatedValue` if bytes are missing.
    pub fn finish(mut self) -> Result<Bytes, KineticError> {
        if !self.is_complete() {
            return Err(KineticError::TruncatedValue {
                expected: self.expected,
                received: self.received,
            });
        }

        // A value read in one piece needs no copy.
        if self.chunks.len() == 1 {
            return Ok(self.chunks.swap_remove(0));
        }

        let mut value = BytesMut::with_capacity(self.expected);
        for chunk in &self.chunks {
            value.put_slice(chunk);
        }
        Ok(value.freeze())
    }

    /// The error to report if the stream ends now.
    pub fn truncated(&self) -> KineticError {
        KineticError::TruncatedValue {
            expected: self.expected,
            received: self.received,
        }
    }
}
