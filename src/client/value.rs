//! GET results: byte ranges and the readable value stream.

use crate::error::{KineticError, Result};
use bytes::Bytes;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Portion of a value to return from a GET. Bounds are inclusive, as in
/// HTTP `Range` headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteRange {
    #[default]
    Full,
    /// Bytes `start..=end`; an `end` past the value is clamped
    Bounded { start: u64, end: u64 },
    /// Everything from `start` on
    From(u64),
    /// The last `n` bytes
    Suffix(u64),
}

impl ByteRange {
    /// Rejects ranges that can never be satisfied, whatever the value size.
    pub fn validate(&self) -> Result<()> {
        match *self {
            ByteRange::Bounded { start, end } if start > end => Err(KineticError::InvalidRange(
                format!("start {start} is past end {end}"),
            )),
            ByteRange::Suffix(0) => Err(KineticError::InvalidRange(
                "empty suffix range".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Slices `value` down to this range.
    pub fn apply(&self, value: Bytes) -> Result<Bytes> {
        self.validate()?;
        let len = value.len();

        match *self {
            ByteRange::Full => Ok(value),
            ByteRange::Bounded { start, end } => {
                let first = offset(start, len)?;
                let last = usize::try_from(end).map_or(len - 1, |end| end.min(len - 1));
                Ok(value.slice(first..=last))
            }
            ByteRange::From(start) => Ok(value.slice(offset(start, len)?..)),
            ByteRange::Suffix(n) => {
                let n = usize::try_from(n).map_or(len, |n| n.min(len));
                Ok(value.slice(len - n..))
            }
        }
    }
}

/// Converts a range start into an index inside a `len`-byte value.
fn offset(start: u64, len: usize) -> Result<usize> {
    usize::try_from(start)
        .ok()
        .filter(|&start| start < len)
        .ok_or_else(|| out_of_bounds(start, len))
}

fn out_of_bounds(start: u64, len: usize) -> KineticError {
    KineticError::InvalidRange(format!("start {start} is past the {len}-byte value"))
}

/// A fetched value, readable with `AsyncRead`.
#[derive(Debug)]
pub struct ValueStream {
    inner: Cursor<Bytes>,
}

impl ValueStream {
    pub fn new(value: Bytes) -> Self {
        Self {
            inner: Cursor::new(value),
        }
    }

    /// Total length of the value.
    pub fn len(&self) -> usize {
        self.inner.get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole value, regardless of how much has been read.
    pub fn into_bytes(self) -> Bytes {
        self.inner.into_inner()
    }
}

impl AsyncRead for ValueStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn digits() -> Bytes {
        Bytes::from_static(b"0123456789")
    }

    #[test]
    fn test_ranges() {
        let cases = [
            (ByteRange::Full, &b"0123456789"[..]),
            (ByteRange::Bounded { start: 2, end: 5 }, &b"2345"[..]),
            (ByteRange::Bounded { start: 7, end: 100 }, &b"789"[..]),
            (ByteRange::Bounded { start: 4, end: 4 }, &b"4"[..]),
            (ByteRange::From(8), &b"89"[..]),
            (ByteRange::Suffix(3), &b"789"[..]),
            (ByteRange::Suffix(50), &b"0123456789"[..]),
            (ByteRange::Bounded { start: 2, end: u64::MAX }, &b"23456789"[..]),
            (ByteRange::Suffix(u64::MAX), &b"0123456789"[..]),
        ];
        for (range, expected) in cases {
            assert_eq!(&range.apply(digits()).unwrap()[..], expected, "{range:?}");
        }
    }

    #[test]
    fn test_unsatisfiable_ranges() {
        let cases = [
            ByteRange::Bounded { start: 5, end: 2 },
            ByteRange::Bounded { start: 10, end: 12 },
            ByteRange::From(10),
            ByteRange::Suffix(0),
            ByteRange::From(u64::MAX),
            ByteRange::Bounded { start: u64::MAX - 1, end: u64::MAX },
        ];
        for range in cases {
            assert!(
                matches!(range.apply(digits()), Err(KineticError::InvalidRange(_))),
                "{range:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_value_stream_reads_everything() {
        let mut stream = ValueStream::new(digits());
        assert_eq!(stream.len(), 10);

        let mut first = [0u8; 4];
        stream.read_exact(&mut first).await.unwrap();
        assert_eq!(&first, b"0123");

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"456789");
        assert_eq!(&stream.into_bytes()[..], b"0123456789");
    }
}
