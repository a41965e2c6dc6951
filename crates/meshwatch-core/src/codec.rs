//! Length-prefixed framing of the reporter link.
//!
//! Each frame is the decimal byte length of its body, a `#`, then the body:
//!
//! ```text
//! 47#{"type":"raw","data":"station: north","time":1}
//! ```
//!
//! The codec only splits frames. Bodies are JSON, parsed by the connection
//! manager.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio_util::codec::{Decoder, Encoder};

/// Separator between the length prefix and the body.
pub const FRAME_SEPARATOR: u8 = b'#';

/// Longest accepted length prefix. `usize::MAX` has 20 digits.
const MAX_PREFIX_DIGITS: usize = 20;

/// Errors raised while framing a reporter link. All of them end the link.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is empty or not a decimal number.
    #[error("invalid frame length prefix: {prefix:?}")]
    InvalidPrefix {
        /// The offending prefix, lossily decoded.
        prefix: String,
    },

    /// The announced body exceeds the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    TooLarge {
        /// Announced body length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// A body could not be serialized for sending.
    #[error("failed to serialize frame body: {source}")]
    Serialize {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// The transport failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

/// Splits a byte stream into `<len>#<body>` frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_bytes: usize,
}

impl FrameCodec {
    /// Create a codec accepting bodies of at most `max_frame_bytes`.
    pub const fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(separator) = src.iter().position(|b| *b == FRAME_SEPARATOR) else {
            if src.len() > MAX_PREFIX_DIGITS {
                return Err(invalid_prefix(src));
            }
            return Ok(None);
        };

        let prefix = src.get(..separator).unwrap_or_default();
        let len = parse_length(prefix).ok_or_else(|| invalid_prefix(prefix))?;
        if len > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_bytes,
            });
        }

        // Both terms are bounded by the prefix limit and `max_frame_bytes`.
        let header = separator.saturating_add(1);
        let total = header.saturating_add(len);
        if src.len() < total {
            src.reserve(total.saturating_sub(src.len()));
            return Ok(None);
        }

        src.advance(header);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let prefix = body.len().to_string();
        dst.reserve(prefix.len().saturating_add(1).saturating_add(body.len()));
        dst.put_slice(prefix.as_bytes());
        dst.put_u8(FRAME_SEPARATOR);
        dst.put(body);
        Ok(())
    }
}

/// Serialize `value` as a frame body.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Bytes, FrameError> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

fn parse_length(prefix: &[u8]) -> Option<usize> {
    if prefix.is_empty() || prefix.len() > MAX_PREFIX_DIGITS {
        return None;
    }
    if !prefix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(prefix).ok()?.parse().ok()
}

fn invalid_prefix(prefix: &[u8]) -> FrameError {
    let shown = prefix.get(..MAX_PREFIX_DIGITS).unwrap_or(prefix);
    FrameError::InvalidPrefix {
        prefix: String::from_utf8_lossy(shown).into_owned(),
    }
}
