//! Line codec for engine output streams.
//!
//! Wraps [`tokio_util::codec::AnyDelimiterCodec`] with a maximum line length
//! so an engine that never writes a newline cannot exhaust memory. Lines are
//! decoded lossily: invalid UTF-8 becomes `U+FFFD` instead of ending the
//! stream.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use focus_orchestrator::orchestrator::codec::LineCodec;
//!
//! let lines = FramedRead::new(child_stdout, LineCodec::new());
//! ```

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder};
use tracing::warn;

use crate::{AppError, Result};

/// Maximum line length accepted by the codec: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited decoder for engine stdout and stderr.
///
/// Lines longer than [`MAX_LINE_BYTES`] are discarded up to the next newline
/// and decoding continues with the following line. Trailing `\r` is removed so
/// engines writing CRLF behave the same as LF.
#[derive(Debug)]
pub struct LineCodec {
    inner: AnyDelimiterCodec,
    max_length: usize,
    discarded: u64,
}

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line limit.
    #[must_use]
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_length),
            max_length,
            discarded: 0,
        }
    }

    /// Number of overlong lines dropped so far.
    #[must_use]
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode(src) {
                Ok(Some(chunk)) => return Ok(Some(chunk_to_line(&chunk))),
                Ok(None) => return Ok(None),
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    // The inner codec is now discarding; let it skip to the
                    // next delimiter on the following pass.
                    self.discarded += 1;
                    warn!(
                        limit = self.max_length,
                        "engine output line too long, discarding"
                    );
                }
                Err(AnyDelimiterCodecError::Io(err)) => return Err(AppError::Io(err.to_string())),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.inner.decode_eof(src) {
                Ok(Some(chunk)) => return Ok(Some(chunk_to_line(&chunk))),
                Ok(None) => return Ok(None),
                Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                    self.discarded += 1;
                    warn!(
                        limit = self.max_length,
                        "engine output line too long at eof, discarding"
                    );
                }
                Err(AnyDelimiterCodecError::Io(err)) => return Err(AppError::Io(err.to_string())),
            }
        }
    }
}

fn chunk_to_line(chunk: &Bytes) -> String {
    let text = String::from_utf8_lossy(chunk);
    text.strip_suffix('\r').unwrap_or(&text).to_owned()
}
