//! The decompression state machine.
//!
//! Tokens are parsed out of a 32-bit bit buffer that is topped up from the
//! input as it drains. The first input byte is the stream header (unless the
//! configuration was supplied up front); every byte after that is token
//! payload. Backpressure is never an error: when input runs dry mid-token
//! the partially read token is rolled back and re-parsed on the next call,
//! and when the output fills mid-match the decompressor remembers how many
//! bytes of the match it already delivered (`skip_bytes`) and finishes it
//! later. Offsets are validated against the window before any window read,
//! so corrupt or hostile streams fail with [`DecompressError::OutOfBounds`]
//! instead of touching memory they shouldn't.

use thiserror::Error;
use tracing::debug;

use crate::bits::BitReader;
use crate::header::{Conf, ConfError};
use crate::huffman;
use crate::ring::Window;
use crate::{Status, Streamed};

/// Errors when decompressing a Tamp stream. Both poison the stream: there
/// is no way to resynchronize a bit stream after a bad token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    #[error("invalid stream header")]
    Conf(#[from] ConfError),
    /// A match token pointed outside the window. The stream is corrupt or
    /// hostile.
    #[error("back-reference outside the window")]
    OutOfBounds,
}

/// A streaming Tamp decompressor.
///
/// ```
/// use tamp_compression::Decompressor;
///
/// let compressed = [0x58, 0xB3, 0x04, 0x1C, 0x81, 0x00, 0x03, 0x00, 0x00];
/// let mut decompressor = Decompressor::new();
/// let mut output = [0u8; 32];
/// let fed = decompressor.decompress(&compressed, &mut output)?;
/// assert_eq!(&output[..fed.written], b"foo foo foo");
/// # Ok::<(), tamp_compression::DecompressError>(())
/// ```
#[derive(Debug)]
pub struct Decompressor {
    conf: Option<Conf>,
    window: Option<Window>,
    min_pattern_size: usize,
    bits: BitReader,
    /// Bytes of the current match already delivered to output across
    /// earlier calls.
    skip_bytes: usize,
    window_limit: u8,
    staged_dictionary: Option<Box<[u8]>>,
}

impl Default for Decompressor {
    fn default() -> Self {
        Decompressor {
            conf: None,
            window: None,
            min_pattern_size: 0,
            bits: BitReader::new(),
            skip_bytes: 0,
            window_limit: 15,
            staged_dictionary: None,
        }
    }
}

impl Decompressor {
    /// Create a decompressor that configures itself from the stream header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Like [`new`](Self::new), but refuse headers that demand a window
    /// larger than `1 << max_window_bits` bytes. Useful when decoding
    /// untrusted streams on a memory budget.
    pub fn with_window_limit(max_window_bits: u8) -> Self {
        Decompressor { window_limit: max_window_bits.min(15), ..Self::default() }
    }

    /// Like [`new`](Self::new), but if the header declares a custom
    /// dictionary, the window starts out holding `dictionary` (the bytes
    /// the compressing side was built with) instead of the standard
    /// seeding.
    pub fn with_dictionary(dictionary: &[u8]) -> Self {
        Decompressor { staged_dictionary: Some(dictionary.into()), ..Self::default() }
    }

    /// Create a decompressor for a headerless stream, with parameters
    /// agreed out-of-band.
    pub fn with_conf(conf: Conf) -> Self {
        let mut decompressor = Self::default();
        decompressor.configure(conf, None);
        decompressor
    }

    /// Headerless stream with a custom dictionary.
    pub fn with_conf_and_dictionary(conf: Conf, dictionary: &[u8]) -> Self {
        let mut conf = conf;
        conf.use_custom_dictionary = true;
        let mut decompressor = Self::default();
        decompressor.configure(conf, Some(dictionary));
        decompressor
    }

    /// The stream parameters, once known (immediately for the explicit-conf
    /// constructors, after the header byte otherwise).
    pub fn conf(&self) -> Option<Conf> {
        self.conf
    }

    fn configure(&mut self, conf: Conf, dictionary: Option<&[u8]>) {
        let window = if conf.use_custom_dictionary {
            Window::from_dictionary(conf.window, dictionary.unwrap_or(&[]))
        } else {
            Window::seeded(conf.window)
        };
        self.min_pattern_size = conf.min_pattern_size();
        self.window = Some(window);
        self.conf = Some(conf);
    }

    /// Decompress as much of `input` into `output` as fits.
    ///
    /// The returned counts always reflect real progress; the status says
    /// why the call stopped. [`Status::InputExhausted`] is also how a
    /// cleanly ended stream reports completion, so it doubles as "give me
    /// more input or we're done".
    pub fn decompress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Streamed, DecompressError> {
        let mut consumed = 0;

        if self.conf.is_none() {
            if input.is_empty() {
                return Ok(Streamed { consumed: 0, written: 0, status: Status::InputExhausted });
            }
            let conf = Conf::parse(input[0])?;
            if conf.window > self.window_limit {
                return Err(ConfError::WindowTooLarge {
                    requested: conf.window,
                    limit: self.window_limit,
                }
                .into());
            }
            consumed = 1;
            let dictionary = self.staged_dictionary.take();
            self.configure(conf, dictionary.as_deref());
            debug!(
                window_bits = conf.window,
                literal_bits = conf.literal,
                custom_dictionary = conf.use_custom_dictionary,
                "stream header parsed"
            );
        }
        let conf = self.conf.as_ref().unwrap();
        let window_bits = conf.window;
        let literal_bits = conf.literal;
        let window = self.window.as_mut().unwrap();

        let mut written = 0;
        loop {
            consumed += self.bits.refill(&input[consumed..]);

            if self.bits.is_empty() {
                return Ok(Streamed { consumed, written, status: Status::InputExhausted });
            }
            if written == output.len() {
                return Ok(Streamed { consumed, written, status: Status::OutputFull });
            }

            if self.bits.peek_bit() {
                // literal
                if self.bits.len() < 1 + literal_bits {
                    return Ok(Streamed { consumed, written, status: Status::InputExhausted });
                }
                self.bits.take(1);
                let byte = self.bits.take(literal_bits) as u8;
                output[written] = byte;
                written += 1;
                window.push(byte);
                continue;
            }

            // match token; anything short of a full parse rolls back
            let saved = self.bits.checkpoint();
            self.bits.take(1);
            let symbol = match huffman_decode(&mut self.bits) {
                Some(symbol) => symbol,
                None => {
                    self.bits.restore(saved);
                    return Ok(Streamed { consumed, written, status: Status::InputExhausted });
                }
            };
            if symbol == huffman::FLUSH_SYMBOL {
                self.bits.round_down_to_byte();
                continue;
            }
            if self.bits.len() < window_bits {
                self.bits.restore(saved);
                return Ok(Streamed { consumed, written, status: Status::InputExhausted });
            }
            let offset = self.bits.take(window_bits) as usize;
            let size = symbol as usize + self.min_pattern_size;
            if offset + size > window.size() {
                return Err(DecompressError::OutOfBounds);
            }

            let remaining = size - self.skip_bytes;
            let room = output.len() - written;
            if remaining > room {
                // Deliver what fits, remember how far we got, and put the
                // token back so the next call re-derives offset and size.
                let start = offset + self.skip_bytes;
                output[written..].copy_from_slice(&window.bytes()[start..start + room]);
                written += room;
                self.skip_bytes += room;
                self.bits.restore(saved);
                return Ok(Streamed { consumed, written, status: Status::OutputFull });
            }

            let start = offset + self.skip_bytes;
            output[written..written + remaining]
                .copy_from_slice(&window.bytes()[start..offset + size]);
            written += remaining;
            self.skip_bytes = 0;

            // Replay the whole match into the window. Going through a stack
            // buffer keeps the copy correct when the destination region
            // overlaps the source.
            let mut pattern = [0u8; 16];
            pattern[..size].copy_from_slice(&window.bytes()[offset..offset + size]);
            for &byte in &pattern[..size] {
                window.push(byte);
            }
        }
    }
}

/// Decode a match-length symbol. The token flag is already consumed; `None`
/// means the buffered bits cannot settle the symbol yet (the caller rolls
/// back and reports input-exhausted).
fn huffman_decode(bits: &mut BitReader) -> Option<u8> {
    if bits.is_empty() {
        return None;
    }
    if bits.take(1) == 0 {
        return Some(0);
    }
    let entry = huffman::DECODE_TABLE[bits.peek7() as usize];
    let extra = entry >> 4;
    if extra > bits.len() {
        return None;
    }
    bits.take(extra);
    Some(entry & 0xF)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lone_header_is_not_an_error() {
        let mut decompressor = Decompressor::new();
        let mut output = [0u8; 8];
        let fed = decompressor.decompress(&[0x58], &mut output).unwrap();
        assert_eq!(fed.consumed, 1);
        assert_eq!(fed.written, 0);
        assert_eq!(fed.status, Status::InputExhausted);
        assert_eq!(decompressor.conf().unwrap(), Conf::new());
    }

    #[test]
    fn empty_input_reports_exhausted() {
        let mut decompressor = Decompressor::new();
        let fed = decompressor.decompress(&[], &mut [0u8; 8]).unwrap();
        assert_eq!(fed.status, Status::InputExhausted);
    }

    #[test]
    fn more_headers_bit_is_rejected() {
        let mut decompressor = Decompressor::new();
        let result = decompressor.decompress(&[0x59], &mut [0u8; 8]);
        assert_eq!(result, Err(DecompressError::Conf(ConfError::MoreHeaders)));
    }

    #[test]
    fn window_limit_is_enforced() {
        // header asking for window_bits = 15
        let header = [0xE0u8];
        let mut decompressor = Decompressor::with_window_limit(10);
        let result = decompressor.decompress(&header, &mut [0u8; 8]);
        assert_eq!(
            result,
            Err(DecompressError::Conf(ConfError::WindowTooLarge { requested: 15, limit: 10 }))
        );
    }

    #[test]
    fn offset_past_window_end_is_out_of_bounds() {
        // window_bits = 10: token `00` (shortest match) + offset 1023; the
        // two-byte match would read past the window end.
        let stream = [0x58, 0x3F, 0xF0];
        let mut decompressor = Decompressor::new();
        let result = decompressor.decompress(&stream, &mut [0u8; 8]);
        assert_eq!(result, Err(DecompressError::OutOfBounds));
    }

    #[test]
    fn match_resumes_across_a_full_output() {
        // "foo foo foo": the final token is a three-byte match; squeezing
        // the output forces it to be delivered one byte per call.
        let compressed = [0x58, 0xB3, 0x04, 0x1C, 0x81, 0x00, 0x03, 0x00, 0x00];
        let mut decompressor = Decompressor::new();
        let mut collected = Vec::new();
        let mut pending: &[u8] = &compressed;
        loop {
            let mut output = [0u8; 1];
            let fed = decompressor.decompress(pending, &mut output).unwrap();
            collected.extend_from_slice(&output[..fed.written]);
            pending = &pending[fed.consumed..];
            if fed.status == Status::InputExhausted && pending.is_empty() {
                break;
            }
        }
        assert_eq!(collected, b"foo foo foo");
    }
}
