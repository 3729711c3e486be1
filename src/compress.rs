//! The compression state machine.
//!
//! The compressor holds three pieces of state: the window (shared dictionary
//! both ends replay), a 16-byte lookahead ring of pending input, and a
//! 32-bit bit buffer for the output stream. Feeding and encoding are
//! separate steps: [`Compressor::sink`] tops up the lookahead,
//! [`Compressor::poll`] emits exactly one token, and
//! [`Compressor::compress`] interleaves the two until input runs out. A
//! token is either a literal (`1` + the literal bits) or a match (Huffman
//! length code + window offset). [`Compressor::flush`] drains what's left
//! and byte-aligns the stream.

use std::marker::PhantomData;

use thiserror::Error;
use tracing::trace;

use crate::bits::BitWriter;
use crate::header::Conf;
use crate::huffman;
use crate::matching::{DefaultFinder, MatchFinder};
use crate::ring::{InputRing, Window, INPUT_RING_SIZE};
use crate::{Status, Streamed};

/// Errors when compressing a Tamp stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    /// An input byte has bits above the configured literal width. Only
    /// possible when the stream was configured with fewer than 8 literal
    /// bits.
    #[error("input byte does not fit the configured literal width")]
    ExcessBits,
}

/// A streaming Tamp compressor.
///
/// Generic over the match-finding strategy; the default is the right choice
/// unless you are experimenting with your own finder.
///
/// ```
/// use tamp_compression::{Compressor, Conf};
///
/// let mut compressor = Compressor::new(Conf::new());
/// let mut output = [0u8; 64];
/// let fed = compressor.compress(b"foo foo foo", &mut output)?;
/// let (flushed, _) = compressor.flush(&mut output[fed.written..], false)?;
/// assert!(fed.written + flushed < 11);
/// # Ok::<(), tamp_compression::CompressError>(())
/// ```
#[derive(Debug)]
pub struct Compressor<F: MatchFinder = DefaultFinder> {
    conf: Conf,
    window: Window,
    input: InputRing,
    bits: BitWriter,
    min_pattern_size: usize,
    /// Whether the bit buffer already holds a FLUSH marker from an earlier
    /// `flush` call that ran out of output; guards against queueing it
    /// twice across retries.
    flush_marker_queued: bool,
    _finder: PhantomData<F>,
}

impl Compressor<DefaultFinder> {
    /// Create a compressor with the standard seeded dictionary.
    pub fn new(conf: Conf) -> Self {
        Self::with_finder(conf)
    }

    /// Create a compressor whose window starts out holding `dictionary`.
    /// The decompressing side must be constructed with the same bytes.
    pub fn with_dictionary(conf: Conf, dictionary: &[u8]) -> Self {
        Self::with_finder_and_dictionary(conf, dictionary)
    }
}

impl<F: MatchFinder> Compressor<F> {
    /// `new`, with an explicit match-finding strategy.
    pub fn with_finder(conf: Conf) -> Self {
        let mut conf = conf;
        conf.use_custom_dictionary = false;
        Self::init(conf, Window::seeded(conf.window))
    }

    /// `with_dictionary`, with an explicit match-finding strategy.
    pub fn with_finder_and_dictionary(conf: Conf, dictionary: &[u8]) -> Self {
        let mut conf = conf;
        conf.use_custom_dictionary = true;
        Self::init(conf, Window::from_dictionary(conf.window, dictionary))
    }

    fn init(conf: Conf, window: Window) -> Self {
        let mut bits = BitWriter::new();
        bits.push(u32::from(conf.pack()), 8);
        Compressor {
            min_pattern_size: conf.min_pattern_size(),
            conf,
            window,
            input: InputRing::new(),
            bits,
            flush_marker_queued: false,
            _finder: PhantomData,
        }
    }

    /// Top up the lookahead ring from `input`; returns the bytes taken.
    /// Nothing is encoded yet.
    pub fn sink(&mut self, input: &[u8]) -> usize {
        self.input.sink(input)
    }

    /// True when the lookahead ring can take no more input and a
    /// [`poll`](Self::poll) would see the full search horizon.
    pub fn is_full(&self) -> bool {
        self.input.is_full()
    }

    /// Encode one token from the lookahead ring into `output`.
    ///
    /// Returns the bytes written and [`Status::OutputFull`] when `output`
    /// could not take the currently buffered whole bytes; the call is
    /// retryable, nothing is lost.
    pub fn poll(&mut self, output: &mut [u8]) -> Result<(usize, Status), CompressError> {
        if self.input.is_empty() {
            return Ok((0, Status::Ok));
        }

        let mut lookahead = [0u8; INPUT_RING_SIZE];
        let pending = self.input.linearize(&mut lookahead);
        let best = F::find_best_match(
            self.window.bytes(),
            &lookahead[..pending],
            self.min_pattern_size,
        );

        // Reject unencodable literals before any output is produced, so the
        // error leaves no half-reported progress behind.
        if best.is_none() && u32::from(self.input.first()) >> self.conf.literal != 0 {
            return Err(CompressError::ExcessBits);
        }

        // Leave at most 7 bits buffered; the worst-case token below needs 24.
        let written = self.bits.drain(output);
        if self.bits.len() >= 8 || written == output.len() {
            return Ok((written, Status::OutputFull));
        }

        let advance = match best {
            Some(found) => {
                let symbol = found.size as usize - self.min_pattern_size;
                self.bits.push(huffman::CODES[symbol], huffman::BIT_LENGTHS[symbol]);
                self.bits.push(u32::from(found.index), self.conf.window);
                found.size as usize
            }
            None => {
                let literal = self.input.first();
                let flagged = (1u32 << self.conf.literal) | u32::from(literal);
                self.bits.push(flagged, self.conf.literal + 1);
                1
            }
        };
        for _ in 0..advance {
            let byte = self.input.pop();
            self.window.push(byte);
        }

        Ok((written, Status::Ok))
    }

    /// Compress as much of `input` into `output` as fits.
    ///
    /// Tokens are only emitted while the lookahead ring is full, so a
    /// trailing ringful stays buffered until [`flush`](Self::flush); the
    /// reported counts tell the caller where to resume.
    pub fn compress(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Streamed, CompressError> {
        let mut consumed = 0;
        let mut written = 0;
        while consumed < input.len() && written < output.len() {
            consumed += self.sink(&input[consumed..]);
            if self.is_full() {
                let (chunk, status) = self.poll(&mut output[written..])?;
                written += chunk;
                if status != Status::Ok {
                    return Ok(Streamed { consumed, written, status });
                }
            }
        }
        let status = if consumed < input.len() { Status::OutputFull } else { Status::Ok };
        Ok(Streamed { consumed, written, status })
    }

    /// Encode everything still buffered and byte-align the output.
    ///
    /// With `write_token` set, a FLUSH marker is emitted before the
    /// padding whenever padding would be needed; the stream can then be
    /// continued with further `compress` calls. Without it the stream is
    /// terminated: trailing bits are zero-padded and the compressor must
    /// not be fed again.
    pub fn flush(
        &mut self,
        output: &mut [u8],
        write_token: bool,
    ) -> Result<(usize, Status), CompressError> {
        let mut written = 0;
        while !self.input.is_empty() {
            let (chunk, status) = self.poll(&mut output[written..])?;
            written += chunk;
            if status != Status::Ok {
                return Ok((written, status));
            }
        }

        written += self.bits.drain(&mut output[written..]);
        if self.bits.len() >= 8 {
            return Ok((written, Status::OutputFull));
        }

        if !self.bits.is_empty() && write_token && !self.flush_marker_queued {
            self.bits.push(huffman::FLUSH_CODE, huffman::FLUSH_BIT_LENGTH);
            self.flush_marker_queued = true;
        }
        written += self.bits.drain_padded(&mut output[written..]);
        if !self.bits.is_empty() {
            return Ok((written, Status::OutputFull));
        }
        self.flush_marker_queued = false;
        trace!(written, "flushed");
        Ok((written, Status::Ok))
    }

    /// One-call convenience: `compress` followed by a terminal `flush`.
    pub fn compress_and_flush(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> Result<Streamed, CompressError> {
        let mut fed = self.compress(input, output)?;
        if fed.status != Status::Ok {
            return Ok(fed);
        }
        let (written, status) = self.flush(&mut output[fed.written..], false)?;
        fed.written += written;
        fed.status = status;
        Ok(fed)
    }
}
