//! Pure-Rust implementation of the Tamp compression codec.
//!
//! Tamp is a dictionary codec built for machines with kilobytes of RAM: the
//! entire shared state is one power-of-two window (256 B to 32 KiB) that
//! compressor and decompressor replay in lockstep. The stream is a one-byte
//! header followed by bit-packed tokens: literals, back-references into the
//! window, and an optional FLUSH marker that byte-aligns the stream so it
//! can be cut and resumed.
//!
//! The streaming types [`Compressor`] and [`Decompressor`] work on byte
//! slices and never allocate past their window; the [`stream`] module
//! drives whole `io::Read`/`io::Write` pairs; [`compress_to_vec`] and
//! [`decompress_to_vec`] are the in-memory conveniences.

#![forbid(unsafe_code)]

pub mod compress;
pub mod decompress;
pub mod dictionary;
pub mod header;
pub mod matching;
pub mod stream;

mod bits;
mod huffman;
mod ring;

pub use compress::{CompressError, Compressor};
pub use decompress::{DecompressError, Decompressor};
pub use header::{Conf, ConfError};
pub use matching::{ByteScan, DefaultFinder, Match, MatchFinder, WordScan};

/// Why a streaming call stopped. Mirrors the split between the codec's
/// recoverable statuses and its hard errors: a `Status` always comes with
/// honest progress counts and the call may simply be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Everything asked for was done.
    Ok,
    /// The output buffer filled up; retry with free space.
    OutputFull,
    /// More input is needed to make progress (or the stream is simply
    /// finished, if there is no more input).
    InputExhausted,
}

/// Progress report of one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streamed {
    /// Input bytes consumed.
    pub consumed: usize,
    /// Output bytes produced.
    pub written: usize,
    /// Why the call returned.
    pub status: Status,
}

/// Compress `input` in one go, producing a terminated stream.
pub fn compress_to_vec(conf: Conf, input: &[u8]) -> Result<Vec<u8>, CompressError> {
    let mut compressor = Compressor::new(conf);
    let mut output = Vec::new();
    let mut chunk = [0u8; 512];
    let mut pending = input;
    while !pending.is_empty() {
        let fed = compressor.compress(pending, &mut chunk)?;
        output.extend_from_slice(&chunk[..fed.written]);
        pending = &pending[fed.consumed..];
    }
    loop {
        let (written, status) = compressor.flush(&mut chunk, false)?;
        output.extend_from_slice(&chunk[..written]);
        if status == Status::Ok {
            break;
        }
    }
    Ok(output)
}

/// Decompress a complete stream in one go.
pub fn decompress_to_vec(input: &[u8]) -> Result<Vec<u8>, DecompressError> {
    let mut decompressor = Decompressor::new();
    let mut output = Vec::new();
    let mut chunk = [0u8; 512];
    let mut pending = input;
    loop {
        let fed = decompressor.decompress(pending, &mut chunk)?;
        output.extend_from_slice(&chunk[..fed.written]);
        pending = &pending[fed.consumed..];
        if fed.status != Status::OutputFull && pending.is_empty() {
            break;
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use std::str;

    use crate::{compress_to_vec, decompress_to_vec, Conf};

    /// Test that the compressed string decompresses to the original string.
    fn inverse(s: &str) {
        let compressed = compress_to_vec(Conf::new(), s.as_bytes()).unwrap();
        println!("Compressed '{}' into {:?}", s, compressed);
        let decompressed = decompress_to_vec(&compressed).unwrap();
        println!("Decompressed it into {:?}", str::from_utf8(&decompressed).unwrap());
        assert_eq!(decompressed, s.as_bytes());
    }

    #[test]
    fn shakespear() {
        inverse("to live or not to live");
        inverse("Love is a wonderful terrible thing");
        inverse("There is nothing either good or bad, but thinking makes it so.");
        inverse("I burn, I pine, I perish.");
    }

    #[test]
    fn save_the_pandas() {
        inverse("To cute to die! Save the red panda!");
        inverse("You are 60% water. Save 60% of yourself!");
        inverse("Save water, it doesn't grow on trees.");
        inverse("The panda bear has an amazing black-and-white fur.");
        inverse("The average panda eats as much as 9 to 14 kg of bamboo shoots a day.");
        inverse("The Empress Dowager Bo was buried with a panda skull in her vault");
    }

    #[test]
    fn not_compressible() {
        inverse("as6yhol.;jrew5tyuikbfewedfyjltre22459ba");
        inverse("jhflkdjshaf9p8u89ybkvjsdbfkhvg4ut08yfrr");
    }

    #[test]
    fn short() {
        inverse("ahhd");
        inverse("ahd");
        inverse("x-29");
        inverse("x");
        inverse("k");
        inverse(".");
        inverse("ajsdh");
    }

    #[test]
    fn empty_string() {
        inverse("");
    }

    #[test]
    fn nulls() {
        inverse("\0\0\0\0\0\0\0\0\0\0\0\0\0");
    }

    #[test]
    fn compression_works() {
        let s = "The Read trait allows for reading bytes from a source. Implementors of the Read trait are called 'readers'. Readers are defined by one required method, read().";

        inverse(s);

        assert!(compress_to_vec(Conf::new(), s.as_bytes()).unwrap().len() < s.len());
    }

    #[test]
    fn big_compression() {
        let mut s = Vec::with_capacity(200_000);

        for n in 0..200_000 {
            s.push((n as u8).wrapping_mul(0xA).wrapping_add(33) ^ 0xA2);
        }

        let compressed = compress_to_vec(Conf::new(), &s).unwrap();
        assert_eq!(decompress_to_vec(&compressed).unwrap(), s);
    }
}
