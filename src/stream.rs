//! Shuttling whole streams through the codec.
//!
//! The drivers here connect an `io::Read` to an `io::Write` through a
//! compressor or decompressor, using two small stack buffers. This is the
//! only place the crate touches `std::io`; the codec cores know nothing
//! about where bytes come from or go to.

use std::io::{self, ErrorKind, Read, Write};

use fehler::{throw, throws};
use thiserror::Error;
use tracing::{debug, trace};

use crate::compress::{CompressError, Compressor};
use crate::decompress::{DecompressError, Decompressor};
use crate::header::Conf;
use crate::Status;

/// Half-size of the stack work buffer: one half reads, one half writes.
/// Anything ≥ 16 works; 256 keeps syscall counts reasonable without
/// noticeable stack use.
const HALF_BUFFER: usize = 256;

/// Errors when driving a whole stream through the codec.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("error reading from the input you gave me")]
    Read(#[source] io::Error),
    #[error("error writing to the output you gave me")]
    Write(#[source] io::Error),
    #[error("compression failed")]
    Compress(#[from] CompressError),
    #[error("decompression failed (data corruption?)")]
    Decompress(#[from] DecompressError),
    #[error("aborted by the progress callback")]
    Aborted,
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> io::Error {
        io::Error::new(ErrorKind::Other, e)
    }
}

/// Compress everything `reader` yields into `writer`, then terminate the
/// stream. Returns `(bytes read, bytes written)`.
#[throws(StreamError)]
pub fn compress<R: Read, W: Write>(conf: Conf, reader: R, writer: W) -> (u64, u64) {
    compress_with_progress(conf, reader, writer, |_| true)?
}

/// Like [`compress`], reporting the running input byte count to `progress`
/// after every read. Returning `false` aborts with [`StreamError::Aborted`].
#[throws(StreamError)]
pub fn compress_with_progress<R, W, P>(
    conf: Conf,
    mut reader: R,
    mut writer: W,
    mut progress: P,
) -> (u64, u64)
where
    R: Read,
    W: Write,
    P: FnMut(u64) -> bool,
{
    let mut compressor = Compressor::new(conf);
    let mut read_buffer = [0u8; HALF_BUFFER];
    let mut write_buffer = [0u8; HALF_BUFFER];
    let mut total_read = 0u64;
    let mut total_written = 0u64;

    loop {
        let read = reader.read(&mut read_buffer).map_err(StreamError::Read)?;
        if read == 0 {
            break;
        }
        let mut pending = &read_buffer[..read];
        while !pending.is_empty() {
            let fed = compressor.compress(pending, &mut write_buffer)?;
            writer.write_all(&write_buffer[..fed.written]).map_err(StreamError::Write)?;
            total_written += fed.written as u64;
            pending = &pending[fed.consumed..];
        }
        total_read += read as u64;
        trace!(total_read, total_written, "compressed chunk");
        if !progress(total_read) {
            throw!(StreamError::Aborted);
        }
    }

    loop {
        let (written, status) = compressor.flush(&mut write_buffer, false)?;
        writer.write_all(&write_buffer[..written]).map_err(StreamError::Write)?;
        total_written += written as u64;
        if status == Status::Ok {
            break;
        }
    }
    debug!(total_read, total_written, "compression finished");
    (total_read, total_written)
}

/// Decompress everything `reader` yields into `writer`. Returns
/// `(bytes read, bytes written)`.
#[throws(StreamError)]
pub fn decompress<R: Read, W: Write>(reader: R, writer: W) -> (u64, u64) {
    decompress_with_progress(reader, writer, |_| true)?
}

/// Like [`decompress`], reporting the running input byte count to
/// `progress` after every read. Returning `false` aborts with
/// [`StreamError::Aborted`].
#[throws(StreamError)]
pub fn decompress_with_progress<R, W, P>(
    mut reader: R,
    mut writer: W,
    mut progress: P,
) -> (u64, u64)
where
    R: Read,
    W: Write,
    P: FnMut(u64) -> bool,
{
    let mut decompressor = Decompressor::new();
    let mut read_buffer = [0u8; HALF_BUFFER];
    let mut write_buffer = [0u8; HALF_BUFFER];
    let mut total_read = 0u64;
    let mut total_written = 0u64;

    loop {
        let read = reader.read(&mut read_buffer).map_err(StreamError::Read)?;
        let mut pending = &read_buffer[..read];
        loop {
            let fed = decompressor.decompress(pending, &mut write_buffer)?;
            writer.write_all(&write_buffer[..fed.written]).map_err(StreamError::Write)?;
            total_written += fed.written as u64;
            pending = &pending[fed.consumed..];
            if fed.status != Status::OutputFull && pending.is_empty() {
                break;
            }
        }
        if read == 0 {
            break;
        }
        total_read += read as u64;
        trace!(total_read, total_written, "decompressed chunk");
        if !progress(total_read) {
            throw!(StreamError::Aborted);
        }
    }
    debug!(total_read, total_written, "decompression finished");
    (total_read, total_written)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn file_shaped_round_trip() {
        let input: Vec<u8> = b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(10_000)
            .collect();

        let mut compressed = Vec::new();
        let (read, written) = compress(Conf::new(), Cursor::new(&input), &mut compressed).unwrap();
        assert_eq!(read, input.len() as u64);
        assert_eq!(written, compressed.len() as u64);
        assert!(compressed.len() < input.len());

        let mut restored = Vec::new();
        decompress(Cursor::new(&compressed), &mut restored).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn progress_callback_sees_totals_and_can_abort() {
        let input = vec![7u8; 4096];
        let mut seen = Vec::new();
        let mut out = Vec::new();
        compress_with_progress(Conf::new(), Cursor::new(&input), &mut out, |n| {
            seen.push(n);
            true
        })
        .unwrap();
        assert_eq!(*seen.last().unwrap(), 4096);

        let result = compress_with_progress(
            Conf::new(),
            Cursor::new(&input),
            &mut Vec::new(),
            |_| false,
        );
        assert!(matches!(result, Err(StreamError::Aborted)));
    }
}
