//! `Read`/`Write` adapters over the stream state machines
//!
//! The chunk API needs the caller to know which chunk is last. These helpers
//! work that out from the underlying reader: the encrypting side looks one
//! chunk ahead, the decrypting side checks for end of input after each chunk.

use std::io::{self, BufRead, Read, Write};

use zeroize::Zeroizing;

use crate::error::{Failure, StreamError};
use crate::stream::{StreamDecryptor, StreamEncryptor};
use crate::wire;

/// Encrypt everything `reader` yields into `writer` as one stream.
///
/// Chunks are `max_chunk_len` bytes except the final one, which is marked
/// last. Empty input produces a single empty last chunk. Returns the number
/// of plaintext bytes consumed.
pub fn encrypt_stream<R: Read, W: Write>(
    encryptor: &mut StreamEncryptor,
    mut reader: R,
    mut writer: W,
) -> io::Result<u64> {
    let max = encryptor.max_chunk_len();
    let mut current = Zeroizing::new(vec![0u8; max]);
    let mut next = Zeroizing::new(vec![0u8; max]);
    let mut current_len = read_full(&mut reader, &mut current)?;
    let mut total = 0u64;

    loop {
        let next_len = if current_len == max {
            read_full(&mut reader, &mut next)?
        } else {
            0
        };
        let is_last = next_len == 0;

        let encrypted = encryptor
            .encrypt_chunk(&current[..current_len], is_last)
            .map_err(into_io)?;
        writer.write_all(&encrypted)?;
        total += current_len as u64;

        if is_last {
            break;
        }
        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
    }

    writer.flush()?;
    Ok(total)
}

/// Decrypt a stream produced by [`encrypt_stream`] (or any sequence of wire
/// chunks) from `reader` into `writer`.
///
/// Plaintext of a chunk is written only after that chunk authenticates, but
/// earlier chunks are already written when a later one fails; write to a
/// temporary location if that matters. Input that ends before a chunk marked
/// last is an `UnexpectedEof` error; every protocol failure is `InvalidData`.
pub fn decrypt_stream<R: BufRead, W: Write>(
    decryptor: &mut StreamDecryptor,
    mut reader: R,
    mut writer: W,
) -> io::Result<u64> {
    let variant = decryptor.variant();
    let prefix_len = wire::prefix_len(variant);
    let mut total = 0u64;

    loop {
        let mut prefix_buf = [0u8; 4];
        let prefix = &mut prefix_buf[..prefix_len];
        let n = read_full(&mut reader, prefix)?;
        if n == 0 {
            let err = decryptor.reject(Failure::TooShort);
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, err));
        }
        if n < prefix_len {
            return Err(into_io(decryptor.reject(Failure::TooShort)));
        }

        let len = wire::read_chunk_length(prefix, 0, variant).unwrap_or(usize::MAX);
        if len > decryptor.max_chunk_len() {
            return Err(into_io(decryptor.reject(Failure::BadLength)));
        }

        let Some(wire_len) = wire::encrypted_len(variant, len) else {
            return Err(into_io(decryptor.reject(Failure::BadLength)));
        };
        let mut chunk = vec![0u8; wire_len];
        chunk[..prefix_len].copy_from_slice(prefix);
        let body_len = chunk.len() - prefix_len;
        if read_full(&mut reader, &mut chunk[prefix_len..])? != body_len {
            let err = decryptor.reject(Failure::TooShort);
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, err));
        }

        let is_last = reader.fill_buf()?.is_empty();
        let plaintext = Zeroizing::new(decryptor.decrypt_chunk(&chunk, is_last).map_err(into_io)?);
        writer.write_all(&plaintext)?;
        total += plaintext.len() as u64;

        if is_last {
            break;
        }
    }

    writer.flush()?;
    Ok(total)
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn into_io(err: StreamError) -> io::Error {
    let kind = match err.failure() {
        Some(failure) => {
            tracing::debug!(reason = %failure, "rejecting encrypted stream");
            io::ErrorKind::InvalidData
        }
        None => io::ErrorKind::InvalidInput,
    };
    io::Error::new(kind, err)
}
