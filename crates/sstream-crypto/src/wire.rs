//! Wire format of one encrypted chunk
//!
//! ```text
//! subkey-derived: [4 bytes: plaintext length, LE][16 bytes: tag][N bytes: ciphertext]
//! full-nonce:     [2 bytes: plaintext length, LE][16 bytes: tag][N bytes: ciphertext]
//! ```
//!
//! An encrypted stream is the plain concatenation of its chunks. There is no
//! outer header: each chunk's length prefix tells how many bytes follow.

use sstream_core::Variant;

use crate::error::{Failure, StreamError};
use crate::TAG_SIZE;

/// Smallest max chunk length accepted by the subkey-derived variant.
pub const MIN_MAX_CHUNK_LEN: usize = 16;

/// Max chunk length of the full-nonce variant (fits its 2-byte prefix).
pub const FULL_NONCE_MAX_CHUNK_LEN: usize = 65535;

/// Exclusive upper bound on the subkey-derived max chunk length.
const SUBKEY_MAX_CHUNK_LIMIT: usize = 0xffff_ffff;

/// Width of the length prefix for `variant`.
pub fn prefix_len(variant: Variant) -> usize {
    match variant {
        Variant::SubkeyDerived => 4,
        Variant::FullNonce => 2,
    }
}

/// Bytes a chunk adds on the wire on top of its plaintext.
pub fn overhead(variant: Variant) -> usize {
    prefix_len(variant) + TAG_SIZE
}

/// Total wire size of a chunk carrying `chunk_len` plaintext bytes, or `None`
/// if that does not fit in `usize`.
pub fn encrypted_len(variant: Variant, chunk_len: usize) -> Option<usize> {
    chunk_len.checked_add(overhead(variant))
}

/// Check a configured max chunk length against the variant's limits.
pub fn validate_max_chunk_len(variant: Variant, max_chunk_len: usize) -> Result<usize, StreamError> {
    match variant {
        Variant::SubkeyDerived => {
            if max_chunk_len >= SUBKEY_MAX_CHUNK_LIMIT || encrypted_len(variant, max_chunk_len).is_none() {
                return Err(StreamError::MaxChunkTooLarge(max_chunk_len));
            }
            if max_chunk_len < MIN_MAX_CHUNK_LEN {
                return Err(StreamError::MaxChunkTooSmall(max_chunk_len));
            }
        }
        Variant::FullNonce => {
            if max_chunk_len != FULL_NONCE_MAX_CHUNK_LEN {
                return Err(StreamError::MaxChunkFixed {
                    variant,
                    fixed: FULL_NONCE_MAX_CHUNK_LEN,
                    requested: max_chunk_len,
                });
            }
        }
    }
    Ok(max_chunk_len)
}

/// Read the plaintext length declared by the chunk starting at `offset`.
///
/// Returns `None` if `data` is too short to hold the length prefix.
pub fn read_chunk_length(data: &[u8], offset: usize, variant: Variant) -> Option<usize> {
    let end = offset.checked_add(prefix_len(variant))?;
    let prefix = data.get(offset..end)?;
    let len = match variant {
        Variant::SubkeyDerived => u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize,
        Variant::FullNonce => u16::from_le_bytes([prefix[0], prefix[1]]) as usize,
    };
    Some(len)
}

/// Append the length prefix for a chunk of `chunk_len` plaintext bytes.
///
/// `chunk_len` must already be bounded by a validated max chunk length.
pub(crate) fn put_prefix(out: &mut Vec<u8>, variant: Variant, chunk_len: usize) {
    match variant {
        Variant::SubkeyDerived => out.extend_from_slice(&(chunk_len as u32).to_le_bytes()),
        Variant::FullNonce => out.extend_from_slice(&(chunk_len as u16).to_le_bytes()),
    }
}

/// Iterator over the wire chunks of a contiguous encrypted stream.
///
/// Yields `(chunk, is_last)` where `is_last` means no bytes follow the chunk
/// in the buffer. A trailing fragment that cannot hold a complete chunk yields
/// `Err(Failure::TooShort)` and ends iteration. Lengths are not checked
/// against any maximum here; the decryptor does that.
#[derive(Debug, Clone)]
pub struct WireChunks<'a> {
    data: &'a [u8],
    offset: usize,
    variant: Variant,
    done: bool,
}

impl<'a> WireChunks<'a> {
    pub fn new(data: &'a [u8], variant: Variant) -> Self {
        Self {
            data,
            offset: 0,
            variant,
            done: data.is_empty(),
        }
    }
}

impl<'a> Iterator for WireChunks<'a> {
    type Item = Result<(&'a [u8], bool), Failure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk_len = match read_chunk_length(self.data, self.offset, self.variant) {
            Some(len) => len,
            None => {
                self.done = true;
                return Some(Err(Failure::TooShort));
            }
        };
        let end = match encrypted_len(self.variant, chunk_len)
            .and_then(|len| self.offset.checked_add(len))
            .filter(|end| *end <= self.data.len())
        {
            Some(end) => end,
            None => {
                self.done = true;
                return Some(Err(Failure::TooShort));
            }
        };

        let chunk = &self.data[self.offset..end];
        self.offset = end;
        let is_last = end == self.data.len();
        self.done = is_last;
        Some(Ok((chunk, is_last)))
    }
}
