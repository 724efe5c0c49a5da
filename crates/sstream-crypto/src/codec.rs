//! Chunk codec: one plaintext chunk <-> one wire chunk
//!
//! The codec owns the nonce state and a scratch buffer sized to the max chunk
//! length. It knows nothing about call ordering; the stream state machines in
//! [`crate::stream`] decide whether a call is allowed at all.

use zeroize::{Zeroize, Zeroizing};

use sstream_core::{StreamConfig, Variant};

use crate::counter::NonceState;
use crate::error::{Failure, StreamError};
use crate::wire;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

pub(crate) struct ChunkCodec {
    variant: Variant,
    max_chunk_len: usize,
    nonce: NonceState,
    scratch: Zeroizing<Vec<u8>>,
}

impl ChunkCodec {
    /// Validate the configuration and set up the key schedule.
    pub(crate) fn new(key: &[u8], nonce: &[u8], config: &StreamConfig) -> Result<Self, StreamError> {
        let key: &[u8; KEY_SIZE] = key
            .try_into()
            .map_err(|_| StreamError::BadKeyLength(key.len()))?;
        let nonce: &[u8; NONCE_SIZE] = nonce
            .try_into()
            .map_err(|_| StreamError::BadNonceLength(nonce.len()))?;
        let max_chunk_len = wire::validate_max_chunk_len(config.variant, config.max_chunk_len)?;

        Ok(Self {
            variant: config.variant,
            max_chunk_len,
            nonce: NonceState::new(config.variant, key, nonce),
            scratch: Zeroizing::new(vec![0u8; max_chunk_len]),
        })
    }

    pub(crate) fn variant(&self) -> Variant {
        self.variant
    }

    pub(crate) fn max_chunk_len(&self) -> usize {
        self.max_chunk_len
    }

    /// Seal one chunk. Sets the last-chunk flag first when `is_last`, so the
    /// flag is covered by the tag.
    pub(crate) fn encode(&mut self, chunk: &[u8], is_last: bool) -> Result<Vec<u8>, StreamError> {
        let len = chunk.len();
        if len > self.max_chunk_len {
            return Err(StreamError::ChunkTooLarge {
                len,
                max: self.max_chunk_len,
            });
        }

        let wire_len = wire::encrypted_len(self.variant, len).ok_or(StreamError::ChunkTooLarge {
            len,
            max: self.max_chunk_len,
        })?;

        let buf = &mut self.scratch[..len];
        buf.copy_from_slice(chunk);
        if is_last {
            self.nonce.set_last();
        }
        let sealed = self.nonce.seal(buf);
        let tag = match sealed {
            Ok(tag) => tag,
            Err(err) => {
                buf.zeroize();
                return Err(err);
            }
        };

        let mut out = Vec::with_capacity(wire_len);
        wire::put_prefix(&mut out, self.variant, len);
        out.extend_from_slice(&tag);
        out.extend_from_slice(buf);
        buf.zeroize();
        Ok(out)
    }

    /// Validate, verify and open one wire chunk.
    ///
    /// On failure nothing is returned and the counter is left where it was;
    /// the caller is expected to wipe the codec.
    pub(crate) fn decode(&mut self, encrypted: &[u8], is_last: bool) -> Result<Vec<u8>, Failure> {
        let prefix_len = wire::prefix_len(self.variant);
        if encrypted.len() < prefix_len + TAG_SIZE {
            return Err(Failure::TooShort);
        }
        let len = wire::read_chunk_length(encrypted, 0, self.variant).ok_or(Failure::TooShort)?;
        if len > self.max_chunk_len {
            return Err(Failure::BadLength);
        }
        if wire::encrypted_len(self.variant, len) != Some(encrypted.len()) {
            return Err(Failure::LengthMismatch);
        }

        let (tag, ciphertext) = encrypted[prefix_len..].split_at(TAG_SIZE);
        let buf = &mut self.scratch[..len];
        buf.copy_from_slice(ciphertext);
        if is_last {
            self.nonce.set_last();
        }
        if let Err(failure) = self.nonce.open(buf, tag) {
            buf.zeroize();
            return Err(failure);
        }

        let plaintext = buf.to_vec();
        buf.zeroize();
        Ok(plaintext)
    }

    /// Number of chunks processed so far, ignoring the last-chunk flag.
    pub(crate) fn chunk_index(&self) -> u64 {
        let mut bytes = *self.nonce.counter().as_bytes();
        bytes[7] &= 0x7f;
        u64::from_le_bytes(bytes)
    }

    /// Zero the scratch buffer, counter and key material.
    ///
    /// The scratch buffer keeps its length, so a wiped codec stays safe to
    /// call; it just no longer holds the stream's key.
    pub(crate) fn wipe(&mut self) {
        self.scratch.as_mut_slice().zeroize();
        self.nonce.wipe();
    }
}

impl std::fmt::Debug for ChunkCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCodec")
            .field("variant", &self.variant)
            .field("max_chunk_len", &self.max_chunk_len)
            .field("nonce", &"[REDACTED]")
            .finish()
    }
}
