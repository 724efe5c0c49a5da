use thiserror::Error;

use sstream_core::Variant;

/// Why a chunk was rejected by a decryptor.
///
/// Every variant means "no plaintext". Reasons are reported for logging only;
/// callers should treat them all the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("encrypted chunk is too short")]
    TooShort,

    #[error("declared chunk length exceeds the maximum")]
    BadLength,

    #[error("declared chunk length does not match the encrypted chunk size")]
    LengthMismatch,

    #[error("authentication failed: corrupted, reordered, or truncated stream")]
    Authentication,

    #[error("decryptor already failed")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("bad key length: {0} bytes, must be 32")]
    BadKeyLength(usize),

    #[error("bad nonce length: {0} bytes, must be 16")]
    BadNonceLength(usize),

    #[error("max chunk length is too small: {0} (minimum 16)")]
    MaxChunkTooSmall(usize),

    #[error("max chunk length is too large: {0}")]
    MaxChunkTooLarge(usize),

    #[error("max chunk length of the {variant} variant is fixed at {fixed}, got {requested}")]
    MaxChunkFixed {
        variant: Variant,
        fixed: usize,
        requested: usize,
    },

    #[error("chunk is too large: {len} / {max}")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("called {0} after last chunk")]
    AfterLastChunk(&'static str),

    #[error("called {0} after release")]
    Released(&'static str),

    #[error("secretbox refused to seal the chunk")]
    Seal,

    #[error("chunk decryption failed: {0}")]
    Decrypt(#[from] Failure),
}

impl StreamError {
    /// True when the caller broke the API contract, as opposed to the input
    /// failing authentication or validation.
    pub fn is_programming_error(&self) -> bool {
        !matches!(self, StreamError::Decrypt(_))
    }

    /// The decryption failure reason, if this is a protocol failure.
    pub fn failure(&self) -> Option<Failure> {
        match self {
            StreamError::Decrypt(f) => Some(*f),
            _ => None,
        }
    }
}
