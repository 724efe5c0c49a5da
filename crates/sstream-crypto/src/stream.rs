//! Stream encryptor / decryptor state machines
//!
//! ```text
//!            encrypt/decrypt(is_last)            decrypt failure
//!   Active ----------------------------> Terminal     Active ------> Failed
//!      \__________ release() from Active or Terminal __________> Released
//! ```
//!
//! `Terminal` and `Released` reject further processing calls as programming
//! errors. `Failed` answers every later decrypt call with
//! [`Failure::Poisoned`] without doing any cryptographic work, including
//! after `release()`: a failed decryptor is already wiped and stays failed.

use zeroize::Zeroize;

use sstream_core::{StreamConfig, Variant};

use crate::codec::ChunkCodec;
use crate::error::{Failure, StreamError};
use crate::KEY_SIZE;

/// Lifecycle state of a stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Active,
    Terminal,
    Failed,
    Released,
}

/// Outcome of checking a processing call against the current state.
enum Gate {
    Proceed,
    Poisoned,
}

impl StreamState {
    /// Central transition guard for `encrypt_chunk` / `decrypt_chunk`.
    fn gate(self, op: &'static str) -> Result<Gate, StreamError> {
        match self {
            StreamState::Active => Ok(Gate::Proceed),
            StreamState::Failed => Ok(Gate::Poisoned),
            StreamState::Terminal => Err(StreamError::AfterLastChunk(op)),
            StreamState::Released => Err(StreamError::Released(op)),
        }
    }

    /// State after a successfully processed chunk.
    fn after_chunk(self, is_last: bool) -> Self {
        if is_last {
            StreamState::Terminal
        } else {
            self
        }
    }
}

/// A 256-bit session key. Zeroized on drop.
///
/// The stream constructors accept plain byte slices; this wrapper is for
/// callers that want the key wiped when they are done with it.
#[derive(Clone)]
pub struct StreamKey {
    bytes: [u8; KEY_SIZE],
}

impl StreamKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, StreamError> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| StreamError::BadKeyLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for StreamKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Create a subkey-derived encryptor with the default 65535-byte max chunk.
pub fn create_encryptor(key: &[u8], nonce: &[u8]) -> Result<StreamEncryptor, StreamError> {
    StreamEncryptor::new(key, nonce, &StreamConfig::default())
}

/// Create a subkey-derived decryptor with the default 65535-byte max chunk.
pub fn create_decryptor(key: &[u8], nonce: &[u8]) -> Result<StreamDecryptor, StreamError> {
    StreamDecryptor::new(key, nonce, &StreamConfig::default())
}

/// Encrypting side of a stream.
///
/// Call [`encrypt_chunk`](Self::encrypt_chunk) once per chunk, in order,
/// marking exactly the final chunk with `is_last = true`. Key material is
/// wiped by [`release`](Self::release) or on drop.
#[derive(Debug)]
pub struct StreamEncryptor {
    codec: ChunkCodec,
    state: StreamState,
}

impl StreamEncryptor {
    pub fn new(key: &[u8], nonce: &[u8], config: &StreamConfig) -> Result<Self, StreamError> {
        let codec = ChunkCodec::new(key, nonce, config)?;
        tracing::debug!(
            variant = %codec.variant(),
            max_chunk_len = codec.max_chunk_len(),
            "stream encryptor created"
        );
        Ok(Self {
            codec,
            state: StreamState::Active,
        })
    }

    /// Encrypt one chunk and return its wire bytes.
    pub fn encrypt_chunk(&mut self, chunk: &[u8], is_last: bool) -> Result<Vec<u8>, StreamError> {
        // Encryptors never enter the failed state, so only the error matters.
        self.state.gate("encrypt_chunk")?;

        let index = self.codec.chunk_index();
        let encrypted = self.codec.encode(chunk, is_last)?;
        self.state = self.state.after_chunk(is_last);
        tracing::trace!(index, len = chunk.len(), is_last, "chunk encrypted");
        Ok(encrypted)
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn variant(&self) -> Variant {
        self.codec.variant()
    }

    pub fn max_chunk_len(&self) -> usize {
        self.codec.max_chunk_len()
    }

    pub fn chunks_processed(&self) -> u64 {
        self.codec.chunk_index()
    }

    /// Wipe scratch buffers, counter and key material. Idempotent.
    pub fn release(&mut self) {
        if self.state == StreamState::Released {
            return;
        }
        self.codec.wipe();
        self.state = StreamState::Released;
        tracing::debug!("stream encryptor released");
    }
}

impl Drop for StreamEncryptor {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decrypting side of a stream.
///
/// Any validation or authentication failure is final: the decryptor wipes
/// itself and every later call returns [`Failure::Poisoned`].
#[derive(Debug)]
pub struct StreamDecryptor {
    codec: ChunkCodec,
    state: StreamState,
    completed: bool,
}

impl StreamDecryptor {
    pub fn new(key: &[u8], nonce: &[u8], config: &StreamConfig) -> Result<Self, StreamError> {
        let codec = ChunkCodec::new(key, nonce, config)?;
        tracing::debug!(
            variant = %codec.variant(),
            max_chunk_len = codec.max_chunk_len(),
            "stream decryptor created"
        );
        Ok(Self {
            codec,
            state: StreamState::Active,
            completed: false,
        })
    }

    /// Verify and decrypt one wire chunk.
    ///
    /// `is_last` is the caller's claim about stream position; a wrong claim
    /// fails authentication.
    pub fn decrypt_chunk(&mut self, encrypted: &[u8], is_last: bool) -> Result<Vec<u8>, StreamError> {
        match self.state.gate("decrypt_chunk")? {
            Gate::Proceed => {}
            Gate::Poisoned => return Err(Failure::Poisoned.into()),
        }

        let index = self.codec.chunk_index();
        match self.codec.decode(encrypted, is_last) {
            Ok(plaintext) => {
                self.state = self.state.after_chunk(is_last);
                self.completed = is_last;
                tracing::trace!(index, len = plaintext.len(), is_last, "chunk decrypted");
                Ok(plaintext)
            }
            Err(failure) => Err(self.fail(index, failure).into()),
        }
    }

    /// Put the decryptor into the failed state without decoding anything.
    ///
    /// Used by readers that reject a chunk before it is fully read, e.g. a
    /// declared length above the maximum.
    pub(crate) fn reject(&mut self, failure: Failure) -> StreamError {
        if self.state != StreamState::Active {
            return Failure::Poisoned.into();
        }
        let index = self.codec.chunk_index();
        self.fail(index, failure).into()
    }

    fn fail(&mut self, index: u64, failure: Failure) -> Failure {
        tracing::warn!(index, reason = %failure, "stream decryption failed");
        self.codec.wipe();
        self.state = StreamState::Failed;
        failure
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// True once a chunk marked last has been authenticated.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn variant(&self) -> Variant {
        self.codec.variant()
    }

    pub fn max_chunk_len(&self) -> usize {
        self.codec.max_chunk_len()
    }

    /// Chunks authenticated so far. Reads zero once the decryptor is wiped.
    pub fn chunks_processed(&self) -> u64 {
        self.codec.chunk_index()
    }

    /// Wipe scratch buffers, counter and key material. Idempotent.
    ///
    /// A failed decryptor was wiped when it failed and keeps reporting
    /// [`Failure::Poisoned`] after release.
    pub fn release(&mut self) {
        if matches!(self.state, StreamState::Released | StreamState::Failed) {
            return;
        }
        if self.state == StreamState::Active && self.codec.chunk_index() > 0 {
            tracing::warn!(
                chunks = self.codec.chunk_index(),
                "stream decryptor released before the last chunk; the stream may be truncated"
            );
        }
        self.codec.wipe();
        self.state = StreamState::Released;
        tracing::debug!("stream decryptor released");
    }
}

impl Drop for StreamDecryptor {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];
    const NONCE: [u8; 16] = [0x24; 16];

    fn small_config() -> StreamConfig {
        StreamConfig::new(Variant::SubkeyDerived, 16)
    }

    #[test]
    fn test_encryptor_terminal_after_last() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        enc.encrypt_chunk(b"only", true).unwrap();
        assert_eq!(enc.state(), StreamState::Terminal);

        let err = enc.encrypt_chunk(b"more", false).unwrap_err();
        assert_eq!(err, StreamError::AfterLastChunk("encrypt_chunk"));
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_decryptor_terminal_after_last() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        let wire = enc.encrypt_chunk(b"only", true).unwrap();

        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        assert_eq!(dec.decrypt_chunk(&wire, true).unwrap(), b"only");
        assert!(dec.is_complete());
        assert_eq!(dec.state(), StreamState::Terminal);

        let err = dec.decrypt_chunk(&wire, false).unwrap_err();
        assert_eq!(err, StreamError::AfterLastChunk("decrypt_chunk"));
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        let w0 = enc.encrypt_chunk(b"zero", false).unwrap();
        let w1 = enc.encrypt_chunk(b"one", true).unwrap();

        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        let err = dec.decrypt_chunk(&w1, false).unwrap_err();
        assert_eq!(err, StreamError::Decrypt(Failure::Authentication));
        assert_eq!(dec.state(), StreamState::Failed);

        // Even the correct chunk is refused now.
        assert_eq!(
            dec.decrypt_chunk(&w0, false).unwrap_err(),
            StreamError::Decrypt(Failure::Poisoned)
        );
        assert_eq!(
            dec.decrypt_chunk(&w0, true).unwrap_err(),
            StreamError::Decrypt(Failure::Poisoned)
        );
        assert!(!dec.is_complete());
    }

    #[test]
    fn test_failure_on_last_claim_is_failed_not_terminal() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        let w0 = enc.encrypt_chunk(b"zero", false).unwrap();

        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        assert!(dec.decrypt_chunk(&w0, true).is_err());
        assert_eq!(dec.state(), StreamState::Failed);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        enc.encrypt_chunk(b"x", false).unwrap();
        enc.release();
        enc.release();
        assert_eq!(enc.state(), StreamState::Released);
        assert_eq!(
            enc.encrypt_chunk(b"y", true).unwrap_err(),
            StreamError::Released("encrypt_chunk")
        );

        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        dec.release();
        dec.release();
        assert_eq!(dec.state(), StreamState::Released);
        assert_eq!(
            dec.decrypt_chunk(b"garbage", false).unwrap_err(),
            StreamError::Released("decrypt_chunk")
        );
    }

    #[test]
    fn test_failed_decryptor_stays_failed_after_release() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        let w0 = enc.encrypt_chunk(b"zero", false).unwrap();

        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        assert!(dec.decrypt_chunk(&w0, true).is_err());
        dec.release();
        dec.release();
        assert_eq!(dec.state(), StreamState::Failed);

        let err = dec.decrypt_chunk(&w0, false).unwrap_err();
        assert_eq!(err, StreamError::Decrypt(Failure::Poisoned));
        assert!(!err.is_programming_error());
    }

    #[test]
    fn test_release_after_terminal() {
        let mut enc = create_encryptor(&KEY, &NONCE).unwrap();
        enc.encrypt_chunk(b"x", true).unwrap();
        enc.release();
        assert_eq!(enc.state(), StreamState::Released);
    }

    #[test]
    fn test_oversized_chunk_is_programming_error() {
        let mut enc = StreamEncryptor::new(&KEY, &NONCE, &small_config()).unwrap();
        assert!(enc.encrypt_chunk(&[0u8; 16], false).is_ok());
        let err = enc.encrypt_chunk(&[0u8; 17], false).unwrap_err();
        assert_eq!(err, StreamError::ChunkTooLarge { len: 17, max: 16 });
        assert_eq!(enc.state(), StreamState::Active);
        assert_eq!(enc.chunks_processed(), 1);
    }

    #[test]
    fn test_invalid_config_rejected_at_creation() {
        let cfg = StreamConfig::new(Variant::SubkeyDerived, 15);
        assert_eq!(
            StreamEncryptor::new(&KEY, &NONCE, &cfg).unwrap_err(),
            StreamError::MaxChunkTooSmall(15)
        );
        assert_eq!(
            StreamDecryptor::new(&KEY, &NONCE, &cfg).unwrap_err(),
            StreamError::MaxChunkTooSmall(15)
        );
        assert_eq!(
            create_encryptor(&KEY[..16], &NONCE).unwrap_err(),
            StreamError::BadKeyLength(16)
        );
        assert_eq!(
            create_decryptor(&KEY, &NONCE[..8]).unwrap_err(),
            StreamError::BadNonceLength(8)
        );
    }

    #[test]
    fn test_reject_fails_decryptor() {
        let mut dec = create_decryptor(&KEY, &NONCE).unwrap();
        let err = dec.reject(Failure::BadLength);
        assert_eq!(err, StreamError::Decrypt(Failure::BadLength));
        assert_eq!(dec.state(), StreamState::Failed);
        assert_eq!(dec.reject(Failure::BadLength), StreamError::Decrypt(Failure::Poisoned));
    }

    #[test]
    fn test_stream_key() {
        let key = StreamKey::from_slice(&KEY).unwrap();
        assert_eq!(key.as_bytes(), &KEY);
        assert!(format!("{key:?}").contains("REDACTED"));
        assert_eq!(
            StreamKey::from_slice(&[0u8; 5]).unwrap_err(),
            StreamError::BadKeyLength(5)
        );
        let mut enc = create_encryptor(key.as_bytes(), &NONCE).unwrap();
        assert!(enc.encrypt_chunk(b"k", true).is_ok());
    }
}
