//! Per-stream nonce state: key schedule plus chunk counter
//!
//! The counter is 8 bytes, little-endian, and starts at zero. The top bit of
//! byte 7 doubles as the last-chunk flag, so the final chunk of a stream is
//! sealed under a nonce no other chunk position can produce.

use zeroize::{Zeroize, Zeroizing};

use sstream_core::Variant;

use crate::error::{Failure, StreamError};
use crate::secretbox::{self, SubkeySalsa20Poly1305, XSalsa20Poly1305};
use crate::{COUNTER_SIZE, FULL_NONCE_SIZE, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

const LAST_CHUNK_FLAG: u8 = 0x80;

/// 8-byte little-endian chunk counter with an overloaded top bit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ChunkCounter([u8; COUNTER_SIZE]);

impl ChunkCounter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; COUNTER_SIZE] {
        &self.0
    }

    /// Add one, carrying into the next byte only when a byte wraps to zero.
    pub(crate) fn increment(&mut self) {
        for byte in self.0.iter_mut() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }

    pub(crate) fn set_last(&mut self) {
        self.0[COUNTER_SIZE - 1] |= LAST_CHUNK_FLAG;
    }
}

impl Zeroize for ChunkCounter {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// How the session key and nonce are turned into a per-chunk secretbox.
enum KeySchedule {
    /// HSalsa20 subkey derived at creation; the counter is the Salsa20 nonce.
    Subkey(Zeroizing<[u8; KEY_SIZE]>),
    /// Session key kept as is; the counter is appended to the 16-byte nonce to
    /// form the 24-byte XSalsa20 nonce.
    FullNonce {
        key: Zeroizing<[u8; KEY_SIZE]>,
        prefix: [u8; NONCE_SIZE],
    },
}

/// Key schedule and counter of one stream instance.
///
/// Every successful seal or open consumes the current counter value, so no
/// two chunks are ever sealed under the same nonce.
pub(crate) struct NonceState {
    schedule: KeySchedule,
    counter: ChunkCounter,
}

impl NonceState {
    pub(crate) fn new(variant: Variant, key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE]) -> Self {
        let schedule = match variant {
            Variant::SubkeyDerived => KeySchedule::Subkey(secretbox::derive_subkey(key, nonce)),
            Variant::FullNonce => KeySchedule::FullNonce {
                key: Zeroizing::new(*key),
                prefix: *nonce,
            },
        };
        Self {
            schedule,
            counter: ChunkCounter::new(),
        }
    }

    pub(crate) fn counter(&self) -> &ChunkCounter {
        &self.counter
    }

    pub(crate) fn set_last(&mut self) {
        self.counter.set_last();
    }

    /// Seal `buf` in place under the current counter value, then advance.
    pub(crate) fn seal(&mut self, buf: &mut [u8]) -> Result<[u8; TAG_SIZE], StreamError> {
        let mut nonce = self.working_nonce();
        let result = match &self.schedule {
            KeySchedule::Subkey(subkey) => {
                secretbox::seal(&secretbox::keyed::<SubkeySalsa20Poly1305>(subkey), &nonce, buf)
            }
            KeySchedule::FullNonce { key, .. } => {
                secretbox::seal(&secretbox::keyed::<XSalsa20Poly1305>(key), &nonce, buf)
            }
        };
        nonce.zeroize();
        let tag = result?;
        self.counter.increment();
        Ok(tag)
    }

    /// Verify and open `buf` in place under the current counter value,
    /// advancing only when the tag checks out.
    pub(crate) fn open(&mut self, buf: &mut [u8], tag: &[u8]) -> Result<(), Failure> {
        let mut nonce = self.working_nonce();
        let result = match &self.schedule {
            KeySchedule::Subkey(subkey) => {
                secretbox::open(&secretbox::keyed::<SubkeySalsa20Poly1305>(subkey), &nonce, buf, tag)
            }
            KeySchedule::FullNonce { key, .. } => {
                secretbox::open(&secretbox::keyed::<XSalsa20Poly1305>(key), &nonce, buf, tag)
            }
        };
        nonce.zeroize();
        result?;
        self.counter.increment();
        Ok(())
    }

    /// Zero the counter and all key material.
    pub(crate) fn wipe(&mut self) {
        self.counter.zeroize();
        match &mut self.schedule {
            KeySchedule::Subkey(subkey) => subkey.zeroize(),
            KeySchedule::FullNonce { key, prefix } => {
                key.zeroize();
                prefix.zeroize();
            }
        }
    }

    /// The 24-byte secretbox nonce for the current chunk. The subkey schedule
    /// leaves the first 16 bytes zero; only the counter half is used.
    fn working_nonce(&self) -> [u8; FULL_NONCE_SIZE] {
        let mut nonce = [0u8; FULL_NONCE_SIZE];
        if let KeySchedule::FullNonce { prefix, .. } = &self.schedule {
            nonce[..NONCE_SIZE].copy_from_slice(prefix);
        }
        nonce[NONCE_SIZE..].copy_from_slice(self.counter.as_bytes());
        nonce
    }
}
