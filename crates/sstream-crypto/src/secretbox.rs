//! Adapter over the `crypto_secretbox` crate
//!
//! Both variants seal through `SecretBox`'s detached in-place interface: tag
//! out, ciphertext in the buffer.
//!
//! - full-nonce: the stock `XSalsa20Poly1305` under the session key and the
//!   24-byte nonce `nonce16 || counter`.
//! - subkey-derived: the HSalsa20 subkey is derived once per stream, so the
//!   secretbox is instantiated over [`PrederivedSalsa20`], whose key
//!   derivation step is the identity. Its nonce is `[0; 16] || counter` and
//!   only the counter half reaches Salsa20.

use crypto_secretbox::aead::generic_array::GenericArray;
use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::{Kdf, SecretBox};
use salsa20::cipher::consts::{U10, U16, U32, U8};
use salsa20::cipher::inout::InOutBuf;
use salsa20::cipher::{Iv, IvSizeUser, KeyIvInit, KeySizeUser, StreamCipher, StreamCipherError};
use salsa20::{hsalsa, Key, Salsa20};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Failure, StreamError};
use crate::{FULL_NONCE_SIZE, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

pub(crate) use crypto_secretbox::XSalsa20Poly1305;

/// Secretbox keyed directly with an HSalsa20 subkey.
pub(crate) type SubkeySalsa20Poly1305 = SecretBox<PrederivedSalsa20>;

/// Salsa20 whose key is already an HSalsa20 subkey.
pub(crate) struct PrederivedSalsa20(Salsa20);

impl KeySizeUser for PrederivedSalsa20 {
    type KeySize = U32;
}

impl IvSizeUser for PrederivedSalsa20 {
    type IvSize = U8;
}

impl KeyIvInit for PrederivedSalsa20 {
    fn new(key: &salsa20::cipher::Key<Self>, iv: &Iv<Self>) -> Self {
        Self(Salsa20::new(key, iv))
    }
}

impl StreamCipher for PrederivedSalsa20 {
    fn try_apply_keystream_inout(&mut self, buf: InOutBuf<'_, '_, u8>) -> Result<(), StreamCipherError> {
        self.0.try_apply_keystream_inout(buf)
    }
}

impl Kdf for PrederivedSalsa20 {
    fn kdf(key: &crypto_secretbox::Key, _nonce: &GenericArray<u8, U16>) -> crypto_secretbox::Key {
        *key
    }
}

/// Derive the 32-byte XSalsa20 subkey for `key` and a 16-byte nonce (HSalsa20).
pub(crate) fn derive_subkey(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut derived = hsalsa::<U10>(Key::from_slice(key), nonce.into());
    let mut subkey = Zeroizing::new([0u8; KEY_SIZE]);
    subkey.copy_from_slice(&derived);
    derived.as_mut_slice().zeroize();
    subkey
}

/// Instantiate a secretbox under `key`.
pub(crate) fn keyed<A: KeyInit>(key: &[u8; KEY_SIZE]) -> A {
    A::new(GenericArray::from_slice(key))
}

/// Encrypt `buf` in place and return its tag.
pub(crate) fn seal<A>(cipher: &A, nonce: &[u8; FULL_NONCE_SIZE], buf: &mut [u8]) -> Result<[u8; TAG_SIZE], StreamError>
where
    A: AeadInPlace<NonceSize = crypto_secretbox::consts::U24>,
{
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", buf)
        .map_err(|_| StreamError::Seal)?;
    let mut out = [0u8; TAG_SIZE];
    out.copy_from_slice(&tag);
    Ok(out)
}

/// Verify `tag` and decrypt `buf` in place.
///
/// `buf` is left as ciphertext when verification fails.
pub(crate) fn open<A>(cipher: &A, nonce: &[u8; FULL_NONCE_SIZE], buf: &mut [u8], tag: &[u8]) -> Result<(), Failure>
where
    A: AeadInPlace<NonceSize = crypto_secretbox::consts::U24, TagSize = U16>,
{
    if tag.len() != TAG_SIZE {
        return Err(Failure::Authentication);
    }
    cipher
        .decrypt_in_place_detached(GenericArray::from_slice(nonce), b"", buf, GenericArray::from_slice(tag))
        .map_err(|_| Failure::Authentication)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subkey_box(subkey: &[u8; KEY_SIZE]) -> SubkeySalsa20Poly1305 {
        keyed(subkey)
    }

    fn counter_nonce(counter: [u8; 8]) -> [u8; FULL_NONCE_SIZE] {
        let mut nonce = [0u8; FULL_NONCE_SIZE];
        nonce[NONCE_SIZE..].copy_from_slice(&counter);
        nonce
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = subkey_box(&[7u8; KEY_SIZE]);
        let nonce = counter_nonce([1u8; 8]);
        let plaintext = b"attack at dawn".to_vec();

        let mut buf = plaintext.clone();
        let tag = seal(&cipher, &nonce, &mut buf).unwrap();
        assert_ne!(buf, plaintext);

        open(&cipher, &nonce, &mut buf, &tag).unwrap();
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn test_open_rejects_tampered_ciphertext() {
        let cipher = subkey_box(&[7u8; KEY_SIZE]);
        let nonce = counter_nonce([0u8; 8]);
        let mut buf = vec![0x42u8; 64];
        let tag = seal(&cipher, &nonce, &mut buf).unwrap();

        buf[10] ^= 0x01;
        let snapshot = buf.clone();
        assert_eq!(open(&cipher, &nonce, &mut buf, &tag), Err(Failure::Authentication));
        assert_eq!(buf, snapshot, "failed open must not touch the buffer");
    }

    #[test]
    fn test_open_rejects_wrong_nonce() {
        let cipher = subkey_box(&[7u8; KEY_SIZE]);
        let mut buf = vec![0u8; 32];
        let tag = seal(&cipher, &counter_nonce([0u8; 8]), &mut buf).unwrap();

        assert!(open(&cipher, &counter_nonce([1u8; 8]), &mut buf, &tag).is_err());
    }

    #[test]
    fn test_open_rejects_short_tag() {
        let cipher = subkey_box(&[7u8; KEY_SIZE]);
        let nonce = counter_nonce([0u8; 8]);
        let mut buf = vec![0u8; 8];
        let tag = seal(&cipher, &nonce, &mut buf).unwrap();

        assert_eq!(open(&cipher, &nonce, &mut buf, &tag[..15]), Err(Failure::Authentication));
    }

    #[test]
    fn test_prederived_subkey_matches_xsalsa20() {
        let key = [9u8; KEY_SIZE];
        let nonce16 = [3u8; NONCE_SIZE];
        let counter = [5u8; 8];

        let mut full = [0u8; FULL_NONCE_SIZE];
        full[..NONCE_SIZE].copy_from_slice(&nonce16);
        full[NONCE_SIZE..].copy_from_slice(&counter);

        let subkey = derive_subkey(&key, &nonce16);
        let mut a = vec![0xAAu8; 100];
        let mut b = a.clone();
        let tag_a = seal(&subkey_box(&subkey), &counter_nonce(counter), &mut a).unwrap();
        let tag_b = seal(&keyed::<XSalsa20Poly1305>(&key), &full, &mut b).unwrap();

        assert_eq!(a, b);
        assert_eq!(tag_a, tag_b);
    }

    #[test]
    fn test_subkey_depends_on_nonce() {
        let key = [9u8; KEY_SIZE];
        let a = derive_subkey(&key, &[0u8; NONCE_SIZE]);
        let b = derive_subkey(&key, &[1u8; NONCE_SIZE]);
        assert_ne!(*a, *b);
    }
}
