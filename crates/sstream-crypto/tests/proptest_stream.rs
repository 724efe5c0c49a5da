//! Property tests: round trip over arbitrary chunkings, and single-bit
//! tampering anywhere in a stream always fails.

use proptest::prelude::*;

use sstream_crypto::{decrypt_stream, encrypt_stream, StreamConfig, StreamDecryptor, StreamEncryptor, Variant};

fn encrypt_all(key: &[u8; 32], nonce: &[u8; 16], cfg: &StreamConfig, data: &[u8]) -> Vec<u8> {
    let mut enc = StreamEncryptor::new(key, nonce, cfg).unwrap();
    let mut out = Vec::new();
    encrypt_stream(&mut enc, data, &mut out).unwrap();
    out
}

fn decrypt_all(key: &[u8; 32], nonce: &[u8; 16], cfg: &StreamConfig, wire: &[u8]) -> Option<Vec<u8>> {
    let mut dec = StreamDecryptor::new(key, nonce, cfg).unwrap();
    let mut out = Vec::new();
    decrypt_stream(&mut dec, wire, &mut out).ok()?;
    Some(out)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn roundtrip_any_chunking(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 16]>(),
        max in 16usize..256,
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let cfg = StreamConfig::new(Variant::SubkeyDerived, max);
        let wire = encrypt_all(&key, &nonce, &cfg, &data);

        let chunks = data.len().div_ceil(max).max(1);
        prop_assert_eq!(wire.len(), data.len() + chunks * 20);
        prop_assert_eq!(decrypt_all(&key, &nonce, &cfg, &wire), Some(data));
    }

    #[test]
    fn roundtrip_full_nonce(
        key in any::<[u8; 32]>(),
        nonce in any::<[u8; 16]>(),
        data in prop::collection::vec(any::<u8>(), 0..150_000),
    ) {
        let cfg = StreamConfig::new(Variant::FullNonce, 65535);
        let wire = encrypt_all(&key, &nonce, &cfg, &data);
        prop_assert_eq!(decrypt_all(&key, &nonce, &cfg, &wire), Some(data));
    }

    #[test]
    fn any_bit_flip_is_rejected(
        data in prop::collection::vec(any::<u8>(), 1..400),
        pos in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = [0x11u8; 32];
        let nonce = [0x22u8; 16];
        let cfg = StreamConfig::new(Variant::SubkeyDerived, 64);
        let mut wire = encrypt_all(&key, &nonce, &cfg, &data);

        let i = pos.index(wire.len());
        wire[i] ^= 1 << bit;
        prop_assert_eq!(decrypt_all(&key, &nonce, &cfg, &wire), None);
    }

    #[test]
    fn truncation_is_rejected(
        data in prop::collection::vec(any::<u8>(), 0..400),
        cut in any::<prop::sample::Index>(),
    ) {
        let key = [0x33u8; 32];
        let nonce = [0x44u8; 16];
        let cfg = StreamConfig::new(Variant::SubkeyDerived, 32);
        let wire = encrypt_all(&key, &nonce, &cfg, &data);

        let keep = cut.index(wire.len());
        prop_assert_eq!(decrypt_all(&key, &nonce, &cfg, &wire[..keep]), None);
    }
}
