//! Key files and nonces as base64 text

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::io::Write;
use std::path::Path;
use zeroize::Zeroizing;

use sstream_crypto::{StreamKey, KEY_SIZE, NONCE_SIZE};

pub fn generate_key() -> StreamKey {
    let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
    rand::thread_rng().fill_bytes(&mut bytes[..]);
    StreamKey::from_bytes(*bytes)
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

pub fn encode_key(key: &StreamKey) -> SecretString {
    SecretString::from(B64.encode(key.as_bytes()))
}

pub fn encode_nonce(nonce: &[u8; NONCE_SIZE]) -> String {
    B64.encode(nonce)
}

pub fn parse_key(text: &SecretString) -> Result<StreamKey> {
    let bytes = Zeroizing::new(
        B64.decode(text.expose_secret().trim())
            .context("key is not valid base64")?,
    );
    StreamKey::from_slice(&bytes).context("key must decode to 32 bytes")
}

pub fn parse_nonce(text: &str) -> Result<[u8; NONCE_SIZE]> {
    let bytes = B64.decode(text.trim()).context("nonce is not valid base64")?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("nonce must decode to {NONCE_SIZE} bytes, got {}", bytes.len()))
}

pub fn read_key(path: &Path) -> Result<StreamKey> {
    let text = SecretString::from(
        std::fs::read_to_string(path)
            .with_context(|| format!("reading key file: {}", path.display()))?,
    );
    parse_key(&text).with_context(|| format!("parsing key file: {}", path.display()))
}

/// Write `key` to a new file readable only by the owner. Refuses to overwrite.
pub fn write_key(path: &Path, key: &StreamKey) -> Result<()> {
    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts
        .open(path)
        .with_context(|| format!("creating key file: {}", path.display()))?;
    writeln!(file, "{}", encode_key(key).expose_secret())
        .with_context(|| format!("writing key file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.key");
        let key = generate_key();

        write_key(&path, &key).unwrap();
        let loaded = read_key(&path).unwrap();
        assert_eq!(loaded.as_bytes(), key.as_bytes());

        // Never clobbers an existing key.
        assert!(write_key(&path, &generate_key()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.key");
        write_key(&path, &generate_key()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_parse_key_rejects_bad_input() {
        assert!(parse_key(&SecretString::from("not base64!")).is_err());
        let short = B64.encode([0u8; 16]);
        assert!(parse_key(&SecretString::from(short)).is_err());
    }

    #[test]
    fn test_parse_nonce() {
        let nonce = generate_nonce();
        assert_eq!(parse_nonce(&encode_nonce(&nonce)).unwrap(), nonce);
        assert_eq!(parse_nonce(" AAAAAAAAAAAAAAAAAAAAAA==\n").unwrap(), [0u8; 16]);
        assert!(parse_nonce(&B64.encode([0u8; 24])).is_err());
    }
}
