//! sstream-crypto: chunked streaming encryption over the NaCl secretbox
//!
//! Architecture: Chunk-then-Seal with XSalsa20-Poly1305
//!
//! A stream is a sequence of independently authenticated chunks. The position
//! of each chunk (an 8-byte little-endian counter) and whether it is the final
//! chunk (top bit of the counter's last byte) are part of the nonce, so
//! truncation, reordering and splicing all surface as tag mismatches.
//!
//! Key schedule:
//! ```text
//! subkey-derived:  subkey = HSalsa20(key, nonce16)
//!                  chunk_i = Salsa20-Poly1305(subkey, counter_i)
//! full-nonce:      chunk_i = XSalsa20-Poly1305(key, nonce16 || counter_i)
//! ```
//!
//! Both schedules produce identical ciphertext; only the length prefix
//! differs (4 bytes vs 2 bytes, little-endian). The secretbox itself comes
//! from the `crypto_secretbox` crate.
//!
//! [`StreamEncryptor`] and [`StreamDecryptor`] are the only way to seal or
//! open chunks. The codec and nonce state behind them are private:
//!
//! ```compile_fail
//! use sstream_crypto::codec::ChunkCodec;
//! ```
//!
//! ```compile_fail
//! use sstream_crypto::counter::NonceState;
//! ```

mod codec;
mod counter;
pub mod error;
pub mod io;
mod secretbox;
pub mod stream;
pub mod wire;

pub use error::{Failure, StreamError};
pub use io::{decrypt_stream, encrypt_stream};
pub use stream::{create_decryptor, create_encryptor, StreamDecryptor, StreamEncryptor, StreamKey, StreamState};
pub use wire::{read_chunk_length, WireChunks};

pub use sstream_core::{StreamConfig, Variant};

/// Size of a session key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of the caller-supplied stream nonce
pub const NONCE_SIZE: usize = 16;

/// Size of an XSalsa20 nonce (192-bit)
pub const FULL_NONCE_SIZE: usize = 24;

/// Size of the little-endian chunk counter
pub const COUNTER_SIZE: usize = 8;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
