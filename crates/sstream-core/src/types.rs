use serde::{Deserialize, Serialize};

/// Wire protocol variant of an encrypted stream.
///
/// Both variants seal each chunk with XSalsa20-Poly1305 and bind the chunk
/// counter and last-chunk flag into the nonce. They differ in how the key and
/// nonce are prepared and in the width of the per-chunk length prefix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// HSalsa20 subkey derived once per stream, 8-byte counter as the Salsa20
    /// nonce, 4-byte length prefix, configurable max chunk length.
    #[default]
    SubkeyDerived,
    /// 16-byte nonce extended to a 24-byte XSalsa20 nonce whose trailing 8
    /// bytes are the counter, 2-byte length prefix, max chunk fixed at 65535.
    FullNonce,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::SubkeyDerived => "subkey-derived",
            Variant::FullNonce => "full-nonce",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subkey-derived" => Ok(Variant::SubkeyDerived),
            "full-nonce" => Ok(Variant::FullNonce),
            other => Err(format!(
                "unknown stream variant '{other}' (expected 'subkey-derived' or 'full-nonce')"
            )),
        }
    }
}
