use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a participant: its ed25519 public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SmesherId(pub [u8; 32]);

impl SmesherId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Base58 of the full key.
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl fmt::Display for SmesherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = self.to_base58();
        let end = encoded.len().min(8);
        write!(f, "{}", &encoded[..end])
    }
}

impl fmt::Debug for SmesherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SmesherId({})", self)
    }
}

impl From<[u8; 32]> for SmesherId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}
