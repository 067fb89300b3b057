//! Stable blake3 digests for plans and manifests.

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Order-sensitive combination of two digests.
    pub fn chain(self, other: Hash256) -> Hash256 {
        let mut h = blake3::Hasher::new();
        h.update(&self.0);
        h.update(&other.0);
        Hash256(*h.finalize().as_bytes())
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    Hash256(*blake3::hash(bytes).as_bytes())
}

/// Hash any serializable value through its JSON encoding.
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(v)?;
    Ok(hash_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_64_chars_and_stable() {
        let a = hash_bytes(b"plan");
        assert_eq!(a.to_hex().len(), 64);
        assert_eq!(a, hash_bytes(b"plan"));
    }

    #[test]
    fn chain_is_order_sensitive() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(a.chain(b), b.chain(a));
    }
}
