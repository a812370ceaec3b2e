use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic configuration hash (BLAKE3 of the canonical config JSON).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigHash(pub String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic content hash of a universe snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniverseHash(pub String);

impl UniverseHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for UniverseHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one rebalance run: config + universe. Two runs with the same
/// `RunId` must produce the same composition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn derive(config: &ConfigHash, universe: &UniverseHash) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(config.0.as_bytes());
        hasher.update(b"+");
        hasher.update(universe.0.as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    /// First 12 hex characters, for log lines and file names.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_id_is_deterministic() {
        let c = ConfigHash::from_bytes(b"config");
        let u = UniverseHash::from_bytes(b"universe");
        assert_eq!(RunId::derive(&c, &u), RunId::derive(&c, &u));
        assert_eq!(RunId::derive(&c, &u).short().len(), 12);
    }

    #[test]
    fn run_id_changes_with_universe() {
        let c = ConfigHash::from_bytes(b"config");
        let u1 = UniverseHash::from_bytes(b"universe-1");
        let u2 = UniverseHash::from_bytes(b"universe-2");
        assert_ne!(RunId::derive(&c, &u1), RunId::derive(&c, &u2));
    }
}
