//! Forensic log obfuscation
//!
//! Repeating-key XOR over a SHA-256 derived key. This is an OBFUSCATION
//! layer: it keeps casual readers and grep out of the log, nothing more.
//! It provides no confidentiality against anyone holding the seed (which
//! defaults to the host name), no integrity and no forward secrecy.

use sha2::{Digest, Sha256};

use crate::constants;

/// Key material length (SHA-256 output)
pub const KEY_LEN: usize = 32;

/// Where the key seed came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOrigin {
    /// Passed in configuration or the environment
    Configured,
    /// Host name fallback (insecure default)
    HostName,
}

/// Derived key, computed once per collector
#[derive(Clone)]
pub struct ObfuscationKey {
    bytes: [u8; KEY_LEN],
    origin: SeedOrigin,
}

impl std::fmt::Debug for ObfuscationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObfuscationKey")
            .field("fingerprint", &self.fingerprint())
            .field("origin", &self.origin)
            .finish()
    }
}

impl ObfuscationKey {
    /// Derive key material from a seed string
    pub fn derive(seed: &str, origin: SeedOrigin) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self { bytes, origin }
    }

    /// Resolve the seed: configured value, else the host name
    pub fn resolve(configured: Option<&str>) -> Self {
        match configured.filter(|s| !s.is_empty()) {
            Some(seed) => Self::derive(seed, SeedOrigin::Configured),
            None => {
                log::warn!(
                    "No forensic key seed configured ({} unset); falling back to host name. \
                     The forensic log is only obfuscated with a guessable key.",
                    constants::FORENSIC_KEY_ENV
                );
                Self::derive(&constants::get_host_name(), SeedOrigin::HostName)
            }
        }
    }

    pub fn origin(&self) -> SeedOrigin {
        self.origin
    }

    /// Short, non-reversible identifier safe to log
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.bytes);
        hex::encode(&digest[..4])
    }

    /// XOR `data` with the repeating key. Applying it twice restores the input.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ self.bytes[i % KEY_LEN])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_is_involution() {
        let key = ObfuscationKey::derive("seed", SeedOrigin::Configured);
        let plain = br#"{"event_type":"FILE","message":"a longer payload than thirty-two bytes"}"#;
        let obfuscated = key.apply(plain);
        assert_ne!(obfuscated.as_slice(), plain.as_slice());
        assert_eq!(key.apply(&obfuscated), plain.to_vec());
    }

    #[test]
    fn test_derivation_is_stable_and_seed_dependent() {
        let a = ObfuscationKey::derive("alpha", SeedOrigin::Configured);
        let b = ObfuscationKey::derive("alpha", SeedOrigin::Configured);
        let c = ObfuscationKey::derive("beta", SeedOrigin::Configured);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
    }

    #[test]
    fn test_resolve_prefers_configured_seed() {
        let key = ObfuscationKey::resolve(Some("operator-secret"));
        assert_eq!(key.origin(), SeedOrigin::Configured);

        let fallback = ObfuscationKey::resolve(Some(""));
        assert_eq!(fallback.origin(), SeedOrigin::HostName);
    }
}
