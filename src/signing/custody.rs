//! Key custody
//!
//! Private keys never enter the swap core. Parties hand it a
//! [`KeyCustody`] implementation and refer to keys by opaque handle.

use std::collections::HashMap;
use std::fmt;

use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{SwapError, SwapResult};
use crate::log_debug;

/// Opaque reference to a key held by a custody backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyHandle(String);

impl KeyHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyHandle {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Signing collaborator
pub trait KeyCustody {
    /// Compressed public key for `handle`
    fn public_key(&self, handle: &KeyHandle) -> SwapResult<PublicKey>;

    /// ECDSA signature over a 32-byte digest
    fn sign(&self, digest: &[u8; 32], handle: &KeyHandle) -> SwapResult<Signature>;
}

/// In-memory keystore for tests and the demo command.
///
/// Secrets are wiped on drop.
pub struct MemoryKeystore {
    secp: Secp256k1<All>,
    keys: HashMap<KeyHandle, Zeroizing<[u8; 32]>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
            keys: HashMap::new(),
        }
    }

    /// Store a secret key under `handle`, returning its public key
    pub fn insert(&mut self, handle: KeyHandle, secret: [u8; 32]) -> SwapResult<PublicKey> {
        let secret = Zeroizing::new(secret);
        let sk = SecretKey::from_slice(secret.as_ref())
            .map_err(|e| SwapError::custody(format!("invalid secret for {}: {}", handle, e)))?;
        let pk = PublicKey::from_secret_key(&self.secp, &sk);
        self.keys.insert(handle, secret);
        Ok(pk)
    }

    /// Generate a fresh random key under `handle`
    pub fn generate(&mut self, handle: KeyHandle) -> SwapResult<PublicKey> {
        let sk = SecretKey::new(&mut rand::thread_rng());
        self.insert(handle, sk.secret_bytes())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn secret(&self, handle: &KeyHandle) -> SwapResult<SecretKey> {
        let bytes = self
            .keys
            .get(handle)
            .ok_or_else(|| SwapError::custody(format!("unknown key handle {}", handle)))?;
        SecretKey::from_slice(bytes.as_ref())
            .map_err(|e| SwapError::custody(format!("corrupt secret for {}: {}", handle, e)))
    }
}

impl Default for MemoryKeystore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryKeystore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryKeystore")
            .field("keys", &self.keys.len())
            .finish()
    }
}

impl KeyCustody for MemoryKeystore {
    fn public_key(&self, handle: &KeyHandle) -> SwapResult<PublicKey> {
        let sk = self.secret(handle)?;
        Ok(PublicKey::from_secret_key(&self.secp, &sk))
    }

    fn sign(&self, digest: &[u8; 32], handle: &KeyHandle) -> SwapResult<Signature> {
        let sk = self.secret(handle)?;
        let msg = Message::from_digest(*digest);
        let mut sig = self.secp.sign_ecdsa(&msg, &sk);
        sig.normalize_s();

        log_debug!("custody", "Signed digest", key_handle = handle, digest = hex::encode(digest));
        Ok(sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let mut store = MemoryKeystore::new();
        let handle = KeyHandle::new("maker");
        let pk = store.insert(handle.clone(), [0x11; 32]).unwrap();
        assert_eq!(store.public_key(&handle).unwrap(), pk);

        let digest = [0x42; 32];
        let sig = store.sign(&digest, &handle).unwrap();
        let secp = Secp256k1::verification_only();
        assert!(secp
            .verify_ecdsa(&Message::from_digest(digest), &sig, &pk)
            .is_ok());
    }

    #[test]
    fn test_unknown_handle() {
        let store = MemoryKeystore::new();
        let err = store.sign(&[0; 32], &KeyHandle::new("nobody")).unwrap_err();
        assert!(matches!(err, SwapError::Custody(_)));
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let mut store = MemoryKeystore::new();
        assert!(store.insert(KeyHandle::new("zero"), [0; 32]).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_generate() {
        let mut store = MemoryKeystore::new();
        let a = store.generate("a".into()).unwrap();
        let b = store.generate("b".into()).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }
}
