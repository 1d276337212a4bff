//! Container value types

use std::collections::btree_map;
use std::collections::BTreeMap;

use bitcoin::ecdsa;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, Verification};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::signing::SighashScope;
use crate::tx::Prevout;

/// One (public key, signature, scope) entry on an input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialSignature {
    pub public_key: PublicKey,
    pub signature: Signature,
    pub scope: SighashScope,
}

impl PartialSignature {
    pub fn new(public_key: PublicKey, signature: Signature, scope: SighashScope) -> Self {
        Self {
            public_key,
            signature,
            scope,
        }
    }

    /// Signature paired with its sighash type, as pushed in witnesses
    pub fn to_ecdsa_signature(&self) -> ecdsa::Signature {
        ecdsa::Signature {
            signature: self.signature,
            sighash_type: self.scope.into(),
        }
    }

    /// Check the signature against a digest
    pub fn verify<C: Verification>(&self, secp: &Secp256k1<C>, digest: &[u8; 32]) -> bool {
        secp.verify_ecdsa(&Message::from_digest(*digest), &self.signature, &self.public_key)
            .is_ok()
    }

    pub(crate) fn key_bytes(&self) -> [u8; 33] {
        self.public_key.serialize()
    }
}

impl Serialize for PartialSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PartialSignature", 3)?;
        state.serialize_field("public_key", &self.public_key.to_string())?;
        state.serialize_field("signature", &hex::encode(self.signature.serialize_der()))?;
        state.serialize_field("scope", &self.scope)?;
        state.end()
    }
}

/// Per-input slot: prevout metadata, scope tag and signature entries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSlot {
    pub(crate) prevout: Option<Prevout>,
    pub(crate) scope_tag: Option<SighashScope>,
    pub(crate) entries: BTreeMap<[u8; 33], PartialSignature>,
}

impl InputSlot {
    pub fn prevout(&self) -> Option<&Prevout> {
        self.prevout.as_ref()
    }

    /// Scope the eventual signature on this input must use
    pub fn scope_tag(&self) -> Option<SighashScope> {
        self.scope_tag
    }
}

/// Entries attached to one input, in public key order.
///
/// Cloning restarts iteration from the clone's current position.
#[derive(Debug, Clone, Default)]
pub struct Signatures<'a> {
    pub(crate) inner: Option<btree_map::Values<'a, [u8; 33], PartialSignature>>,
}

impl<'a> Iterator for Signatures<'a> {
    type Item = &'a PartialSignature;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.as_mut()?.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(values) => values.size_hint(),
            None => (0, Some(0)),
        }
    }
}

impl ExactSizeIterator for Signatures<'_> {}

/// Signing progress of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureStatus {
    pub input: usize,
    pub entries: usize,
    pub has_prevout: bool,
    pub scope_tag: Option<SighashScope>,
}

impl SignatureStatus {
    pub fn is_signed(&self) -> bool {
        self.entries > 0
    }
}
