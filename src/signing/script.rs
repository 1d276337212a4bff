//! Locking script derivation and unlocking data
//!
//! The finalizer only trusts an entry when its public key resolves to the
//! locking script of the output being spent.

use bitcoin::{CompressedPublicKey, Script, ScriptBuf, Witness};
use secp256k1::PublicKey;

use crate::container::PartialSignature;
use crate::tx::Unlock;

/// Maps public keys to scripts
pub trait ScriptResolver {
    /// Locking script a key controls
    fn locking_script(&self, public_key: &PublicKey) -> ScriptBuf;

    /// Script sig and witness spending that locking script with a verified entry
    fn unlock(&self, entry: &PartialSignature) -> Unlock;

    /// Whether `public_key` controls `script_pubkey`
    fn controls(&self, public_key: &PublicKey, script_pubkey: &Script) -> bool {
        self.locking_script(public_key).as_script() == script_pubkey
    }
}

/// Pay-to-witness-pubkey-hash (segwit v0) over compressed keys
#[derive(Debug, Clone, Copy, Default)]
pub struct PayToWitnessPubkeyHash;

impl ScriptResolver for PayToWitnessPubkeyHash {
    /// `OP_0 <hash160(pubkey)>`
    fn locking_script(&self, public_key: &PublicKey) -> ScriptBuf {
        ScriptBuf::new_p2wpkh(&CompressedPublicKey(*public_key).wpubkey_hash())
    }

    /// Witness `<sig||scope> <pubkey>`, empty script sig
    fn unlock(&self, entry: &PartialSignature) -> Unlock {
        Unlock::witness(Witness::p2wpkh(&entry.to_ecdsa_signature(), &entry.public_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::SighashScope;
    use secp256k1::{Message, Secp256k1, SecretKey};

    fn key() -> (Secp256k1<secp256k1::All>, SecretKey, PublicKey) {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[0x22; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);
        (secp, sk, pk)
    }

    #[test]
    fn test_p2wpkh_layout() {
        let (_, _, pk) = key();
        let script = PayToWitnessPubkeyHash.locking_script(&pk);
        assert!(script.is_p2wpkh());
        assert_eq!(&script.as_bytes()[..2], &[0x00, 0x14]);
        assert!(PayToWitnessPubkeyHash.controls(&pk, &script));

        let other = PublicKey::from_secret_key(&Secp256k1::new(), &SecretKey::from_slice(&[0x23; 32]).unwrap());
        assert!(!PayToWitnessPubkeyHash.controls(&other, &script));
    }

    #[test]
    fn test_unlock_is_witness_only() {
        let (secp, sk, pk) = key();
        let sig = secp.sign_ecdsa(&Message::from_digest([1; 32]), &sk);
        let entry = PartialSignature::new(pk, sig, SighashScope::SingleAnyoneCanPay);

        let unlock = PayToWitnessPubkeyHash.unlock(&entry);
        assert!(unlock.script_sig.is_empty());
        assert_eq!(unlock.witness.len(), 2);

        let pushed_sig = unlock.witness.nth(0).unwrap();
        assert_eq!(*pushed_sig.last().unwrap(), 0x83);
        assert_eq!(&pushed_sig[..pushed_sig.len() - 1], &sig.serialize_der()[..]);
        assert_eq!(unlock.witness.nth(1).unwrap(), &pk.serialize()[..]);
    }
}
