//! Signing
//!
//! Signature scopes, the digest each signature commits to, and the two
//! collaborator seams the swap core signs through:
//! - [`KeyCustody`] holds private keys
//! - [`ScriptResolver`] maps public keys to locking/unlocking scripts

pub mod custody;
pub mod preimage;
pub mod scope;
pub mod script;

pub use custody::{KeyCustody, KeyHandle, MemoryKeystore};
pub use preimage::{preimage, script_code, signature_digest};
pub use scope::{OutputCommitment, SighashScope};
pub use script::{PayToWitnessPubkeyHash, ScriptResolver};
