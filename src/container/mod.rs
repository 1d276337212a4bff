//! Partial-Signature Container
//!
//! Holds an unsigned skeleton plus, per input, the spent prevout, an
//! optional scope tag and any number of (public key -> signature) entries.
//! Parties exchange containers as text and combine them with `merge`.

pub mod codec;
pub mod pst;
pub mod types;

#[cfg(test)]
mod tests;

pub use pst::SignedContainer;
pub use types::{InputSlot, PartialSignature, SignatureStatus, Signatures};
