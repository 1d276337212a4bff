//! Transaction Model
//!
//! Immutable value types for inputs, outputs, the unsigned transaction
//! skeleton and the final broadcastable transaction. Wire encoding is
//! `bitcoin` consensus encoding.

pub mod final_tx;
pub mod types;

pub use bitcoin::{OutPoint, Txid};
pub use final_tx::{FinalTransaction, Unlock};
pub use types::*;
