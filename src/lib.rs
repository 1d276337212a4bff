//! ordswap Core Library
//!
//! Two-party atomic swaps built on partially signed transactions.
//!
//! # Architecture
//!
//! This crate provides:
//! - **tx**: Transaction skeletons and final transactions over `bitcoin`'s consensus types
//! - **signing**: Signature scopes, scope-aware digests, key custody and scripts
//! - **container**: The partial-signature container parties exchange and merge
//! - **protocol**: Maker draft/offer, taker extension and the swap state machine
//! - **finalizer**: Validation of a fully signed container into a final transaction
//! - **utils**: Structured logging and protocol configuration
//!
//! # Flow
//!
//! The maker signs its item input with `SINGLE|ANYONECANPAY`, committing to
//! that input and to its asking-price output at the same index. The taker
//! places the pair at the agreed anchor index, adds inputs and outputs
//! around it and signs its own inputs with `ALL`. Inputs are P2WPKH spends,
//! so every digest is the segwit v0 one and unlocking data is a witness.
//!
//! # Security
//!
//! Private keys live behind [`signing::KeyCustody`]; the in-memory keystore
//! holds them in `zeroize` buffers that are cleared on drop.
//!
//! # Example
//!
//! ```rust,ignore
//! use ordswap::{Draft, PayToWitnessPubkeyHash};
//!
//! let offer = Draft::new(item, payee).commit(&keystore, &maker)?;
//! let extended = offer
//!     .extension()
//!     .input_before(dummy)
//!     .input(payment)
//!     .output_before(dummy_out)
//!     .output(item_out)
//!     .build()?;
//! let final_tx = extended
//!     .sign_taker_inputs(&keystore, &taker)?
//!     .finalize(&PayToWitnessPubkeyHash)?;
//! println!("{}", final_tx.to_hex());
//! ```

pub mod container;
pub mod error;
pub mod finalizer;
pub mod protocol;
pub mod signing;
pub mod tx;
pub mod utils;

// Re-export key types for convenience
pub use error::{ErrorCode, ErrorReport, SwapError, SwapResult};

pub use container::{PartialSignature, SignatureStatus, SignedContainer};
pub use finalizer::finalize;
pub use protocol::{
    Draft, Extended, ExtensionBuilder, Offer, OfferSummary, Phase, Rejected, SwapState, TakerSigned,
    MAKER_SCOPE, TAKER_SCOPE,
};
pub use signing::{
    signature_digest, KeyCustody, KeyHandle, MemoryKeystore, PayToWitnessPubkeyHash, ScriptResolver,
    SighashScope,
};
pub use tx::{
    FinalTransaction, OutPoint, Prevout, TxInput, TxOutput, Txid, Unlock, UnsignedTransaction, Utxo,
};
pub use utils::config::{get_protocol_config, ProtocolLevel, ProtocolSettings};
