//! Offer/Extension Protocol
//!
//! The maker drafts a one-input, one-output transaction and signs it with
//! SINGLE|ANYONECANPAY. That signature commits only to the maker's input
//! and the output at the same index, so a taker can later splice the pair
//! into a larger transaction at the agreed anchor index, add its own
//! inputs and outputs around it and sign those with ALL.
//!
//! Each phase is its own type; [`SwapState`] ties them together for
//! callers that want a single value to carry around.

pub mod draft;
pub mod extension;
pub mod offer;
pub mod state;


pub use draft::{Draft, MAKER_SCOPE};
pub use extension::{Extended, ExtensionBuilder, TakerSigned, TAKER_SCOPE};
pub use offer::{Offer, OfferSummary};
pub use state::{Aborted, Phase, Rejected, SwapState, Transition};
