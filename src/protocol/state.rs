//! Swap state machine
//!
//! ```text
//! Drafted -> MakerCommitted -> Extended -> TakerSigned -> Finalized
//!     \            \              \             \
//!      +------------+--------------+-------------+--> Aborted
//! ```
//!
//! Transitions consume the current state. A guard violation moves the swap
//! to `Aborted`; any other failure hands the state back unchanged inside
//! [`Rejected`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::draft::Draft;
use super::extension::{Extended, TakerSigned};
use super::offer::Offer;
use crate::error::SwapError;
use crate::signing::{KeyCustody, KeyHandle, ScriptResolver};
use crate::tx::{FinalTransaction, Prevout, UnsignedTransaction};
use crate::{log_info, log_warn};

/// Name of a swap state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Drafted,
    MakerCommitted,
    Extended,
    TakerSigned,
    Finalized,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Aborted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Drafted => "Drafted",
            Self::MakerCommitted => "MakerCommitted",
            Self::Extended => "Extended",
            Self::TakerSigned => "TakerSigned",
            Self::Finalized => "Finalized",
            Self::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Terminal failure record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aborted {
    /// Phase the violating transition started from
    pub from: Phase,
    pub reason: SwapError,
}

/// A swap in one of its phases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapState {
    Drafted(Draft),
    MakerCommitted(Offer),
    Extended(Extended),
    TakerSigned(TakerSigned),
    Finalized(FinalTransaction),
    Aborted(Aborted),
}

/// A refused transition and the state the swap is now in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub state: SwapState,
    pub error: SwapError,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (swap is {})", self.error, self.state.phase())
    }
}

impl std::error::Error for Rejected {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Rejected> for SwapError {
    fn from(rejected: Rejected) -> Self {
        rejected.error
    }
}

pub type Transition = Result<SwapState, Rejected>;

impl SwapState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Drafted(_) => Phase::Drafted,
            Self::MakerCommitted(_) => Phase::MakerCommitted,
            Self::Extended(_) => Phase::Extended,
            Self::TakerSigned(_) => Phase::TakerSigned,
            Self::Finalized(_) => Phase::Finalized,
            Self::Aborted(_) => Phase::Aborted,
        }
    }

    fn reject(self, error: SwapError) -> Rejected {
        let from = self.phase();
        if error.aborts_swap() && !from.is_terminal() {
            log_warn!("protocol", "Swap aborted", phase = from, code = format!("{:?}", error.code()));
            Rejected {
                state: SwapState::Aborted(Aborted {
                    from,
                    reason: error.clone(),
                }),
                error,
            }
        } else {
            Rejected { state: self, error }
        }
    }

    fn wrong_phase(self, expected: Phase) -> Rejected {
        let actual = self.phase();
        Rejected {
            state: self,
            error: SwapError::InvalidPhase { expected, actual },
        }
    }

    fn advance<T, F>(self, result: Result<T, SwapError>, wrap: F) -> Transition
    where
        F: FnOnce(T) -> SwapState,
    {
        match result {
            Ok(next) => {
                let next = wrap(next);
                log_info!("protocol", "Swap advanced", from = self.phase(), to = next.phase());
                Ok(next)
            }
            Err(error) => Err(self.reject(error)),
        }
    }

    /// Drafted -> MakerCommitted
    pub fn commit<K>(self, custody: &K, handle: &KeyHandle) -> Transition
    where
        K: KeyCustody + ?Sized,
    {
        let result = match &self {
            Self::Drafted(draft) => draft.commit(custody, handle),
            _ => return Err(self.wrong_phase(Phase::Drafted)),
        };
        self.advance(result, SwapState::MakerCommitted)
    }

    /// MakerCommitted -> Extended
    pub fn extend<I>(self, tx: UnsignedTransaction, prevouts: I) -> Transition
    where
        I: IntoIterator<Item = (usize, Prevout)>,
    {
        let result = match &self {
            Self::MakerCommitted(offer) => offer.extend_with(tx, prevouts),
            _ => return Err(self.wrong_phase(Phase::MakerCommitted)),
        };
        self.advance(result, SwapState::Extended)
    }

    /// MakerCommitted -> Extended, refusing offers above `limit` sats
    pub fn extend_within<I>(self, limit: u64, tx: UnsignedTransaction, prevouts: I) -> Transition
    where
        I: IntoIterator<Item = (usize, Prevout)>,
    {
        let result = match &self {
            Self::MakerCommitted(offer) => offer
                .check_price(limit)
                .and_then(|()| offer.extend_with(tx, prevouts)),
            _ => return Err(self.wrong_phase(Phase::MakerCommitted)),
        };
        self.advance(result, SwapState::Extended)
    }

    /// Extended -> TakerSigned
    pub fn sign_taker_inputs<K>(self, custody: &K, handles: &[(usize, KeyHandle)]) -> Transition
    where
        K: KeyCustody + ?Sized,
    {
        let result = match &self {
            Self::Extended(extended) => extended.sign_inputs(custody, handles),
            _ => return Err(self.wrong_phase(Phase::Extended)),
        };
        self.advance(result, SwapState::TakerSigned)
    }

    /// TakerSigned -> Finalized
    pub fn finalize<R>(self, resolver: &R) -> Transition
    where
        R: ScriptResolver + ?Sized,
    {
        let result = match &self {
            Self::TakerSigned(signed) => signed.finalize(resolver),
            _ => return Err(self.wrong_phase(Phase::TakerSigned)),
        };
        self.advance(result, SwapState::Finalized)
    }

    pub fn abort_reason(&self) -> Option<&SwapError> {
        match self {
            Self::Aborted(aborted) => Some(&aborted.reason),
            _ => None,
        }
    }
}

impl From<Draft> for SwapState {
    fn from(draft: Draft) -> Self {
        Self::Drafted(draft)
    }
}

impl From<Offer> for SwapState {
    fn from(offer: Offer) -> Self {
        Self::MakerCommitted(offer)
    }
}
