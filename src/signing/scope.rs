//! Signature scopes
//!
//! A scope selects which parts of a transaction a signature commits to.
//! The byte values are the Bitcoin sighash flags and are appended to the
//! DER signature in unlocking scripts.

use std::fmt;

use bitcoin::sighash::EcdsaSighashType;
use serde::{Deserialize, Serialize};

/// Flag bit restricting the input commitment to the signing input
pub const ANYONECANPAY_FLAG: u8 = 0x80;

/// Signature scope selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SighashScope {
    /// Every input, every output
    All = 0x01,
    /// Every input, no outputs
    None = 0x02,
    /// Every input, only the output at the signing index
    Single = 0x03,
    /// Own input, every output
    AllAnyoneCanPay = 0x81,
    /// Own input, no outputs
    NoneAnyoneCanPay = 0x82,
    /// Own input, only the output at the signing index
    SingleAnyoneCanPay = 0x83,
}

/// Output half of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCommitment {
    All,
    None,
    Single,
}

impl SighashScope {
    pub fn to_byte(&self) -> u8 {
        *self as u8
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::All),
            0x02 => Some(Self::None),
            0x03 => Some(Self::Single),
            0x81 => Some(Self::AllAnyoneCanPay),
            0x82 => Some(Self::NoneAnyoneCanPay),
            0x83 => Some(Self::SingleAnyoneCanPay),
            _ => None,
        }
    }

    pub fn is_anyonecanpay(&self) -> bool {
        self.to_byte() & ANYONECANPAY_FLAG != 0
    }

    pub fn outputs(&self) -> OutputCommitment {
        match self {
            Self::All | Self::AllAnyoneCanPay => OutputCommitment::All,
            Self::None | Self::NoneAnyoneCanPay => OutputCommitment::None,
            Self::Single | Self::SingleAnyoneCanPay => OutputCommitment::Single,
        }
    }

    /// Whether a signature with this scope still lets other parties move
    /// value around after signing. Only ALL pins the whole transaction.
    pub fn is_restricted(&self) -> bool {
        *self != Self::All
    }
}

impl From<SighashScope> for EcdsaSighashType {
    fn from(scope: SighashScope) -> Self {
        match scope {
            SighashScope::All => EcdsaSighashType::All,
            SighashScope::None => EcdsaSighashType::None,
            SighashScope::Single => EcdsaSighashType::Single,
            SighashScope::AllAnyoneCanPay => EcdsaSighashType::AllPlusAnyoneCanPay,
            SighashScope::NoneAnyoneCanPay => EcdsaSighashType::NonePlusAnyoneCanPay,
            SighashScope::SingleAnyoneCanPay => EcdsaSighashType::SinglePlusAnyoneCanPay,
        }
    }
}

impl fmt::Display for SighashScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::All => "ALL",
            Self::None => "NONE",
            Self::Single => "SINGLE",
            Self::AllAnyoneCanPay => "ALL|ANYONECANPAY",
            Self::NoneAnyoneCanPay => "NONE|ANYONECANPAY",
            Self::SingleAnyoneCanPay => "SINGLE|ANYONECANPAY",
        };
        f.write_str(name)
    }
}
