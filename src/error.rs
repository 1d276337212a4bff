//! Unified error types for ordswap
//!
//! Every failure the swap core can produce flows through [`SwapError`].
//! Messages always name the input/output index involved and the
//! invariant that was violated, since indices are the unit of protocol
//! reasoning.

use serde::{Deserialize, Serialize};

use crate::protocol::Phase;
use crate::signing::SighashScope;

/// Main error type for all swap operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("Malformed transaction: {reason}")]
    MalformedTransaction { reason: String },

    #[error("Malformed container: {reason}")]
    MalformedContainer { reason: String },

    #[error("Unsupported scope: input {input} does not exist (transaction has {input_count} inputs)")]
    UnsupportedScope { input: usize, input_count: usize },

    #[error(
        "Missing committed output: SINGLE scope on input {input} commits to output {input}, \
         but the transaction has only {output_count} outputs"
    )]
    MissingCommittedOutput { input: usize, output_count: usize },

    #[error("Duplicate signature: input {input} already carries a different entry for key {public_key}")]
    DuplicateSignature { input: usize, public_key: String },

    #[error("Skeleton mismatch: {reason}")]
    SkeletonMismatch { reason: String },

    #[error("Commitment violated at index {index}: {reason}")]
    CommitmentViolated { index: usize, reason: String },

    #[error("Unsafe scope: input {input} signed with {scope}, which lets others rearrange value after signing")]
    UnsafeScope { input: usize, scope: SighashScope },

    #[error("Incomplete signatures: inputs {inputs:?} lack a satisfying signature")]
    IncompleteSignatures { inputs: Vec<usize> },

    #[error("Invalid signature: entry for key {public_key} on input {input} does not verify against the final digest")]
    InvalidSignature { input: usize, public_key: String },

    #[error("Missing prevout: input {input} has no value/locking script metadata")]
    MissingPrevout { input: usize },

    #[error("Insufficient funds: inputs carry {input_value} sats but outputs require {output_value} sats")]
    InsufficientFunds { input_value: u64, output_value: u64 },

    #[error("Price exceeded: offer at index {index} asks {asked} sats, limit is {limit} sats")]
    PriceExceeded { index: usize, asked: u64, limit: u64 },

    #[error("Invalid phase: operation requires {expected}, swap is {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("Key custody error: {0}")]
    Custody(String),
}

impl SwapError {
    pub fn malformed_transaction(reason: impl Into<String>) -> Self {
        Self::MalformedTransaction { reason: reason.into() }
    }

    pub fn malformed_container(reason: impl Into<String>) -> Self {
        Self::MalformedContainer { reason: reason.into() }
    }

    pub fn skeleton_mismatch(reason: impl Into<String>) -> Self {
        Self::SkeletonMismatch { reason: reason.into() }
    }

    pub fn commitment_violated(index: usize, reason: impl Into<String>) -> Self {
        Self::CommitmentViolated { index, reason: reason.into() }
    }

    pub fn custody(msg: impl Into<String>) -> Self {
        Self::Custody(msg.into())
    }

    /// Error code for categorization
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedTransaction { .. } => ErrorCode::MalformedTransaction,
            Self::MalformedContainer { .. } => ErrorCode::MalformedContainer,
            Self::UnsupportedScope { .. } => ErrorCode::UnsupportedScope,
            Self::MissingCommittedOutput { .. } => ErrorCode::MissingCommittedOutput,
            Self::DuplicateSignature { .. } => ErrorCode::DuplicateSignature,
            Self::SkeletonMismatch { .. } => ErrorCode::SkeletonMismatch,
            Self::CommitmentViolated { .. } => ErrorCode::CommitmentViolated,
            Self::UnsafeScope { .. } => ErrorCode::UnsafeScope,
            Self::IncompleteSignatures { .. } => ErrorCode::IncompleteSignatures,
            Self::InvalidSignature { .. } => ErrorCode::InvalidSignature,
            Self::MissingPrevout { .. } => ErrorCode::MissingPrevout,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::PriceExceeded { .. } => ErrorCode::PriceExceeded,
            Self::InvalidPhase { .. } => ErrorCode::InvalidPhase,
            Self::Custody(_) => ErrorCode::Custody,
        }
    }

    /// Errors the caller can recover from by re-deriving from a shared base
    /// or running another signing round.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SkeletonMismatch { .. }
                | Self::IncompleteSignatures { .. }
                | Self::MissingPrevout { .. }
                | Self::Custody(_)
        )
    }

    /// Protocol-violation guards: the swap moves to `Aborted`.
    pub fn aborts_swap(&self) -> bool {
        matches!(
            self,
            Self::CommitmentViolated { .. }
                | Self::UnsafeScope { .. }
                | Self::InvalidSignature { .. }
                | Self::PriceExceeded { .. }
        )
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Structural errors
    MalformedTransaction,
    MalformedContainer,

    // Misuse
    UnsupportedScope,
    MissingCommittedOutput,
    InvalidPhase,

    // Container errors
    DuplicateSignature,
    SkeletonMismatch,
    MissingPrevout,

    // Protocol guards
    CommitmentViolated,
    UnsafeScope,
    PriceExceeded,

    // Finalization
    IncompleteSignatures,
    InvalidSignature,
    InsufficientFunds,

    // Collaborators
    Custody,
}

/// Serializable error report, used by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl From<&SwapError> for ErrorReport {
    fn from(e: &SwapError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
            recoverable: e.is_recoverable(),
        }
    }
}

/// Result type alias for swap operations
pub type SwapResult<T> = Result<T, SwapError>;

impl From<hex::FromHexError> for SwapError {
    fn from(e: hex::FromHexError) -> Self {
        SwapError::malformed_transaction(format!("invalid hex: {}", e))
    }
}

impl From<base64::DecodeError> for SwapError {
    fn from(e: base64::DecodeError) -> Self {
        SwapError::malformed_container(format!("invalid base64: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_indices() {
        let err = SwapError::MissingCommittedOutput { input: 2, output_count: 1 };
        let msg = err.to_string();
        assert!(msg.contains("input 2"));
        assert!(msg.contains("output 2"));

        let err = SwapError::commitment_violated(1, "output value reduced from 100000 to 99000");
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_classification() {
        assert!(SwapError::IncompleteSignatures { inputs: vec![0] }.is_recoverable());
        assert!(SwapError::skeleton_mismatch("x").is_recoverable());
        assert!(!SwapError::InvalidSignature { input: 0, public_key: "02".into() }.is_recoverable());

        assert!(SwapError::commitment_violated(0, "x").aborts_swap());
        assert!(SwapError::UnsafeScope { input: 0, scope: SighashScope::Single }.aborts_swap());
        assert!(!SwapError::IncompleteSignatures { inputs: vec![] }.aborts_swap());
    }

    #[test]
    fn test_error_code_serde() {
        let json = serde_json::to_string(&ErrorCode::SkeletonMismatch).unwrap();
        assert_eq!(json, "\"skeleton_mismatch\"");

        let report = ErrorReport::from(&SwapError::malformed_container("bad checksum"));
        assert_eq!(report.code, ErrorCode::MalformedContainer);
        assert!(!report.recoverable);
    }
}
