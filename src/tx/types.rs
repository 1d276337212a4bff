//! Transaction value types
//!
//! Inputs, outputs and the unsigned transaction skeleton. All of these are
//! plain values: the protocol never mutates a UTXO, it only references it.
//! Outpoints, txids and scripts are the `bitcoin` crate's own types, and the
//! wire form is produced by converting to a [`Transaction`] and running it
//! through consensus encoding.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};

use crate::error::{SwapError, SwapResult};

/// Final sequence: no relative lock time, no replacement
pub const SEQUENCE_FINAL: u32 = Sequence::MAX.0;

/// Replaceable, no relative lock time
pub const SEQUENCE_ENABLE_RBF_NO_LOCKTIME: u32 = Sequence::ENABLE_RBF_NO_LOCKTIME.0;

/// Value and locking script of the output an input spends
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Prevout {
    /// Value in satoshis
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

impl Prevout {
    pub fn new(value: u64, script_pubkey: impl Into<ScriptBuf>) -> Self {
        Self {
            value,
            script_pubkey: script_pubkey.into(),
        }
    }

    pub fn amount(&self) -> Amount {
        Amount::from_sat(self.value)
    }
}

/// An unspent output owned by one of the parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

impl Utxo {
    pub fn new(outpoint: OutPoint, value: u64, script_pubkey: impl Into<ScriptBuf>) -> Self {
        Self {
            outpoint,
            value,
            script_pubkey: script_pubkey.into(),
        }
    }

    /// Input spending this UTXO with the default sequence
    pub fn to_input(&self) -> TxInput {
        TxInput::new(self.outpoint)
    }

    pub fn prevout(&self) -> Prevout {
        Prevout::new(self.value, self.script_pubkey.clone())
    }
}

/// Transaction input (unsigned; unlocking data is added at finalization)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub sequence: u32,
}

impl TxInput {
    pub fn new(outpoint: OutPoint) -> Self {
        Self {
            outpoint,
            sequence: SEQUENCE_ENABLE_RBF_NO_LOCKTIME,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }
}

impl From<&TxInput> for TxIn {
    fn from(input: &TxInput) -> Self {
        TxIn {
            previous_output: input.outpoint,
            script_sig: ScriptBuf::new(),
            sequence: Sequence(input.sequence),
            witness: Witness::default(),
        }
    }
}

/// Transaction output: value plus recipient locking script
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOutput {
    /// Value in satoshis
    pub value: u64,
    pub script_pubkey: ScriptBuf,
}

impl TxOutput {
    pub fn new(value: u64, script_pubkey: impl Into<ScriptBuf>) -> Self {
        Self {
            value,
            script_pubkey: script_pubkey.into(),
        }
    }
}

impl From<&TxOutput> for TxOut {
    fn from(output: &TxOutput) -> Self {
        TxOut {
            value: Amount::from_sat(output.value),
            script_pubkey: output.script_pubkey.clone(),
        }
    }
}

impl From<TxOut> for TxOutput {
    fn from(output: TxOut) -> Self {
        Self {
            value: output.value.to_sat(),
            script_pubkey: output.script_pubkey,
        }
    }
}

/// Ordered inputs and outputs plus version and lock time.
///
/// Index positions are semantically significant: scope commitments are
/// always expressed as "input i, output i" or "all outputs".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl UnsignedTransaction {
    /// Version 2, lock time zero
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: 2,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    /// Consensus transaction with empty script sigs and witnesses
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            version: Version(self.version),
            lock_time: LockTime::from_consensus(self.lock_time),
            input: self.inputs.iter().map(TxIn::from).collect(),
            output: self.outputs.iter().map(TxOut::from).collect(),
        }
    }

    /// Skeleton of a consensus transaction, dropping any unlocking data
    pub(crate) fn skeleton_of(tx: &Transaction) -> Self {
        Self {
            version: tx.version.0,
            inputs: tx
                .input
                .iter()
                .map(|input| TxInput::new(input.previous_output).with_sequence(input.sequence.0))
                .collect(),
            outputs: tx.output.iter().cloned().map(TxOutput::from).collect(),
            lock_time: tx.lock_time.to_consensus_u32(),
        }
    }

    /// Consensus encoding with empty unlocking data
    pub fn serialize(&self) -> Vec<u8> {
        encode::serialize(&self.to_transaction())
    }

    /// Parse consensus bytes. Unsigned skeletons never carry unlocking
    /// data, so a non-empty script sig or witness is rejected.
    pub fn parse(bytes: &[u8]) -> SwapResult<Self> {
        let tx: Transaction = encode::deserialize(bytes)
            .map_err(|e| SwapError::malformed_transaction(e.to_string()))?;
        Self::try_from(tx)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(hex_str: &str) -> SwapResult<Self> {
        Self::parse(&hex::decode(hex_str.trim())?)
    }

    /// Id of the skeleton. Witness data never enters a txid, so for
    /// segwit spends this equals the final txid.
    pub fn txid(&self) -> Txid {
        self.to_transaction().compute_txid()
    }

    /// Sum of output values, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.value))
    }
}

impl TryFrom<Transaction> for UnsignedTransaction {
    type Error = SwapError;

    fn try_from(tx: Transaction) -> SwapResult<Self> {
        let unlocked = tx
            .input
            .iter()
            .position(|input| !input.script_sig.is_empty() || !input.witness.is_empty());
        if let Some(index) = unlocked {
            return Err(SwapError::malformed_transaction(format!(
                "input {} of an unsigned transaction carries unlocking data",
                index
            )));
        }
        Ok(Self::skeleton_of(&tx))
    }
}
