//! Final (broadcastable) transaction

use bitcoin::consensus::encode;
use bitcoin::{ScriptBuf, Transaction, Txid, Witness, Wtxid};
use serde::{Deserialize, Serialize};

use super::types::UnsignedTransaction;
use crate::error::{SwapError, SwapResult};

/// Unlocking data for one input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unlock {
    pub script_sig: ScriptBuf,
    pub witness: Witness,
}

impl Unlock {
    /// Segwit spend: empty script sig
    pub fn witness(witness: Witness) -> Self {
        Self {
            script_sig: ScriptBuf::new(),
            witness,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.script_sig.is_empty() && self.witness.is_empty()
    }
}

/// Unsigned skeleton plus exactly one non-empty [`Unlock`] per input.
///
/// Only produced by the finalizer or by parsing consensus bytes; immutable
/// afterwards. Serde goes through the hex encoding and [`parse`](Self::parse),
/// so a deserialized value upholds the same invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FinalTransaction {
    tx: UnsignedTransaction,
    unlocks: Vec<Unlock>,
}

impl FinalTransaction {
    pub(crate) fn new(tx: UnsignedTransaction, unlocks: Vec<Unlock>) -> SwapResult<Self> {
        if unlocks.len() != tx.inputs.len() {
            return Err(SwapError::malformed_transaction(format!(
                "{} unlocks for {} inputs",
                unlocks.len(),
                tx.inputs.len()
            )));
        }
        if let Some(index) = unlocks.iter().position(Unlock::is_empty) {
            return Err(SwapError::malformed_transaction(format!(
                "input {} carries no unlocking data",
                index
            )));
        }
        Ok(Self { tx, unlocks })
    }

    /// The unsigned skeleton the signatures committed to
    pub fn skeleton(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn unlock(&self, input_index: usize) -> Option<&Unlock> {
        self.unlocks.get(input_index)
    }

    pub fn witness(&self, input_index: usize) -> Option<&Witness> {
        self.unlock(input_index).map(|unlock| &unlock.witness)
    }

    pub fn to_transaction(&self) -> Transaction {
        let mut tx = self.tx.to_transaction();
        for (input, unlock) in tx.input.iter_mut().zip(&self.unlocks) {
            input.script_sig = unlock.script_sig.clone();
            input.witness = unlock.witness.clone();
        }
        tx
    }

    /// Consensus broadcast bytes
    pub fn serialize(&self) -> Vec<u8> {
        encode::serialize(&self.to_transaction())
    }

    /// Parse consensus bytes; every input must carry unlocking data
    pub fn parse(bytes: &[u8]) -> SwapResult<Self> {
        let tx: Transaction = encode::deserialize(bytes)
            .map_err(|e| SwapError::malformed_transaction(e.to_string()))?;
        let unlocks = tx
            .input
            .iter()
            .map(|input| Unlock {
                script_sig: input.script_sig.clone(),
                witness: input.witness.clone(),
            })
            .collect();
        Self::new(UnsignedTransaction::skeleton_of(&tx), unlocks)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    pub fn from_hex(hex_str: &str) -> SwapResult<Self> {
        Self::parse(&hex::decode(hex_str.trim())?)
    }

    /// Content hash submitted alongside the bytes
    pub fn txid(&self) -> Txid {
        self.to_transaction().compute_txid()
    }

    pub fn wtxid(&self) -> Wtxid {
        self.to_transaction().compute_wtxid()
    }

    /// Serialized size in bytes, witnesses included
    pub fn size(&self) -> usize {
        self.to_transaction().total_size()
    }

    pub fn vsize(&self) -> usize {
        self.to_transaction().vsize()
    }
}

impl TryFrom<String> for FinalTransaction {
    type Error = SwapError;

    fn try_from(hex_str: String) -> SwapResult<Self> {
        Self::from_hex(&hex_str)
    }
}

impl From<FinalTransaction> for String {
    fn from(tx: FinalTransaction) -> Self {
        tx.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{TxInput, TxOutput};
    use bitcoin::hashes::Hash;
    use bitcoin::OutPoint;

    fn skeleton(inputs: usize) -> UnsignedTransaction {
        UnsignedTransaction::new(
            (0..inputs)
                .map(|i| TxInput::new(OutPoint::new(Txid::from_byte_array([i as u8; 32]), i as u32)))
                .collect(),
            vec![TxOutput::new(5_000, vec![0x51])],
        )
    }

    fn unlock(items: &[&[u8]]) -> Unlock {
        Unlock::witness(Witness::from_slice(items))
    }

    #[test]
    fn test_roundtrip() {
        let final_tx = FinalTransaction::new(
            skeleton(2),
            vec![unlock(&[&[0x01, 0xaa], &[0x02]]), unlock(&[&[0x02, 0xbb, 0xcc]])],
        )
        .unwrap();
        let bytes = final_tx.serialize();
        let parsed = FinalTransaction::parse(&bytes).unwrap();
        assert_eq!(parsed, final_tx);
        assert_eq!(parsed.serialize(), bytes);
        assert_eq!(parsed.txid(), final_tx.txid());
        assert_eq!(final_tx.size(), bytes.len());
    }

    #[test]
    fn test_witness_stays_out_of_txid() {
        let tx = skeleton(1);
        let final_tx = FinalTransaction::new(tx.clone(), vec![unlock(&[&[0x01]])]).unwrap();
        assert_eq!(final_tx.txid(), tx.txid());
        assert_ne!(final_tx.wtxid().to_byte_array(), final_tx.txid().to_byte_array());
        assert!(final_tx.vsize() < final_tx.size());
    }

    #[test]
    fn test_unlock_count_must_match_inputs() {
        assert!(FinalTransaction::new(skeleton(2), vec![unlock(&[&[0x01]])]).is_err());
        assert!(FinalTransaction::new(skeleton(1), vec![Unlock::default()]).is_err());
    }

    #[test]
    fn test_unsigned_bytes_are_not_final() {
        let bytes = skeleton(1).serialize();
        assert!(matches!(
            FinalTransaction::parse(&bytes),
            Err(SwapError::MalformedTransaction { .. })
        ));
    }

    #[test]
    fn test_serde_goes_through_parse() {
        let final_tx = FinalTransaction::new(skeleton(1), vec![unlock(&[&[0x01]])]).unwrap();
        let json = serde_json::to_string(&final_tx).unwrap();
        assert_eq!(json, format!("\"{}\"", final_tx.to_hex()));
        assert_eq!(serde_json::from_str::<FinalTransaction>(&json).unwrap(), final_tx);

        let unsigned = format!("\"{}\"", skeleton(1).to_hex());
        assert!(serde_json::from_str::<FinalTransaction>(&unsigned).is_err());
        assert!(serde_json::from_str::<FinalTransaction>(r#"{"tx":null,"unlocks":[]}"#).is_err());
    }
}
