//! Signature digest computation
//!
//! BIP-143 segwit v0 pre-image, double-SHA256, produced by the `bitcoin`
//! crate's [`SighashCache`]:
//!
//! 1. version
//! 2. hash of every input outpoint (zero under ANYONECANPAY)
//! 3. hash of every input sequence (zero under ANYONECANPAY, SINGLE, NONE)
//! 4. outpoint of the signing input
//! 5. script code of the spent output
//! 6. value of the spent output
//! 7. sequence of the signing input
//! 8. hash of committed outputs (zero under NONE)
//! 9. lock time
//! 10. scope byte as u32
//!
//! The signing input's position never enters the pre-image, only the
//! output it selects under SINGLE does. This is what lets the maker sign a
//! one-input draft at index 0 and have the signature hold once the input
//! lands at its anchor index.

use bitcoin::hashes::{sha256d, Hash};
use bitcoin::sighash::SighashCache;
use bitcoin::{Script, ScriptBuf};

use super::scope::{OutputCommitment, SighashScope};
use crate::error::{SwapError, SwapResult};
use crate::tx::{Prevout, UnsignedTransaction};

/// Script code committed to when spending `script_pubkey`: the implied
/// pay-to-pubkey-hash script for P2WPKH outputs, the script itself otherwise
pub fn script_code(script_pubkey: &Script) -> ScriptBuf {
    script_pubkey
        .p2wpkh_script_code()
        .unwrap_or_else(|| script_pubkey.to_owned())
}

/// Serialize the pre-image for `input_index` under `scope`
pub fn preimage(
    tx: &UnsignedTransaction,
    input_index: usize,
    prevout: &Prevout,
    scope: SighashScope,
) -> SwapResult<Vec<u8>> {
    if input_index >= tx.inputs.len() {
        return Err(SwapError::UnsupportedScope {
            input: input_index,
            input_count: tx.inputs.len(),
        });
    }
    // The consensus encoder hashes a missing SINGLE output to zero
    if scope.outputs() == OutputCommitment::Single && input_index >= tx.outputs.len() {
        return Err(SwapError::MissingCommittedOutput {
            input: input_index,
            output_count: tx.outputs.len(),
        });
    }

    let transaction = tx.to_transaction();
    let script_code = script_code(&prevout.script_pubkey);
    let mut data = Vec::with_capacity(156 + script_code.len());
    SighashCache::new(&transaction)
        .segwit_v0_encode_signing_data_to(
            &mut data,
            input_index,
            &script_code,
            prevout.amount(),
            scope.into(),
        )
        .map_err(|e| SwapError::malformed_transaction(format!("input {}: {}", input_index, e)))?;

    Ok(data)
}

/// The 32-byte digest a signature on `input_index` commits to
pub fn signature_digest(
    tx: &UnsignedTransaction,
    input_index: usize,
    prevout: &Prevout,
    scope: SighashScope,
) -> SwapResult<[u8; 32]> {
    let data = preimage(tx, input_index, prevout, scope)?;
    Ok(sha256d::Hash::hash(&data).to_byte_array())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{TxInput, TxOutput};
    use bitcoin::sighash::EcdsaSighashType;
    use bitcoin::{OutPoint, Txid, WPubkeyHash};

    fn outpoint(tag: u8) -> OutPoint {
        OutPoint::new(Txid::from_byte_array([tag; 32]), tag as u32)
    }

    fn prevout() -> Prevout {
        Prevout::new(10_000, ScriptBuf::new_p2wpkh(&WPubkeyHash::from_byte_array([0x11; 20])))
    }

    fn offer_tx() -> UnsignedTransaction {
        UnsignedTransaction::new(
            vec![TxInput::new(outpoint(1))],
            vec![TxOutput::new(100_000, vec![0x51])],
        )
    }

    /// Offer pair moved to index 2 with two taker inputs/outputs in front
    fn extended_tx() -> UnsignedTransaction {
        UnsignedTransaction::new(
            vec![
                TxInput::new(outpoint(7)),
                TxInput::new(outpoint(8)),
                TxInput::new(outpoint(1)),
                TxInput::new(outpoint(9)),
            ],
            vec![
                TxOutput::new(600, vec![0x52]),
                TxOutput::new(10_000, vec![0x53]),
                TxOutput::new(100_000, vec![0x51]),
                TxOutput::new(4_000, vec![0x54]),
            ],
        )
    }

    #[test]
    fn test_single_anyonecanpay_survives_extension() {
        let scope = SighashScope::SingleAnyoneCanPay;
        let drafted = signature_digest(&offer_tx(), 0, &prevout(), scope).unwrap();
        let extended = signature_digest(&extended_tx(), 2, &prevout(), scope).unwrap();
        assert_eq!(drafted, extended);
    }

    #[test]
    fn test_single_anyonecanpay_breaks_on_output_change() {
        let scope = SighashScope::SingleAnyoneCanPay;
        let drafted = signature_digest(&offer_tx(), 0, &prevout(), scope).unwrap();

        let mut tx = extended_tx();
        tx.outputs[2].value = 99_000;
        assert_ne!(signature_digest(&tx, 2, &prevout(), scope).unwrap(), drafted);

        let mut tx = extended_tx();
        tx.outputs[2].script_pubkey = ScriptBuf::from(vec![0x00]);
        assert_ne!(signature_digest(&tx, 2, &prevout(), scope).unwrap(), drafted);
    }

    #[test]
    fn test_all_commits_to_every_input_and_output() {
        let tx = extended_tx();
        let base = signature_digest(&tx, 0, &prevout(), SighashScope::All).unwrap();

        let mut more_outputs = tx.clone();
        more_outputs.outputs.push(TxOutput::new(1, ScriptBuf::new()));
        assert_ne!(signature_digest(&more_outputs, 0, &prevout(), SighashScope::All).unwrap(), base);

        let mut resequenced = tx.clone();
        resequenced.inputs[3].sequence = 0;
        assert_ne!(signature_digest(&resequenced, 0, &prevout(), SighashScope::All).unwrap(), base);
    }

    #[test]
    fn test_single_leaves_other_sequences_open() {
        let tx = extended_tx();
        let base = signature_digest(&tx, 2, &prevout(), SighashScope::Single).unwrap();

        let mut resequenced = tx.clone();
        resequenced.inputs[0].sequence = 0;
        assert_eq!(signature_digest(&resequenced, 2, &prevout(), SighashScope::Single).unwrap(), base);

        let mut respent = tx.clone();
        respent.inputs[0].outpoint = outpoint(0x42);
        assert_ne!(signature_digest(&respent, 2, &prevout(), SighashScope::Single).unwrap(), base);
    }

    #[test]
    fn test_none_ignores_outputs() {
        let tx = extended_tx();
        let base = signature_digest(&tx, 1, &prevout(), SighashScope::None).unwrap();
        let mut changed = tx.clone();
        changed.outputs.clear();
        assert_eq!(signature_digest(&changed, 1, &prevout(), SighashScope::None).unwrap(), base);
    }

    #[test]
    fn test_prevout_is_committed() {
        let tx = offer_tx();
        let scope = SighashScope::SingleAnyoneCanPay;
        let a = signature_digest(&tx, 0, &prevout(), scope).unwrap();
        let b = signature_digest(&tx, 0, &Prevout::new(10_001, prevout().script_pubkey), scope).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_matches_consensus_p2wpkh_sighash() {
        let tx = extended_tx();
        let transaction = tx.to_transaction();
        let mut cache = SighashCache::new(&transaction);
        for (input, scope) in [(0, SighashScope::All), (2, SighashScope::SingleAnyoneCanPay)] {
            let expected = cache
                .p2wpkh_signature_hash(input, &prevout().script_pubkey, prevout().amount(), EcdsaSighashType::from(scope))
                .unwrap();
            let digest = signature_digest(&tx, input, &prevout(), scope).unwrap();
            assert_eq!(digest, expected.to_byte_array());
        }
    }

    #[test]
    fn test_non_p2wpkh_script_is_its_own_script_code() {
        let bare = ScriptBuf::from(vec![0x51]);
        assert_eq!(script_code(&bare), bare);
        assert_eq!(script_code(&prevout().script_pubkey).len(), 25);
    }

    #[test]
    fn test_single_without_output_fails() {
        let mut tx = extended_tx();
        tx.outputs.truncate(2);
        let err = signature_digest(&tx, 3, &prevout(), SighashScope::Single).unwrap_err();
        assert_eq!(err, SwapError::MissingCommittedOutput { input: 3, output_count: 2 });
    }

    #[test]
    fn test_input_out_of_range() {
        let err = signature_digest(&offer_tx(), 1, &prevout(), SighashScope::All).unwrap_err();
        assert_eq!(err, SwapError::UnsupportedScope { input: 1, input_count: 1 });
    }

    #[test]
    fn test_preimage_ends_with_scope_byte() {
        let data = preimage(&offer_tx(), 0, &prevout(), SighashScope::SingleAnyoneCanPay).unwrap();
        assert_eq!(&data[data.len() - 4..], &[0x83, 0, 0, 0]);
    }
}
