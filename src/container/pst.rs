//! Partially signed transaction container

use std::collections::BTreeMap;

use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use super::types::{InputSlot, PartialSignature, SignatureStatus, Signatures};
use crate::error::{SwapError, SwapResult};
use crate::log_debug;
use crate::signing::SighashScope;
use crate::tx::{Prevout, TxOutput, UnsignedTransaction};

/// Unsigned skeleton plus one signature slot per input.
///
/// Containers are values: parties exchange copies and combine them with
/// [`merge`](Self::merge). Two containers only combine when their
/// skeletons are byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContainer {
    tx: UnsignedTransaction,
    slots: Vec<InputSlot>,
    anchor: Option<usize>,
    pinned: BTreeMap<usize, TxOutput>,
}

impl SignedContainer {
    /// Empty container over `tx`
    pub fn new(tx: UnsignedTransaction) -> Self {
        let slots = vec![InputSlot::default(); tx.inputs.len()];
        Self {
            tx,
            slots,
            anchor: None,
            pinned: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        tx: UnsignedTransaction,
        slots: Vec<InputSlot>,
        anchor: Option<usize>,
        pinned: BTreeMap<usize, TxOutput>,
    ) -> Self {
        debug_assert_eq!(tx.inputs.len(), slots.len());
        Self {
            tx,
            slots,
            anchor,
            pinned,
        }
    }

    /// Record the index the maker pair occupies once extended
    pub fn with_anchor(mut self, anchor: usize) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Require `output` at `index` in any transaction this container grows into
    pub fn with_pinned_output(mut self, index: usize, output: TxOutput) -> Self {
        self.pinned.insert(index, output);
        self
    }

    pub fn pinned_outputs(&self) -> &BTreeMap<usize, TxOutput> {
        &self.pinned
    }

    pub fn unsigned_tx(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn into_unsigned_tx(self) -> UnsignedTransaction {
        self.tx
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn input_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, input_index: usize) -> Option<&InputSlot> {
        self.slots.get(input_index)
    }

    pub(crate) fn slots(&self) -> &[InputSlot] {
        &self.slots
    }

    pub fn prevout(&self, input_index: usize) -> Option<&Prevout> {
        self.slots.get(input_index)?.prevout.as_ref()
    }

    pub fn scope_tag(&self, input_index: usize) -> Option<SighashScope> {
        self.slots.get(input_index)?.scope_tag
    }

    fn slot_mut(&mut self, input_index: usize) -> SwapResult<&mut InputSlot> {
        let input_count = self.slots.len();
        self.slots.get_mut(input_index).ok_or(SwapError::UnsupportedScope {
            input: input_index,
            input_count,
        })
    }

    /// Record the value and locking script spent by `input_index`
    pub fn set_prevout(&mut self, input_index: usize, prevout: Prevout) -> SwapResult<()> {
        let slot = self.slot_mut(input_index)?;
        match &slot.prevout {
            Some(existing) if *existing != prevout => Err(SwapError::skeleton_mismatch(format!(
                "input {} already spends a {} sat prevout, refusing {} sats",
                input_index, existing.value, prevout.value
            ))),
            _ => {
                slot.prevout = Some(prevout);
                Ok(())
            }
        }
    }

    /// Pin the scope the signature on `input_index` must use
    pub fn set_scope_tag(&mut self, input_index: usize, scope: SighashScope) -> SwapResult<()> {
        let slot = self.slot_mut(input_index)?;
        match slot.scope_tag {
            Some(existing) if existing != scope => Err(SwapError::skeleton_mismatch(format!(
                "input {} is tagged {}, refusing {}",
                input_index, existing, scope
            ))),
            _ => {
                slot.scope_tag = Some(scope);
                Ok(())
            }
        }
    }

    /// Attach a signature entry.
    ///
    /// Re-attaching an identical entry is a no-op. A different signature or
    /// scope for the same (input, key) fails with `DuplicateSignature`.
    pub fn attach(
        &mut self,
        input_index: usize,
        public_key: PublicKey,
        signature: Signature,
        scope: SighashScope,
    ) -> SwapResult<()> {
        self.attach_entry(input_index, PartialSignature::new(public_key, signature, scope))
    }

    pub fn attach_entry(&mut self, input_index: usize, entry: PartialSignature) -> SwapResult<()> {
        let slot = self.slot_mut(input_index)?;
        let key = entry.key_bytes();
        match slot.entries.get(&key) {
            Some(existing) if *existing == entry => Ok(()),
            Some(_) => Err(SwapError::DuplicateSignature {
                input: input_index,
                public_key: entry.public_key.to_string(),
            }),
            None => {
                slot.entries.insert(key, entry);
                log_debug!(
                    "container",
                    "Attached signature",
                    input = input_index,
                    scope = entry.scope
                );
                Ok(())
            }
        }
    }

    /// Union of two containers over the same skeleton
    pub fn merge(&self, other: &SignedContainer) -> SwapResult<SignedContainer> {
        if self.tx != other.tx {
            return Err(SwapError::skeleton_mismatch(format!(
                "skeleton {} differs from {}",
                self.tx.txid(),
                other.tx.txid()
            )));
        }

        let anchor = match (self.anchor, other.anchor) {
            (Some(a), Some(b)) if a != b => {
                return Err(SwapError::skeleton_mismatch(format!(
                    "anchor index {} differs from {}",
                    a, b
                )));
            }
            (a, b) => a.or(b),
        };

        if !self.pinned.is_empty() && !other.pinned.is_empty() && self.pinned != other.pinned {
            return Err(SwapError::skeleton_mismatch("pinned outputs differ"));
        }

        let mut merged = self.clone();
        merged.anchor = anchor;
        if merged.pinned.is_empty() {
            merged.pinned = other.pinned.clone();
        }

        for (index, theirs) in other.slots.iter().enumerate() {
            if let Some(prevout) = &theirs.prevout {
                merged.set_prevout(index, prevout.clone())?;
            }
            if let Some(scope) = theirs.scope_tag {
                merged.set_scope_tag(index, scope)?;
            }
            for entry in theirs.entries.values() {
                merged.attach_entry(index, *entry)?;
            }
        }

        Ok(merged)
    }

    /// Entries on `input_index`; empty for unknown indices
    pub fn signatures_for(&self, input_index: usize) -> Signatures<'_> {
        Signatures {
            inner: self.slots.get(input_index).map(|slot| slot.entries.values()),
        }
    }

    pub fn signature_status(&self) -> Vec<SignatureStatus> {
        self.slots
            .iter()
            .enumerate()
            .map(|(input, slot)| SignatureStatus {
                input,
                entries: slot.entries.len(),
                has_prevout: slot.prevout.is_some(),
                scope_tag: slot.scope_tag,
            })
            .collect()
    }

    /// Every input carries at least one entry
    pub fn is_fully_signed(&self) -> bool {
        self.slots.iter().all(|slot| !slot.entries.is_empty())
    }

    /// Total prevout value
    pub fn input_value(&self) -> SwapResult<u64> {
        self.slots.iter().enumerate().try_fold(0u64, |acc, (input, slot)| {
            let prevout = slot.prevout.as_ref().ok_or(SwapError::MissingPrevout { input })?;
            acc.checked_add(prevout.value)
                .ok_or_else(|| SwapError::malformed_container("prevout values overflow"))
        })
    }

    /// Prevout value minus output value
    pub fn fee(&self) -> SwapResult<u64> {
        let input_value = self.input_value()?;
        let output_value = self
            .tx
            .total_output_value()
            .ok_or_else(|| SwapError::malformed_transaction("output values overflow"))?;
        input_value
            .checked_sub(output_value)
            .ok_or(SwapError::InsufficientFunds {
                input_value,
                output_value,
            })
    }
}
