//! Published offer
//!
//! A signed one-input container. Anyone holding it can extend it into a
//! full transaction, as long as the maker's input and the output at the
//! anchor index survive unchanged.

use std::collections::{BTreeMap, HashSet};

use secp256k1::Secp256k1;
use serde::Serialize;

use super::draft::MAKER_SCOPE;
use super::extension::{Extended, ExtensionBuilder};
use crate::container::{PartialSignature, SignedContainer};
use crate::error::{SwapError, SwapResult};
use crate::signing::{signature_digest, ScriptResolver};
use crate::tx::{OutPoint, Prevout, TxInput, TxOutput, UnsignedTransaction};
use bitcoin::ScriptBuf;
use crate::utils::config::get_protocol_config;
use crate::{log_info, log_warn};

/// Maker-committed offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    container: SignedContainer,
    prevout: Prevout,
    entry: PartialSignature,
}

/// Human-readable view of an offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferSummary {
    pub maker_outpoint: OutPoint,
    pub item_value: u64,
    pub asking_price: u64,
    /// What the taker pays on top of the item it receives
    pub net_cost: u64,
    pub anchor: usize,
    pub payee_script: ScriptBuf,
    pub maker_public_key: String,
    pub pinned_outputs: usize,
    pub signature_valid: bool,
}

impl Offer {
    /// Check that a container has the shape of an offer
    pub fn from_container(container: SignedContainer) -> SwapResult<Self> {
        let tx = container.unsigned_tx();
        if tx.inputs.len() != 1 || tx.outputs.len() != 1 {
            return Err(SwapError::malformed_container(format!(
                "an offer has exactly one input and one output, got {} and {}",
                tx.inputs.len(),
                tx.outputs.len()
            )));
        }

        let anchor = container
            .anchor()
            .ok_or_else(|| SwapError::malformed_container("offer carries no anchor index"))?;
        if container.pinned_outputs().contains_key(&anchor) {
            return Err(SwapError::commitment_violated(
                anchor,
                "a pinned output collides with the anchor",
            ));
        }

        let prevout = container
            .prevout(0)
            .cloned()
            .ok_or(SwapError::MissingPrevout { input: 0 })?;

        match container.scope_tag(0) {
            Some(MAKER_SCOPE) => {}
            Some(scope) => return Err(SwapError::UnsafeScope { input: 0, scope }),
            None => return Err(SwapError::malformed_container("offer input carries no scope tag")),
        }

        let mut entries = container.signatures_for(0);
        let entry = match (entries.next(), entries.next()) {
            (Some(entry), None) => *entry,
            (None, _) => return Err(SwapError::IncompleteSignatures { inputs: vec![0] }),
            (Some(_), Some(_)) => {
                return Err(SwapError::malformed_container(
                    "an offer carries exactly one maker signature",
                ))
            }
        };
        if entry.scope != MAKER_SCOPE {
            return Err(SwapError::UnsafeScope {
                input: 0,
                scope: entry.scope,
            });
        }

        Ok(Self {
            container,
            prevout,
            entry,
        })
    }

    pub fn from_base64(text: &str) -> SwapResult<Self> {
        Self::from_container(SignedContainer::from_base64(text)?)
    }

    pub fn from_text(text: &str) -> SwapResult<Self> {
        Self::from_container(SignedContainer::from_text(text)?)
    }

    pub fn to_base64(&self) -> String {
        self.container.to_base64()
    }

    pub fn container(&self) -> &SignedContainer {
        &self.container
    }

    pub fn into_container(self) -> SignedContainer {
        self.container
    }

    pub fn unsigned_tx(&self) -> &UnsignedTransaction {
        self.container.unsigned_tx()
    }

    pub fn anchor(&self) -> usize {
        self.container.anchor().unwrap_or_default()
    }

    pub fn maker_input(&self) -> &TxInput {
        &self.unsigned_tx().inputs[0]
    }

    pub fn payee_output(&self) -> &TxOutput {
        &self.unsigned_tx().outputs[0]
    }

    pub fn maker_prevout(&self) -> &Prevout {
        &self.prevout
    }

    pub fn maker_entry(&self) -> &PartialSignature {
        &self.entry
    }

    pub fn pinned_outputs(&self) -> &BTreeMap<usize, TxOutput> {
        self.container.pinned_outputs()
    }

    /// Minimum proceeds the maker accepts
    pub fn asking_price(&self) -> u64 {
        self.payee_output().value
    }

    /// Check the maker signature against the offer skeleton
    pub fn verify_signature(&self) -> SwapResult<()> {
        let entry = self.maker_entry();
        let digest = signature_digest(self.unsigned_tx(), 0, self.maker_prevout(), MAKER_SCOPE)?;
        if !entry.verify(&Secp256k1::verification_only(), &digest) {
            return Err(SwapError::InvalidSignature {
                input: 0,
                public_key: entry.public_key.to_string(),
            });
        }
        Ok(())
    }

    /// Check the maker signature and that the signing key owns the item
    pub fn verify<R: ScriptResolver + ?Sized>(&self, resolver: &R) -> SwapResult<()> {
        self.verify_signature()?;
        let entry = self.maker_entry();
        if !resolver.controls(&entry.public_key, &self.maker_prevout().script_pubkey) {
            return Err(SwapError::InvalidSignature {
                input: 0,
                public_key: entry.public_key.to_string(),
            });
        }
        Ok(())
    }

    /// Asking price less the value the maker's input brings in
    pub fn net_cost(&self) -> u64 {
        self.asking_price().saturating_sub(self.maker_prevout().value)
    }

    /// Refuse offers costing the taker more than `limit` sats net
    pub fn check_price(&self, limit: u64) -> SwapResult<()> {
        let asked = self.net_cost();
        if asked > limit {
            return Err(SwapError::PriceExceeded {
                index: self.anchor(),
                asked,
                limit,
            });
        }
        Ok(())
    }

    pub fn summary(&self) -> OfferSummary {
        OfferSummary {
            maker_outpoint: self.maker_input().outpoint,
            item_value: self.maker_prevout().value,
            asking_price: self.asking_price(),
            net_cost: self.net_cost(),
            anchor: self.anchor(),
            payee_script: self.payee_output().script_pubkey.clone(),
            maker_public_key: self.maker_entry().public_key.to_string(),
            pinned_outputs: self.pinned_outputs().len(),
            signature_valid: self.verify_signature().is_ok(),
        }
    }

    /// Start assembling an extension around the anchor
    pub fn extension(&self) -> ExtensionBuilder<'_> {
        ExtensionBuilder::new(self)
    }

    /// Accept a taker-built transaction.
    ///
    /// `prevouts` must cover every input except the anchor. Fails with
    /// `CommitmentViolated` when the maker's input or proceeds moved or
    /// changed, a pinned output is missing, version or lock time differ,
    /// or the maker's outpoint is spent twice.
    pub fn extend_with<I>(&self, tx: UnsignedTransaction, prevouts: I) -> SwapResult<Extended>
    where
        I: IntoIterator<Item = (usize, Prevout)>,
    {
        let k = self.anchor();
        let offer_tx = self.unsigned_tx();

        if tx.version != offer_tx.version {
            return Err(SwapError::commitment_violated(
                k,
                format!("version changed from {} to {}", offer_tx.version, tx.version),
            ));
        }
        if tx.lock_time != offer_tx.lock_time {
            return Err(SwapError::commitment_violated(
                k,
                format!("lock time changed from {} to {}", offer_tx.lock_time, tx.lock_time),
            ));
        }

        match tx.inputs.get(k) {
            Some(input) if input == self.maker_input() => {}
            Some(input) => {
                return Err(SwapError::commitment_violated(
                    k,
                    format!("input spends {} instead of the maker's {}", input.outpoint, self.maker_input().outpoint),
                ))
            }
            None => {
                return Err(SwapError::commitment_violated(
                    k,
                    format!("transaction has only {} inputs", tx.inputs.len()),
                ))
            }
        }

        let payee = self.payee_output();
        match tx.outputs.get(k) {
            Some(output) if output == payee => {}
            Some(output) if output.value < payee.value => {
                return Err(SwapError::commitment_violated(
                    k,
                    format!("maker proceeds reduced from {} to {}", payee.value, output.value),
                ))
            }
            Some(_) => {
                return Err(SwapError::commitment_violated(k, "maker output changed"))
            }
            None => {
                return Err(SwapError::commitment_violated(
                    k,
                    format!("transaction has only {} outputs", tx.outputs.len()),
                ))
            }
        }

        for (index, pinned) in self.pinned_outputs() {
            if tx.outputs.get(*index) != Some(pinned) {
                return Err(SwapError::commitment_violated(
                    *index,
                    format!("pinned {} sat output missing or changed", pinned.value),
                ));
            }
        }

        let mut seen = HashSet::with_capacity(tx.inputs.len());
        for (index, input) in tx.inputs.iter().enumerate() {
            if !seen.insert(input.outpoint) {
                if input.outpoint == self.maker_input().outpoint {
                    return Err(SwapError::commitment_violated(
                        index,
                        "maker outpoint spent twice",
                    ));
                }
                return Err(SwapError::malformed_transaction(format!(
                    "input {} spends {} a second time",
                    index, input.outpoint
                )));
            }
        }

        let mut container = self
            .pinned_outputs()
            .iter()
            .fold(SignedContainer::new(tx).with_anchor(k), |c, (index, output)| {
                c.with_pinned_output(*index, output.clone())
            });

        for (index, prevout) in prevouts {
            if index == k && prevout != *self.maker_prevout() {
                return Err(SwapError::commitment_violated(k, "maker prevout replaced"));
            }
            container.set_prevout(index, prevout)?;
        }
        container.set_prevout(k, self.maker_prevout().clone())?;
        container.set_scope_tag(k, MAKER_SCOPE)?;
        container.attach_entry(k, *self.maker_entry())?;

        if let Some(input) = (0..container.input_count()).find(|i| container.prevout(*i).is_none()) {
            return Err(SwapError::MissingPrevout { input });
        }
        container.fee()?;

        if get_protocol_config().verify_offer_on_extend() {
            let entry = self.maker_entry();
            let digest = signature_digest(container.unsigned_tx(), k, self.maker_prevout(), MAKER_SCOPE)?;
            if !entry.verify(&Secp256k1::verification_only(), &digest) {
                log_warn!("protocol", "Maker signature does not verify", anchor = k);
                return Err(SwapError::InvalidSignature {
                    input: k,
                    public_key: entry.public_key.to_string(),
                });
            }
        }

        log_info!(
            "protocol",
            "Offer extended",
            anchor = k,
            inputs = container.input_count(),
            outputs = container.unsigned_tx().outputs.len()
        );

        Ok(Extended::new(container))
    }
}
