//! Maker draft

use std::collections::BTreeMap;

use super::offer::Offer;
use crate::container::SignedContainer;
use crate::error::{SwapError, SwapResult};
use crate::signing::{signature_digest, KeyCustody, KeyHandle, SighashScope};
use crate::tx::{TxInput, TxOutput, UnsignedTransaction, Utxo};
use crate::utils::config::get_protocol_config;
use crate::utils::logging::{LogEntry, LogLevel};

/// Scope every maker signature uses
pub const MAKER_SCOPE: SighashScope = SighashScope::SingleAnyoneCanPay;

/// One-input, one-output offer before the maker signs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    item: Utxo,
    payee: TxOutput,
    anchor: usize,
    pinned: BTreeMap<usize, TxOutput>,
    version: i32,
    lock_time: u32,
    sequence: u32,
}

impl Draft {
    /// Sell `item` for at least `payee.value`, paid to `payee.script_pubkey`.
    ///
    /// Anchor, version, lock time and sequence come from the protocol
    /// configuration.
    pub fn new(item: Utxo, payee: TxOutput) -> Self {
        let settings = get_protocol_config().settings();
        Self {
            item,
            payee,
            anchor: settings.default_anchor,
            pinned: BTreeMap::new(),
            version: settings.tx_version,
            lock_time: settings.lock_time,
            sequence: settings.sequence,
        }
    }

    /// Index the maker pair will occupy in the extended transaction
    pub fn with_anchor(mut self, anchor: usize) -> Self {
        self.anchor = anchor;
        self
    }

    /// Require `output` at `index` in the extended transaction
    pub fn with_pinned_output(mut self, index: usize, output: TxOutput) -> Self {
        self.pinned.insert(index, output);
        self
    }

    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    pub fn with_lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn item(&self) -> &Utxo {
        &self.item
    }

    pub fn payee(&self) -> &TxOutput {
        &self.payee
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// The one-input, one-output skeleton the maker signs
    pub fn unsigned_tx(&self) -> UnsignedTransaction {
        UnsignedTransaction::new(
            vec![TxInput::new(self.item.outpoint).with_sequence(self.sequence)],
            vec![self.payee.clone()],
        )
        .with_version(self.version)
        .with_lock_time(self.lock_time)
    }

    /// Sign the item input with SINGLE|ANYONECANPAY, producing the offer
    pub fn commit<K>(&self, custody: &K, handle: &KeyHandle) -> SwapResult<Offer>
    where
        K: KeyCustody + ?Sized,
    {
        if let Some(output) = self.pinned.get(&self.anchor) {
            return Err(SwapError::commitment_violated(
                self.anchor,
                format!("pinned {} sat output collides with the anchor", output.value),
            ));
        }

        let tx = self.unsigned_tx();
        let prevout = self.item.prevout();
        let digest = signature_digest(&tx, 0, &prevout, MAKER_SCOPE)?;
        let public_key = custody.public_key(handle)?;
        let signature = custody.sign(&digest, handle)?;

        let mut container = self
            .pinned
            .iter()
            .fold(SignedContainer::new(tx).with_anchor(self.anchor), |c, (index, output)| {
                c.with_pinned_output(*index, output.clone())
            });
        container.set_prevout(0, prevout)?;
        container.set_scope_tag(0, MAKER_SCOPE)?;
        container.attach(0, public_key, signature, MAKER_SCOPE)?;

        LogEntry::new(LogLevel::Info, "protocol", "Offer committed")
            .field("outpoint", self.item.outpoint)
            .field("price", self.payee.value)
            .field("anchor", self.anchor)
            .script_field("payee", &self.payee.script_pubkey)
            .log();

        Offer::from_container(container)
    }
}
