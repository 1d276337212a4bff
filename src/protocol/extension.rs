//! Taker side: extending an offer and signing the taker inputs

use super::offer::Offer;
use crate::container::SignedContainer;
use crate::error::{SwapError, SwapResult};
use crate::finalizer;
use crate::log_info;
use crate::signing::{signature_digest, KeyCustody, KeyHandle, ScriptResolver, SighashScope};
use crate::tx::{FinalTransaction, Prevout, TxInput, TxOutput, UnsignedTransaction, Utxo};
use crate::utils::config::get_protocol_config;

/// Scope every taker signature uses
pub const TAKER_SCOPE: SighashScope = SighashScope::All;

/// Assembles an extended transaction around an offer's anchor.
///
/// Inputs and outputs added with the `*_before` methods land ahead of
/// the anchor and must fill exactly `anchor` slots on each side; the rest
/// follow it in insertion order.
#[derive(Debug, Clone)]
pub struct ExtensionBuilder<'a> {
    offer: &'a Offer,
    sequence: u32,
    inputs_before: Vec<Utxo>,
    inputs_after: Vec<Utxo>,
    outputs_before: Vec<TxOutput>,
    outputs_after: Vec<TxOutput>,
}

impl<'a> ExtensionBuilder<'a> {
    pub fn new(offer: &'a Offer) -> Self {
        Self {
            offer,
            sequence: get_protocol_config().settings().sequence,
            inputs_before: Vec::new(),
            inputs_after: Vec::new(),
            outputs_before: Vec::new(),
            outputs_after: Vec::new(),
        }
    }

    /// Sequence for taker inputs
    pub fn sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn input_before(mut self, utxo: Utxo) -> Self {
        self.inputs_before.push(utxo);
        self
    }

    pub fn input(mut self, utxo: Utxo) -> Self {
        self.inputs_after.push(utxo);
        self
    }

    pub fn output_before(mut self, output: TxOutput) -> Self {
        self.outputs_before.push(output);
        self
    }

    pub fn output(mut self, output: TxOutput) -> Self {
        self.outputs_after.push(output);
        self
    }

    /// The extended skeleton plus prevouts for every taker input
    pub fn assemble(&self) -> SwapResult<(UnsignedTransaction, Vec<(usize, Prevout)>)> {
        let k = self.offer.anchor();
        if self.inputs_before.len() != k {
            return Err(SwapError::commitment_violated(
                k,
                format!("{} inputs placed before the anchor, need {}", self.inputs_before.len(), k),
            ));
        }
        if self.outputs_before.len() != k {
            return Err(SwapError::commitment_violated(
                k,
                format!("{} outputs placed before the anchor, need {}", self.outputs_before.len(), k),
            ));
        }

        let taker_input = |utxo: &Utxo| TxInput::new(utxo.outpoint).with_sequence(self.sequence);

        let mut inputs = Vec::with_capacity(k + 1 + self.inputs_after.len());
        let mut prevouts = Vec::with_capacity(k + self.inputs_after.len());
        for utxo in &self.inputs_before {
            prevouts.push((inputs.len(), utxo.prevout()));
            inputs.push(taker_input(utxo));
        }
        inputs.push(*self.offer.maker_input());
        for utxo in &self.inputs_after {
            prevouts.push((inputs.len(), utxo.prevout()));
            inputs.push(taker_input(utxo));
        }

        let mut outputs = self.outputs_before.clone();
        outputs.push(self.offer.payee_output().clone());
        outputs.extend(self.outputs_after.iter().cloned());

        let offer_tx = self.offer.unsigned_tx();
        let tx = UnsignedTransaction::new(inputs, outputs)
            .with_version(offer_tx.version)
            .with_lock_time(offer_tx.lock_time);
        Ok((tx, prevouts))
    }

    /// Assemble and validate against the offer
    pub fn build(self) -> SwapResult<Extended> {
        let (tx, prevouts) = self.assemble()?;
        self.offer.extend_with(tx, prevouts)
    }
}

/// Offer extended by a taker, taker inputs not yet (fully) signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extended {
    container: SignedContainer,
}

impl Extended {
    pub(crate) fn new(container: SignedContainer) -> Self {
        Self { container }
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

    /// Every input index except the anchor
    pub fn taker_inputs(&self) -> Vec<usize> {
        let k = self.anchor();
        (0..self.container.input_count()).filter(|i| *i != k).collect()
    }

    /// Sign one taker input. Only `ALL` is accepted on taker inputs.
    pub fn sign_input<K>(
        &self,
        input_index: usize,
        scope: SighashScope,
        custody: &K,
        handle: &KeyHandle,
    ) -> SwapResult<Extended>
    where
        K: KeyCustody + ?Sized,
    {
        let k = self.anchor();
        if input_index == k {
            return Err(SwapError::commitment_violated(
                k,
                "the anchor input belongs to the maker",
            ));
        }
        if scope != TAKER_SCOPE {
            return Err(SwapError::UnsafeScope {
                input: input_index,
                scope,
            });
        }

        let prevout = self
            .container
            .prevout(input_index)
            .ok_or(SwapError::MissingPrevout { input: input_index })?;
        let digest = signature_digest(self.unsigned_tx(), input_index, prevout, scope)?;
        let public_key = custody.public_key(handle)?;
        let signature = custody.sign(&digest, handle)?;

        let mut container = self.container.clone();
        container.attach(input_index, public_key, signature, scope)?;
        Ok(Self { container })
    }

    /// Sign each listed taker input with `ALL`
    pub fn sign_inputs<K>(&self, custody: &K, handles: &[(usize, KeyHandle)]) -> SwapResult<TakerSigned>
    where
        K: KeyCustody + ?Sized,
    {
        let signed = handles.iter().try_fold(self.clone(), |extended, (index, handle)| {
            extended.sign_input(*index, TAKER_SCOPE, custody, handle)
        })?;

        log_info!(
            "protocol",
            "Taker inputs signed",
            signed = handles.len(),
            inputs = signed.container.input_count()
        );
        Ok(TakerSigned {
            container: signed.container,
        })
    }

    /// Sign every taker input with one key
    pub fn sign_taker_inputs<K>(&self, custody: &K, handle: &KeyHandle) -> SwapResult<TakerSigned>
    where
        K: KeyCustody + ?Sized,
    {
        let handles: Vec<_> = self
            .taker_inputs()
            .into_iter()
            .map(|index| (index, handle.clone()))
            .collect();
        self.sign_inputs(custody, &handles)
    }
}

/// Extended offer carrying the taker's signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakerSigned {
    container: SignedContainer,
}

impl TakerSigned {
    pub fn container(&self) -> &SignedContainer {
        &self.container
    }

    pub fn into_container(self) -> SignedContainer {
        self.container
    }

    /// Fold in signatures gathered elsewhere over the same skeleton
    pub fn merge(&self, other: &SignedContainer) -> SwapResult<TakerSigned> {
        Ok(Self {
            container: self.container.merge(other)?,
        })
    }

    pub fn finalize<R>(&self, resolver: &R) -> SwapResult<FinalTransaction>
    where
        R: ScriptResolver + ?Sized,
    {
        finalizer::finalize(&self.container, resolver)
    }
}
