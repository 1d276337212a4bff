//! Container exchange format
//!
//! Fields use `bitcoin` consensus encoding (compact-size varints, length
//! prefixed byte vectors, `TxOut` for values with scripts):
//!
//! ```text
//! magic "opst" | version u8 | var_bytes(skeleton) | anchor flag u8 [varint]
//! | varint pinned count | (varint index, txout)*
//! | varint slot count | slot* | checksum (first 4 bytes of sha256d)
//!
//! slot: flags u8 (0x01 prevout, 0x02 scope tag)
//!       [txout] [u8 scope]
//!       varint entry count | entry*
//! entry: 33-byte compressed key | var_bytes DER signature | u8 scope
//! ```
//!
//! Every decoding failure is reported as `MalformedContainer`.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bitcoin::consensus::encode::VarInt;
use bitcoin::consensus::{serialize, Decodable, Encodable};
use bitcoin::hashes::{sha256d, Hash};
use bitcoin::TxOut;
use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use super::pst::SignedContainer;
use super::types::{InputSlot, PartialSignature};
use crate::error::{SwapError, SwapResult};
use crate::signing::SighashScope;
use crate::tx::{Prevout, TxOutput, UnsignedTransaction};
use crate::utils::config::{get_protocol_config, DecodeLimits};

pub const MAGIC: [u8; 4] = *b"opst";
pub const FORMAT_VERSION: u8 = 1;

const CHECKSUM_LEN: usize = 4;
const FLAG_PREVOUT: u8 = 0x01;
const FLAG_SCOPE_TAG: u8 = 0x02;

fn checksum(data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = sha256d::Hash::hash(data).to_byte_array();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash[..CHECKSUM_LEN]);
    out
}

fn put<T: Encodable + ?Sized>(out: &mut Vec<u8>, value: &T) {
    out.extend_from_slice(&serialize(value));
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    put(out, &VarInt(len as u64));
}

fn read<T: Decodable>(r: &mut &[u8], what: &str) -> SwapResult<T> {
    T::consensus_decode(r)
        .map_err(|e| SwapError::malformed_container(format!("reading {}: {}", what, e)))
}

fn read_varint(r: &mut &[u8], what: &str) -> SwapResult<u64> {
    read::<VarInt>(r, what).map(|n| n.0)
}

/// Encode a container
pub fn encode(container: &SignedContainer) -> Vec<u8> {
    let mut out = Vec::new();
    put(&mut out, &MAGIC);
    put(&mut out, &FORMAT_VERSION);
    put(&mut out, &container.unsigned_tx().serialize());

    match container.anchor() {
        Some(anchor) => {
            put(&mut out, &1u8);
            put_len(&mut out, anchor);
        }
        None => put(&mut out, &0u8),
    }

    put_len(&mut out, container.pinned_outputs().len());
    for (index, output) in container.pinned_outputs() {
        put_len(&mut out, *index);
        put(&mut out, &TxOut::from(output));
    }

    put_len(&mut out, container.slots().len());
    for slot in container.slots() {
        let mut flags = 0u8;
        if slot.prevout.is_some() {
            flags |= FLAG_PREVOUT;
        }
        if slot.scope_tag.is_some() {
            flags |= FLAG_SCOPE_TAG;
        }
        put(&mut out, &flags);
        if let Some(prevout) = &slot.prevout {
            put(
                &mut out,
                &TxOut {
                    value: prevout.amount(),
                    script_pubkey: prevout.script_pubkey.clone(),
                },
            );
        }
        if let Some(scope) = slot.scope_tag {
            put(&mut out, &scope.to_byte());
        }

        put_len(&mut out, slot.entries.len());
        for entry in slot.entries.values() {
            put(&mut out, &entry.public_key.serialize());
            put(&mut out, &entry.signature.serialize_der().to_vec());
            put(&mut out, &entry.scope.to_byte());
        }
    }

    let sum = checksum(&out);
    out.extend_from_slice(&sum);
    out
}

fn read_scope(r: &mut &[u8]) -> SwapResult<SighashScope> {
    let byte: u8 = read(r, "scope")?;
    SighashScope::from_byte(byte)
        .ok_or_else(|| SwapError::malformed_container(format!("unknown scope byte 0x{:02x}", byte)))
}

fn read_slot(r: &mut &[u8], index: usize, limits: &DecodeLimits) -> SwapResult<InputSlot> {
    let flags: u8 = read(r, "slot flags")?;
    if flags & !(FLAG_PREVOUT | FLAG_SCOPE_TAG) != 0 {
        return Err(SwapError::malformed_container(format!(
            "slot {} has unknown flags 0x{:02x}",
            index, flags
        )));
    }

    let mut slot = InputSlot::default();
    if flags & FLAG_PREVOUT != 0 {
        let spent: TxOut = read(r, "prevout")?;
        slot.prevout = Some(Prevout::new(spent.value.to_sat(), spent.script_pubkey));
    }
    if flags & FLAG_SCOPE_TAG != 0 {
        slot.scope_tag = Some(read_scope(r)?);
    }

    let count = read_varint(r, "entry count")?;
    if count > limits.max_entries_per_input as u64 {
        return Err(SwapError::malformed_container(format!(
            "slot {} declares {} entries, limit is {}",
            index, count, limits.max_entries_per_input
        )));
    }

    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let key_bytes: [u8; 33] = read(r, "public key")?;
        let public_key = PublicKey::from_slice(&key_bytes).map_err(|e| {
            SwapError::malformed_container(format!("slot {}: invalid public key: {}", index, e))
        })?;
        let der: Vec<u8> = read(r, "signature")?;
        let signature = Signature::from_der(&der).map_err(|e| {
            SwapError::malformed_container(format!("slot {}: invalid signature: {}", index, e))
        })?;
        let scope = read_scope(r)?;

        let entry = PartialSignature::new(public_key, signature, scope);
        if entries.insert(key_bytes, entry).is_some() {
            return Err(SwapError::malformed_container(format!(
                "slot {} repeats key {}",
                index, public_key
            )));
        }
    }
    slot.entries = entries;
    Ok(slot)
}

/// Decode a container under explicit limits
pub fn decode_with_limits(bytes: &[u8], limits: &DecodeLimits) -> SwapResult<SignedContainer> {
    if bytes.len() < MAGIC.len() + 1 + CHECKSUM_LEN {
        return Err(SwapError::malformed_container(format!(
            "{} bytes is too short for a container",
            bytes.len()
        )));
    }

    let (body, sum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    if checksum(body) != sum {
        return Err(SwapError::malformed_container("checksum mismatch"));
    }

    let mut r = body;
    if read::<[u8; 4]>(&mut r, "magic")? != MAGIC {
        return Err(SwapError::malformed_container("bad magic"));
    }
    let version: u8 = read(&mut r, "format version")?;
    if version != FORMAT_VERSION {
        return Err(SwapError::malformed_container(format!(
            "unsupported format version {}",
            version
        )));
    }

    let skeleton: Vec<u8> = read(&mut r, "skeleton")?;
    let tx = UnsignedTransaction::parse(&skeleton).map_err(|e| {
        SwapError::malformed_container(format!("embedded skeleton: {}", e))
    })?;
    if tx.inputs.len() > limits.max_inputs || tx.outputs.len() > limits.max_outputs {
        return Err(SwapError::malformed_container(format!(
            "skeleton has {} inputs and {} outputs, limits are {} and {}",
            tx.inputs.len(),
            tx.outputs.len(),
            limits.max_inputs,
            limits.max_outputs
        )));
    }

    let anchor = match read::<u8>(&mut r, "anchor flag")? {
        0 => None,
        1 => {
            let anchor = read_varint(&mut r, "anchor")?;
            if anchor >= limits.max_inputs as u64 {
                return Err(SwapError::malformed_container(format!(
                    "anchor index {} exceeds the input limit",
                    anchor
                )));
            }
            Some(anchor as usize)
        }
        other => {
            return Err(SwapError::malformed_container(format!(
                "invalid anchor flag {}",
                other
            )));
        }
    };

    let pinned_count = read_varint(&mut r, "pinned count")?;
    if pinned_count > limits.max_outputs as u64 {
        return Err(SwapError::malformed_container(format!(
            "{} pinned outputs exceeds the output limit",
            pinned_count
        )));
    }
    let mut pinned = BTreeMap::new();
    for _ in 0..pinned_count {
        let index = read_varint(&mut r, "pinned index")?;
        if index >= limits.max_outputs as u64 {
            return Err(SwapError::malformed_container(format!(
                "pinned output index {} exceeds the output limit",
                index
            )));
        }
        let output: TxOut = read(&mut r, "pinned output")?;
        if pinned.insert(index as usize, TxOutput::from(output)).is_some() {
            return Err(SwapError::malformed_container(format!(
                "output index {} pinned twice",
                index
            )));
        }
    }

    let slot_count = read_varint(&mut r, "slot count")?;
    if slot_count != tx.inputs.len() as u64 {
        return Err(SwapError::malformed_container(format!(
            "{} slots for {} inputs",
            slot_count,
            tx.inputs.len()
        )));
    }

    let slots = (0..tx.inputs.len())
        .map(|index| read_slot(&mut r, index, limits))
        .collect::<SwapResult<Vec<_>>>()?;

    if !r.is_empty() {
        return Err(SwapError::malformed_container(format!(
            "{} trailing bytes",
            r.len()
        )));
    }

    Ok(SignedContainer::from_parts(tx, slots, anchor, pinned))
}

/// Decode a container under the configured limits
pub fn decode(bytes: &[u8]) -> SwapResult<SignedContainer> {
    decode_with_limits(bytes, &get_protocol_config().limits())
}

impl SignedContainer {
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> SwapResult<Self> {
        decode(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(encode(self))
    }

    pub fn from_base64(text: &str) -> SwapResult<Self> {
        decode(&STANDARD.decode(text.trim())?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(encode(self))
    }

    pub fn from_hex(text: &str) -> SwapResult<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| SwapError::malformed_container(format!("invalid hex: {}", e)))?;
        decode(&bytes)
    }

    /// Accept either transport encoding
    pub fn from_text(text: &str) -> SwapResult<Self> {
        let trimmed = text.trim();
        if !trimmed.is_empty() && trimmed.len() % 2 == 0 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(container) = Self::from_hex(trimmed) {
                return Ok(container);
            }
        }
        Self::from_base64(trimmed)
    }
}
