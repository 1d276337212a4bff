//! Container tests

use bitcoin::hashes::Hash;
use bitcoin::ScriptBuf;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use super::codec::{self, decode_with_limits, MAGIC};
use super::*;
use crate::error::SwapError;
use crate::signing::SighashScope;
use crate::tx::{OutPoint, Prevout, TxInput, TxOutput, Txid, UnsignedTransaction};
use crate::utils::config::{DecodeLimits, ProtocolSettings};

fn keypair(seed: u8) -> (SecretKey, PublicKey) {
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
    (sk, PublicKey::from_secret_key(&secp, &sk))
}

fn sign(seed: u8, digest: [u8; 32]) -> (PublicKey, Signature) {
    let secp = Secp256k1::new();
    let (sk, pk) = keypair(seed);
    (pk, secp.sign_ecdsa(&Message::from_digest(digest), &sk))
}

fn skeleton() -> UnsignedTransaction {
    UnsignedTransaction::new(
        vec![
            TxInput::new(OutPoint::new(Txid::from_byte_array([1; 32]), 0)),
            TxInput::new(OutPoint::new(Txid::from_byte_array([2; 32]), 1)),
        ],
        vec![
            TxOutput::new(600, vec![0x51]),
            TxOutput::new(100_000, vec![0x52]),
        ],
    )
}

fn container() -> SignedContainer {
    SignedContainer::new(skeleton())
}

#[test]
fn test_attach_is_idempotent() {
    let mut c = container();
    let (pk, sig) = sign(3, [9; 32]);
    c.attach(0, pk, sig, SighashScope::All).unwrap();
    c.attach(0, pk, sig, SighashScope::All).unwrap();
    assert_eq!(c.signatures_for(0).count(), 1);
}

#[test]
fn test_attach_conflicts() {
    let mut c = container();
    let (pk, sig) = sign(3, [9; 32]);
    let (_, other_sig) = sign(3, [8; 32]);
    c.attach(0, pk, sig, SighashScope::All).unwrap();

    assert!(matches!(
        c.attach(0, pk, sig, SighashScope::Single),
        Err(SwapError::DuplicateSignature { input: 0, .. })
    ));
    assert!(matches!(
        c.attach(0, pk, other_sig, SighashScope::All),
        Err(SwapError::DuplicateSignature { input: 0, .. })
    ));

    // A second key on the same input is fine
    let (pk2, sig2) = sign(4, [9; 32]);
    c.attach(0, pk2, sig2, SighashScope::All).unwrap();
    assert_eq!(c.signatures_for(0).len(), 2);
}

#[test]
fn test_attach_out_of_range() {
    let mut c = container();
    let (pk, sig) = sign(3, [9; 32]);
    assert_eq!(
        c.attach(5, pk, sig, SighashScope::All),
        Err(SwapError::UnsupportedScope { input: 5, input_count: 2 })
    );
}

#[test]
fn test_signatures_for_is_restartable() {
    let mut c = container();
    for seed in 3..6 {
        let (pk, sig) = sign(seed, [9; 32]);
        c.attach(1, pk, sig, SighashScope::All).unwrap();
    }

    let iter = c.signatures_for(1);
    let first: Vec<_> = iter.clone().collect();
    let second: Vec<_> = iter.collect();
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);

    assert_eq!(c.signatures_for(7).count(), 0);
}

#[test]
fn test_merge_unions_entries() {
    let (pk_a, sig_a) = sign(3, [9; 32]);
    let (pk_b, sig_b) = sign(4, [9; 32]);

    let mut a = container().with_anchor(1);
    a.attach(1, pk_a, sig_a, SighashScope::SingleAnyoneCanPay).unwrap();
    a.set_scope_tag(1, SighashScope::SingleAnyoneCanPay).unwrap();

    let mut b = container();
    b.attach(0, pk_b, sig_b, SighashScope::All).unwrap();
    b.set_prevout(0, Prevout::new(700, vec![0x53])).unwrap();

    let ab = a.merge(&b).unwrap();
    let ba = b.merge(&a).unwrap();
    assert_eq!(ab, ba);
    assert!(ab.is_fully_signed());
    assert_eq!(ab.anchor(), Some(1));
    assert_eq!(ab.scope_tag(1), Some(SighashScope::SingleAnyoneCanPay));
    assert_eq!(ab.prevout(0).map(|p| p.value), Some(700));

    assert_eq!(ab.merge(&ab).unwrap(), ab);
    assert_eq!(ab.merge(&a).unwrap(), ab);
}

#[test]
fn test_merge_rejects_different_skeletons() {
    let mut other_tx = skeleton();
    other_tx.outputs[0].value = 601;
    let err = container().merge(&SignedContainer::new(other_tx)).unwrap_err();
    assert!(matches!(err, SwapError::SkeletonMismatch { .. }));

    let err = container()
        .with_anchor(1)
        .merge(&container().with_anchor(2))
        .unwrap_err();
    assert!(matches!(err, SwapError::SkeletonMismatch { .. }));

    let err = container()
        .with_pinned_output(0, TxOutput::new(600, vec![0x51]))
        .merge(&container().with_pinned_output(0, TxOutput::new(700, vec![0x51])))
        .unwrap_err();
    assert!(matches!(err, SwapError::SkeletonMismatch { .. }));
}

#[test]
fn test_merge_rejects_conflicting_metadata_and_entries() {
    let mut a = container();
    a.set_prevout(0, Prevout::new(700, vec![0x53])).unwrap();
    let mut b = container();
    b.set_prevout(0, Prevout::new(800, vec![0x53])).unwrap();
    assert!(matches!(a.merge(&b), Err(SwapError::SkeletonMismatch { .. })));

    let (pk, sig) = sign(3, [9; 32]);
    let mut a = container();
    a.attach(0, pk, sig, SighashScope::All).unwrap();
    let mut b = container();
    b.attach(0, pk, sig, SighashScope::None).unwrap();
    assert!(matches!(a.merge(&b), Err(SwapError::DuplicateSignature { .. })));
}

#[test]
fn test_status_and_fee() {
    let mut c = container();
    assert!(matches!(c.fee(), Err(SwapError::MissingPrevout { input: 0 })));

    c.set_prevout(0, Prevout::new(700, ScriptBuf::new())).unwrap();
    c.set_prevout(1, Prevout::new(100_500, ScriptBuf::new())).unwrap();
    assert_eq!(c.fee().unwrap(), 600);

    let status = c.signature_status();
    assert_eq!(status.len(), 2);
    assert!(status.iter().all(|s| s.has_prevout && !s.is_signed()));
    assert!(!c.is_fully_signed());

    let mut poor = container();
    poor.set_prevout(0, Prevout::new(1, ScriptBuf::new())).unwrap();
    poor.set_prevout(1, Prevout::new(1, ScriptBuf::new())).unwrap();
    assert_eq!(
        poor.fee(),
        Err(SwapError::InsufficientFunds { input_value: 2, output_value: 100_600 })
    );
}

fn populated() -> SignedContainer {
    let (pk_a, sig_a) = sign(3, [9; 32]);
    let (pk_b, sig_b) = sign(4, [7; 32]);
    let mut c = container()
        .with_anchor(1)
        .with_pinned_output(0, TxOutput::new(600, vec![0x51]));
    c.set_prevout(1, Prevout::new(10_000, vec![0x76, 0xa9])).unwrap();
    c.set_scope_tag(1, SighashScope::SingleAnyoneCanPay).unwrap();
    c.attach(1, pk_a, sig_a, SighashScope::SingleAnyoneCanPay).unwrap();
    c.attach(0, pk_b, sig_b, SighashScope::All).unwrap();
    c
}

#[test]
fn test_codec_roundtrip() {
    let c = populated();
    assert_eq!(SignedContainer::from_bytes(&c.to_bytes()).unwrap(), c);
    assert_eq!(SignedContainer::from_base64(&c.to_base64()).unwrap(), c);
    assert_eq!(SignedContainer::from_hex(&c.to_hex()).unwrap(), c);
    assert_eq!(SignedContainer::from_text(&c.to_base64()).unwrap(), c);
    assert_eq!(SignedContainer::from_text(&c.to_hex()).unwrap(), c);
}

/// Rewrite the checksum so corruption reaches the structural checks
fn reseal(mut bytes: Vec<u8>) -> Vec<u8> {
    use bitcoin::hashes::sha256d;
    let body_len = bytes.len() - 4;
    let sum = sha256d::Hash::hash(&bytes[..body_len]).to_byte_array();
    bytes[body_len..].copy_from_slice(&sum[..4]);
    bytes
}

#[test]
fn test_codec_rejects_corruption() {
    let bytes = populated().to_bytes();

    let mut flipped = bytes.clone();
    flipped[10] ^= 0x01;
    assert!(matches!(
        SignedContainer::from_bytes(&flipped),
        Err(SwapError::MalformedContainer { .. })
    ));

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'x';
    assert!(matches!(
        SignedContainer::from_bytes(&reseal(bad_magic)),
        Err(SwapError::MalformedContainer { .. })
    ));

    let mut bad_version = bytes.clone();
    bad_version[MAGIC.len()] = 9;
    assert!(matches!(
        SignedContainer::from_bytes(&reseal(bad_version)),
        Err(SwapError::MalformedContainer { .. })
    ));

    assert!(matches!(
        SignedContainer::from_bytes(&bytes[..bytes.len() - 1]),
        Err(SwapError::MalformedContainer { .. })
    ));
    assert!(matches!(
        SignedContainer::from_bytes(&[]),
        Err(SwapError::MalformedContainer { .. })
    ));
    assert!(matches!(
        SignedContainer::from_base64("not base64!"),
        Err(SwapError::MalformedContainer { .. })
    ));
}

#[test]
fn test_codec_rejects_trailing_bytes() {
    let bytes = populated().to_bytes();
    let mut padded = bytes[..bytes.len() - 4].to_vec();
    padded.push(0);
    padded.extend_from_slice(&[0; 4]);
    assert!(matches!(
        SignedContainer::from_bytes(&reseal(padded)),
        Err(SwapError::MalformedContainer { .. })
    ));
}

#[test]
fn test_codec_enforces_limits() {
    let bytes = codec::encode(&populated());

    let tight = DecodeLimits {
        max_inputs: 1,
        ..ProtocolSettings::standard().limits()
    };
    assert!(matches!(
        decode_with_limits(&bytes, &tight),
        Err(SwapError::MalformedContainer { .. })
    ));

    let no_entries = DecodeLimits {
        max_entries_per_input: 0,
        ..ProtocolSettings::standard().limits()
    };
    assert!(matches!(
        decode_with_limits(&bytes, &no_entries),
        Err(SwapError::MalformedContainer { .. })
    ));

    assert!(decode_with_limits(&bytes, &DecodeLimits::default()).is_ok());
}
