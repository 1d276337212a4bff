//! Finalizer/Validator
//!
//! Turns a fully signed container into a broadcastable transaction. For
//! every input:
//! 1. prevout metadata must be present
//! 2. only entries whose key controls the prevout's locking script count
//! 3. each such entry must use `ALL`, except on the anchor input, which may
//!    be tagged with the maker scope and must then use it
//! 4. each such entry must verify against the digest of the final skeleton
//!
//! Scope tags travel inside the container, so a tag alone never widens what
//! an input may be signed with. Any non-`ALL` tag off the anchor is refused.
//!
//! Nothing is emitted unless every input passes.

use secp256k1::Secp256k1;

use crate::container::{PartialSignature, SignedContainer};
use crate::error::{SwapError, SwapResult};
use crate::protocol::{MAKER_SCOPE, TAKER_SCOPE};
use crate::signing::{signature_digest, ScriptResolver, SighashScope};
use crate::tx::FinalTransaction;
use crate::{log_info, log_warn};

/// Scope every entry on `input` must carry, given its tag
fn required_scope(
    input: usize,
    anchor: Option<usize>,
    tag: Option<SighashScope>,
) -> SwapResult<SighashScope> {
    match tag {
        None => Ok(TAKER_SCOPE),
        Some(scope) if scope == TAKER_SCOPE => Ok(scope),
        Some(scope) if scope == MAKER_SCOPE && anchor == Some(input) => Ok(scope),
        Some(scope) => {
            log_warn!("finalizer", "Unsafe scope tag", input = input, scope = scope);
            Err(SwapError::UnsafeScope { input, scope })
        }
    }
}

/// Finalize a container.
///
/// `InvalidSignature` and `UnsafeScope` abort immediately. Inputs with no
/// satisfying entry are collected and reported together as
/// `IncompleteSignatures` once every other input has been checked.
pub fn finalize<R>(container: &SignedContainer, resolver: &R) -> SwapResult<FinalTransaction>
where
    R: ScriptResolver + ?Sized,
{
    let tx = container.unsigned_tx();
    let secp = Secp256k1::verification_only();

    for (index, pinned) in container.pinned_outputs() {
        if tx.outputs.get(*index) != Some(pinned) {
            return Err(SwapError::commitment_violated(
                *index,
                format!("pinned {} sat output missing or changed", pinned.value),
            ));
        }
    }

    let mut incomplete = Vec::new();
    let mut unlocks = Vec::with_capacity(tx.inputs.len());
    let anchor = container.anchor();

    for input in 0..tx.inputs.len() {
        let prevout = container
            .prevout(input)
            .ok_or(SwapError::MissingPrevout { input })?;
        let required = required_scope(input, anchor, container.scope_tag(input))?;

        let mut satisfying: Option<&PartialSignature> = None;
        for entry in container.signatures_for(input) {
            if !resolver.controls(&entry.public_key, &prevout.script_pubkey) {
                continue;
            }
            if entry.scope != required {
                log_warn!("finalizer", "Unsafe scope", input = input, scope = entry.scope);
                return Err(SwapError::UnsafeScope {
                    input,
                    scope: entry.scope,
                });
            }

            let digest = signature_digest(tx, input, prevout, entry.scope)?;
            if !entry.verify(&secp, &digest) {
                log_warn!("finalizer", "Signature does not verify", input = input);
                return Err(SwapError::InvalidSignature {
                    input,
                    public_key: entry.public_key.to_string(),
                });
            }
            satisfying.get_or_insert(entry);
        }

        match satisfying {
            Some(entry) => unlocks.push(resolver.unlock(entry)),
            None => incomplete.push(input),
        }
    }

    if !incomplete.is_empty() {
        return Err(SwapError::IncompleteSignatures { inputs: incomplete });
    }

    let final_tx = FinalTransaction::new(tx.clone(), unlocks)?;
    log_info!(
        "finalizer",
        "Transaction finalized",
        txid = final_tx.txid(),
        inputs = tx.inputs.len(),
        size = final_tx.size()
    );
    Ok(final_tx)
}
