/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Certificate derivation, chain-of-trust checks, and the search for the next certificate.

use std::collections::HashMap;

use crate::{
    bft_votes::types::BFTHeights,
    errors::BFTError,
    types::{
        block::{AggregateCommit, BlockHeader},
        crypto_primitives::AggregateSignatureVerifier,
        data_types::{BFTWeight, BlockHeight, BlsKey, CryptoHash},
        validators::{signers_weight, validators_in_bls_key_order, ValidatorsData},
    },
};

use super::{
    history::ChainHistory,
    types::{Certificate, LastCertificate, UnsignedCertificate},
};

/// Derive the unsigned certificate of the block with `header`.
pub fn unsigned_certificate(header: &BlockHeader) -> UnsignedCertificate {
    UnsignedCertificate::from(header)
}

/// Combine `aggregate_commit` with the unsigned certificate of `header`, which must be the header of
/// the block that `aggregate_commit` certifies.
pub fn certificate_from_aggregate_commit(
    aggregate_commit: &AggregateCommit,
    header: &BlockHeader,
) -> Result<Certificate, BFTError> {
    if header.height != aggregate_commit.height {
        return Err(BFTError::HeaderMismatch {
            header_height: header.height,
            aggregate_commit_height: aggregate_commit.height,
        });
    }
    Ok(Certificate::new(
        unsigned_certificate(header),
        aggregate_commit.aggregation_bits.clone(),
        aggregate_commit.certificate_signature.clone(),
    ))
}

/// Map the BLS key of every validator in `validators_data` to its weight. Placeholder keys are left out.
pub fn bls_key_to_weight(validators_data: &ValidatorsData) -> HashMap<BlsKey, BFTWeight> {
    validators_data
        .validators
        .iter()
        .filter(|validator| !validator.bls_key.is_placeholder())
        .map(|validator| (validator.bls_key.clone(), validator.bft_weight))
        .collect()
}

/// Check whether a receiving chain that trusts the validator set with `last_validators_hash` can trust
/// `aggregate_commit`.
///
/// The commit is signed by the validator set that the header at `aggregate_commit.height - 1` names.
/// If that is the trusted set, trust is immediate. Otherwise every signer must be a member of the
/// trusted set, given as `bls_key_to_weight`, and the signers' trusted weights must reach
/// `last_certificate_threshold`.
///
/// Returns `Ok(false)` for an untrusted signer. Returns an error only if some history is missing.
pub fn check_chain_of_trust(
    last_validators_hash: &CryptoHash,
    bls_key_to_weight: &HashMap<BlsKey, BFTWeight>,
    last_certificate_threshold: BFTWeight,
    aggregate_commit: &AggregateCommit,
    history: &impl ChainHistory,
) -> Result<bool, BFTError> {
    let parent_height = aggregate_commit
        .height
        .checked_sub(1)
        .ok_or(BFTError::MissingBlockHeader {
            height: aggregate_commit.height,
        })?;
    let parent = history
        .block_header(parent_height)
        .ok_or(BFTError::MissingBlockHeader {
            height: parent_height,
        })?;

    if &parent.validators_hash == last_validators_hash {
        return Ok(true);
    }

    let signing_set = history
        .validators_data(&parent.validators_hash)
        .ok_or(BFTError::MissingValidatorSnapshot {
            validators_hash: parent.validators_hash,
        })?;
    let signing_validators = validators_in_bls_key_order(&signing_set.validators);

    let mut trusted_weight = BFTWeight::zero();
    for index in aggregate_commit.aggregation_bits.set_indices() {
        let Some(signer) = signing_validators.get(index) else {
            continue;
        };
        match bls_key_to_weight.get(&signer.bls_key) {
            Some(weight) => trusted_weight += *weight,
            None => return Ok(false),
        }
    }

    Ok(trusted_weight >= last_certificate_threshold)
}

/// Find the certificate of the highest certified block above `last_certificate` that a receiving chain
/// which accepted `last_certificate` can trust.
///
/// Heights are scanned from `bft_heights.max_height_certified` down to `last_certificate.height + 1`.
/// Heights without an aggregate commit in `history` are skipped, as are commits that fail the chain of
/// trust. Returns `Ok(None)` if no height qualifies.
pub fn next_certificate(
    last_certificate: &LastCertificate,
    bft_heights: &BFTHeights,
    history: &impl ChainHistory,
) -> Result<Option<Certificate>, BFTError> {
    if bft_heights.max_height_certified <= last_certificate.height {
        return Ok(None);
    }

    let trusted_set = history
        .validators_data(&last_certificate.validators_hash)
        .ok_or(BFTError::MissingValidatorSnapshot {
            validators_hash: last_certificate.validators_hash,
        })?;
    let bls_key_to_weight = bls_key_to_weight(&trusted_set);

    let lowest = last_certificate.height.int() + 1;
    for height in (lowest..=bft_heights.max_height_certified.int()).rev() {
        let height = BlockHeight::new(height);
        let Some(aggregate_commit) = history.aggregate_commit(height) else {
            continue;
        };
        let trusted = check_chain_of_trust(
            &last_certificate.validators_hash,
            &bls_key_to_weight,
            trusted_set.certificate_threshold,
            &aggregate_commit,
            history,
        )?;
        if trusted {
            let header = history
                .block_header(height)
                .ok_or(BFTError::MissingBlockHeader { height })?;
            return certificate_from_aggregate_commit(&aggregate_commit, &header).map(Some);
        }
    }

    Ok(None)
}

/// Check that `aggregate_commit` certifies `header`: its signers, taken from `validators_data`, carry at
/// least the certificate threshold, and `verifier` accepts the aggregate signature over the unsigned
/// certificate of `header`.
pub fn verify_aggregate_commit(
    validators_data: &ValidatorsData,
    aggregate_commit: &AggregateCommit,
    header: &BlockHeader,
    verifier: &dyn AggregateSignatureVerifier,
) -> Result<bool, BFTError> {
    let certificate = certificate_from_aggregate_commit(aggregate_commit, header)?;
    if signers_weight(&validators_data.validators, &certificate.aggregation_bits)
        < validators_data.certificate_threshold
    {
        return Ok(false);
    }

    let keys: Vec<BlsKey> = validators_in_bls_key_order(&validators_data.validators)
        .into_iter()
        .map(|validator| validator.bls_key)
        .collect();
    Ok(verifier.verify_aggregate_signature(
        &keys,
        &certificate.aggregation_bits,
        &certificate.unsigned().signing_bytes(),
        &certificate.signature,
    ))
}
