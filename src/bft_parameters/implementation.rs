/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads, validated writes, and pruning of the BFT parameters store.

use borsh::BorshSerialize;

use crate::{
    errors::{BFTError, InvalidValidatorSetReason},
    generators::{Generator, Generators},
    state::{
        kv_store::{KVGet, WriteBatch},
        repositories::{
            GeneratorKeysRepository, ParametersRepository, ValidatorSnapshotRepository, VotesRepository,
        },
        write_batch::ConsensusWriteBatch,
    },
    types::{
        crypto_primitives::{hash, verifying_key},
        data_types::{BFTWeight, BlockHeight, CryptoHash},
        validators::{
            aggregate_weight, has_duplicate_addresses, has_duplicate_bls_keys, sort_validators_by_address,
            validators_in_bls_key_order, Validator, ValidatorsData,
        },
    },
};

use super::types::{BFTParameters, BFTParametersUpdate, ValidatorsHashInput};

/// Get the BFT parameters that apply at `height`: the record with the greatest key `<= height`.
pub fn bft_parameters(kv: &impl KVGet, height: BlockHeight) -> Result<BFTParameters, BFTError> {
    kv.effective_bft_parameters(height)?
        .map(|(_, bft_parameters)| bft_parameters)
        .ok_or(BFTError::ParameterNotFound { height })
}

/// Check whether a record is stored with exactly `height` as key.
pub fn exist_bft_parameters(kv: &impl KVGet, height: BlockHeight) -> Result<bool, BFTError> {
    Ok(kv.bft_parameters_at(height)?.is_some())
}

/// Get the smallest key of a stored record that is strictly greater than `height`.
pub fn next_height_bft_parameters(kv: &impl KVGet, height: BlockHeight) -> Result<BlockHeight, BFTError> {
    kv.next_bft_parameters_height(height)?
        .ok_or(BFTError::ParameterNotFound { height })
}

/// Compute the validators hash: the SHA-256 of the BLS-key-sorted `(bls_key, bft_weight)` pairs of
/// `validators`, together with `certificate_threshold`.
pub fn compute_validators_hash(validators: &[Validator], certificate_threshold: BFTWeight) -> CryptoHash {
    let input = ValidatorsHashInput {
        active_validators: validators_in_bls_key_order(validators)
            .into_iter()
            .map(|validator| (validator.bls_key, validator.bft_weight))
            .collect(),
        certificate_threshold,
    };
    // Safety: serializing into a Vec is infallible.
    hash(&input.try_to_vec().unwrap())
}

/// Compute the prevote threshold for an aggregate weight `w`: `floor(2w/3) + 1`.
pub fn prevote_threshold(aggregate_weight: BFTWeight) -> BFTWeight {
    BFTWeight::new(((aggregate_weight.int() as u128 * 2) / 3) as u64 + 1)
}

/// Check whether `threshold` lies within `[floor(w/3) + 1, w]` for an aggregate weight `w`.
pub fn is_threshold_in_range(threshold: BFTWeight, aggregate_weight: BFTWeight) -> bool {
    let minimum = aggregate_weight.int() / 3 + 1;
    minimum <= threshold.int() && threshold <= aggregate_weight
}

/// Check `validators` and the two thresholds against the invariants of [`BFTParameters`], returning the
/// aggregate weight of `validators` if they hold.
///
/// `validators` must already be sorted by address.
pub fn validate_validator_set(
    precommit_threshold: BFTWeight,
    certificate_threshold: BFTWeight,
    validators: &[Validator],
    batch_size: u32,
) -> Result<BFTWeight, InvalidValidatorSetReason> {
    if validators.len() > batch_size as usize {
        return Err(InvalidValidatorSetReason::TooManyValidators {
            count: validators.len(),
            batch_size,
        });
    }

    let aggregate_weight =
        aggregate_weight(validators).ok_or(InvalidValidatorSetReason::AggregateWeightOverflow)?;

    if !is_threshold_in_range(precommit_threshold, aggregate_weight) {
        return Err(InvalidValidatorSetReason::InvalidPrecommitThreshold {
            threshold: precommit_threshold,
            aggregate_weight,
        });
    }

    if !is_threshold_in_range(certificate_threshold, aggregate_weight) {
        return Err(InvalidValidatorSetReason::InvalidCertificateThreshold {
            threshold: certificate_threshold,
            aggregate_weight,
        });
    }

    if has_duplicate_addresses(validators) {
        return Err(InvalidValidatorSetReason::DuplicateAddress);
    }

    if has_duplicate_bls_keys(validators) {
        return Err(InvalidValidatorSetReason::DuplicateBlsKey);
    }

    if let Some(validator) = validators
        .iter()
        .find(|validator| verifying_key(&validator.generator_key).is_err())
    {
        return Err(InvalidValidatorSetReason::InvalidGeneratorKey {
            address: validator.address,
        });
    }

    Ok(aggregate_weight)
}

/// Validate and stage a new validator set and thresholds into `wb`.
///
/// The new parameters apply from [`BFTVotes::next_height`](crate::bft_votes::types::BFTVotes::next_height).
/// Along with the parameters, this stages the validators data snapshot, the generator keys, and the
/// updated active validator index of the votes ledger.
///
/// Returns `Ok(None)` without staging anything if the validator set and both thresholds are identical to
/// those already in effect at that height. A record already stored at that height is replaced.
pub fn set_bft_parameters<W: WriteBatch>(
    kv: &impl KVGet,
    wb: &mut ConsensusWriteBatch<W>,
    batch_size: u32,
    precommit_threshold: BFTWeight,
    certificate_threshold: BFTWeight,
    mut validators: Vec<Validator>,
) -> Result<Option<BFTParametersUpdate>, BFTError> {
    sort_validators_by_address(&mut validators);
    let aggregate_weight =
        validate_validator_set(precommit_threshold, certificate_threshold, &validators, batch_size)?;

    let mut bft_votes = kv.bft_votes()?;
    let next_height = bft_votes.next_height()?;

    let current = kv.effective_bft_parameters(next_height)?;
    if let Some((_, current)) = &current {
        if current.validators == validators
            && current.precommit_threshold == precommit_threshold
            && current.certificate_threshold == certificate_threshold
        {
            return Ok(None);
        }
    }

    let validators_hash = compute_validators_hash(&validators, certificate_threshold);
    let bft_parameters = BFTParameters {
        prevote_threshold: prevote_threshold(aggregate_weight),
        precommit_threshold,
        certificate_threshold,
        validators,
        validators_hash,
    };

    let outgoing = match next_height.checked_sub(1) {
        Some(previous_height) => kv
            .effective_bft_parameters(previous_height)?
            .map(|(_, previous)| previous.validators)
            .unwrap_or_default(),
        None => Vec::new(),
    };
    bft_votes.update_active_validators(next_height, &bft_parameters.validators, &outgoing);

    let generators = Generators {
        generators: bft_parameters
            .validators
            .iter()
            .filter(|validator| !validator.bft_weight.is_zero())
            .map(|validator| Generator {
                address: validator.address,
                generator_key: validator.generator_key,
            })
            .collect(),
    };

    // A record already set at `next_height` is replaced. Its snapshot goes with it, unless another record
    // still names the same validator set.
    if let Some(replaced) = kv.bft_parameters_at(next_height)? {
        let still_named = replaced.validators_hash == validators_hash
            || kv.bft_parameters_records()?.iter().any(|(key, other)| {
                *key != next_height && other.validators_hash == replaced.validators_hash
            });
        if !still_named {
            wb.delete_validators_data(&replaced.validators_hash);
        }
    }

    wb.set_bft_parameters(next_height, &bft_parameters)?;
    wb.set_validators_data(&bft_parameters.validators_data(next_height))?;
    wb.set_generator_keys(next_height, &generators)?;
    wb.set_bft_votes(&bft_votes)?;

    Ok(Some(BFTParametersUpdate {
        height: next_height,
        validators_hash,
    }))
}

/// Stage the deletion of every BFT parameters and generator keys record with key `<= height`, except the
/// one with the greatest such key, which still applies at `height`.
///
/// Returns the keys of the deleted BFT parameters records, in ascending order.
pub fn prune_bft_parameters<W: WriteBatch>(
    kv: &impl KVGet,
    wb: &mut ConsensusWriteBatch<W>,
    height: BlockHeight,
) -> Result<Vec<BlockHeight>, BFTError> {
    let mut stale_parameters: Vec<BlockHeight> = kv
        .bft_parameters_records()?
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| *key <= height)
        .collect();
    stale_parameters.pop();
    for key in &stale_parameters {
        wb.delete_bft_parameters(*key);
    }

    let mut stale_generator_keys: Vec<BlockHeight> = kv
        .generator_keys_records()?
        .into_iter()
        .map(|(key, _)| key)
        .filter(|key| *key <= height)
        .collect();
    stale_generator_keys.pop();
    for key in stale_generator_keys {
        wb.delete_generator_keys(key);
    }

    Ok(stale_parameters)
}

/// Stage the deletion of every validators data snapshot that stopped being active before `height`. The
/// snapshot of the BFT parameters in effect at `height` is kept, as are the snapshots of every later
/// parameters record.
///
/// Returns the validators hashes of the deleted snapshots.
pub fn prune_validator_snapshots<W: WriteBatch>(
    kv: &impl KVGet,
    wb: &mut ConsensusWriteBatch<W>,
    height: BlockHeight,
) -> Result<Vec<CryptoHash>, BFTError> {
    let records = kv.bft_parameters_records()?;
    let mut in_use: Vec<CryptoHash> = records
        .iter()
        .filter(|(key, _)| *key > height)
        .map(|(_, bft_parameters)| bft_parameters.validators_hash)
        .collect();

    let mut candidates: Vec<ValidatorsData> = kv
        .all_validators_data()?
        .into_iter()
        .filter(|data| data.height <= height)
        .collect();
    match records.iter().rev().find(|(key, _)| *key <= height) {
        Some((_, effective)) => in_use.push(effective.validators_hash),
        // The record in effect was already pruned: the newest snapshot at or below `height` stands in
        // for it.
        None => {
            if let Some(newest) = candidates.pop() {
                in_use.push(newest.validators_hash);
            }
        }
    }

    candidates.retain(|data| !in_use.contains(&data.validators_hash));
    let stale: Vec<CryptoHash> = candidates.into_iter().map(|data| data.validators_hash).collect();
    for validators_hash in &stale {
        wb.delete_validators_data(validators_hash);
    }
    Ok(stale)
}
