/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Validators, and pure functions for ordering validators and doing arithmetic on their weights.
//!
//! ## Orderings of validators
//!
//! Two orderings of a validator list are used throughout the crate:
//! 1. **Address order**: ascending byte order of [`Address`]. This is the order validators are stored
//!    in inside [`BFTParameters`](crate::bft_parameters::types::BFTParameters), and the order the
//!    [generator selector](crate::generators) rotates through.
//! 2. **BLS key order**: ascending byte order of [`BlsKey`]. This is the order that
//!    [`AggregationBits`] index into, and the order the validators hash commits to.

use std::collections::HashSet;

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{Address, AggregationBits, BFTWeight, BlockHeight, BlsKey, CryptoHash, GeneratorKey};

/// A validator that takes part in the BFT protocol.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Validator {
    pub address: Address,
    pub generator_key: GeneratorKey,
    pub bls_key: BlsKey,
    pub bft_weight: BFTWeight,
}

/// Sort `validators` in ascending order of their addresses.
pub fn sort_validators_by_address(validators: &mut [Validator]) {
    validators.sort_by(|a, b| a.address.cmp(&b.address))
}

/// Sort `validators` in ascending order of their BLS keys.
pub fn sort_validators_by_bls_key(validators: &mut [Validator]) {
    validators.sort_by(|a, b| a.bls_key.cmp(&b.bls_key))
}

/// Get a copy of `validators` in BLS key order.
pub fn validators_in_bls_key_order(validators: &[Validator]) -> Vec<Validator> {
    let mut sorted = validators.to_vec();
    sort_validators_by_bls_key(&mut sorted);
    sorted
}

/// Sum the weights of `validators`. Returns `None` if the sum overflows.
pub fn aggregate_weight(validators: &[Validator]) -> Option<BFTWeight> {
    validators
        .iter()
        .try_fold(BFTWeight::zero(), |sum, validator| sum.checked_add(validator.bft_weight))
}

/// Check whether two validators in `validators` share the same address.
pub fn has_duplicate_addresses(validators: &[Validator]) -> bool {
    let mut seen = HashSet::with_capacity(validators.len());
    !validators.iter().all(|validator| seen.insert(validator.address))
}

/// Check whether two validators in `validators` share the same BLS key. Placeholder keys are not
/// counted.
pub fn has_duplicate_bls_keys(validators: &[Validator]) -> bool {
    let mut seen = HashSet::with_capacity(validators.len());
    !validators
        .iter()
        .filter(|validator| !validator.bls_key.is_placeholder())
        .all(|validator| seen.insert(&validator.bls_key))
}

/// Get the weight of the validator with `address` in `validators`, if any.
pub fn weight_of(validators: &[Validator], address: &Address) -> Option<BFTWeight> {
    validators
        .iter()
        .find(|validator| &validator.address == address)
        .map(|validator| validator.bft_weight)
}

/// Sum the weights of the validators that `aggregation_bits` marks as signers.
///
/// `aggregation_bits` is interpreted over `validators` in BLS key order, whatever order `validators`
/// is passed in.
pub fn signers_weight(validators: &[Validator], aggregation_bits: &AggregationBits) -> BFTWeight {
    let mut weight = BFTWeight::zero();
    for (i, validator) in validators_in_bls_key_order(validators).iter().enumerate() {
        if aggregation_bits.is_set(i) {
            weight += validator.bft_weight
        }
    }
    weight
}

/// Historical record of a validator set, addressed by its validators hash.
///
/// One is written every time the BFT parameters change, and is never mutated afterwards. The
/// certification engine reads these to learn the BLS keys and weights of past validator sets.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorsData {
    /// Validators in address order.
    pub validators: Vec<Validator>,
    pub certificate_threshold: BFTWeight,
    pub validators_hash: CryptoHash,
    /// Height from which this validator set is active.
    pub height: BlockHeight,
}
