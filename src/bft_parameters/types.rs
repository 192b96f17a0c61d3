/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to the BFT parameters store.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::{Address, BFTWeight, BlockHeight, BlsKey, CryptoHash},
    validators::{self, Validator, ValidatorsData},
};

/// Validator set and weight thresholds that apply from some height onwards.
///
/// ## Invariants
///
/// With `W` the aggregate weight of `validators`:
/// 1. `prevote_threshold == floor(2W/3) + 1`.
/// 2. `floor(W/3) + 1 <= precommit_threshold <= W`, and likewise for `certificate_threshold`.
/// 3. `validators` are sorted in ascending order of address, and no two share an address or a
///    non-placeholder BLS key.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BFTParameters {
    pub prevote_threshold: BFTWeight,
    pub precommit_threshold: BFTWeight,
    pub certificate_threshold: BFTWeight,
    pub validators: Vec<Validator>,
    pub validators_hash: CryptoHash,
}

impl BFTParameters {
    /// Get the sum of the weights of all validators.
    pub fn aggregate_weight(&self) -> BFTWeight {
        let mut total = BFTWeight::zero();
        for validator in &self.validators {
            total += validator.bft_weight
        }
        total
    }

    /// Get the weight of the validator with `address`, if it is in the set.
    pub fn weight_of(&self, address: &Address) -> Option<BFTWeight> {
        validators::weight_of(&self.validators, address)
    }

    /// Get the BLS keys of all validators, in ascending order. This is the key list that
    /// [`AggregationBits`](crate::types::data_types::AggregationBits) index into.
    pub fn sorted_bls_keys(&self) -> Vec<BlsKey> {
        validators::validators_in_bls_key_order(&self.validators)
            .into_iter()
            .map(|validator| validator.bls_key)
            .collect()
    }

    /// Create the historical snapshot of these parameters, as active from `height`.
    pub fn validators_data(&self, height: BlockHeight) -> ValidatorsData {
        ValidatorsData {
            validators: self.validators.clone(),
            certificate_threshold: self.certificate_threshold,
            validators_hash: self.validators_hash,
            height,
        }
    }
}

/// Borsh-encoded preimage of a validators hash.
#[derive(BorshSerialize)]
pub(crate) struct ValidatorsHashInput {
    /// `(bls_key, bft_weight)` pairs in ascending order of BLS key.
    pub(crate) active_validators: Vec<(BlsKey, BFTWeight)>,
    pub(crate) certificate_threshold: BFTWeight,
}

/// Summary of a successful, non-idempotent call to `set_bft_parameters`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BFTParametersUpdate {
    /// Height from which the new parameters apply.
    pub height: BlockHeight,
    pub validators_hash: CryptoHash,
}
