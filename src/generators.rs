/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Round-robin selection of the validator that may generate the block of a given slot.
//!
//! # Slots
//!
//! Time is divided into slots of `block_time` seconds each, counted from the Unix Epoch. Exactly one
//! validator is allowed to generate a block in each slot: the validator at index
//! `slot_number % count` among the validators with non-zero weight in the BFT parameters of the
//! block's height, in address order.
//!
//! # Generator keys
//!
//! Whenever the BFT parameters change, the generator keys of the validators with non-zero weight are
//! stored alongside them, keyed by the same height. Blocks are signed with these Ed25519 keys, and
//! [`verify_block_generator`] checks both the slot assignment and the signature.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    bft_parameters::implementation::bft_parameters,
    errors::BFTError,
    state::{kv_store::KVGet, repositories::GeneratorKeysRepository},
    types::{
        block::BlockHeader,
        data_types::{Address, BlockHeight, GeneratorKey, SlotNumber, Timestamp},
        validators::Validator,
    },
};

/// A validator that is allowed to generate blocks, together with the key it signs them with.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Generator {
    pub address: Address,
    pub generator_key: GeneratorKey,
}

/// Generator key index record: every generator of a validator set, in address order.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Generators {
    pub generators: Vec<Generator>,
}

impl Generators {
    /// Get the generator key of the validator with `address`.
    pub fn generator_key(&self, address: &Address) -> Option<GeneratorKey> {
        self.generators
            .iter()
            .find(|generator| &generator.address == address)
            .map(|generator| generator.generator_key)
    }
}

/// Get the slot that `timestamp` falls into.
///
/// `block_time` is in seconds. A `block_time` of zero is treated as one second.
pub fn slot_number(timestamp: Timestamp, block_time: u32) -> SlotNumber {
    SlotNumber::new((timestamp.secs() / block_time.max(1)) as u64)
}

/// Select the generator of `slot` among `validators`, which must be in address order.
///
/// Validators with zero weight are never selected. Returns `None` if no validator has non-zero weight.
pub fn select_generator(slot: SlotNumber, validators: &[Validator]) -> Option<&Validator> {
    let eligible: Vec<&Validator> = validators
        .iter()
        .filter(|validator| !validator.bft_weight.is_zero())
        .collect();
    if eligible.is_empty() {
        return None;
    }
    let index = slot.int() % eligible.len() as u64;
    Some(eligible[index as usize])
}

/// Get the validator that is allowed to generate a block at `height` with `timestamp`.
pub fn generator_at(
    kv: &impl KVGet,
    height: BlockHeight,
    timestamp: Timestamp,
    block_time: u32,
) -> Result<Generator, BFTError> {
    let bft_parameters = bft_parameters(kv, height)?;
    let validator = select_generator(slot_number(timestamp, block_time), &bft_parameters.validators)
        .ok_or(BFTError::ParameterNotFound { height })?;
    Ok(Generator {
        address: validator.address,
        generator_key: validator.generator_key,
    })
}

/// Get the generator keys that apply at `height`.
pub fn generator_keys(kv: &impl KVGet, height: BlockHeight) -> Result<Generators, BFTError> {
    kv.effective_generator_keys(height)?
        .ok_or(BFTError::ParameterNotFound { height })
}

/// Check whether `header` was generated by the validator assigned to its slot, and is signed with that
/// validator's generator key.
pub fn verify_block_generator(
    kv: &impl KVGet,
    header: &BlockHeader,
    block_time: u32,
) -> Result<bool, BFTError> {
    let expected = generator_at(kv, header.height, header.timestamp, block_time)?;
    if expected.address != header.generator_address {
        return Ok(false);
    }
    let generator_key = generator_keys(kv, header.height)?
        .generator_key(&header.generator_address)
        .unwrap_or(expected.generator_key);
    Ok(header.is_signed_by(&generator_key))
}
