/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each consensus state variable is stored in the user-provided
//! key-value store.
//!
//! # List of State Variables
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |BFT Parameters|[`BlockHeight`](crate::types::data_types::BlockHeight) -> [`BFTParameters`](crate::bft_parameters::types::BFTParameters)|Validator set and thresholds, keyed by the first height they apply to.|
//! |BFT Votes|[`BFTVotes`](crate::bft_votes::types::BFTVotes)|The votes ledger: watermarks, the window of recent block infos, and the active validator index.|
//! |Validators Data|[`CryptoHash`](crate::types::data_types::CryptoHash) -> [`ValidatorsData`](crate::types::validators::ValidatorsData)|Snapshot of every validator set, keyed by its validators hash.|
//! |Generator Keys|[`BlockHeight`](crate::types::data_types::BlockHeight) -> [`Generators`](crate::generators::Generators)|Generator addresses and keys, keyed by the first height they apply to.|
//!
//! # Persistence of state variables
//!
//! Each variable is stored as **Borsh-serialized values**.
//!
//! "Single values" (BFT Votes) are stored in one-byte, constant keys defined in constants sharing the
//! variable's name.
//!
//! Mappings of the form "`A` -> `B`" are stored in multiple keys, each key being the concatenation of a
//! one-byte prefix sharing the variable's name and the encoding of an instance of `A`. Heights are
//! encoded as **4-byte big-endian** integers (not Borsh) so that iterating over a prefix in key order
//! visits heights in ascending order. Hashes are encoded as their 32 raw bytes.

use crate::types::data_types::{BlockHeight, CryptoHash};

// State variables
pub const BFT_PARAMETERS: [u8; 1] = [0];
pub const BFT_VOTES: [u8; 1] = [1];
pub const VALIDATORS_DATA: [u8; 1] = [2];
pub const GENERATOR_KEYS: [u8; 1] = [3];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

/// Key of the BFT parameters that start applying at `height`.
pub fn bft_parameters_key(height: BlockHeight) -> Vec<u8> {
    concat(&BFT_PARAMETERS, &height.to_be_bytes())
}

/// Key of the validators data with `validators_hash`.
pub fn validators_data_key(validators_hash: &CryptoHash) -> Vec<u8> {
    concat(&VALIDATORS_DATA, &validators_hash.bytes())
}

/// Key of the generator keys that start applying at `height`.
pub fn generator_keys_key(height: BlockHeight) -> Vec<u8> {
    concat(&GENERATOR_KEYS, &height.to_be_bytes())
}

/// Read the height back out of a height-keyed mapping's `key`. Returns `None` if `key` is not a one-byte
/// prefix followed by a 4-byte height.
pub fn height_from_key(key: &[u8]) -> Option<BlockHeight> {
    let height_bytes: [u8; 4] = key.get(1..)?.try_into().ok()?;
    Some(BlockHeight::from_be_bytes(height_bytes))
}
