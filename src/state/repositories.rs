/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed read access to each kind of record in the consensus state.
//!
//! Every repository trait is implemented for every [`KVGet`], so the same methods are available on a
//! [`ConsensusState`](super::consensus_state::ConsensusState), on its snapshots, and on any user
//! store.

use borsh::BorshDeserialize;

use crate::{
    bft_parameters::types::BFTParameters,
    bft_votes::types::BFTVotes,
    generators::Generators,
    types::{
        data_types::{BlockHeight, CryptoHash},
        validators::ValidatorsData,
    },
};

use super::{
    kv_store::{get_deserialized, KVGet, KVGetError, Key},
    variables::{self, height_from_key},
};

/// Decode every record of a height-keyed mapping stored under `prefix`, in ascending order of height.
fn height_keyed_records<T: BorshDeserialize>(
    kv: &(impl KVGet + ?Sized),
    prefix: &[u8],
    key: fn(BlockHeight) -> Key,
) -> Result<Vec<(BlockHeight, T)>, KVGetError> {
    kv.iterate_prefix(prefix)
        .into_iter()
        .map(|(raw_key, bytes)| {
            let height =
                height_from_key(&raw_key).ok_or(KVGetError::MalformedKey { raw_key: raw_key.clone() })?;
            let value = T::deserialize(&mut bytes.as_slice()).map_err(|err| {
                KVGetError::DeserializeValueError {
                    key: key(height),
                    source: err,
                }
            })?;
            Ok((height, value))
        })
        .collect()
}

/// Read access to the BFT Parameters variable.
pub trait ParametersRepository: KVGet {
    /// Get the BFT parameters stored with exactly `height` as key.
    fn bft_parameters_at(&self, height: BlockHeight) -> Result<Option<BFTParameters>, KVGetError> {
        get_deserialized(
            self,
            &variables::bft_parameters_key(height),
            Key::BFTParameters { height },
        )
    }

    /// Get every stored BFT parameters record, in ascending order of key.
    fn bft_parameters_records(&self) -> Result<Vec<(BlockHeight, BFTParameters)>, KVGetError> {
        height_keyed_records(self, &variables::BFT_PARAMETERS, |height| Key::BFTParameters {
            height,
        })
    }

    /// Get the record with the greatest key that is `<= height`, together with that key.
    fn effective_bft_parameters(
        &self,
        height: BlockHeight,
    ) -> Result<Option<(BlockHeight, BFTParameters)>, KVGetError> {
        Ok(self
            .bft_parameters_records()?
            .into_iter()
            .rev()
            .find(|(key, _)| *key <= height))
    }

    /// Get the smallest key that is `> height`.
    fn next_bft_parameters_height(&self, height: BlockHeight) -> Result<Option<BlockHeight>, KVGetError> {
        Ok(self
            .iterate_prefix(&variables::BFT_PARAMETERS)
            .iter()
            .filter_map(|(raw_key, _)| height_from_key(raw_key))
            .find(|key| *key > height))
    }
}

impl<T: KVGet + ?Sized> ParametersRepository for T {}

/// Read access to the BFT Votes variable.
pub trait VotesRepository: KVGet {
    /// Get the votes ledger. Fails if the ledger has not been initialized.
    fn bft_votes(&self) -> Result<BFTVotes, KVGetError> {
        get_deserialized(self, &variables::BFT_VOTES, Key::BFTVotes)?
            .ok_or(KVGetError::ValueExpectedButNotFound { key: Key::BFTVotes })
    }
}

impl<T: KVGet + ?Sized> VotesRepository for T {}

/// Read access to the Validators Data variable.
pub trait ValidatorSnapshotRepository: KVGet {
    /// Get the snapshot of the validator set whose validators hash is `validators_hash`.
    fn validators_data(&self, validators_hash: &CryptoHash) -> Result<Option<ValidatorsData>, KVGetError> {
        get_deserialized(
            self,
            &variables::validators_data_key(validators_hash),
            Key::ValidatorsData {
                validators_hash: *validators_hash,
            },
        )
    }

    /// Get every stored snapshot, in ascending order of the height it became active at.
    fn all_validators_data(&self) -> Result<Vec<ValidatorsData>, KVGetError> {
        let mut all = self
            .iterate_prefix(&variables::VALIDATORS_DATA)
            .into_iter()
            .map(|(raw_key, bytes)| {
                ValidatorsData::deserialize(&mut bytes.as_slice()).map_err(|err| {
                    match <[u8; 32]>::try_from(&raw_key[1..]) {
                        Ok(hash) => KVGetError::DeserializeValueError {
                            key: Key::ValidatorsData {
                                validators_hash: CryptoHash::new(hash),
                            },
                            source: err,
                        },
                        Err(_) => KVGetError::MalformedKey { raw_key },
                    }
                })
            })
            .collect::<Result<Vec<ValidatorsData>, KVGetError>>()?;
        all.sort_by_key(|data| data.height);
        Ok(all)
    }
}

impl<T: KVGet + ?Sized> ValidatorSnapshotRepository for T {}

/// Read access to the Generator Keys variable.
pub trait GeneratorKeysRepository: KVGet {
    /// Get every stored generator keys record, in ascending order of key.
    fn generator_keys_records(&self) -> Result<Vec<(BlockHeight, Generators)>, KVGetError> {
        height_keyed_records(self, &variables::GENERATOR_KEYS, |height| Key::GeneratorKeys {
            height,
        })
    }

    /// Get the generator keys record with the greatest key that is `<= height`.
    fn effective_generator_keys(&self, height: BlockHeight) -> Result<Option<Generators>, KVGetError> {
        Ok(self
            .generator_keys_records()?
            .into_iter()
            .rev()
            .find(|(key, _)| *key <= height)
            .map(|(_, generators)| generators))
    }
}

impl<T: KVGet + ?Sized> GeneratorKeysRepository for T {}
