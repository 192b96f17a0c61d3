/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Typed writes into the consensus state.
//!
//! [`ConsensusWriteBatch`] forms keys and serializes values, then calls the user's [`WriteBatch`]. All
//! changes made in response to one call of the [BFT module](crate::bft_module) are collected into one
//! `ConsensusWriteBatch` and written atomically, so the parameters store and the votes ledger never
//! disagree.

use borsh::BorshSerialize;

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
    kv_store::{KVSetError, Key, WriteBatch},
    variables,
};

pub struct ConsensusWriteBatch<W: WriteBatch>(pub(super) W);

impl<W: WriteBatch> ConsensusWriteBatch<W> {
    pub fn new() -> ConsensusWriteBatch<W> {
        ConsensusWriteBatch(W::new())
    }

    /* ↓↓↓ BFT Parameters ↓↓↓ */

    pub fn set_bft_parameters(
        &mut self,
        height: BlockHeight,
        bft_parameters: &BFTParameters,
    ) -> Result<(), KVSetError> {
        self.0.set(
            &variables::bft_parameters_key(height),
            &bft_parameters
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BFTParameters { height },
                    source: err,
                })?,
        );
        Ok(())
    }

    pub fn delete_bft_parameters(&mut self, height: BlockHeight) {
        self.0.delete(&variables::bft_parameters_key(height))
    }

    /* ↓↓↓ BFT Votes ↓↓↓ */

    pub fn set_bft_votes(&mut self, bft_votes: &BFTVotes) -> Result<(), KVSetError> {
        self.0.set(
            &variables::BFT_VOTES,
            &bft_votes
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::BFTVotes,
                    source: err,
                })?,
        );
        Ok(())
    }

    /* ↓↓↓ Validators Data ↓↓↓ */

    pub fn set_validators_data(&mut self, validators_data: &ValidatorsData) -> Result<(), KVSetError> {
        self.0.set(
            &variables::validators_data_key(&validators_data.validators_hash),
            &validators_data
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::ValidatorsData {
                        validators_hash: validators_data.validators_hash,
                    },
                    source: err,
                })?,
        );
        Ok(())
    }

    pub fn delete_validators_data(&mut self, validators_hash: &CryptoHash) {
        self.0.delete(&variables::validators_data_key(validators_hash))
    }

    /* ↓↓↓ Generator Keys ↓↓↓ */

    pub fn set_generator_keys(
        &mut self,
        height: BlockHeight,
        generators: &Generators,
    ) -> Result<(), KVSetError> {
        self.0.set(
            &variables::generator_keys_key(height),
            &generators
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::GeneratorKeys { height },
                    source: err,
                })?,
        );
        Ok(())
    }

    pub fn delete_generator_keys(&mut self, height: BlockHeight) {
        self.0.delete(&variables::generator_keys_key(height))
    }
}

impl<W: WriteBatch> Default for ConsensusWriteBatch<W> {
    fn default() -> Self {
        Self::new()
    }
}
