/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to the BFT votes ledger.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    errors::BFTError,
    types::{
        block::BlockHeader,
        data_types::{Address, BFTWeight, BlockHeight},
        validators::Validator,
    },
};

/// Per-block information recorded by the votes ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockBFTInfo {
    pub height: BlockHeight,
    pub generator_address: Address,
    pub max_height_generated: BlockHeight,
    pub max_height_prevoted: BlockHeight,
    pub prevote_weight: BFTWeight,
    pub precommit_weight: BFTWeight,
}

impl From<&BlockHeader> for BlockBFTInfo {
    fn from(header: &BlockHeader) -> Self {
        BlockBFTInfo {
            height: header.height,
            generator_address: header.generator_address,
            max_height_generated: header.max_height_generated,
            max_height_prevoted: header.max_height_prevoted,
            prevote_weight: BFTWeight::zero(),
            precommit_weight: BFTWeight::zero(),
        }
    }
}

/// Voting activity of one validator.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ActiveValidatorVoteInfo {
    pub address: Address,
    /// The first height at which the validator was active.
    pub min_active_height: BlockHeight,
    /// The largest height the validator has precommitted. A validator never precommits twice for the same
    /// height.
    pub largest_height_precommit: BlockHeight,
}

/// The votes ledger. Stored as a single record.
///
/// ## Invariants
///
/// 1. `max_height_certified <= max_height_precommitted <= max_height_prevoted`.
/// 2. `block_bft_infos` is ordered newest first, with consecutive heights.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BFTVotes {
    pub max_height_prevoted: BlockHeight,
    pub max_height_precommitted: BlockHeight,
    pub max_height_certified: BlockHeight,
    pub block_bft_infos: Vec<BlockBFTInfo>,
    pub active_validators_vote_info: Vec<ActiveValidatorVoteInfo>,
}

impl BFTVotes {
    /// The ledger right after the genesis block at `genesis_height`.
    pub fn genesis(genesis_height: BlockHeight) -> Self {
        BFTVotes {
            max_height_prevoted: genesis_height,
            max_height_precommitted: genesis_height,
            max_height_certified: genesis_height,
            block_bft_infos: Vec::new(),
            active_validators_vote_info: Vec::new(),
        }
    }

    /// Get the three watermarks.
    pub fn heights(&self) -> BFTHeights {
        BFTHeights {
            max_height_prevoted: self.max_height_prevoted,
            max_height_precommitted: self.max_height_precommitted,
            max_height_certified: self.max_height_certified,
        }
    }

    /// Get the height that BFT parameters set now would start applying at: one past the newest block in
    /// the ledger, or one past `max_height_prevoted` if the ledger has no blocks yet.
    ///
    /// Fails with [`BFTError::InvalidHeightReference`] if that height is not representable.
    pub fn next_height(&self) -> Result<BlockHeight, BFTError> {
        let newest = match self.block_bft_infos.first() {
            Some(newest) => newest.height,
            None => self.max_height_prevoted,
        };
        newest.checked_add(1).ok_or(BFTError::InvalidHeightReference {
            height: newest,
            expected: newest,
        })
    }

    /// Check that `header` directly follows the newest block in the ledger. Any header is accepted while the
    /// ledger has no blocks.
    pub(crate) fn check_follows_newest(&self, header: &BlockHeader) -> Result<(), BFTError> {
        let Some(newest) = self.block_bft_infos.first() else {
            return Ok(());
        };
        match newest.height.checked_add(1) {
            Some(expected) if expected == header.height => Ok(()),
            Some(expected) => Err(BFTError::InvalidHeightReference {
                height: header.height,
                expected,
            }),
            None => Err(BFTError::InvalidHeightReference {
                height: header.height,
                expected: newest.height,
            }),
        }
    }

    /// Get the vote info of the validator with `address`.
    pub fn vote_info(&self, address: &Address) -> Option<&ActiveValidatorVoteInfo> {
        self.active_validators_vote_info
            .iter()
            .find(|info| &info.address == address)
    }

    /// Rebuild the active validator index for a validator set change taking effect at `next_height`.
    ///
    /// Validators that are already tracked keep their vote info. New validators start at `next_height`.
    /// Validators of `outgoing`, the set that applies right below `next_height`, stay tracked so their
    /// votes on the remaining blocks of their set are still counted. Everyone else is dropped.
    pub(crate) fn update_active_validators(
        &mut self,
        next_height: BlockHeight,
        incoming: &[Validator],
        outgoing: &[Validator],
    ) {
        let mut next_vote_info = Vec::with_capacity(incoming.len() + outgoing.len());

        for validator in incoming {
            match self.vote_info(&validator.address) {
                Some(existing) => next_vote_info.push(existing.clone()),
                None => next_vote_info.push(ActiveValidatorVoteInfo {
                    address: validator.address,
                    min_active_height: next_height,
                    largest_height_precommit: next_height.saturating_sub(1),
                }),
            }
        }

        for validator in outgoing {
            let already_pushed = next_vote_info
                .iter()
                .any(|info| info.address == validator.address);
            if already_pushed {
                continue;
            }
            if let Some(existing) = self.vote_info(&validator.address) {
                next_vote_info.push(existing.clone());
            }
        }

        self.active_validators_vote_info = next_vote_info;
    }
}

/// The three finality watermarks of the votes ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BFTHeights {
    pub max_height_prevoted: BlockHeight,
    pub max_height_precommitted: BlockHeight,
    pub max_height_certified: BlockHeight,
}
