/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Watermark advancement and the read-only queries of the BFT votes ledger.

use crate::{
    bft_parameters::{implementation::prune_bft_parameters, types::BFTParameters},
    errors::BFTError,
    state::{
        kv_store::{KVGet, WriteBatch},
        repositories::{ParametersRepository, VotesRepository},
        write_batch::ConsensusWriteBatch,
    },
    types::{
        block::BlockHeader,
        data_types::{BFTWeight, BlockHeight},
        validators::signers_weight,
    },
};

use super::types::{BFTHeights, BFTVotes, BlockBFTInfo};

/// Get the three finality watermarks.
pub fn bft_heights(kv: &impl KVGet) -> Result<BFTHeights, BFTError> {
    Ok(kv.bft_votes()?.heights())
}

/// Summary of the changes that [`process_block`] staged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessBlockOutcome {
    pub previous_bft_heights: BFTHeights,
    pub bft_heights: BFTHeights,
    /// Keys of the BFT parameters records that became unreachable and were deleted.
    pub pruned_bft_parameters: Vec<BlockHeight>,
}

/// Record `header` in the votes ledger, advance the watermarks, and prune BFT parameters no longer
/// needed. Everything is staged into `wb`.
///
/// `header` must directly follow the newest block in the ledger.
pub fn process_block<W: WriteBatch>(
    kv: &impl KVGet,
    wb: &mut ConsensusWriteBatch<W>,
    header: &BlockHeader,
    batch_size: u32,
) -> Result<ProcessBlockOutcome, BFTError> {
    let mut bft_votes = kv.bft_votes()?;
    bft_votes.check_follows_newest(header)?;
    let previous_bft_heights = bft_votes.heights();
    let parameters = ParametersHistory(kv.bft_parameters_records()?);

    insert_block_bft_info(&mut bft_votes, header, batch_size);
    update_prevotes_precommits(&mut bft_votes, &parameters);
    update_max_height_prevoted(&mut bft_votes, &parameters)?;
    update_max_height_precommitted(&mut bft_votes, &parameters)?;
    update_max_height_certified(&mut bft_votes, &parameters, header)?;

    // Every BFT parameters record at or below this height, except the newest, no longer applies to any
    // block that is retained in the ledger or still uncertified.
    let oldest_retained = match bft_votes.block_bft_infos.last() {
        Some(oldest) => oldest.height,
        None => header.height,
    };
    let prune_height = match bft_votes.max_height_certified.checked_add(1) {
        Some(above_certified) => oldest_retained.min(above_certified),
        None => oldest_retained,
    };
    let pruned_bft_parameters = prune_bft_parameters(kv, wb, prune_height)?;

    wb.set_bft_votes(&bft_votes)?;

    Ok(ProcessBlockOutcome {
        previous_bft_heights,
        bft_heights: bft_votes.heights(),
        pruned_bft_parameters,
    })
}

/// Prepend the info of `header` and drop the oldest entries beyond `3 * batch_size`.
pub(crate) fn insert_block_bft_info(bft_votes: &mut BFTVotes, header: &BlockHeader, batch_size: u32) {
    bft_votes
        .block_bft_infos
        .insert(0, BlockBFTInfo::from(header));
    bft_votes
        .block_bft_infos
        .truncate(3 * batch_size as usize);
}

/// Get the height below which the generator of the newest block has not prevoted on any retained block,
/// found by walking back through the generator's previous blocks.
pub(crate) fn height_not_prevoted(bft_votes: &BFTVotes) -> BlockHeight {
    let Some(newest) = bft_votes.block_bft_infos.first() else {
        return BlockHeight::default();
    };
    let window_len = bft_votes.block_bft_infos.len();
    let current_height = newest.height;
    let mut height_previous_block = newest.max_height_generated;

    while height_previous_block <= current_height
        && ((current_height - height_previous_block) as usize) < window_len
    {
        let info = &bft_votes.block_bft_infos[(current_height - height_previous_block) as usize];
        if info.generator_address != newest.generator_address
            || info.max_height_generated >= height_previous_block
        {
            return height_previous_block;
        }
        height_previous_block = info.max_height_generated;
    }

    current_height
        .saturating_sub(window_len as u32)
        .max(height_previous_block)
}

/// Add the newest block's implied votes to the weights of the blocks it votes on.
pub(crate) fn update_prevotes_precommits(bft_votes: &mut BFTVotes, parameters: &ParametersHistory) {
    let Some(newest) = bft_votes.block_bft_infos.first().cloned() else {
        return;
    };
    let Some(vote_info_index) = bft_votes
        .active_validators_vote_info
        .iter()
        .position(|info| info.address == newest.generator_address)
    else {
        return;
    };
    let vote_info = bft_votes.active_validators_vote_info[vote_info_index].clone();

    // Nothing is left to precommit once either bound passes the largest height.
    let min_precommit_height = match (
        height_not_prevoted(bft_votes).checked_add(1),
        vote_info.largest_height_precommit.checked_add(1),
    ) {
        (Some(above_not_prevoted), Some(above_precommit)) => Some(
            vote_info
                .min_active_height
                .max(above_not_prevoted)
                .max(above_precommit),
        ),
        _ => None,
    };

    let mut largest_height_precommit = None;
    for info in bft_votes.block_bft_infos.iter_mut() {
        match min_precommit_height {
            Some(min_height) if info.height >= min_height => (),
            _ => break,
        }
        let Some(bft_parameters) = parameters.at(info.height) else {
            continue;
        };
        if info.prevote_weight < bft_parameters.prevote_threshold {
            continue;
        }
        let Some(weight) = bft_parameters.weight_of(&newest.generator_address) else {
            continue;
        };
        info.precommit_weight += weight;
        if largest_height_precommit.is_none() {
            largest_height_precommit = Some(info.height);
        }
    }
    if let Some(height) = largest_height_precommit {
        bft_votes.active_validators_vote_info[vote_info_index].largest_height_precommit = height;
    }

    let min_prevote_height = (newest.max_height_generated + 1).max(vote_info.min_active_height);
    for info in bft_votes.block_bft_infos.iter_mut() {
        if info.height < min_prevote_height {
            break;
        }
        let weight = parameters
            .at(info.height)
            .and_then(|bft_parameters| bft_parameters.weight_of(&newest.generator_address));
        if let Some(weight) = weight {
            info.prevote_weight += weight;
        }
    }
}

/// Raise `max_height_prevoted` to the newest retained height whose prevote weight reaches its threshold.
pub(crate) fn update_max_height_prevoted(
    bft_votes: &mut BFTVotes,
    parameters: &ParametersHistory,
) -> Result<(), BFTError> {
    for info in &bft_votes.block_bft_infos {
        if info.height <= bft_votes.max_height_prevoted {
            return Ok(());
        }
        if info.prevote_weight >= parameters.required(info.height)?.prevote_threshold {
            bft_votes.max_height_prevoted = info.height;
            return Ok(());
        }
    }
    Ok(())
}

/// Raise `max_height_precommitted` to the newest retained height whose precommit weight reaches its
/// threshold.
pub(crate) fn update_max_height_precommitted(
    bft_votes: &mut BFTVotes,
    parameters: &ParametersHistory,
) -> Result<(), BFTError> {
    for info in &bft_votes.block_bft_infos {
        if info.height <= bft_votes.max_height_precommitted {
            return Ok(());
        }
        if info.precommit_weight >= parameters.required(info.height)?.precommit_threshold {
            bft_votes.max_height_precommitted = info.height;
            return Ok(());
        }
    }
    Ok(())
}

/// Raise `max_height_certified` to the height of the aggregate commit carried by `header`, if the commit
/// certifies a precommitted block that is not yet certified and its signers carry enough weight.
pub(crate) fn update_max_height_certified(
    bft_votes: &mut BFTVotes,
    parameters: &ParametersHistory,
    header: &BlockHeader,
) -> Result<(), BFTError> {
    let aggregate_commit = &header.aggregate_commit;
    if aggregate_commit.is_empty()
        || aggregate_commit.height <= bft_votes.max_height_certified
        || aggregate_commit.height > bft_votes.max_height_precommitted
    {
        return Ok(());
    }

    let bft_parameters = parameters.required(aggregate_commit.height)?;
    let weight = signers_weight(&bft_parameters.validators, &aggregate_commit.aggregation_bits);
    if weight >= bft_parameters.certificate_threshold {
        bft_votes.max_height_certified = aggregate_commit.height;
    }
    Ok(())
}

/// Check whether two block headers by the same generator contradict each other, i.e., whether an honest
/// generator could not have produced both.
pub fn are_headers_contradicting(header1: &BlockHeader, header2: &BlockHeader) -> bool {
    if header1.id() == header2.id() {
        return false;
    }
    are_distinct_headers_contradicting(&BlockBFTInfo::from(header1), &BlockBFTInfo::from(header2))
}

/// Check whether `header` contradicts any block by the same generator that is retained in the ledger.
pub fn is_header_contradicting_chain(kv: &impl KVGet, header: &BlockHeader) -> Result<bool, BFTError> {
    let bft_votes = kv.bft_votes()?;
    let header_info = BlockBFTInfo::from(header);
    Ok(bft_votes
        .block_bft_infos
        .iter()
        .filter(|info| info.generator_address == header.generator_address)
        .any(|info| are_distinct_headers_contradicting(info, &header_info)))
}

/// Check whether `header`, which must directly follow the newest block in the ledger, implies the
/// maximal number of prevotes: its generator produced no block that the header fails to prevote on.
pub fn implies_maximal_prevotes(kv: &impl KVGet, header: &BlockHeader) -> Result<bool, BFTError> {
    let bft_votes = kv.bft_votes()?;
    bft_votes.check_follows_newest(header)?;
    let infos = &bft_votes.block_bft_infos;

    if header.max_height_generated >= header.height {
        return Ok(false);
    }

    // Distance from the newest block in the ledger, which sits at `header.height - 1`.
    let offset = (header.height.int() - 1 - header.max_height_generated.int()) as usize;
    match infos.get(offset) {
        None => Ok(true),
        Some(info) => Ok(info.generator_address == header.generator_address),
    }
}

fn are_distinct_headers_contradicting(info1: &BlockBFTInfo, info2: &BlockBFTInfo) -> bool {
    if info1.generator_address != info2.generator_address {
        return false;
    }

    let (earlier, later) = if (info1.max_height_generated, info1.height)
        > (info2.max_height_generated, info2.height)
    {
        (info2, info1)
    } else {
        (info1, info2)
    };

    if earlier.max_height_prevoted == later.max_height_prevoted && earlier.height >= later.height {
        return true;
    }
    if earlier.height > later.max_height_generated {
        return true;
    }
    earlier.max_height_prevoted > later.max_height_prevoted
}

/// Every stored BFT parameters record, read once per processed block.
pub(crate) struct ParametersHistory(pub(crate) Vec<(BlockHeight, BFTParameters)>);

impl ParametersHistory {
    fn at(&self, height: BlockHeight) -> Option<&BFTParameters> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| *key <= height)
            .map(|(_, bft_parameters)| bft_parameters)
    }

    fn required(&self, height: BlockHeight) -> Result<&BFTParameters, BFTError> {
        self.at(height).ok_or(BFTError::ParameterNotFound { height })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bft_votes::types::ActiveValidatorVoteInfo,
        types::{
            block::AggregateCommit,
            data_types::{Address, CryptoHash, GeneratorKey, SignatureBytes, Timestamp},
        },
    };

    fn info(height: u32, generator: u8, max_height_generated: u32, max_height_prevoted: u32) -> BlockBFTInfo {
        BlockBFTInfo {
            height: BlockHeight::new(height),
            generator_address: Address::new([generator; 20]),
            max_height_generated: BlockHeight::new(max_height_generated),
            max_height_prevoted: BlockHeight::new(max_height_prevoted),
            prevote_weight: BFTWeight::zero(),
            precommit_weight: BFTWeight::zero(),
        }
    }

    fn votes_with(infos: Vec<BlockBFTInfo>) -> BFTVotes {
        BFTVotes {
            block_bft_infos: infos,
            ..BFTVotes::genesis(BlockHeight::new(0))
        }
    }

    fn header(height: u32, generator: u8, max_height_generated: u32, max_height_prevoted: u32) -> BlockHeader {
        BlockHeader {
            version: 2,
            height: BlockHeight::new(height),
            timestamp: Timestamp::new(height * 10),
            previous_block_id: CryptoHash::default(),
            generator_address: Address::new([generator; 20]),
            max_height_prevoted: BlockHeight::new(max_height_prevoted),
            max_height_generated: BlockHeight::new(max_height_generated),
            state_root: CryptoHash::default(),
            validators_hash: CryptoHash::default(),
            aggregate_commit: AggregateCommit::empty(BlockHeight::new(0)),
            signature: SignatureBytes::empty(),
        }
    }

    #[test]
    fn window_is_bounded_by_three_batches() {
        let mut bft_votes = votes_with(Vec::new());
        for height in 1..=20 {
            insert_block_bft_info(&mut bft_votes, &header(height, 1, 0, 0), 2);
        }
        assert_eq!(bft_votes.block_bft_infos.len(), 6);
        assert_eq!(bft_votes.block_bft_infos[0].height, BlockHeight::new(20));
        assert_eq!(bft_votes.block_bft_infos[5].height, BlockHeight::new(15));
    }

    #[test]
    fn height_not_prevoted_stops_at_another_generator() {
        // Generator 1 produced 10 claiming it last generated 8, but 8 was produced by generator 2.
        let bft_votes = votes_with(vec![info(10, 1, 8, 7), info(9, 3, 9, 7), info(8, 2, 8, 6)]);
        assert_eq!(height_not_prevoted(&bft_votes), BlockHeight::new(8));
    }

    #[test]
    fn height_not_prevoted_follows_own_blocks_out_of_the_window() {
        // Generator 1 produced 12 and 10, and 10 points further back than the window reaches.
        let bft_votes = votes_with(vec![info(12, 1, 10, 9), info(11, 2, 11, 9), info(10, 1, 4, 8)]);
        assert_eq!(height_not_prevoted(&bft_votes), BlockHeight::new(9));
    }

    #[test]
    fn headers_by_different_generators_never_contradict() {
        assert!(!are_headers_contradicting(&header(10, 1, 5, 8), &header(10, 2, 5, 8)));
    }

    #[test]
    fn identical_headers_do_not_contradict() {
        let header = header(10, 1, 5, 8);
        assert!(!are_headers_contradicting(&header, &header.clone()));
    }

    #[test]
    fn double_signing_at_the_same_height_contradicts() {
        let header1 = header(10, 1, 5, 8);
        let mut header2 = header1.clone();
        header2.state_root = CryptoHash::new([1u8; 32]);
        assert!(are_headers_contradicting(&header1, &header2));
    }

    #[test]
    fn skipping_own_previous_block_contradicts() {
        // The later header claims the generator's previous block was 5, but it also produced 8.
        assert!(are_headers_contradicting(&header(8, 1, 5, 6), &header(12, 1, 5, 10)));
        assert!(are_headers_contradicting(&header(8, 1, 3, 6), &header(12, 1, 5, 10)));
    }

    #[test]
    fn decreasing_max_height_prevoted_contradicts() {
        assert!(are_headers_contradicting(&header(8, 1, 5, 7), &header(12, 1, 8, 6)));
    }

    #[test]
    fn honest_successive_headers_do_not_contradict() {
        assert!(!are_headers_contradicting(&header(8, 1, 5, 6), &header(12, 1, 8, 10)));
    }

    #[test]
    fn certified_height_requires_enough_signers() {
        let validator = |byte: u8, weight: u64| crate::types::validators::Validator {
            address: Address::new([byte; 20]),
            generator_key: GeneratorKey::new([byte; 32]),
            bls_key: crate::types::data_types::BlsKey::new(vec![byte; 48]),
            bft_weight: BFTWeight::new(weight),
        };
        let bft_parameters = BFTParameters {
            prevote_threshold: BFTWeight::new(3),
            precommit_threshold: BFTWeight::new(3),
            certificate_threshold: BFTWeight::new(3),
            validators: vec![validator(1, 1), validator(2, 1), validator(3, 1), validator(4, 1)],
            validators_hash: CryptoHash::default(),
        };
        let parameters = ParametersHistory(vec![(BlockHeight::new(1), bft_parameters)]);
        let mut bft_votes = votes_with(Vec::new());
        bft_votes.max_height_prevoted = BlockHeight::new(10);
        bft_votes.max_height_precommitted = BlockHeight::new(8);
        bft_votes.active_validators_vote_info = vec![ActiveValidatorVoteInfo {
            address: Address::new([1; 20]),
            min_active_height: BlockHeight::new(1),
            largest_height_precommit: BlockHeight::new(0),
        }];

        let mut carrying = header(11, 1, 10, 10);
        carrying.aggregate_commit = AggregateCommit {
            height: BlockHeight::new(7),
            aggregation_bits: crate::types::data_types::AggregationBits::from_indices(4, [0, 1]),
            certificate_signature: SignatureBytes::new(vec![1; 96]),
        };
        update_max_height_certified(&mut bft_votes, &parameters, &carrying).unwrap();
        assert_eq!(bft_votes.max_height_certified, BlockHeight::new(0));

        carrying.aggregate_commit.aggregation_bits =
            crate::types::data_types::AggregationBits::from_indices(4, [0, 1, 3]);
        update_max_height_certified(&mut bft_votes, &parameters, &carrying).unwrap();
        assert_eq!(bft_votes.max_height_certified, BlockHeight::new(7));

        // Commits above the precommitted watermark are ignored.
        carrying.aggregate_commit.height = BlockHeight::new(9);
        update_max_height_certified(&mut bft_votes, &parameters, &carrying).unwrap();
        assert_eq!(bft_votes.max_height_certified, BlockHeight::new(7));
    }
}
