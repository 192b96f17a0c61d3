/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Sources of the past block headers, aggregate commits, and validator snapshots that certificate
//! generation reads.

use std::collections::{BTreeMap, HashMap};

use crate::{
    state::{
        kv_store::{KVGet, KVGetError},
        repositories::ValidatorSnapshotRepository,
    },
    types::{
        block::{AggregateCommit, BlockHeader},
        data_types::{BlockHeight, CryptoHash},
        validators::ValidatorsData,
    },
};

/// Read access to the chain history that certificate generation needs.
///
/// Every method returns `None` if the requested item has not been made available (yet). Certificate
/// generation turns that into a data-availability error.
pub trait ChainHistory {
    /// Get the block header at `height`.
    fn block_header(&self, height: BlockHeight) -> Option<BlockHeader>;

    /// Get the aggregate commit that certifies the block at `height`.
    fn aggregate_commit(&self, height: BlockHeight) -> Option<AggregateCommit>;

    /// Get the validator snapshot whose validators hash is `validators_hash`.
    fn validators_data(&self, validators_hash: &CryptoHash) -> Option<ValidatorsData>;
}

/// In-memory [`ChainHistory`], fed from new-block notifications.
#[derive(Clone, Debug, Default)]
pub struct ChainHistoryCache {
    block_headers: BTreeMap<BlockHeight, BlockHeader>,
    aggregate_commits: BTreeMap<BlockHeight, AggregateCommit>,
    validators_data: HashMap<CryptoHash, ValidatorsData>,
}

impl ChainHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `header`, and the aggregate commit it carries if the commit is not empty.
    pub fn insert_block_header(&mut self, header: BlockHeader) {
        if !header.aggregate_commit.is_empty() {
            self.insert_aggregate_commit(header.aggregate_commit.clone());
        }
        self.block_headers.insert(header.height, header);
    }

    pub fn insert_aggregate_commit(&mut self, aggregate_commit: AggregateCommit) {
        self.aggregate_commits
            .insert(aggregate_commit.height, aggregate_commit);
    }

    pub fn insert_validators_data(&mut self, validators_data: ValidatorsData) {
        self.validators_data
            .insert(validators_data.validators_hash, validators_data);
    }

    /// Copy every validator snapshot stored in `kv` into the cache. Returns the number of snapshots
    /// copied.
    pub fn load_validators_data(&mut self, kv: &impl KVGet) -> Result<usize, KVGetError> {
        let all = kv.all_validators_data()?;
        let count = all.len();
        for validators_data in all {
            self.insert_validators_data(validators_data);
        }
        Ok(count)
    }

    /// Get the height of the newest block header in the cache.
    pub fn newest_height(&self) -> Option<BlockHeight> {
        self.block_headers.keys().next_back().copied()
    }

    /// Drop every header and aggregate commit below `height`, and every validator snapshot that
    /// stopped being active before `height`.
    pub fn prune_below(&mut self, height: BlockHeight) {
        self.block_headers = self.block_headers.split_off(&height);
        self.aggregate_commits = self.aggregate_commits.split_off(&height);

        let newest_active = self
            .validators_data
            .values()
            .map(|data| data.height)
            .filter(|data_height| *data_height <= height)
            .max();
        if let Some(newest_active) = newest_active {
            self.validators_data
                .retain(|_, data| data.height >= newest_active);
        }
    }
}

impl ChainHistory for ChainHistoryCache {
    fn block_header(&self, height: BlockHeight) -> Option<BlockHeader> {
        self.block_headers.get(&height).cloned()
    }

    fn aggregate_commit(&self, height: BlockHeight) -> Option<AggregateCommit> {
        self.aggregate_commits.get(&height).cloned()
    }

    fn validators_data(&self, validators_hash: &CryptoHash) -> Option<ValidatorsData> {
        self.validators_data.get(validators_hash).cloned()
    }
}
