/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The handle through which the block-processing pipeline owns the consensus state.

use crate::{bft_votes::types::BFTVotes, types::data_types::BlockHeight};

use super::{
    kv_store::{KVGet, KVSetError, KVStore},
    write_batch::ConsensusWriteBatch,
};

/// Exclusive read and write handle into the consensus state stored in `K`.
///
/// There is exactly one `ConsensusState` per store, owned by whatever drives block processing. Readers
/// that run concurrently with block processing (e.g., certificate generation) should read from a
/// [`snapshot`](Self::snapshot), which is a point-in-time view that is never partially updated.
pub struct ConsensusState<K: KVStore>(K);

impl<K: KVStore> ConsensusState<K> {
    /// Create a new instance of `ConsensusState` on top of `kv_store`.
    pub fn new(kv_store: K) -> Self {
        ConsensusState(kv_store)
    }

    /// Initialize the votes ledger at `genesis_height`.
    ///
    /// This function must be called exactly once on an empty `kv_store`, before the first BFT parameters
    /// are set. All watermarks start at `genesis_height`.
    pub fn initialize(&mut self, genesis_height: BlockHeight) -> Result<(), KVSetError> {
        let mut wb = ConsensusWriteBatch::new();
        wb.set_bft_votes(&BFTVotes::genesis(genesis_height))?;
        self.write(wb);
        Ok(())
    }

    /// Create a point-in-time snapshot of the consensus state.
    pub fn snapshot(&self) -> K::Snapshot<'_> {
        self.0.snapshot()
    }

    /// Atomically write the changes in `write_batch` into the store.
    pub fn write(&mut self, write_batch: ConsensusWriteBatch<K::WriteBatch>) {
        self.0.write(write_batch.0)
    }

    /// Get a clone of the underlying store handle.
    pub fn kv_store(&self) -> K {
        self.0.clone()
    }
}

impl<K: KVStore> KVGet for ConsensusState<K> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key)
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.0.iterate_prefix(prefix)
    }
}
