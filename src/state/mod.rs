//! The persistent state of the BFT module.
//!
//! The consensus state consists of four [variables](variables): the BFT parameters, the BFT votes
//! ledger, the validators data snapshots, and the generator keys. They live in a single user-provided
//! [key-value store](kv_store::KVStore), are read through typed [repositories](repositories), and
//! are written through a typed [write batch](write_batch::ConsensusWriteBatch) so that all the
//! changes caused by one block land atomically.

pub mod consensus_state;

pub mod kv_store;

pub mod repositories;

pub mod variables;

pub mod write_batch;
