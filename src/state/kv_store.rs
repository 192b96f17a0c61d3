/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable persistence of the consensus state.
//!
//! Library users provide a key-value store by implementing [`KVStore`]. The store must apply a
//! [`WriteBatch`] atomically, and must be able to iterate over the keys that share a prefix in
//! ascending byte order.

use std::fmt::{self, Display};

use borsh::BorshDeserialize;

use crate::types::data_types::{BlockHeight, CryptoHash};

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    fn write(&mut self, wb: Self::WriteBatch);
    fn clear(&mut self);
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'_>;
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Get all key-value pairs whose key starts with `prefix`, in ascending order of key.
    fn iterate_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// Read and deserialize the value at `raw_key`, naming it `key` in any error.
pub(crate) fn get_deserialized<T: BorshDeserialize>(
    kv: &(impl KVGet + ?Sized),
    raw_key: &[u8],
    key: Key,
) -> Result<Option<T>, KVGetError> {
    match kv.get(raw_key) {
        None => Ok(None),
        Some(bytes) => T::deserialize(&mut bytes.as_slice())
            .map(Some)
            .map_err(|err| KVGetError::DeserializeValueError { key, source: err }),
    }
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. The value corresponding to a given key cannot be found, even though it should have been
///    initialized,
/// 3. A key found by iterating over a prefix does not have the layout of that prefix's keys.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
    MalformedKey { raw_key: Vec<u8> },
}

impl Display for KVGetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVGetError::DeserializeValueError { key, source } => {
                write!(f, "failed to deserialize {}: {}", key, source)
            }
            KVGetError::ValueExpectedButNotFound { key } => {
                write!(f, "{} expected but not found", key)
            }
            KVGetError::MalformedKey { raw_key } => write!(f, "malformed key {:?}", raw_key),
        }
    }
}

/// Error when trying to serialize a value into a [`WriteBatch`].
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

impl Display for KVSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVSetError::SerializeValueError { key, source } => {
                write!(f, "failed to serialize {}: {}", key, source)
            }
        }
    }
}

#[derive(Debug)]
pub enum Key {
    BFTParameters { height: BlockHeight },
    BFTVotes,
    ValidatorsData { validators_hash: CryptoHash },
    GeneratorKeys { height: BlockHeight },
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::BFTParameters { height } => write!(f, "BFT Parameters at height {}", height),
            Key::BFTVotes => write!(f, "BFT Votes"),
            Key::ValidatorsData { validators_hash } => {
                write!(f, "Validators Data for validators hash {}", validators_hash)
            }
            Key::GeneratorKeys { height } => write!(f, "Generator Keys at height {}", height),
        }
    }
}
