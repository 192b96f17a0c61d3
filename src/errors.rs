/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The error type returned by the BFT module and the certification engine.
//!
//! Errors fall into three groups:
//! 1. **Caller errors**: [`ParameterNotFound`](BFTError::ParameterNotFound),
//!    [`InvalidValidatorSet`](BFTError::InvalidValidatorSet),
//!    [`InvalidHeightReference`](BFTError::InvalidHeightReference), and
//!    [`HeaderMismatch`](BFTError::HeaderMismatch).
//! 2. **Data-availability gaps** during certificate generation:
//!    [`MissingBlockHeader`](BFTError::MissingBlockHeader),
//!    [`MissingAggregateCommit`](BFTError::MissingAggregateCommit), and
//!    [`MissingValidatorSnapshot`](BFTError::MissingValidatorSnapshot). A relay can retry once it
//!    has fetched more history.
//! 3. **Storage errors** bubbled up from the user's key-value store.
//!
//! No mutation is written when an error is returned.

use std::fmt::{self, Display};

use crate::{
    state::kv_store::{KVGetError, KVSetError},
    types::data_types::{Address, BFTWeight, BlockHeight, CryptoHash},
};

#[derive(Debug)]
pub enum BFTError {
    /// No BFT parameters cover `height`.
    ParameterNotFound { height: BlockHeight },

    /// A call to `set_bft_parameters` was rejected. Nothing was written.
    InvalidValidatorSet(InvalidValidatorSetReason),

    /// A header at `height` was passed to a ledger query that only accepts the header immediately
    /// following the newest block in the ledger, `expected`. Also returned when the newest block is at
    /// the largest representable height, in which case `expected` is that height.
    InvalidHeightReference {
        height: BlockHeight,
        expected: BlockHeight,
    },

    /// A certificate was requested for an aggregate commit and a block header at different heights.
    HeaderMismatch {
        header_height: BlockHeight,
        aggregate_commit_height: BlockHeight,
    },

    /// The block header at `height` is needed but has not been made available.
    MissingBlockHeader { height: BlockHeight },

    /// The aggregate commit that certifies the block at `height` is needed but has not been made
    /// available.
    MissingAggregateCommit { height: BlockHeight },

    /// The validators data for `validators_hash` is needed but has not been made available.
    MissingValidatorSnapshot { validators_hash: CryptoHash },

    KVGetError(KVGetError),

    KVSetError(KVSetError),
}

/// Reason why a validator set and thresholds were rejected.
#[derive(Debug, PartialEq, Eq)]
pub enum InvalidValidatorSetReason {
    TooManyValidators { count: usize, batch_size: u32 },
    AggregateWeightOverflow,
    DuplicateAddress,
    DuplicateBlsKey,
    InvalidGeneratorKey { address: Address },
    InvalidPrecommitThreshold {
        threshold: BFTWeight,
        aggregate_weight: BFTWeight,
    },
    InvalidCertificateThreshold {
        threshold: BFTWeight,
        aggregate_weight: BFTWeight,
    },
}

impl Display for BFTError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BFTError::ParameterNotFound { height } => {
                write!(f, "no BFT parameters found for height {}", height)
            }
            BFTError::InvalidValidatorSet(reason) => write!(f, "invalid validator set: {:?}", reason),
            BFTError::InvalidHeightReference { height, expected } => write!(
                f,
                "header height {} does not follow the newest block, expected {}",
                height, expected
            ),
            BFTError::HeaderMismatch {
                header_height,
                aggregate_commit_height,
            } => write!(
                f,
                "block header height {} does not match aggregate commit height {}",
                header_height, aggregate_commit_height
            ),
            BFTError::MissingBlockHeader { height } => {
                write!(f, "no block header available at height {}", height)
            }
            BFTError::MissingAggregateCommit { height } => {
                write!(f, "no aggregate commit available for height {}", height)
            }
            BFTError::MissingValidatorSnapshot { validators_hash } => write!(
                f,
                "no validators data available for validators hash {}",
                validators_hash
            ),
            BFTError::KVGetError(err) => write!(f, "{}", err),
            BFTError::KVSetError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BFTError {}

impl From<KVGetError> for BFTError {
    fn from(value: KVGetError) -> Self {
        BFTError::KVGetError(value)
    }
}

impl From<KVSetError> for BFTError {
    fn from(value: KVSetError) -> Self {
        BFTError::KVSetError(value)
    }
}

impl From<InvalidValidatorSetReason> for BFTError {
    fn from(value: InvalidValidatorSetReason) -> Self {
        BFTError::InvalidValidatorSet(value)
    }
}
