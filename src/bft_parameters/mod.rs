//! Height-indexed store of validator sets and weight thresholds.
//!
//! # BFT Parameters
//!
//! Every block is voted on by exactly one validator set: the one stored in the record with the greatest
//! key that is `<= height`. A record holds the set itself, sorted by address, together with three
//! weight thresholds:
//! 1. **Prevote threshold**: always `floor(2W/3) + 1`, with `W` the aggregate weight of the set.
//! 2. **Precommit threshold**: chosen by the caller, within `[floor(W/3) + 1, W]`.
//! 3. **Certificate threshold**: chosen by the caller, within the same range. This is the weight of
//!    aggregate signatures required to certify a block, which is what relays carry across chains.
//!
//! # Setting parameters
//!
//! [`set_bft_parameters`](implementation::set_bft_parameters) never changes the parameters of a block
//! that the votes ledger has already seen. New parameters apply from one past the newest block in the
//! ledger. Setting parameters that are identical to the ones already in effect there is a no-op.
//!
//! Along with each new record, the same write batch stores:
//! - A [`ValidatorsData`](crate::types::validators::ValidatorsData) snapshot, keyed by the
//!   validators hash. Certificate generation uses these to verify signers of past blocks.
//! - The [generator keys](crate::generators) of the set's validators with non-zero weight.
//! - An updated active validator index in the [votes ledger](crate::bft_votes).
//!
//! # Pruning
//!
//! Records that no block in the ledger or any uncertified height still needs are removed by
//! [`prune_bft_parameters`](implementation::prune_bft_parameters). Validators data snapshots are pruned
//! separately, on request, through
//! [`prune_validator_snapshots`](implementation::prune_validator_snapshots), since relays may need
//! them long after the parameters themselves are gone.

pub mod implementation;

pub mod types;
