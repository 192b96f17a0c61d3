/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the block header type and the aggregate commit it carries.
//!
//! Only the header fields that the BFT protocol and certificate generation read are modelled. The
//! header commits to the rest of the block (transactions, events, assets) through `state_root` and
//! the block ID.

use borsh::{BorshDeserialize, BorshSerialize};

use super::{
    crypto_primitives::{hash, verify_ed25519, Signer, SigningKey},
    data_types::{
        Address, AggregationBits, BlockHeight, CryptoHash, GeneratorKey, SignatureBytes, Timestamp,
    },
};

/// Header of a block, as produced by the block's generator.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub height: BlockHeight,
    pub timestamp: Timestamp,
    pub previous_block_id: CryptoHash,
    pub generator_address: Address,
    /// The `max_height_prevoted` of the BFT votes ledger after the parent of this block was processed.
    pub max_height_prevoted: BlockHeight,
    /// The height of the previous block generated by the same generator, or the block's own height if it
    /// is the generator's first block.
    pub max_height_generated: BlockHeight,
    pub state_root: CryptoHash,
    /// Validators hash of the validator set that is active at `height + 1`.
    pub validators_hash: CryptoHash,
    pub aggregate_commit: AggregateCommit,
    pub signature: SignatureBytes,
}

impl BlockHeader {
    /// Get the bytes that the generator signs: the header without its signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let unsigned = BlockHeader {
            signature: SignatureBytes::empty(),
            ..self.clone()
        };
        // Safety: serializing into a Vec is infallible.
        unsigned.try_to_vec().unwrap()
    }

    /// Compute the ID of this block: the hash of the full, signed header.
    pub fn id(&self) -> CryptoHash {
        // Safety: serializing into a Vec is infallible.
        hash(&self.try_to_vec().unwrap())
    }

    /// Sign the header with the generator's `signing_key`, replacing any existing signature.
    pub fn sign(&mut self, signing_key: &SigningKey) {
        self.signature = SignatureBytes::new(signing_key.sign(&self.signing_bytes()).to_bytes().to_vec());
    }

    /// Check whether the header carries a valid signature by `generator_key`.
    pub fn is_signed_by(&self, generator_key: &GeneratorKey) -> bool {
        verify_ed25519(generator_key, &self.signing_bytes(), &self.signature)
    }
}

/// Aggregated certificate signature over the block at `height`, together with the bitmap of the
/// validators that contributed to it.
///
/// Block generators include one aggregate commit in every header. When there is nothing new to
/// report, the commit is [empty](AggregateCommit::is_empty).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AggregateCommit {
    pub height: BlockHeight,
    pub aggregation_bits: AggregationBits,
    pub certificate_signature: SignatureBytes,
}

impl AggregateCommit {
    /// Create an empty aggregate commit that points at `height`.
    pub fn empty(height: BlockHeight) -> Self {
        AggregateCommit {
            height,
            aggregation_bits: AggregationBits::empty(),
            certificate_signature: SignatureBytes::empty(),
        }
    }

    /// Check whether this commit carries no signature.
    pub fn is_empty(&self) -> bool {
        self.aggregation_bits.is_empty() && self.certificate_signature.is_empty()
    }
}
