//! Validator sets and honestly generated block headers.

use std::collections::HashMap;

use bft_finality::bft_module::{BFTModule, BFTModuleSpec};
use bft_finality::config::BFTConfiguration;
use bft_finality::types::{
    block::{AggregateCommit, BlockHeader},
    crypto_primitives::SigningKey,
    data_types::{
        Address, AggregationBits, BFTWeight, BlockHeight, BlsKey, CryptoHash, GeneratorKey, SignatureBytes,
        Timestamp,
    },
    validators::Validator,
};
use rand_core::OsRng;

use super::mem_db::MemDB;

pub(crate) const BLOCK_TIME: u32 = 10;

/// Create a validator with `weight` for every entry of `weights`. The validator at index `i` has address
/// `[i + 1; 20]` and BLS key `[i + 1; 48]`, so address order and BLS key order agree with index order.
pub(crate) fn validator_set(weights: &[u64]) -> (Vec<SigningKey>, Vec<Validator>) {
    let mut csprg = OsRng {};
    weights
        .iter()
        .enumerate()
        .map(|(i, weight)| {
            let signing_key = SigningKey::generate(&mut csprg);
            let validator = Validator {
                address: Address::new([i as u8 + 1; 20]),
                generator_key: GeneratorKey::new(signing_key.verifying_key().to_bytes()),
                bls_key: BlsKey::new(vec![i as u8 + 1; 48]),
                bft_weight: BFTWeight::new(*weight),
            };
            (signing_key, validator)
        })
        .unzip()
}

/// An aggregate commit on `height` signed by the validators at `signers`, with a made-up signature.
pub(crate) fn aggregate_commit(height: u32, number_of_validators: usize, signers: &[usize]) -> AggregateCommit {
    AggregateCommit {
        height: BlockHeight::new(height),
        aggregation_bits: AggregationBits::from_indices(number_of_validators, signers.iter().copied()),
        certificate_signature: SignatureBytes::new(vec![0xAB; 96]),
    }
}

/// Generates the headers of a chain where validators take turns in address order, one per slot, and
/// always report the height of their previous block truthfully.
pub(crate) struct HonestChain {
    signing_keys: Vec<SigningKey>,
    validators: Vec<Validator>,
    validators_hash: CryptoHash,
    last_generated: HashMap<Address, BlockHeight>,
    previous_block_id: CryptoHash,
}

impl HonestChain {
    pub(crate) fn new(
        signing_keys: Vec<SigningKey>,
        validators: Vec<Validator>,
        validators_hash: CryptoHash,
    ) -> Self {
        HonestChain {
            signing_keys,
            validators,
            validators_hash,
            last_generated: HashMap::new(),
            previous_block_id: CryptoHash::default(),
        }
    }

    /// Index of the validator whose slot the block at `height` falls in.
    pub(crate) fn generator_index(&self, height: u32) -> usize {
        height as usize % self.validators.len()
    }

    /// Generate and sign the header at `height`, in slot `height`.
    pub(crate) fn header(
        &mut self,
        height: u32,
        max_height_prevoted: BlockHeight,
        aggregate_commit: AggregateCommit,
    ) -> BlockHeader {
        let index = self.generator_index(height);
        let generator_address = self.validators[index].address;
        let height = BlockHeight::new(height);
        let max_height_generated = self
            .last_generated
            .insert(generator_address, height)
            .unwrap_or_default();

        let mut header = BlockHeader {
            version: 2,
            height,
            timestamp: Timestamp::new(height.int() * BLOCK_TIME),
            previous_block_id: self.previous_block_id,
            generator_address,
            max_height_prevoted,
            max_height_generated,
            state_root: CryptoHash::new([height.int() as u8; 32]),
            validators_hash: self.validators_hash,
            aggregate_commit,
            signature: SignatureBytes::empty(),
        };
        header.sign(&self.signing_keys[index]);
        self.previous_block_id = header.id();
        header
    }
}

/// Initialize `kv_store` at `genesis_height` and start a BFT module on it.
pub(crate) fn start_bft_module(kv_store: MemDB, genesis_height: u32, batch_size: u32) -> BFTModule<MemDB> {
    BFTModule::initialize(kv_store.clone(), BlockHeight::new(genesis_height)).unwrap();
    BFTModuleSpec::builder()
        .kv_store(kv_store)
        .configuration(
            BFTConfiguration::builder()
                .batch_size(batch_size)
                .block_time(BLOCK_TIME)
                .log_events(true)
                .build(),
        )
        .build()
        .start()
}
