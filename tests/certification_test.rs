use std::sync::{Arc, Mutex};

use bft_finality::{
    bft_parameters::implementation::compute_validators_hash,
    bft_votes::types::BFTHeights,
    certification::{
        history::{ChainHistory, ChainHistoryCache},
        implementation::{
            bls_key_to_weight, certificate_from_aggregate_commit, check_chain_of_trust, next_certificate,
            unsigned_certificate, verify_aggregate_commit,
        },
        types::LastCertificate,
    },
    errors::BFTError,
    types::{
        block::{AggregateCommit, BlockHeader},
        crypto_primitives::AggregateSignatureVerifier,
        data_types::{
            Address, AggregationBits, BFTWeight, BlockHeight, BlsKey, CryptoHash, GeneratorKey, SignatureBytes,
            Timestamp,
        },
        validators::{Validator, ValidatorsData},
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    fixtures::{aggregate_commit, start_bft_module, validator_set},
    logging::setup_logger,
    mem_db::MemDB,
};

/// A validator whose address and BLS key are both derived from `id`.
fn validator(id: u8, weight: u64) -> Validator {
    Validator {
        address: Address::new([id; 20]),
        generator_key: GeneratorKey::new([id; 32]),
        bls_key: BlsKey::new(vec![id; 48]),
        bft_weight: BFTWeight::new(weight),
    }
}

fn validators_data(validators: Vec<Validator>, certificate_threshold: u64, height: u32) -> ValidatorsData {
    let certificate_threshold = BFTWeight::new(certificate_threshold);
    ValidatorsData {
        validators_hash: compute_validators_hash(&validators, certificate_threshold),
        validators,
        certificate_threshold,
        height: BlockHeight::new(height),
    }
}

fn header(height: u32, validators_hash: CryptoHash) -> BlockHeader {
    BlockHeader {
        version: 2,
        height: BlockHeight::new(height),
        timestamp: Timestamp::new(1_700_000_000 + height * 10),
        previous_block_id: CryptoHash::new([height as u8; 32]),
        generator_address: Address::new([1; 20]),
        max_height_prevoted: BlockHeight::new(height.saturating_sub(2)),
        max_height_generated: BlockHeight::new(height.saturating_sub(4)),
        state_root: CryptoHash::new([height as u8 + 1; 32]),
        validators_hash,
        aggregate_commit: AggregateCommit::empty(BlockHeight::new(0)),
        signature: SignatureBytes::new(vec![7; 64]),
    }
}

fn certified_up_to(height: u32) -> BFTHeights {
    BFTHeights {
        max_height_prevoted: BlockHeight::new(height + 2),
        max_height_precommitted: BlockHeight::new(height + 1),
        max_height_certified: BlockHeight::new(height),
    }
}

/// The trusted set: weights {50, 50, 3} plus a validator without weight, and a certificate threshold of 68.
fn trusted_set() -> ValidatorsData {
    validators_data(
        vec![validator(1, 50), validator(2, 50), validator(3, 3), validator(4, 0)],
        68,
        1,
    )
}

#[test]
fn commit_by_the_trusted_set_is_trusted_regardless_of_signers() {
    setup_logger(LevelFilter::Trace);

    let trusted = trusted_set();
    let mut history = ChainHistoryCache::new();
    history.insert_block_header(header(9, trusted.validators_hash));

    let nobody_signed = aggregate_commit(10, 4, &[]);
    assert!(check_chain_of_trust(
        &trusted.validators_hash,
        &bls_key_to_weight(&trusted),
        trusted.certificate_threshold,
        &nobody_signed,
        &history,
    )
    .unwrap());
}

#[test]
fn signers_outside_the_trusted_set_are_not_trusted() {
    setup_logger(LevelFilter::Trace);

    let trusted = trusted_set();
    let strangers = validators_data(
        vec![validator(11, 50), validator(12, 50), validator(13, 50)],
        101,
        10,
    );
    let mut history = ChainHistoryCache::new();
    history.insert_validators_data(trusted.clone());
    history.insert_validators_data(strangers.clone());
    history.insert_block_header(header(9, strangers.validators_hash));

    // Every stranger signed: plenty of raw weight, none of it trusted.
    let everyone_signed = aggregate_commit(10, 3, &[0, 1, 2]);
    assert!(!check_chain_of_trust(
        &trusted.validators_hash,
        &bls_key_to_weight(&trusted),
        trusted.certificate_threshold,
        &everyone_signed,
        &history,
    )
    .unwrap());
}

#[test]
fn zero_weight_signer_adds_nothing_to_trust() {
    setup_logger(LevelFilter::Trace);

    // The same validators sign under a new certificate threshold, which changes the validators hash.
    let trusted = trusted_set();
    let signing_set = validators_data(trusted.validators.clone(), 69, 10);
    assert_ne!(trusted.validators_hash, signing_set.validators_hash);

    let mut history = ChainHistoryCache::new();
    history.insert_validators_data(signing_set.clone());
    history.insert_block_header(header(9, signing_set.validators_hash));
    let bls_key_to_weight = bls_key_to_weight(&trusted);
    assert_eq!(bls_key_to_weight.len(), 4);

    // Validators 3 and 4 carry 3 + 0 of the 68 needed.
    let small = aggregate_commit(10, 4, &[2, 3]);
    assert!(!check_chain_of_trust(
        &trusted.validators_hash,
        &bls_key_to_weight,
        trusted.certificate_threshold,
        &small,
        &history,
    )
    .unwrap());

    // Validators 1, 2, and 4 carry 50 + 50 + 0.
    let large = aggregate_commit(10, 4, &[0, 1, 3]);
    assert!(check_chain_of_trust(
        &trusted.validators_hash,
        &bls_key_to_weight,
        trusted.certificate_threshold,
        &large,
        &history,
    )
    .unwrap());
}

#[test]
fn missing_history_is_reported() {
    setup_logger(LevelFilter::Trace);

    let trusted = trusted_set();
    let unknown_hash = CryptoHash::new([0xEE; 32]);
    let mut history = ChainHistoryCache::new();
    let commit = aggregate_commit(10, 4, &[0, 1]);

    assert!(matches!(
        check_chain_of_trust(
            &trusted.validators_hash,
            &bls_key_to_weight(&trusted),
            trusted.certificate_threshold,
            &commit,
            &history,
        ),
        Err(BFTError::MissingBlockHeader { height }) if height == BlockHeight::new(9)
    ));

    history.insert_block_header(header(9, unknown_hash));
    assert!(matches!(
        check_chain_of_trust(
            &trusted.validators_hash,
            &bls_key_to_weight(&trusted),
            trusted.certificate_threshold,
            &commit,
            &history,
        ),
        Err(BFTError::MissingValidatorSnapshot { validators_hash }) if validators_hash == unknown_hash
    ));

    // The snapshot of the last certificate itself is needed to search for the next one.
    let last_certificate = LastCertificate {
        height: BlockHeight::new(5),
        validators_hash: trusted.validators_hash,
    };
    assert!(matches!(
        next_certificate(&last_certificate, &certified_up_to(10), &history),
        Err(BFTError::MissingValidatorSnapshot { .. })
    ));
}

#[test]
fn next_certificate_is_the_highest_trusted_commit() {
    setup_logger(LevelFilter::Trace);

    // 1. Blocks 10 to 20. The trusted set signs up to block 15, whose header names a set of strangers
    //    that signs from block 16 on.
    let trusted = trusted_set();
    let strangers = validators_data(
        vec![validator(11, 50), validator(12, 50), validator(13, 50)],
        101,
        16,
    );
    let mut history = ChainHistoryCache::new();
    history.insert_validators_data(trusted.clone());
    history.insert_validators_data(strangers.clone());
    for height in 10..=20 {
        let validators_hash = if height < 15 {
            trusted.validators_hash
        } else {
            strangers.validators_hash
        };
        history.insert_block_header(header(height, validators_hash));
    }
    for height in [12, 14] {
        history.insert_aggregate_commit(aggregate_commit(height, 4, &[0, 1]));
    }
    for height in [17, 19] {
        history.insert_aggregate_commit(aggregate_commit(height, 3, &[0, 1, 2]));
    }

    let last_certificate = LastCertificate {
        height: BlockHeight::new(10),
        validators_hash: trusted.validators_hash,
    };

    // 2. Commits by the strangers are skipped. The highest commit by the trusted set wins.
    let certificate = next_certificate(&last_certificate, &certified_up_to(20), &history)
        .unwrap()
        .unwrap();
    assert_eq!(certificate.height, BlockHeight::new(14));
    assert_eq!(certificate.block_id, history.block_header(BlockHeight::new(14)).unwrap().id());
    assert_eq!(
        certificate.unsigned(),
        unsigned_certificate(&history.block_header(BlockHeight::new(14)).unwrap())
    );

    // 3. Nothing above the certified height is considered.
    let certificate = next_certificate(&last_certificate, &certified_up_to(13), &history)
        .unwrap()
        .unwrap();
    assert_eq!(certificate.height, BlockHeight::new(12));

    // 4. Nothing to certify: no commit above the last certificate, or nothing certified above it.
    assert!(next_certificate(&last_certificate, &certified_up_to(11), &history)
        .unwrap()
        .is_none());
    assert!(next_certificate(&last_certificate, &certified_up_to(10), &history)
        .unwrap()
        .is_none());
    assert!(next_certificate(&last_certificate, &certified_up_to(3), &history)
        .unwrap()
        .is_none());
}

#[test]
fn history_cache_keeps_what_certification_still_needs() {
    setup_logger(LevelFilter::Trace);

    let trusted = trusted_set();
    let next = validators_data(trusted.validators.clone(), 69, 30);
    let mut history = ChainHistoryCache::new();
    history.insert_validators_data(trusted.clone());
    history.insert_validators_data(next.clone());
    for height in 1..=40 {
        let mut header = header(height, trusted.validators_hash);
        if height > 1 {
            header.aggregate_commit = aggregate_commit(height - 1, 4, &[0, 1]);
        }
        history.insert_block_header(header);
    }
    assert_eq!(history.newest_height(), Some(BlockHeight::new(40)));
    assert!(history.aggregate_commit(BlockHeight::new(39)).is_some());

    // The snapshot active at height 20 stays, as does every later one.
    history.prune_below(BlockHeight::new(20));
    assert!(history.block_header(BlockHeight::new(19)).is_none());
    assert!(history.aggregate_commit(BlockHeight::new(19)).is_none());
    assert!(history.block_header(BlockHeight::new(20)).is_some());
    assert!(history.validators_data(&trusted.validators_hash).is_some());

    // Once the next set is active, the old one goes.
    history.prune_below(BlockHeight::new(35));
    assert!(history.validators_data(&trusted.validators_hash).is_none());
    assert!(history.validators_data(&next.validators_hash).is_some());
}

#[test]
fn history_cache_loads_snapshots_from_the_consensus_state() {
    setup_logger(LevelFilter::Trace);

    let (_, validators) = validator_set(&[1, 1, 1, 1]);
    let kv_store = MemDB::new();
    let mut bft_module = start_bft_module(kv_store.clone(), 0, 4);
    let update = bft_module
        .set_bft_parameters(BFTWeight::new(3), BFTWeight::new(3), validators)
        .unwrap()
        .unwrap();

    let mut history = ChainHistoryCache::new();
    assert_eq!(history.load_validators_data(&kv_store).unwrap(), 1);
    let loaded = history.validators_data(&update.validators_hash).unwrap();
    assert_eq!(loaded.height, BlockHeight::new(1));
    assert_eq!(loaded.certificate_threshold, BFTWeight::new(3));
}

/// Records every call, and accepts a signature only if it equals the message.
#[derive(Clone, Default)]
struct EchoVerifier(Arc<Mutex<Vec<Vec<BlsKey>>>>);

impl AggregateSignatureVerifier for EchoVerifier {
    fn verify_aggregate_signature(
        &self,
        keys: &[BlsKey],
        _: &AggregationBits,
        message: &[u8],
        signature: &SignatureBytes,
    ) -> bool {
        self.0.lock().unwrap().push(keys.to_vec());
        signature.bytes() == message
    }
}

#[test]
fn aggregate_commit_is_verified_over_the_unsigned_certificate() {
    setup_logger(LevelFilter::Trace);

    let signing_set = validators_data(
        vec![validator(3, 50), validator(1, 50), validator(2, 3)],
        68,
        1,
    );
    let header = header(10, signing_set.validators_hash);
    let verifier = EchoVerifier::default();

    let signed = AggregateCommit {
        height: BlockHeight::new(10),
        aggregation_bits: AggregationBits::from_indices(3, [0, 2]),
        certificate_signature: SignatureBytes::new(unsigned_certificate(&header).signing_bytes()),
    };
    assert!(verify_aggregate_commit(&signing_set, &signed, &header, &verifier).unwrap());
    assert_eq!(
        verifier.0.lock().unwrap().last().unwrap(),
        &vec![BlsKey::new(vec![1; 48]), BlsKey::new(vec![2; 48]), BlsKey::new(vec![3; 48])]
    );

    let forged = AggregateCommit {
        certificate_signature: SignatureBytes::new(vec![0; 32]),
        ..signed.clone()
    };
    assert!(!verify_aggregate_commit(&signing_set, &forged, &header, &verifier).unwrap());

    // Keys 1 and 2 carry 50 + 3: below the threshold, so the signature is not even checked.
    let calls = verifier.0.lock().unwrap().len();
    let light = AggregateCommit {
        aggregation_bits: AggregationBits::from_indices(3, [0, 1]),
        ..signed.clone()
    };
    assert!(!verify_aggregate_commit(&signing_set, &light, &header, &verifier).unwrap());
    assert_eq!(verifier.0.lock().unwrap().len(), calls);

    // The commit must be on the header's height.
    let elsewhere = AggregateCommit {
        height: BlockHeight::new(11),
        ..signed
    };
    assert!(matches!(
        certificate_from_aggregate_commit(&elsewhere, &header),
        Err(BFTError::HeaderMismatch { .. })
    ));
}
