use std::sync::{
    mpsc::{self, Receiver},
    Arc, Mutex,
};
use std::thread;
use std::time::{Duration, Instant};

use borsh::BorshDeserialize;
use bft_finality::{
    certification::{
        history::{ChainHistory, ChainHistoryCache},
        types::{Certificate, LastCertificate},
    },
    chain_connector::ConnectorSpec,
    config::ConnectorConfiguration,
    events::{Event, SubmitCrossChainUpdateEvent},
    relay::{
        implementation::ChainConnector,
        pluggables::{ClientError, ReceivingChainClient},
        types::{ChainRole, ConnectorState, CrossChainUpdate, NewBlock, TransactionID},
    },
    types::{
        block::AggregateCommit,
        data_types::{BFTWeight, BlockHeight, ChainID, CryptoHash},
    },
};
use log::LevelFilter;

mod common;

use crate::common::{
    fixtures::{aggregate_commit, start_bft_module, validator_set, HonestChain},
    logging::setup_logger,
    mem_db::MemDB,
};

/// What the mock receiving chain has seen, and how it should behave next.
#[derive(Default)]
struct ReceivingChain {
    connects: usize,
    failing_connects: usize,
    fail_next_submission: bool,
    include_submissions: bool,
    submissions: Vec<(String, CrossChainUpdate)>,
}

#[derive(Clone)]
struct MockClient {
    receiving_chain: Arc<Mutex<ReceivingChain>>,
    last_certificate: LastCertificate,
}

impl ReceivingChainClient for MockClient {
    fn connect(&mut self) -> Result<(), ClientError> {
        let mut receiving_chain = self.receiving_chain.lock().unwrap();
        receiving_chain.connects += 1;
        if receiving_chain.failing_connects > 0 {
            receiving_chain.failing_connects -= 1;
            return Err(ClientError::Transient(String::from("connection refused")));
        }
        Ok(())
    }

    fn last_certificate(&mut self) -> Result<LastCertificate, ClientError> {
        Ok(self.last_certificate)
    }

    fn submit(&mut self, command: &str, update: &CrossChainUpdate) -> Result<TransactionID, ClientError> {
        let mut receiving_chain = self.receiving_chain.lock().unwrap();
        if receiving_chain.fail_next_submission {
            receiving_chain.fail_next_submission = false;
            return Err(ClientError::Fatal(String::from("transaction rejected")));
        }
        receiving_chain
            .submissions
            .push((command.to_string(), update.clone()));
        Ok(TransactionID::new(CryptoHash::new(
            [receiving_chain.submissions.len() as u8; 32],
        )))
    }

    fn is_included(&mut self, _: &TransactionID) -> Result<bool, ClientError> {
        Ok(self.receiving_chain.lock().unwrap().include_submissions)
    }
}

impl MockClient {
    fn new(validators_hash: CryptoHash) -> Self {
        MockClient {
            receiving_chain: Arc::new(Mutex::new(ReceivingChain::default())),
            last_certificate: LastCertificate {
                height: BlockHeight::new(0),
                validators_hash,
            },
        }
    }

    fn submitted_heights(&self) -> Vec<BlockHeight> {
        self.receiving_chain
            .lock()
            .unwrap()
            .submissions
            .iter()
            .map(|(_, update)| {
                Certificate::try_from_slice(&update.certificate)
                    .unwrap()
                    .height
            })
            .collect()
    }
}

fn configuration(chain_role: ChainRole, submission_timeout: Duration) -> ConnectorConfiguration {
    ConnectorConfiguration::builder()
        .chain_role(chain_role)
        .sending_chain_id(ChainID::new([0, 0, 0, 2]))
        .submission_timeout(submission_timeout)
        .log_events(true)
        .build()
}

/// Run four equally weighted validators for `number_of_blocks` blocks. Every block carries an aggregate
/// commit on the highest precommitted block whenever that is above the certified height.
fn finalized_chain(number_of_blocks: u32) -> (Vec<NewBlock>, CryptoHash) {
    let (signing_keys, validators) = validator_set(&[1, 1, 1, 1]);
    let mut bft_module = start_bft_module(MemDB::new(), 0, 4);
    let update = bft_module
        .set_bft_parameters(BFTWeight::new(3), BFTWeight::new(3), validators.clone())
        .unwrap()
        .unwrap();
    let mut chain = HonestChain::new(signing_keys, validators, update.validators_hash);

    let mut new_blocks = Vec::new();
    for height in 1..=number_of_blocks {
        let bft_heights = bft_module.bft_heights().unwrap();
        let commit = if bft_heights.max_height_precommitted > bft_heights.max_height_certified {
            aggregate_commit(bft_heights.max_height_precommitted.int(), 4, &[0, 1, 2, 3])
        } else {
            AggregateCommit::empty(BlockHeight::new(0))
        };
        let header = chain.header(height, bft_heights.max_height_prevoted, commit);
        bft_module.process_block(&header).unwrap();
        new_blocks.push(bft_module.new_block(&header).unwrap());
    }
    (new_blocks, update.validators_hash)
}

fn state_changes(events: &Receiver<Event>) -> Vec<(ConnectorState, ConnectorState)> {
    events
        .try_iter()
        .filter_map(|event| match event {
            Event::ConnectorStateChange(event) => Some((event.from, event.to)),
            _ => None,
        })
        .collect()
}

#[test]
fn ready_connector_submits_the_highest_certificate() {
    setup_logger(LevelFilter::Trace);

    let (new_blocks, validators_hash) = finalized_chain(20);
    let client = MockClient::new(validators_hash);
    let (event_publisher, events) = mpsc::channel();
    let mut connector = ChainConnector::new(
        configuration(ChainRole::Mainchain, Duration::from_secs(60)),
        client.clone(),
        None,
        ChainHistoryCache::new(),
        Some(event_publisher),
    );

    // 1. The first block takes the connector all the way to Ready.
    connector.on_new_block(new_blocks[0].clone());
    assert_eq!(connector.state(), ConnectorState::Ready);
    assert_eq!(
        state_changes(&events),
        vec![
            (ConnectorState::Disconnected, ConnectorState::Connecting),
            (ConnectorState::Connecting, ConnectorState::Syncing),
            (ConnectorState::Syncing, ConnectorState::Ready),
        ]
    );
    assert_eq!(connector.last_certificate(), Some(client.last_certificate));

    // 2. Feed blocks until the first submission. It carries the certificate of the certified block, in
    //    the mainchain command, without a validator update since the validator set never changed.
    let mut submitted_at = None;
    for new_block in &new_blocks[1..] {
        let certified = new_block.bft_heights.max_height_certified;
        connector.on_new_block(new_block.clone());
        if connector.has_pending_submission() {
            submitted_at = Some(certified);
            break;
        }
    }
    let certified = submitted_at.unwrap();
    assert_eq!(client.submitted_heights(), vec![certified]);

    let receiving_chain = client.receiving_chain.lock().unwrap();
    let (command, update) = &receiving_chain.submissions[0];
    assert_eq!(command, "submitMainchainCrossChainUpdate");
    assert_eq!(update.sending_chain_id, ChainID::new([0, 0, 0, 2]));
    assert!(update.active_validators_update.is_empty());
    assert_eq!(update.certificate_threshold, BFTWeight::new(3));
    let certificate = Certificate::try_from_slice(&update.certificate).unwrap();
    assert_eq!(certificate.validators_hash, validators_hash);
    assert_eq!(
        certificate.block_id,
        connector.history().block_header(certified).unwrap().id()
    );
}

#[test]
fn one_submission_is_in_flight_at_a_time() {
    setup_logger(LevelFilter::Trace);

    let (new_blocks, validators_hash) = finalized_chain(40);
    let client = MockClient::new(validators_hash);
    let mut connector = ChainConnector::new(
        configuration(ChainRole::Sidechain, Duration::from_secs(60)),
        client.clone(),
        None,
        ChainHistoryCache::new(),
        None,
    );

    // 1. Nothing is included: the first submission stays in flight, and nothing else is submitted.
    let (last, rest) = new_blocks.split_last().unwrap();
    for new_block in rest {
        connector.on_new_block(new_block.clone());
    }
    let first = client.submitted_heights();
    assert_eq!(first.len(), 1);
    assert!(connector.has_pending_submission());
    assert_eq!(connector.last_certificate().unwrap().height, BlockHeight::new(0));

    // 2. Once included, the submitted certificate becomes the last certificate, and the next one is
    //    submitted right away.
    client.receiving_chain.lock().unwrap().include_submissions = true;
    connector.on_new_block(last.clone());
    assert_eq!(connector.last_certificate().unwrap().height, first[0]);

    let submitted = client.submitted_heights();
    assert_eq!(submitted.len(), 2);
    assert_eq!(submitted[1], last.bft_heights.max_height_certified);
    assert!(submitted[1] > submitted[0]);
    assert!(client
        .receiving_chain
        .lock()
        .unwrap()
        .submissions
        .iter()
        .all(|(command, _)| command == "submitSidechainCrossChainUpdate"));
}

#[test]
fn client_errors_disconnect_until_the_next_block() {
    setup_logger(LevelFilter::Trace);

    let (new_blocks, validators_hash) = finalized_chain(30);
    let client = MockClient::new(validators_hash);
    client.receiving_chain.lock().unwrap().failing_connects = 2;
    let (event_publisher, events) = mpsc::channel();
    let mut connector = ChainConnector::new(
        configuration(ChainRole::Sidechain, Duration::from_secs(60)),
        client.clone(),
        None,
        ChainHistoryCache::new(),
        Some(event_publisher),
    );
    let mut new_blocks = new_blocks.into_iter();

    // 1. Two failed connection attempts, one per block.
    for _ in 0..2 {
        connector.on_new_block(new_blocks.next().unwrap());
        assert_eq!(connector.state(), ConnectorState::Disconnected);
    }
    assert_eq!(
        state_changes(&events),
        vec![
            (ConnectorState::Disconnected, ConnectorState::Connecting),
            (ConnectorState::Connecting, ConnectorState::Disconnected),
            (ConnectorState::Disconnected, ConnectorState::Connecting),
            (ConnectorState::Connecting, ConnectorState::Disconnected),
        ]
    );

    // 2. The third attempt succeeds.
    connector.on_new_block(new_blocks.next().unwrap());
    assert_eq!(connector.state(), ConnectorState::Ready);
    assert_eq!(client.receiving_chain.lock().unwrap().connects, 3);

    // 3. A rejected submission disconnects the connector. The next block reconnects and submits again.
    client.receiving_chain.lock().unwrap().fail_next_submission = true;
    let mut rejected = false;
    for new_block in new_blocks.by_ref() {
        connector.on_new_block(new_block);
        if connector.state() == ConnectorState::Disconnected {
            rejected = true;
            break;
        }
    }
    assert!(rejected);
    assert!(client.submitted_heights().is_empty());
    assert!(!connector.has_pending_submission());

    connector.on_new_block(new_blocks.next().unwrap());
    assert_eq!(connector.state(), ConnectorState::Ready);
    assert_eq!(client.submitted_heights().len(), 1);
    assert!(connector.has_pending_submission());
}

#[test]
fn timed_out_submissions_are_forgotten_and_resubmitted() {
    setup_logger(LevelFilter::Trace);

    let (new_blocks, validators_hash) = finalized_chain(30);
    let client = MockClient::new(validators_hash);
    let (event_publisher, events) = mpsc::channel();
    let mut connector = ChainConnector::new(
        configuration(ChainRole::Mainchain, Duration::ZERO),
        client.clone(),
        None,
        ChainHistoryCache::new(),
        Some(event_publisher),
    );

    let mut blocks_after_first_submission = 0;
    for new_block in new_blocks {
        if connector.has_pending_submission() {
            blocks_after_first_submission += 1;
        }
        connector.on_new_block(new_block);
    }
    assert!(blocks_after_first_submission > 0);

    // Every block after the first submission times out the previous one and submits anew.
    let submitted = client.submitted_heights();
    assert_eq!(submitted.len(), blocks_after_first_submission + 1);
    assert!(submitted.windows(2).all(|pair| pair[0] <= pair[1]));

    let timeouts = events
        .try_iter()
        .filter(|event| matches!(event, Event::SubmissionTimeout(_)))
        .count();
    assert_eq!(timeouts, blocks_after_first_submission);
    assert_eq!(connector.last_certificate().unwrap().height, BlockHeight::new(0));
}

#[test]
fn connector_thread_relays_notified_blocks() {
    setup_logger(LevelFilter::Trace);

    let (new_blocks, validators_hash) = finalized_chain(20);
    let client = MockClient::new(validators_hash);
    let (submissions, received) = mpsc::channel();
    let connector = ConnectorSpec::builder()
        .client(client.clone())
        .configuration(configuration(ChainRole::Mainchain, Duration::from_secs(60)))
        .on_submit_cross_chain_update(move |event: &SubmitCrossChainUpdateEvent| {
            let _ = submissions.send((event.certificate_height, event.transaction_id));
        })
        .build()
        .start();

    for new_block in new_blocks {
        connector.notify(new_block);
    }

    // Wait for the connector thread to submit.
    let deadline = Instant::now() + Duration::from_secs(10);
    while client.submitted_heights().is_empty() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    drop(connector);

    let submitted = client.submitted_heights();
    assert_eq!(submitted.len(), 1);
    assert_eq!(
        received.try_recv().unwrap(),
        (submitted[0], TransactionID::new(CryptoHash::new([1; 32])))
    );
}
