/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by the BFT module and the chain connector, for event handling and
//! logging.
//!
//! An event for a given action indicates that the action has been completed. For the BFT module, that
//! means the corresponding write batch has been written to the key-value store.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::{
    bft_votes::types::BFTHeights,
    relay::types::{ConnectorState, TransactionID},
    types::data_types::{Address, BFTWeight, BlockHeight, CryptoHash},
};

pub enum Event {
    // Events that change the consensus state.
    SetBFTParameters(SetBFTParametersEvent),
    ProcessBlock(ProcessBlockEvent),
    UpdateBFTHeights(UpdateBFTHeightsEvent),
    PruneBFTParameters(PruneBFTParametersEvent),
    PruneValidatorSnapshots(PruneValidatorSnapshotsEvent),
    // Chain connector events.
    ConnectorStateChange(ConnectorStateChangeEvent),
    NewCertificate(NewCertificateEvent),
    SubmitCrossChainUpdate(SubmitCrossChainUpdateEvent),
    SubmissionIncluded(SubmissionIncludedEvent),
    SubmissionTimeout(SubmissionTimeoutEvent),
}

impl Event {
    /// Publish `event` if there is anyone to publish it to. Events are dropped silently if the event bus
    /// has already shut down.
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(event);
        }
    }
}

/// New BFT parameters were stored. They apply from `height`.
pub struct SetBFTParametersEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub validators_hash: CryptoHash,
    pub number_of_validators: usize,
    pub precommit_threshold: BFTWeight,
    pub certificate_threshold: BFTWeight,
}

/// A block was recorded in the votes ledger.
pub struct ProcessBlockEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub generator_address: Address,
}

/// At least one of the finality watermarks advanced.
pub struct UpdateBFTHeightsEvent {
    pub timestamp: SystemTime,
    pub bft_heights: BFTHeights,
}

/// BFT parameters records that no longer apply to any retained or uncertified block were deleted.
pub struct PruneBFTParametersEvent {
    pub timestamp: SystemTime,
    pub heights: Vec<BlockHeight>,
}

/// Validator snapshots were deleted.
pub struct PruneValidatorSnapshotsEvent {
    pub timestamp: SystemTime,
    pub validators_hashes: Vec<CryptoHash>,
}

pub struct ConnectorStateChangeEvent {
    pub timestamp: SystemTime,
    pub from: ConnectorState,
    pub to: ConnectorState,
}

/// The chain connector found a certificate that the receiving chain can trust.
pub struct NewCertificateEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub block_id: CryptoHash,
}

pub struct SubmitCrossChainUpdateEvent {
    pub timestamp: SystemTime,
    pub certificate_height: BlockHeight,
    pub transaction_id: TransactionID,
}

pub struct SubmissionIncludedEvent {
    pub timestamp: SystemTime,
    pub transaction_id: TransactionID,
}

/// An in-flight submission was not included within the submission timeout and was forgotten.
pub struct SubmissionTimeoutEvent {
    pub timestamp: SystemTime,
    pub transaction_id: TransactionID,
}
