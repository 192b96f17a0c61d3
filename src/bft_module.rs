/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, run, and initialize the storage of a BFT module.
//!
//! The BFT module is owned by the block-processing pipeline of a chain. It keeps the
//! [consensus state](crate::state) up to date as blocks are processed, and answers the queries that
//! block validation and block generation need.
//!
//! ## Starting a BFT module
//!
//! ```ignore
//! BFTModule::initialize(kv_store.clone(), genesis_height)?;
//!
//! let mut bft_module =
//!     BFTModuleSpec::builder()
//!     .kv_store(kv_store)
//!     .configuration(configuration)
//!     .on_update_bft_heights(update_bft_heights_handler)
//!     .build()
//!     .start();
//!
//! bft_module.set_bft_parameters(precommit_threshold, certificate_threshold, validators)?;
//! bft_module.process_block(&header)?;
//! ```
//!
//! ### Required setters
//!
//! - `.kv_store(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! - `.on_set_bft_parameters(...)`
//! - `.on_process_block(...)`
//! - `.on_update_bft_heights(...)`
//! - `.on_prune_bft_parameters(...)`
//! - `.on_prune_validator_snapshots(...)`
//!
//! ## Atomicity
//!
//! Every mutating method collects all of its changes into one write batch, which is written only if the
//! method succeeds. Events are published after the write.

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::bft_parameters::{implementation as parameters, types::BFTParameters, types::BFTParametersUpdate};
use crate::bft_votes::{
    implementation as votes,
    implementation::ProcessBlockOutcome,
    types::BFTHeights,
};
use crate::config::BFTConfiguration;
use crate::errors::BFTError;
use crate::event_bus::*;
use crate::events::*;
use crate::generators::{self, Generator, Generators};
use crate::relay::types::NewBlock;
use crate::state::{
    consensus_state::ConsensusState,
    kv_store::KVStore,
    repositories::ValidatorSnapshotRepository,
    write_batch::ConsensusWriteBatch,
};
use crate::types::{
    block::BlockHeader,
    data_types::{BFTWeight, BlockHeight, CryptoHash, SlotNumber, Timestamp},
    validators::{Validator, ValidatorsData},
};

/// Stores all parameters required to start a [BFTModule].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [BFTModuleSpec]. On the builder call the following methods to construct a valid [BFTModuleSpec].

    Required:
    - `.kv_store(...)`
    - `.configuration(...)`

    Optional:
    - `.on_set_bft_parameters(...)`
    - `.on_process_block(...)`
    - `.on_update_bft_heights(...)`
    - `.on_prune_bft_parameters(...)`
    - `.on_prune_validator_snapshots(...)`
"))]
pub struct BFTModuleSpec<K: KVStore> {
    // Required parameters
    #[builder(setter(doc = "Set the implementation of the Key-Value store that holds the consensus state. The argument must implement the [KVStore](crate::state::kv_store::KVStore) trait. Required."))]
    kv_store: K,
    #[builder(setter(doc = "Set the [configuration](BFTConfiguration) of the BFT module. Required."))]
    configuration: BFTConfiguration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&SetBFTParametersEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SetBFTParametersEvent>),
    doc = "Register a handler closure to be invoked after new BFT parameters are stored. Optional."))]
    on_set_bft_parameters: Option<HandlerPtr<SetBFTParametersEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProcessBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProcessBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is recorded in the votes ledger. Optional."))]
    on_process_block: Option<HandlerPtr<ProcessBlockEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&UpdateBFTHeightsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<UpdateBFTHeightsEvent>),
    doc = "Register a handler closure to be invoked after a finality watermark advances. Optional."))]
    on_update_bft_heights: Option<HandlerPtr<UpdateBFTHeightsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PruneBFTParametersEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PruneBFTParametersEvent>),
    doc = "Register a handler closure to be invoked after stale BFT parameters are deleted. Optional."))]
    on_prune_bft_parameters: Option<HandlerPtr<PruneBFTParametersEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PruneValidatorSnapshotsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PruneValidatorSnapshotsEvent>),
    doc = "Register a handler closure to be invoked after stale validator snapshots are deleted. Optional."))]
    on_prune_validator_snapshots: Option<HandlerPtr<PruneValidatorSnapshotsEvent>>,
}

impl<K: KVStore> BFTModuleSpec<K> {
    /// Starts the event bus thread if any handler is registered, and returns the [BFTModule].
    pub fn start(self) -> BFTModule<K> {
        let event_handlers = EventHandlers::for_bft_module(
            self.configuration.log_events,
            self.on_set_bft_parameters,
            self.on_process_block,
            self.on_update_bft_heights,
            self.on_prune_bft_parameters,
            self.on_prune_validator_snapshots,
        );

        let (event_publisher, event_bus, event_bus_shutdown) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_publisher), Some(event_bus), Some(event_bus_shutdown))
        } else {
            (None, None, None)
        };

        BFTModule {
            consensus_state: ConsensusState::new(self.kv_store),
            configuration: self.configuration,
            event_publisher,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// The BFT module: the parameters store, the votes ledger, and the generator selector over one
/// consensus state.
///
/// When this value is dropped, the event bus thread is gracefully shut down after it has handled every
/// event already published.
pub struct BFTModule<K: KVStore> {
    consensus_state: ConsensusState<K>,
    configuration: BFTConfiguration,
    event_publisher: Option<Sender<Event>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<K: KVStore> BFTModule<K> {
    /// Initializes the votes ledger in `kv_store` at `genesis_height`.
    ///
    /// Call this exactly once on an empty store, before the BFT module is started for the first time.
    pub fn initialize(kv_store: K, genesis_height: BlockHeight) -> Result<(), BFTError> {
        let mut consensus_state = ConsensusState::new(kv_store);
        consensus_state.initialize(genesis_height)?;
        Ok(())
    }

    /// Get a point-in-time snapshot of the consensus state, for reading concurrently with block
    /// processing.
    pub fn snapshot(&self) -> K::Snapshot<'_> {
        self.consensus_state.snapshot()
    }

    pub fn configuration(&self) -> &BFTConfiguration {
        &self.configuration
    }

    /* ↓↓↓ BFT Parameters ↓↓↓ */

    /// Get the BFT parameters that apply at `height`.
    pub fn bft_parameters(&self, height: BlockHeight) -> Result<BFTParameters, BFTError> {
        parameters::bft_parameters(&self.consensus_state, height)
    }

    /// Check whether new BFT parameters start applying at exactly `height`.
    pub fn exist_bft_parameters(&self, height: BlockHeight) -> Result<bool, BFTError> {
        parameters::exist_bft_parameters(&self.consensus_state, height)
    }

    /// Get the smallest height above `height` at which new BFT parameters start applying.
    pub fn next_height_bft_parameters(&self, height: BlockHeight) -> Result<BlockHeight, BFTError> {
        parameters::next_height_bft_parameters(&self.consensus_state, height)
    }

    /// Validate and store a new validator set and thresholds, effective from the height after the newest
    /// processed block.
    ///
    /// Returns `Ok(None)` if nothing changed.
    pub fn set_bft_parameters(
        &mut self,
        precommit_threshold: BFTWeight,
        certificate_threshold: BFTWeight,
        validators: Vec<Validator>,
    ) -> Result<Option<BFTParametersUpdate>, BFTError> {
        let number_of_validators = validators.len();
        let mut wb = ConsensusWriteBatch::new();
        let update = parameters::set_bft_parameters(
            &self.consensus_state,
            &mut wb,
            self.configuration.batch_size,
            precommit_threshold,
            certificate_threshold,
            validators,
        )?;

        if let Some(update) = &update {
            self.consensus_state.write(wb);
            Event::publish(
                &self.event_publisher,
                Event::SetBFTParameters(SetBFTParametersEvent {
                    timestamp: SystemTime::now(),
                    height: update.height,
                    validators_hash: update.validators_hash,
                    number_of_validators,
                    precommit_threshold,
                    certificate_threshold,
                }),
            );
        }
        Ok(update)
    }

    /// Delete every validator snapshot that stopped being active before `height`.
    pub fn prune_validator_snapshots(&mut self, height: BlockHeight) -> Result<Vec<CryptoHash>, BFTError> {
        let mut wb = ConsensusWriteBatch::new();
        let pruned = parameters::prune_validator_snapshots(&self.consensus_state, &mut wb, height)?;
        if !pruned.is_empty() {
            self.consensus_state.write(wb);
            Event::publish(
                &self.event_publisher,
                Event::PruneValidatorSnapshots(PruneValidatorSnapshotsEvent {
                    timestamp: SystemTime::now(),
                    validators_hashes: pruned.clone(),
                }),
            );
        }
        Ok(pruned)
    }

    /// Get the snapshot of the validator set with `validators_hash`.
    pub fn validators_data(&self, validators_hash: &CryptoHash) -> Result<Option<ValidatorsData>, BFTError> {
        Ok(self.consensus_state.validators_data(validators_hash)?)
    }

    /* ↓↓↓ BFT Votes ↓↓↓ */

    pub fn bft_heights(&self) -> Result<BFTHeights, BFTError> {
        votes::bft_heights(&self.consensus_state)
    }

    /// Record `header` in the votes ledger and advance the finality watermarks.
    pub fn process_block(&mut self, header: &BlockHeader) -> Result<ProcessBlockOutcome, BFTError> {
        let mut wb = ConsensusWriteBatch::new();
        let outcome = votes::process_block(
            &self.consensus_state,
            &mut wb,
            header,
            self.configuration.batch_size,
        )?;
        self.consensus_state.write(wb);

        Event::publish(
            &self.event_publisher,
            Event::ProcessBlock(ProcessBlockEvent {
                timestamp: SystemTime::now(),
                height: header.height,
                generator_address: header.generator_address,
            }),
        );
        if outcome.bft_heights != outcome.previous_bft_heights {
            Event::publish(
                &self.event_publisher,
                Event::UpdateBFTHeights(UpdateBFTHeightsEvent {
                    timestamp: SystemTime::now(),
                    bft_heights: outcome.bft_heights,
                }),
            );
        }
        if !outcome.pruned_bft_parameters.is_empty() {
            Event::publish(
                &self.event_publisher,
                Event::PruneBFTParameters(PruneBFTParametersEvent {
                    timestamp: SystemTime::now(),
                    heights: outcome.pruned_bft_parameters.clone(),
                }),
            );
        }

        Ok(outcome)
    }

    /// Check whether two headers from the same generator contradict each other.
    pub fn are_headers_contradicting(&self, header1: &BlockHeader, header2: &BlockHeader) -> bool {
        votes::are_headers_contradicting(header1, header2)
    }

    /// Check whether `header` contradicts a block of the same generator retained in the votes ledger.
    pub fn is_header_contradicting_chain(&self, header: &BlockHeader) -> Result<bool, BFTError> {
        votes::is_header_contradicting_chain(&self.consensus_state, header)
    }

    /// Check whether `header`, as the next block, implies the maximal possible prevotes.
    pub fn implies_maximal_prevotes(&self, header: &BlockHeader) -> Result<bool, BFTError> {
        votes::implies_maximal_prevotes(&self.consensus_state, header)
    }

    /// Build the notification of `header`, which has just been processed, for a
    /// [chain connector](crate::chain_connector::Connector).
    pub fn new_block(&self, header: &BlockHeader) -> Result<NewBlock, BFTError> {
        Ok(NewBlock {
            header: header.clone(),
            bft_heights: self.bft_heights()?,
            validators_data: self.validators_data(&header.validators_hash)?,
        })
    }

    /* ↓↓↓ Generators ↓↓↓ */

    pub fn slot_number(&self, timestamp: Timestamp) -> SlotNumber {
        generators::slot_number(timestamp, self.configuration.block_time)
    }

    /// Get the validator that may generate the block at `height` with `timestamp`.
    pub fn generator_at_timestamp(
        &self,
        height: BlockHeight,
        timestamp: Timestamp,
    ) -> Result<Generator, BFTError> {
        generators::generator_at(
            &self.consensus_state,
            height,
            timestamp,
            self.configuration.block_time,
        )
    }

    pub fn generator_keys(&self, height: BlockHeight) -> Result<Generators, BFTError> {
        generators::generator_keys(&self.consensus_state, height)
    }

    /// Check whether `header` was generated in its slot by the right validator, with a valid signature.
    pub fn verify_block_generator(&self, header: &BlockHeader) -> Result<bool, BFTError> {
        generators::verify_block_generator(&self.consensus_state, header, self.configuration.block_time)
    }
}

impl<K: KVStore> Drop for BFTModule<K> {
    fn drop(&mut self) {
        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| {
                let _ = shutdown.send(());
            });
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}
