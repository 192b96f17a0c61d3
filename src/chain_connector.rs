/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a chain connector.
//!
//! Here is an example that demonstrates how to build and start a chain connector using the builder
//! pattern:
//!
//! ```ignore
//! let connector =
//!     ConnectorSpec::builder()
//!     .client(client)
//!     .configuration(configuration)
//!     .history(history)
//!     .on_submit_cross_chain_update(submit_handler)
//!     .build()
//!     .start();
//!
//! // For every block processed by the BFT module:
//! connector.notify(new_block);
//! ```
//!
//! ### Required setters
//!
//! - `.client(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! - `.verifier(...)`: check aggregate signatures before submitting.
//! - `.history(...)`: start from a pre-filled history cache, e.g., one holding the validator snapshots
//!   read from the consensus state.
//! - `.on_connector_state_change(...)`
//! - `.on_new_certificate(...)`
//! - `.on_submit_cross_chain_update(...)`
//! - `.on_submission_included(...)`
//! - `.on_submission_timeout(...)`

use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::certification::history::ChainHistoryCache;
use crate::config::ConnectorConfiguration;
use crate::event_bus::*;
use crate::events::*;
use crate::relay::{
    implementation::{start_connector, ChainConnector},
    pluggables::ReceivingChainClient,
    types::NewBlock,
};
use crate::types::crypto_primitives::AggregateSignatureVerifier;

/// Stores all parameters and trait implementations required to run a [Connector].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ConnectorSpec]. On the builder call the following methods to construct a valid [ConnectorSpec].

    Required:
    - `.client(...)`
    - `.configuration(...)`

    Optional:
    - `.verifier(...)`
    - `.history(...)`
    - `.on_connector_state_change(...)`
    - `.on_new_certificate(...)`
    - `.on_submit_cross_chain_update(...)`
    - `.on_submission_included(...)`
    - `.on_submission_timeout(...)`
"))]
pub struct ConnectorSpec<C: ReceivingChainClient + 'static> {
    // Required parameters
    #[builder(setter(doc = "Set the client of the receiving chain. The argument must implement the [ReceivingChainClient](crate::relay::pluggables::ReceivingChainClient) trait. Required."))]
    client: C,
    #[builder(setter(doc = "Set the [configuration](ConnectorConfiguration) of the connector. Required."))]
    configuration: ConnectorConfiguration,
    // Optional parameters
    #[builder(default, setter(transform = |verifier: impl AggregateSignatureVerifier + 'static| Some(Box::new(verifier) as Box<dyn AggregateSignatureVerifier>),
    doc = "Set the verifier of aggregate BLS signatures. Certificates whose signature does not verify are not submitted. Optional."))]
    verifier: Option<Box<dyn AggregateSignatureVerifier>>,
    #[builder(default, setter(doc = "Set the history cache to start from. Optional, defaults to an empty cache."))]
    history: ChainHistoryCache,
    #[builder(default, setter(transform = |handler: impl Fn(&ConnectorStateChangeEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ConnectorStateChangeEvent>),
    doc = "Register a handler closure to be invoked after the connector changes state. Optional."))]
    on_connector_state_change: Option<HandlerPtr<ConnectorStateChangeEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&NewCertificateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<NewCertificateEvent>),
    doc = "Register a handler closure to be invoked after the connector finds a certificate the receiving chain can trust. Optional."))]
    on_new_certificate: Option<HandlerPtr<NewCertificateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SubmitCrossChainUpdateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SubmitCrossChainUpdateEvent>),
    doc = "Register a handler closure to be invoked after the connector submits a cross-chain update. Optional."))]
    on_submit_cross_chain_update: Option<HandlerPtr<SubmitCrossChainUpdateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SubmissionIncludedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SubmissionIncludedEvent>),
    doc = "Register a handler closure to be invoked after a submitted cross-chain update is included on the receiving chain. Optional."))]
    on_submission_included: Option<HandlerPtr<SubmissionIncludedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&SubmissionTimeoutEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<SubmissionTimeoutEvent>),
    doc = "Register a handler closure to be invoked after a submitted cross-chain update times out. Optional."))]
    on_submission_timeout: Option<HandlerPtr<SubmissionTimeoutEvent>>,
}

impl<C: ReceivingChainClient + 'static> ConnectorSpec<C> {
    /// Starts the connector thread and, if any handler is registered, the event bus thread, and returns
    /// the handles to them in a [Connector] struct.
    pub fn start(self) -> Connector {
        let event_handlers = EventHandlers::for_connector(
            self.configuration.log_events,
            self.on_connector_state_change,
            self.on_new_certificate,
            self.on_submit_cross_chain_update,
            self.on_submission_included,
            self.on_submission_timeout,
        );

        let (event_publisher, event_bus, event_bus_shutdown) = if !event_handlers.is_empty() {
            let (event_publisher, event_subscriber) = mpsc::channel();
            let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
            let event_bus = start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_publisher), Some(event_bus), Some(event_bus_shutdown))
        } else {
            (None, None, None)
        };

        let chain_connector = ChainConnector::new(
            self.configuration,
            self.client,
            self.verifier,
            self.history,
            event_publisher,
        );
        let (notifier, new_blocks) = mpsc::channel();
        let (connector_shutdown, connector_shutdown_receiver) = mpsc::channel();
        let connector = start_connector(chain_connector, new_blocks, connector_shutdown_receiver);

        Connector {
            notifier,
            connector: Some(connector),
            connector_shutdown,
            event_bus,
            event_bus_shutdown,
        }
    }
}

/// A handle to the background threads of a chain connector. When this value is dropped, all background
/// threads are gracefully shut down.
pub struct Connector {
    notifier: Sender<NewBlock>,
    connector: Option<JoinHandle<()>>,
    connector_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl Connector {
    /// Notify the connector of a new block. Returns immediately.
    pub fn notify(&self, new_block: NewBlock) {
        let _ = self.notifier.send(new_block);
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        // The connector thread publishes events, so it stops before the event bus does.
        let _ = self.connector_shutdown.send(());
        if let Some(connector) = self.connector.take() {
            let _ = connector.join();
        }

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
