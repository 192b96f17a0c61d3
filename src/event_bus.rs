/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Dispatch of [events](crate::events) to the default loggers and user-registered handlers, on a
//! thread of its own.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus thread blocks waiting for an event before it checks for a shutdown signal.
const EVENT_BUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Default)]
pub(crate) struct EventHandlers {
    pub(crate) set_bft_parameters_handlers: Vec<HandlerPtr<SetBFTParametersEvent>>,
    pub(crate) process_block_handlers: Vec<HandlerPtr<ProcessBlockEvent>>,
    pub(crate) update_bft_heights_handlers: Vec<HandlerPtr<UpdateBFTHeightsEvent>>,
    pub(crate) prune_bft_parameters_handlers: Vec<HandlerPtr<PruneBFTParametersEvent>>,
    pub(crate) prune_validator_snapshots_handlers: Vec<HandlerPtr<PruneValidatorSnapshotsEvent>>,
    pub(crate) connector_state_change_handlers: Vec<HandlerPtr<ConnectorStateChangeEvent>>,
    pub(crate) new_certificate_handlers: Vec<HandlerPtr<NewCertificateEvent>>,
    pub(crate) submit_cross_chain_update_handlers: Vec<HandlerPtr<SubmitCrossChainUpdateEvent>>,
    pub(crate) submission_included_handlers: Vec<HandlerPtr<SubmissionIncludedEvent>>,
    pub(crate) submission_timeout_handlers: Vec<HandlerPtr<SubmissionTimeoutEvent>>,
}

impl EventHandlers {
    /// Create handlers for the events of the BFT module: the default loggers if `log_events` is set, and
    /// `on_*` if provided.
    pub(crate) fn for_bft_module(
        log_events: bool,
        on_set_bft_parameters: Option<HandlerPtr<SetBFTParametersEvent>>,
        on_process_block: Option<HandlerPtr<ProcessBlockEvent>>,
        on_update_bft_heights: Option<HandlerPtr<UpdateBFTHeightsEvent>>,
        on_prune_bft_parameters: Option<HandlerPtr<PruneBFTParametersEvent>>,
        on_prune_validator_snapshots: Option<HandlerPtr<PruneValidatorSnapshotsEvent>>,
    ) -> EventHandlers {
        let mut handlers = EventHandlers::default();
        if log_events {
            handlers
                .set_bft_parameters_handlers
                .push(SetBFTParametersEvent::get_logger());
            handlers
                .process_block_handlers
                .push(ProcessBlockEvent::get_logger());
            handlers
                .update_bft_heights_handlers
                .push(UpdateBFTHeightsEvent::get_logger());
            handlers
                .prune_bft_parameters_handlers
                .push(PruneBFTParametersEvent::get_logger());
            handlers
                .prune_validator_snapshots_handlers
                .push(PruneValidatorSnapshotsEvent::get_logger());
        }
        handlers.set_bft_parameters_handlers.extend(on_set_bft_parameters);
        handlers.process_block_handlers.extend(on_process_block);
        handlers.update_bft_heights_handlers.extend(on_update_bft_heights);
        handlers.prune_bft_parameters_handlers.extend(on_prune_bft_parameters);
        handlers
            .prune_validator_snapshots_handlers
            .extend(on_prune_validator_snapshots);
        handlers
    }

    /// Create handlers for the events of the chain connector: the default loggers if `log_events` is set,
    /// and `on_*` if provided.
    pub(crate) fn for_connector(
        log_events: bool,
        on_connector_state_change: Option<HandlerPtr<ConnectorStateChangeEvent>>,
        on_new_certificate: Option<HandlerPtr<NewCertificateEvent>>,
        on_submit_cross_chain_update: Option<HandlerPtr<SubmitCrossChainUpdateEvent>>,
        on_submission_included: Option<HandlerPtr<SubmissionIncludedEvent>>,
        on_submission_timeout: Option<HandlerPtr<SubmissionTimeoutEvent>>,
    ) -> EventHandlers {
        let mut handlers = EventHandlers::default();
        if log_events {
            handlers
                .connector_state_change_handlers
                .push(ConnectorStateChangeEvent::get_logger());
            handlers
                .new_certificate_handlers
                .push(NewCertificateEvent::get_logger());
            handlers
                .submit_cross_chain_update_handlers
                .push(SubmitCrossChainUpdateEvent::get_logger());
            handlers
                .submission_included_handlers
                .push(SubmissionIncludedEvent::get_logger());
            handlers
                .submission_timeout_handlers
                .push(SubmissionTimeoutEvent::get_logger());
        }
        handlers
            .connector_state_change_handlers
            .extend(on_connector_state_change);
        handlers.new_certificate_handlers.extend(on_new_certificate);
        handlers
            .submit_cross_chain_update_handlers
            .extend(on_submit_cross_chain_update);
        handlers.submission_included_handlers.extend(on_submission_included);
        handlers.submission_timeout_handlers.extend(on_submission_timeout);
        handlers
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.set_bft_parameters_handlers.is_empty()
            && self.process_block_handlers.is_empty()
            && self.update_bft_heights_handlers.is_empty()
            && self.prune_bft_parameters_handlers.is_empty()
            && self.prune_validator_snapshots_handlers.is_empty()
            && self.connector_state_change_handlers.is_empty()
            && self.new_certificate_handlers.is_empty()
            && self.submit_cross_chain_update_handlers.is_empty()
            && self.submission_included_handlers.is_empty()
            && self.submission_timeout_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::SetBFTParameters(set_bft_parameters_event) => self
                .set_bft_parameters_handlers
                .iter()
                .for_each(|handler| handler(&set_bft_parameters_event)),

            Event::ProcessBlock(process_block_event) => self
                .process_block_handlers
                .iter()
                .for_each(|handler| handler(&process_block_event)),

            Event::UpdateBFTHeights(update_bft_heights_event) => self
                .update_bft_heights_handlers
                .iter()
                .for_each(|handler| handler(&update_bft_heights_event)),

            Event::PruneBFTParameters(prune_bft_parameters_event) => self
                .prune_bft_parameters_handlers
                .iter()
                .for_each(|handler| handler(&prune_bft_parameters_event)),

            Event::PruneValidatorSnapshots(prune_validator_snapshots_event) => self
                .prune_validator_snapshots_handlers
                .iter()
                .for_each(|handler| handler(&prune_validator_snapshots_event)),

            Event::ConnectorStateChange(connector_state_change_event) => self
                .connector_state_change_handlers
                .iter()
                .for_each(|handler| handler(&connector_state_change_event)),

            Event::NewCertificate(new_certificate_event) => self
                .new_certificate_handlers
                .iter()
                .for_each(|handler| handler(&new_certificate_event)),

            Event::SubmitCrossChainUpdate(submit_cross_chain_update_event) => self
                .submit_cross_chain_update_handlers
                .iter()
                .for_each(|handler| handler(&submit_cross_chain_update_event)),

            Event::SubmissionIncluded(submission_included_event) => self
                .submission_included_handlers
                .iter()
                .for_each(|handler| handler(&submission_included_event)),

            Event::SubmissionTimeout(submission_timeout_event) => self
                .submission_timeout_handlers
                .iter()
                .for_each(|handler| handler(&submission_timeout_event)),
        }
    }
}

/// Start the event bus thread, which fires `event_handlers` on every event received from
/// `event_subscriber` until a shutdown signal arrives.
///
/// Events that were published before the shutdown signal are still handled. The thread also exits once
/// every publisher has been dropped.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                while let Ok(event) = event_subscriber.try_recv() {
                    event_handlers.fire_handlers(event)
                }
                return;
            }
            Err(TryRecvError::Empty) => (),
        }

        match event_subscriber.recv_timeout(EVENT_BUS_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
