/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chain connector state machine and the thread that drives it.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};

use borsh::BorshSerialize;

use crate::{
    bft_votes::types::BFTHeights,
    certification::{
        history::{ChainHistory, ChainHistoryCache},
        implementation::{next_certificate, verify_aggregate_commit},
        types::{Certificate, LastCertificate},
    },
    config::ConnectorConfiguration,
    errors::BFTError,
    events::*,
    types::{crypto_primitives::AggregateSignatureVerifier, validators::validators_in_bls_key_order},
};

use super::{
    pluggables::{ClientError, ReceivingChainClient},
    types::{ActiveValidator, ConnectorState, CrossChainUpdate, NewBlock, PendingSubmission},
};

/// How long the connector thread blocks waiting for a new block before it checks for a shutdown signal.
const CONNECTOR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Relays certificates of this chain to one receiving chain.
///
/// The connector is driven entirely by [`on_new_block`](Self::on_new_block). On every new block it
/// first settles the in-flight submission, if any, then moves through its [states](ConnectorState) as
/// far as the client allows, and finally, if it is `Ready` and nothing is in flight, submits the next
/// certificate the receiving chain can trust.
///
/// Client errors never escape: they are logged, and the connector falls back to `Disconnected` and tries
/// again on the next block.
pub struct ChainConnector<C: ReceivingChainClient> {
    configuration: ConnectorConfiguration,
    client: C,
    verifier: Option<Box<dyn AggregateSignatureVerifier>>,
    state: ConnectorState,
    history: ChainHistoryCache,
    last_certificate: Option<LastCertificate>,
    pending: Option<PendingSubmission>,
    event_publisher: Option<Sender<Event>>,
}

impl<C: ReceivingChainClient> ChainConnector<C> {
    /// Create a disconnected chain connector.
    ///
    /// `history` should already hold the validator snapshot of the receiving chain's last certificate,
    /// e.g., through [`ChainHistoryCache::load_validators_data`].
    pub fn new(
        configuration: ConnectorConfiguration,
        client: C,
        verifier: Option<Box<dyn AggregateSignatureVerifier>>,
        history: ChainHistoryCache,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        ChainConnector {
            configuration,
            client,
            verifier,
            state: ConnectorState::Disconnected,
            history,
            last_certificate: None,
            pending: None,
            event_publisher,
        }
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    /// Get the last certificate that the receiving chain is known to have accepted.
    pub fn last_certificate(&self) -> Option<LastCertificate> {
        self.last_certificate
    }

    /// Check whether a submitted cross-chain update is still waiting to be included.
    pub fn has_pending_submission(&self) -> bool {
        self.pending.is_some()
    }

    pub fn history(&self) -> &ChainHistoryCache {
        &self.history
    }

    /// React to a new block on this chain.
    pub fn on_new_block(&mut self, new_block: NewBlock) {
        self.history.insert_block_header(new_block.header);
        if let Some(validators_data) = new_block.validators_data {
            self.history.insert_validators_data(validators_data);
        }

        self.settle_pending_submission();
        self.connect_and_sync();
        if self.state == ConnectorState::Ready && self.pending.is_none() {
            self.submit_next_certificate(&new_block.bft_heights);
        }
        self.prune_history();
    }

    fn transition(&mut self, to: ConnectorState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        Event::publish(
            &self.event_publisher,
            Event::ConnectorStateChange(ConnectorStateChangeEvent {
                timestamp: SystemTime::now(),
                from,
                to,
            }),
        );
    }

    fn disconnect(&mut self, error: ClientError) {
        match &error {
            ClientError::Transient(_) => log::warn!("{}", error),
            ClientError::Fatal(_) => log::error!("{}", error),
        }
        self.transition(ConnectorState::Disconnected);
    }

    /// Forget the in-flight submission if it timed out, or adopt its certificate as the last certificate
    /// if it has been included.
    fn settle_pending_submission(&mut self) {
        let Some(pending) = self.pending.clone() else {
            return;
        };

        if pending.submitted_at.elapsed() >= self.configuration.submission_timeout {
            self.pending = None;
            Event::publish(
                &self.event_publisher,
                Event::SubmissionTimeout(SubmissionTimeoutEvent {
                    timestamp: SystemTime::now(),
                    transaction_id: pending.transaction_id,
                }),
            );
            return;
        }

        if self.state != ConnectorState::Ready {
            return;
        }
        match self.client.is_included(&pending.transaction_id) {
            Ok(true) => {
                self.pending = None;
                if self
                    .last_certificate
                    .map_or(true, |last| last.height < pending.certificate_height())
                {
                    self.last_certificate = Some(pending.certificate);
                }
                Event::publish(
                    &self.event_publisher,
                    Event::SubmissionIncluded(SubmissionIncludedEvent {
                        timestamp: SystemTime::now(),
                        transaction_id: pending.transaction_id,
                    }),
                );
            }
            Ok(false) => (),
            Err(err) => self.disconnect(err),
        }
    }

    /// Move towards `Ready`: connect if disconnected, then fetch the last certificate.
    fn connect_and_sync(&mut self) {
        if self.state == ConnectorState::Disconnected {
            self.transition(ConnectorState::Connecting);
        }

        if self.state == ConnectorState::Connecting {
            match self.client.connect() {
                Ok(()) => self.transition(ConnectorState::Syncing),
                Err(err) => return self.disconnect(err),
            }
        }

        if self.state == ConnectorState::Syncing {
            match self.client.last_certificate() {
                Ok(last_certificate) => {
                    self.last_certificate = Some(last_certificate);
                    self.transition(ConnectorState::Ready);
                }
                Err(err) => self.disconnect(err),
            }
        }
    }

    fn submit_next_certificate(&mut self, bft_heights: &BFTHeights) {
        let Some(last_certificate) = self.last_certificate else {
            return;
        };

        let certificate = match next_certificate(&last_certificate, bft_heights, &self.history) {
            Ok(Some(certificate)) => certificate,
            Ok(None) => return,
            Err(err) => {
                log::debug!("no certificate after height {}: {}", last_certificate.height, err);
                return;
            }
        };
        Event::publish(
            &self.event_publisher,
            Event::NewCertificate(NewCertificateEvent {
                timestamp: SystemTime::now(),
                height: certificate.height,
                block_id: certificate.block_id,
            }),
        );

        if self.verifier.is_some() {
            match self.verify_certificate(&certificate) {
                Ok(true) => (),
                Ok(false) => {
                    log::warn!(
                        "aggregate signature of the certificate at height {} does not verify",
                        certificate.height
                    );
                    return;
                }
                Err(err) => {
                    log::debug!("cannot verify the certificate at height {}: {}", certificate.height, err);
                    return;
                }
            }
        }

        let cross_chain_update = match self.cross_chain_update(&last_certificate, &certificate) {
            Ok(cross_chain_update) => cross_chain_update,
            Err(err) => {
                log::debug!("cannot build a cross-chain update: {}", err);
                return;
            }
        };

        let command = self.configuration.chain_role.submit_command();
        match self.client.submit(command, &cross_chain_update) {
            Ok(transaction_id) => {
                self.pending = Some(PendingSubmission {
                    transaction_id,
                    certificate: LastCertificate::from(&certificate),
                    submitted_at: Instant::now(),
                });
                Event::publish(
                    &self.event_publisher,
                    Event::SubmitCrossChainUpdate(SubmitCrossChainUpdateEvent {
                        timestamp: SystemTime::now(),
                        certificate_height: certificate.height,
                        transaction_id,
                    }),
                );
            }
            Err(err) => self.disconnect(err),
        }
    }

    /// Check the aggregate signature of `certificate` against the validator set that signed it, i.e., the
    /// set named by the header one height below.
    fn verify_certificate(&self, certificate: &Certificate) -> Result<bool, BFTError> {
        let Some(verifier) = &self.verifier else {
            return Ok(true);
        };
        let header = self
            .history
            .block_header(certificate.height)
            .ok_or(BFTError::MissingBlockHeader {
                height: certificate.height,
            })?;
        let aggregate_commit = self
            .history
            .aggregate_commit(certificate.height)
            .ok_or(BFTError::MissingAggregateCommit {
                height: certificate.height,
            })?;
        let parent_height = certificate.height.saturating_sub(1);
        let parent = self
            .history
            .block_header(parent_height)
            .ok_or(BFTError::MissingBlockHeader {
                height: parent_height,
            })?;
        let signing_set = self
            .history
            .validators_data(&parent.validators_hash)
            .ok_or(BFTError::MissingValidatorSnapshot {
                validators_hash: parent.validators_hash,
            })?;
        verify_aggregate_commit(&signing_set, &aggregate_commit, &header, verifier.as_ref())
    }

    /// Build the payload that carries `certificate` to the receiving chain.
    fn cross_chain_update(
        &self,
        last_certificate: &LastCertificate,
        certificate: &Certificate,
    ) -> Result<CrossChainUpdate, BFTError> {
        let validators_data = self
            .history
            .validators_data(&certificate.validators_hash)
            .ok_or(BFTError::MissingValidatorSnapshot {
                validators_hash: certificate.validators_hash,
            })?;

        let active_validators_update = if certificate.validators_hash != last_certificate.validators_hash {
            validators_in_bls_key_order(&validators_data.validators)
                .into_iter()
                .filter(|validator| !validator.bls_key.is_placeholder())
                .map(|validator| ActiveValidator {
                    bls_key: validator.bls_key,
                    bft_weight: validator.bft_weight,
                })
                .collect()
        } else {
            Vec::new()
        };

        Ok(CrossChainUpdate {
            sending_chain_id: self.configuration.sending_chain_id,
            // Safety: serializing into a Vec is infallible.
            certificate: certificate.try_to_vec().unwrap(),
            active_validators_update,
            certificate_threshold: validators_data.certificate_threshold,
        })
    }

    fn prune_history(&mut self) {
        if let Some(last_certificate) = self.last_certificate {
            self.history.prune_below(
                last_certificate
                    .height
                    .saturating_sub(self.configuration.history_retention),
            );
        }
    }
}

/// Start the chain connector thread, which feeds every block received from `new_blocks` into `connector`
/// until a shutdown signal arrives or every sender of `new_blocks` has been dropped.
pub(crate) fn start_connector<C: ReceivingChainClient + 'static>(
    mut connector: ChainConnector<C>,
    new_blocks: Receiver<NewBlock>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => return,
            Err(TryRecvError::Empty) => (),
        }

        match new_blocks.recv_timeout(CONNECTOR_POLL_INTERVAL) {
            Ok(new_block) => connector.on_new_block(new_block),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
