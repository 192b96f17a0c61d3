/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the `log_events` flag of
//! the [BFT module configuration](crate::config::BFTConfiguration) or the
//! [connector configuration](crate::config::ConnectorConfiguration).
//!
//! This crate logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how an [UpdateBFTHeights](crate::events::UpdateBFTHeightsEvent) is printed:
//!
//! ```text
//! UpdateBFTHeights, 1701329264, 1022, 1020, 1012
//! ```
//!
//! In the snippet, the third, fourth, and fifth values are the new `max_height_prevoted`,
//! `max_height_precommitted`, and `max_height_certified` respectively.
//!
//! Hashes and addresses are printed as the first seven characters of their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const SET_BFT_PARAMETERS: &str = "SetBFTParameters";
pub const PROCESS_BLOCK: &str = "ProcessBlock";
pub const UPDATE_BFT_HEIGHTS: &str = "UpdateBFTHeights";
pub const PRUNE_BFT_PARAMETERS: &str = "PruneBFTParameters";
pub const PRUNE_VALIDATOR_SNAPSHOTS: &str = "PruneValidatorSnapshots";

pub const CONNECTOR_STATE_CHANGE: &str = "ConnectorStateChange";
pub const NEW_CERTIFICATE: &str = "NewCertificate";
pub const SUBMIT_CROSS_CHAIN_UPDATE: &str = "SubmitCrossChainUpdate";
pub const SUBMISSION_INCLUDED: &str = "SubmissionIncluded";
pub const SUBMISSION_TIMEOUT: &str = "SubmissionTimeout";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for SetBFTParametersEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |set_bft_parameters_event: &SetBFTParametersEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}, {}",
                SET_BFT_PARAMETERS,
                secs_since_unix_epoch(set_bft_parameters_event.timestamp),
                set_bft_parameters_event.height,
                first_seven_base64_chars(&set_bft_parameters_event.validators_hash.bytes()),
                set_bft_parameters_event.number_of_validators,
                set_bft_parameters_event.precommit_threshold,
                set_bft_parameters_event.certificate_threshold
            )
        };
        Box::new(logger)
    }
}

impl Logger for ProcessBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |process_block_event: &ProcessBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROCESS_BLOCK,
                secs_since_unix_epoch(process_block_event.timestamp),
                process_block_event.height,
                first_seven_base64_chars(&process_block_event.generator_address.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for UpdateBFTHeightsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |update_bft_heights_event: &UpdateBFTHeightsEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                UPDATE_BFT_HEIGHTS,
                secs_since_unix_epoch(update_bft_heights_event.timestamp),
                update_bft_heights_event.bft_heights.max_height_prevoted,
                update_bft_heights_event.bft_heights.max_height_precommitted,
                update_bft_heights_event.bft_heights.max_height_certified
            )
        };
        Box::new(logger)
    }
}

impl Logger for PruneBFTParametersEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prune_bft_parameters_event: &PruneBFTParametersEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PRUNE_BFT_PARAMETERS,
                secs_since_unix_epoch(prune_bft_parameters_event.timestamp),
                prune_bft_parameters_event.heights.len(),
                prune_bft_parameters_event
                    .heights
                    .last()
                    .map_or(String::from("-"), |height| height.to_string())
            )
        };
        Box::new(logger)
    }
}

impl Logger for PruneValidatorSnapshotsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |prune_validator_snapshots_event: &PruneValidatorSnapshotsEvent| {
            log::info!(
                "{}, {}, {}",
                PRUNE_VALIDATOR_SNAPSHOTS,
                secs_since_unix_epoch(prune_validator_snapshots_event.timestamp),
                prune_validator_snapshots_event.validators_hashes.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for ConnectorStateChangeEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |connector_state_change_event: &ConnectorStateChangeEvent| {
            log::info!(
                "{}, {}, {:?}, {:?}",
                CONNECTOR_STATE_CHANGE,
                secs_since_unix_epoch(connector_state_change_event.timestamp),
                connector_state_change_event.from,
                connector_state_change_event.to
            )
        };
        Box::new(logger)
    }
}

impl Logger for NewCertificateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |new_certificate_event: &NewCertificateEvent| {
            log::info!(
                "{}, {}, {}, {}",
                NEW_CERTIFICATE,
                secs_since_unix_epoch(new_certificate_event.timestamp),
                new_certificate_event.height,
                first_seven_base64_chars(&new_certificate_event.block_id.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for SubmitCrossChainUpdateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |submit_cross_chain_update_event: &SubmitCrossChainUpdateEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SUBMIT_CROSS_CHAIN_UPDATE,
                secs_since_unix_epoch(submit_cross_chain_update_event.timestamp),
                submit_cross_chain_update_event.certificate_height,
                first_seven_base64_chars(&submit_cross_chain_update_event.transaction_id.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for SubmissionIncludedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |submission_included_event: &SubmissionIncludedEvent| {
            log::info!(
                "{}, {}, {}",
                SUBMISSION_INCLUDED,
                secs_since_unix_epoch(submission_included_event.timestamp),
                first_seven_base64_chars(&submission_included_event.transaction_id.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for SubmissionTimeoutEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |submission_timeout_event: &SubmissionTimeoutEvent| {
            log::warn!(
                "{}, {}, {}",
                SUBMISSION_TIMEOUT,
                secs_since_unix_epoch(submission_timeout_event.timestamp),
                first_seven_base64_chars(&submission_timeout_event.transaction_id.bytes())
            )
        };
        Box::new(logger)
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
