/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Trait for a pluggable client of the receiving chain.
//!
//! The chain connector does not know how to talk to the receiving chain. Library users provide that by
//! implementing [`ReceivingChainClient`], for example over the receiving chain's RPC endpoint.

use std::fmt::{self, Display};

use crate::certification::types::LastCertificate;

use super::types::{CrossChainUpdate, TransactionID};

/// Client of the receiving chain, driven by the chain connector thread.
///
/// Every method may block. None of them should block for much longer than a block time, since new
/// blocks queue up behind them.
pub trait ReceivingChainClient: Send {
    /// Establish a connection to the receiving chain.
    fn connect(&mut self) -> Result<(), ClientError>;

    /// Get the last certificate of this chain that the receiving chain accepted.
    fn last_certificate(&mut self) -> Result<LastCertificate, ClientError>;

    /// Submit a transaction that invokes `command` with `update` as its parameters. Returns the ID of the
    /// submitted transaction.
    fn submit(&mut self, command: &str, update: &CrossChainUpdate) -> Result<TransactionID, ClientError>;

    /// Check whether the transaction with `transaction_id` has been included in the receiving chain.
    fn is_included(&mut self, transaction_id: &TransactionID) -> Result<bool, ClientError>;
}

/// Error returned by a [`ReceivingChainClient`].
///
/// Either kind of error disconnects the connector. The kind only decides how the error is logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientError {
    /// The request may succeed if retried, e.g., the connection dropped.
    Transient(String),
    /// The request will not succeed if retried, e.g., the receiving chain rejected the transaction.
    Fatal(String),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transient(reason) => write!(f, "transient client error: {}", reason),
            ClientError::Fatal(reason) => write!(f, "fatal client error: {}", reason),
        }
    }
}

impl std::error::Error for ClientError {}
