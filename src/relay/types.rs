/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types specific to the chain connector.

use std::fmt::{self, Debug, Formatter};
use std::time::Instant;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    bft_votes::types::BFTHeights,
    certification::types::LastCertificate,
    types::{
        block::BlockHeader,
        data_types::{BFTWeight, BlockHeight, BlsKey, ChainID, CryptoHash},
        validators::ValidatorsData,
    },
};

/// Role of the sending chain in the interoperability network.
///
/// A mainchain relays to sidechains and vice versa. The receiving chain exposes a different command
/// for each direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainRole {
    Mainchain,
    Sidechain,
}

impl ChainRole {
    /// Get the name of the command that submits a cross-chain update from a chain with this role.
    pub fn submit_command(&self) -> &'static str {
        match self {
            ChainRole::Mainchain => "submitMainchainCrossChainUpdate",
            ChainRole::Sidechain => "submitSidechainCrossChainUpdate",
        }
    }
}

/// Connection state of the chain connector.
///
/// ```text
/// Disconnected ──► Connecting ──► Syncing ──► Ready
///      ▲                │            │          │
///      └────────────────┴────────────┴──────────┘  (client error)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorState {
    /// No connection to the receiving chain.
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// Connected. The last certificate accepted by the receiving chain is being fetched.
    Syncing,
    /// The last certificate is known. New certificates are submitted as they become available.
    Ready,
}

/// ID of a transaction submitted to the receiving chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize)]
pub struct TransactionID(CryptoHash);

impl TransactionID {
    pub const fn new(hash: CryptoHash) -> Self {
        Self(hash)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0.bytes()
    }
}

impl Debug for TransactionID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// A member of the validator set that the receiving chain should trust from now on.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ActiveValidator {
    pub bls_key: BlsKey,
    pub bft_weight: BFTWeight,
}

/// Payload of the transaction that carries a certificate to the receiving chain.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CrossChainUpdate {
    pub sending_chain_id: ChainID,
    /// Borsh-encoded [`Certificate`](crate::certification::types::Certificate).
    pub certificate: Vec<u8>,
    /// The complete new validator set, in BLS key order, if the certificate's validators hash differs from
    /// that of the last certificate. Empty otherwise.
    pub active_validators_update: Vec<ActiveValidator>,
    /// The certificate threshold of the validator set named by the certificate.
    pub certificate_threshold: BFTWeight,
}

/// Notification of a new block on the sending chain, sent to the connector thread.
#[derive(Clone, Debug)]
pub struct NewBlock {
    pub header: BlockHeader,
    /// The finality watermarks right after the block was processed.
    pub bft_heights: BFTHeights,
    /// The snapshot of a validator set that was stored while processing the block, if any.
    pub validators_data: Option<ValidatorsData>,
}

/// The one cross-chain update that the connector is waiting on.
#[derive(Clone, Debug)]
pub(crate) struct PendingSubmission {
    pub(crate) transaction_id: TransactionID,
    pub(crate) certificate: LastCertificate,
    pub(crate) submitted_at: Instant,
}

impl PendingSubmission {
    pub(crate) fn certificate_height(&self) -> BlockHeight {
        self.certificate.height
    }
}
