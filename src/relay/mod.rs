//! Relaying of certificates from this chain to a receiving chain.
//!
//! The [chain connector](implementation::ChainConnector) keeps a
//! [history cache](crate::certification::history::ChainHistoryCache) of recent block headers,
//! aggregate commits, and validator snapshots. On every new block it asks the
//! [certification engine](crate::certification) for the next certificate that the receiving chain can
//! trust, wraps it in a [cross-chain update](types::CrossChainUpdate), and submits it through a
//! user-provided [client](pluggables::ReceivingChainClient).
//!
//! At most one cross-chain update is in flight at any time. It is settled when it is included on the
//! receiving chain, or forgotten when the submission timeout elapses.
//!
//! The connector is started and kept alive through [`ConnectorSpec`](crate::chain_connector::ConnectorSpec).

pub mod implementation;

pub mod pluggables;

pub mod types;
