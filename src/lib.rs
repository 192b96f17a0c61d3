/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! BFT finality bookkeeping and cross-chain certificate generation for proof-of-stake chains.
//!
//! Every block header of a chain carries two numbers besides its height: `max_height_prevoted` and
//! `max_height_generated`. Together they imply prevotes and precommits by the block's generator for
//! earlier blocks. This crate tallies those implied votes by stake to decide which blocks are prevoted,
//! precommitted, and certified (final), and turns certified blocks into compact certificates that a
//! receiving chain can verify.
//!
//! The main components are:
//! - The [BFT module](bft_module), owned by the block-processing pipeline. It keeps the
//!   [BFT parameters store](bft_parameters) and the [votes ledger](bft_votes) up to date in the
//!   user-provided [key-value store](state::kv_store::KVStore), and [selects generators](generators).
//! - The [certification engine](certification), which derives certificates and decides which
//!   certificates a receiving chain can trust.
//! - The [chain connector](chain_connector), which relays certificates to a receiving chain over a
//!   user-provided [client](relay::pluggables::ReceivingChainClient).
//!
//! Both the BFT module and the chain connector publish [events](events) that can be
//! [logged](logging) or handled by user-registered closures.

pub mod bft_module;

pub mod bft_parameters;

pub mod bft_votes;

pub mod certification;

pub mod chain_connector;

pub mod config;

pub mod errors;

pub mod event_bus;

pub mod events;

pub mod generators;

pub mod logging;

pub mod relay;

pub mod state;

pub mod types;
