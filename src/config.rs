/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of the BFT module and of the chain connector.
//!
//! Both configuration types are built with the builder pattern, for example:
//!
//! ```ignore
//! let configuration =
//!     BFTConfiguration::builder()
//!     .batch_size(103)
//!     .block_time(10)
//!     .log_events(true)
//!     .build()
//! ```

use std::time::Duration;

use typed_builder::TypedBuilder;

use crate::{relay::types::ChainRole, types::data_types::ChainID};

/// Protocol constants of the BFT module.
///
/// ## Batch size
///
/// The maximum number of validators in a validator set. The votes ledger retains the `3 * batch_size`
/// newest blocks, which is enough history to check implied votes and contradictions across three full
/// rounds of generators.
///
/// ## Block time
///
/// The length of a slot in seconds. One block may be generated per slot.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [BFTConfiguration]. On the builder call the following methods to construct a valid [BFTConfiguration].

    Required:
    - `.batch_size(...)`
    - `.block_time(...)`
    - `.log_events(...)`
"))]
pub struct BFTConfiguration {
    #[builder(setter(doc = "Set the maximum number of validators in a validator set. Required."))]
    pub batch_size: u32,
    #[builder(setter(doc = "Set the length of a slot, in seconds. Required."))]
    pub block_time: u32,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Parameters of a chain connector, which relays certificates of this chain to one receiving chain.
///
/// ## Submission timeout
///
/// The connector never has more than one cross-chain update in flight. If a submitted update is not
/// included on the receiving chain within `submission_timeout`, the connector forgets it and is free to
/// submit again.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ConnectorConfiguration]. On the builder call the following methods to construct a valid [ConnectorConfiguration].

    Required:
    - `.chain_role(...)`
    - `.sending_chain_id(...)`
    - `.submission_timeout(...)`
    - `.log_events(...)`

    Optional:
    - `.history_retention(...)`
"))]
pub struct ConnectorConfiguration {
    #[builder(setter(doc = "Set the role of this chain, i.e., the sending chain. Required."))]
    pub chain_role: ChainRole,
    #[builder(setter(doc = "Set the chain ID of this chain, as known to the receiving chain. Required."))]
    pub sending_chain_id: ChainID,
    #[builder(setter(doc = "Set how long to wait for a submitted update to be included before forgetting it. Required."))]
    pub submission_timeout: Duration,
    #[builder(
        default = 1000,
        setter(doc = "Set how many heights of history below the last certified height to keep in memory. Optional, defaults to 1000.")
    )]
    pub history_retention: u32,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}
