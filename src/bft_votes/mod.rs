//! The BFT votes ledger: implied votes, finality watermarks, and contradiction checks.
//!
//! # Implied votes
//!
//! Validators do not send explicit vote messages. Instead, every block header carries two heights that
//! let the ledger infer which earlier blocks the header's generator votes on:
//! - `max_height_generated`: the height of the previous block by the same generator. A generator
//!   **prevotes** on every block above it.
//! - `max_height_prevoted`: the `max_height_prevoted` watermark after the parent was processed. A
//!   generator **precommits** on every block that has already gathered enough prevote weight, and
//!   that it has not precommitted before.
//!
//! The ledger keeps a window of the `3 * batch_size` newest [`BlockBFTInfo`](types::BlockBFTInfo)
//! entries, one per block, in which these weights are accumulated.
//!
//! # Watermarks
//!
//! After each block, three watermarks are advanced:
//! 1. `max_height_prevoted`: the newest height whose prevote weight reaches the prevote threshold.
//! 2. `max_height_precommitted`: the newest height whose precommit weight reaches the precommit
//!    threshold. Blocks at or below it are final.
//! 3. `max_height_certified`: the newest height covered by an aggregate commit that was included in a
//!    block.
//!
//! Watermarks never decrease, and `max_height_certified <= max_height_precommitted <= max_height_prevoted`
//! always holds.
//!
//! # Contradicting headers
//!
//! An honest generator always builds its headers on top of its own previous ones. Two headers by the same
//! generator that could not both come from an honest generator are **contradicting**, which is
//! evidence for a punishable fault. See
//! [`are_headers_contradicting`](implementation::are_headers_contradicting).

pub mod implementation;

pub mod types;
