//! Types and traits that are used across multiple components of the crate.
//!
//! Other types, specific to single components, can be found in the "types" submodules of their
//! components, e.g., [`crate::bft_votes::types`].

pub mod block;

pub mod crypto_primitives;

pub mod data_types;

pub mod validators;
