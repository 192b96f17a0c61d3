//! Generation of certificates that prove finalized blocks to a foreign chain.
//!
//! # Certificates
//!
//! Validators sign the [unsigned certificate](types::UnsignedCertificate) of every finalized block with
//! their BLS keys. Signatures are aggregated off-chain into an
//! [`AggregateCommit`](crate::types::block::AggregateCommit), which a later block generator includes in
//! its header. Together with the block header, an aggregate commit forms a [`Certificate`](types::Certificate).
//!
//! # Chain of trust
//!
//! A receiving chain only knows the validator set of the last certificate it accepted. A new
//! certificate is acceptable if it is signed by that same set, or if enough of its signers (by the
//! weights of the trusted set) are members of the trusted set. [`check_chain_of_trust`] implements this
//! rule, and [`next_certificate`] uses it to find the highest certifiable height.
//!
//! Certificate generation holds no state of its own. It reads headers, commits, and validator snapshots
//! through the [`ChainHistory`](history::ChainHistory) trait, so it can run on a relay thread without
//! touching the consensus state that block processing owns.
//!
//! [`check_chain_of_trust`]: implementation::check_chain_of_trust
//! [`next_certificate`]: implementation::next_certificate

pub mod history;

pub mod implementation;

pub mod types;
