/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide three categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate.
//! 2. **Block Signatures**: Ed25519, provided by the [`ed25519_dalek`] crate.
//! 3. **Aggregate Certificate Signatures**: BLS. The math is not implemented by this crate. Users plug in
//!    an implementation of [`AggregateSignatureVerifier`].

use super::data_types::{AggregationBits, BlsKey, CryptoHash, GeneratorKey, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// Compute the SHA-256 digest of `bytes`.
pub fn hash(bytes: &[u8]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    hasher.update(bytes);
    CryptoHash::new(hasher.finalize().into())
}

/// Interpret `generator_key` as an Ed25519 verifying key.
pub fn verifying_key(generator_key: &GeneratorKey) -> Result<VerifyingKey, SignatureError> {
    VerifyingKey::from_bytes(&generator_key.bytes())
}

/// Check whether `signature` is a valid Ed25519 signature over `message` by `generator_key`.
///
/// Malformed keys and malformed signatures both count as invalid.
pub fn verify_ed25519(generator_key: &GeneratorKey, message: &[u8], signature: &SignatureBytes) -> bool {
    let Ok(verifying_key) = verifying_key(generator_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature.bytes()) else {
        return false;
    };
    verifying_key.verify(message, &signature).is_ok()
}

/// Pluggable verification of aggregated BLS signatures.
///
/// `keys` is the full list of BLS keys of a validator set, sorted ascending. `aggregation_bits`
/// selects the signers among `keys`.
pub trait AggregateSignatureVerifier: Send {
    fn verify_aggregate_signature(
        &self,
        keys: &[BlsKey],
        aggregation_bits: &AggregationBits,
        message: &[u8],
        signature: &SignatureBytes,
    ) -> bool;
}
