/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Certificates: compact proofs that a finalized block was signed by enough of its validator set.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    block::BlockHeader,
    data_types::{AggregationBits, BlockHeight, CryptoHash, SignatureBytes, Timestamp},
};

/// The part of a [`Certificate`] that validators sign. Derived deterministically from a block header.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct UnsignedCertificate {
    pub block_id: CryptoHash,
    pub height: BlockHeight,
    pub state_root: CryptoHash,
    pub validators_hash: CryptoHash,
    pub timestamp: Timestamp,
}

impl UnsignedCertificate {
    /// Get the bytes that validators sign with their BLS keys.
    pub fn signing_bytes(&self) -> Vec<u8> {
        // Safety: serializing into a Vec is infallible.
        self.try_to_vec().unwrap()
    }
}

impl From<&BlockHeader> for UnsignedCertificate {
    fn from(header: &BlockHeader) -> Self {
        UnsignedCertificate {
            block_id: header.id(),
            height: header.height,
            state_root: header.state_root,
            validators_hash: header.validators_hash,
            timestamp: header.timestamp,
        }
    }
}

/// An unsigned certificate together with the aggregate signature over it and the bitmap of the
/// validators that contributed to the signature.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Certificate {
    pub block_id: CryptoHash,
    pub height: BlockHeight,
    pub state_root: CryptoHash,
    pub validators_hash: CryptoHash,
    pub timestamp: Timestamp,
    pub aggregation_bits: AggregationBits,
    pub signature: SignatureBytes,
}

impl Certificate {
    /// Create a certificate by attaching `aggregation_bits` and `signature` to `unsigned`.
    pub fn new(
        unsigned: UnsignedCertificate,
        aggregation_bits: AggregationBits,
        signature: SignatureBytes,
    ) -> Self {
        Certificate {
            block_id: unsigned.block_id,
            height: unsigned.height,
            state_root: unsigned.state_root,
            validators_hash: unsigned.validators_hash,
            timestamp: unsigned.timestamp,
            aggregation_bits,
            signature,
        }
    }

    /// Strip the signature and the bitmap.
    pub fn unsigned(&self) -> UnsignedCertificate {
        UnsignedCertificate {
            block_id: self.block_id,
            height: self.height,
            state_root: self.state_root,
            validators_hash: self.validators_hash,
            timestamp: self.timestamp,
        }
    }
}

/// The certificate that a receiving chain last accepted, as far as this chain knows. Only the height and
/// the validators hash matter for deriving the next certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct LastCertificate {
    pub height: BlockHeight,
    pub validators_hash: CryptoHash,
}

impl From<&Certificate> for LastCertificate {
    fn from(certificate: &Certificate) -> Self {
        LastCertificate {
            height: certificate.height,
            validators_hash: certificate.validators_hash,
        }
    }
}
