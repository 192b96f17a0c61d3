/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or integers, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub},
};

use borsh::{BorshDeserialize, BorshSerialize};

/// Number of bytes in a compressed BLS12-381 public key.
pub const BLS_PUBLIC_KEY_LENGTH: usize = 48;

/// Four-byte identifier of a blockchain in the interoperability network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct ChainID([u8; 4]);

impl ChainID {
    /// Create a new `ChainID` from its four `bytes`.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the bytes of this `ChainID`.
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl Debug for ChainID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ChainID({:02x?})", self.0)
    }
}

/// Height of a block in the chain.
///
/// Heights are persisted as part of store keys in big-endian order so that the byte order of keys
/// agrees with the numeric order of heights.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(u32);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u32) -> Self {
        Self(int)
    }

    /// Get the inner `u32` value of this `BlockHeight`.
    pub const fn int(&self) -> u32 {
        self.0
    }

    /// Get the big-endian representation of this `BlockHeight`.
    pub const fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Read a `BlockHeight` back from its big-endian representation.
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }

    /// Add `rhs` to this height, returning `None` on overflow.
    pub fn checked_add(&self, rhs: u32) -> Option<BlockHeight> {
        self.0.checked_add(rhs).map(BlockHeight)
    }

    /// Subtract `rhs` from this height, returning `None` on underflow.
    pub fn checked_sub(&self, rhs: u32) -> Option<BlockHeight> {
        self.0.checked_sub(rhs).map(BlockHeight)
    }

    /// Subtract `rhs` from this height, stopping at zero.
    pub fn saturating_sub(&self, rhs: u32) -> BlockHeight {
        BlockHeight(self.0.saturating_sub(rhs))
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u32> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u32) -> Self::Output {
        BlockHeight(self.0 + rhs)
    }
}

impl AddAssign<u32> for BlockHeight {
    fn add_assign(&mut self, rhs: u32) {
        self.0 += rhs
    }
}

impl Sub<BlockHeight> for BlockHeight {
    type Output = u32;
    fn sub(self, rhs: BlockHeight) -> Self::Output {
        self.0 - rhs.0
    }
}

/// Unix timestamp, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct Timestamp(u32);

impl Timestamp {
    pub const fn new(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn secs(&self) -> u32 {
        self.0
    }
}

/// Index of a block-time-long slot since the Unix Epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotNumber(u64);

impl SlotNumber {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Voting power of a validator in the BFT protocol.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BFTWeight(u64);

impl BFTWeight {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Add two weights, returning `None` on overflow.
    pub fn checked_add(&self, rhs: BFTWeight) -> Option<BFTWeight> {
        self.0.checked_add(rhs.0).map(BFTWeight)
    }
}

impl Display for BFTWeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AddAssign<BFTWeight> for BFTWeight {
    fn add_assign(&mut self, rhs: BFTWeight) {
        self.0 = self.0.saturating_add(rhs.0)
    }
}

/// 20-byte address identifying a validator account.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 20] {
        self.0
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Compressed BLS public key of a validator.
///
/// A key of 48 zero bytes is the placeholder used by validators that have not registered a BLS key
/// yet. Placeholder keys are exempt from the BLS key uniqueness rule.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct BlsKey(Vec<u8>);

impl BlsKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The "no BLS key registered" placeholder.
    pub fn placeholder() -> Self {
        Self(vec![0u8; BLS_PUBLIC_KEY_LENGTH])
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for BlsKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bytes of the Ed25519 verifying key that a validator uses to sign the blocks it generates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct GeneratorKey([u8; 32]);

impl GeneratorKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Debug for GeneratorKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// SHA-256 digest. Used for block IDs, state roots, and validators hashes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signature represented in bytes. Holds either an Ed25519 block signature or an aggregated BLS
/// certificate signature, depending on where it appears.
#[derive(Clone, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes(Vec<u8>);

impl SignatureBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bitmap over a validator list, marking which validators contributed to an aggregated signature.
///
/// Bit `i` refers to the `i`-th validator of the list and is stored in bit `i % 8` (least significant
/// bit first) of byte `i / 8`.
#[derive(Clone, Default, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct AggregationBits(Vec<u8>);

impl AggregationBits {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Create a bitmap over `len` validators with the bits at `indices` set. Indices `>= len` are
    /// ignored.
    pub fn from_indices(len: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut bytes = vec![0u8; (len + 7) / 8];
        for i in indices.into_iter().filter(|i| *i < len) {
            bytes[i / 8] |= 1 << (i % 8);
        }
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check whether the bit at `index` is set. Bits beyond the end of the bitmap are unset.
    pub fn is_set(&self, index: usize) -> bool {
        self.0
            .get(index / 8)
            .map_or(false, |byte| byte & (1 << (index % 8)) != 0)
    }

    /// Get an iterator over the indices of the set bits, in ascending order.
    pub fn set_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.0.len() * 8).filter(|i| self.is_set(*i))
    }
}

impl Debug for AggregationBits {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
