//! Core type definitions for confidential single-price auctions.
//!
//! This crate provides the shared data structures used across the workspace:
//! curve point encodings, typed ciphertext handles, input proofs, auction
//! parameters, bid records and settlement results.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

// =========================
// PRIMITIVES
// =========================

/// Generic address type (32 bytes)
pub type Address = [u8; 32];

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Duration in seconds
pub type Duration = u64;

/// Monetary amount in the smallest unit of the payment token
pub type Amount = u128;

/// Compressed G1 point on BLS12-381 (48 bytes)
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Compressed G2 point on BLS12-381 (96 bytes)
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct G2Point(#[serde_as(as = "[_; 96]")] pub [u8; 96]);

impl Default for G2Point {
    fn default() -> Self {
        Self([0u8; 96])
    }
}

/// Scalar field element (32 bytes, little-endian)
#[derive(
    Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Scalar(pub [u8; 32]);

// =========================
// THRESHOLD ENCRYPTION
// =========================

/// Threshold IBE ciphertext.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ThresholdCiphertext {
    /// Ephemeral public key: U = r·G2
    pub ephemeral_pubkey: G2Point,

    /// AES-256-GCM encrypted payload (width tag || little-endian value)
    pub ciphertext: Vec<u8>,

    /// Authentication tag
    pub tag: [u8; 16],

    /// Nonce for AEAD
    pub nonce: [u8; 12],
}

/// Partial decryption key share from a committee member
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct PartialDecryptionShare {
    pub validator_index: u32,
    pub partial_sig: G1Point,
    pub proof: DiscreteLogProof,
}

/// DLEQ proof for partial signature correctness
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct DiscreteLogProof {
    pub challenge: Scalar,
    pub response: Scalar,
}

/// Master public key of the decryption committee
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct MasterPublicKey {
    pub mpk: G2Point,
    pub threshold: u32,
    pub total_validators: u32,
}

// =========================
// TYPED CIPHERTEXT HANDLES
// =========================

/// Supported plaintext bit-widths for encrypted integers.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum BitWidth {
    W8,
    W16,
    W32,
    W64,
}

impl BitWidth {
    /// Number of plaintext bits.
    pub fn bits(self) -> u32 {
        match self {
            BitWidth::W8 => 8,
            BitWidth::W16 => 16,
            BitWidth::W32 => 32,
            BitWidth::W64 => 64,
        }
    }

    /// Largest plaintext representable at this width.
    pub fn max_value(self) -> u64 {
        match self {
            BitWidth::W64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }

    /// One-byte tag used in handle derivation and plaintext encoding.
    pub fn tag(self) -> u8 {
        match self {
            BitWidth::W8 => 0x08,
            BitWidth::W16 => 0x10,
            BitWidth::W32 => 0x20,
            BitWidth::W64 => 0x40,
        }
    }

    /// Inverse of [`BitWidth::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x08 => Some(BitWidth::W8),
            0x10 => Some(BitWidth::W16),
            0x20 => Some(BitWidth::W32),
            0x40 => Some(BitWidth::W64),
            _ => None,
        }
    }
}

/// Opaque reference to a stored ciphertext (SHA-256 of its encoding).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct CiphertextHandle(pub [u8; 32]);

/// An encrypted integer, tagged with its plaintext width.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum EncryptedValue {
    U8(CiphertextHandle),
    U16(CiphertextHandle),
    U32(CiphertextHandle),
    U64(CiphertextHandle),
}

impl EncryptedValue {
    /// Wrap a handle with the given width.
    pub fn new(width: BitWidth, handle: CiphertextHandle) -> Self {
        match width {
            BitWidth::W8 => EncryptedValue::U8(handle),
            BitWidth::W16 => EncryptedValue::U16(handle),
            BitWidth::W32 => EncryptedValue::U32(handle),
            BitWidth::W64 => EncryptedValue::U64(handle),
        }
    }

    pub fn width(&self) -> BitWidth {
        match self {
            EncryptedValue::U8(_) => BitWidth::W8,
            EncryptedValue::U16(_) => BitWidth::W16,
            EncryptedValue::U32(_) => BitWidth::W32,
            EncryptedValue::U64(_) => BitWidth::W64,
        }
    }

    pub fn handle(&self) -> &CiphertextHandle {
        match self {
            EncryptedValue::U8(h)
            | EncryptedValue::U16(h)
            | EncryptedValue::U32(h)
            | EncryptedValue::U64(h) => h,
        }
    }
}

/// Ciphertexts produced by the encryption client for one bid.
///
/// `values[i]` is the typed handle of `ciphertexts[i]`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CiphertextBundle {
    pub values: Vec<EncryptedValue>,
    pub ciphertexts: Vec<ThresholdCiphertext>,
}

/// Attestation that a bundle of handles is well formed and bound to a
/// `(contract, bidder)` pair under encryption context `epoch`.
///
/// Travels as an opaque borsh blob.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct InputProof {
    pub contract: Address,
    pub bidder: Address,
    pub epoch: u64,
    pub signature: G1Point,
}

impl InputProof {
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

// =========================
// AUCTION TYPES
// =========================

/// Immutable policy bundle fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionConfig {
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub allow_bid_modification: bool,
    pub max_modifications: u32,
    pub extension_time: Duration,
    pub extension_threshold: Duration,
    pub required_deposit: Amount,
    pub min_bid_value: u64,
}

/// Construction parameters of an auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AuctionParams {
    pub token_for_sale: Address,
    pub payment_token: Address,
    pub beneficiary: Address,
    pub total_tokens_offered: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub min_participants: u32,
    pub config: AuctionConfig,
}

/// Auction lifecycle state
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum AuctionPhase {
    /// Constructed, waiting for `startAuction`
    Created,
    /// Accepting bids
    Open,
    /// Accepting bids past an anti-sniping extension
    Extended,
    /// Deadline passed, waiting for a usable oracle response
    Closing,
    /// Cleared and paid out
    Settled,
    /// Too few valid participants, everything refunded
    CancelledLowParticipation,
}

impl AuctionPhase {
    pub fn accepts_bids(self) -> bool {
        matches!(self, AuctionPhase::Open | AuctionPhase::Extended)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuctionPhase::Settled | AuctionPhase::CancelledLowParticipation
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuctionPhase::Created => "created",
            AuctionPhase::Open => "open",
            AuctionPhase::Extended => "extended",
            AuctionPhase::Closing => "closing",
            AuctionPhase::Settled => "settled",
            AuctionPhase::CancelledLowParticipation => "cancelled_low_participation",
        }
    }
}

/// Bid lifecycle state
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum BidStatus {
    Active,
    Withdrawn,
    Filled,
    Unfilled,
}

/// A stored encrypted bid. Never holds plaintext.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BidRecord {
    pub bidder: Address,
    pub encrypted_quantity: EncryptedValue,
    pub encrypted_price: EncryptedValue,
    pub deposit_posted: Amount,
    pub modification_count: u32,
    pub submitted_at: Timestamp,
    /// Global submission order, used as the final tie-breaker
    pub sequence: u64,
    pub status: BidStatus,
}

/// Quantity allocated to one bidder at settlement.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Allocation {
    pub bidder: Address,
    pub filled_quantity: u64,
}

/// Auction settlement result. Written once.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ClearingResult {
    pub auction_id: u64,
    pub clearing_price: u64,
    /// Ordered by clearing priority
    pub allocations: Vec<Allocation>,
    pub total_filled: u64,
    /// Supply left unsold, returned to the beneficiary
    pub unallocated: u64,
    pub participants_at_close: u32,
    pub settled_at: Timestamp,
}

/// Why value moves out of the auction.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum TransferReason {
    /// Deposit (or its excess) returned to a bidder
    Refund,
    /// Clearing payment to the beneficiary
    Payment,
    /// Sold tokens delivered to a bidder
    Allocation,
    /// Unsold tokens returned to the beneficiary
    UnsoldReturn,
}

/// A value transfer the host ledger must execute.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transfer {
    pub auction_id: u64,
    pub token: Address,
    pub to: Address,
    pub amount: Amount,
    pub reason: TransferReason,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Derive the contract address of an auction instance.
pub fn compute_contract_address(auction_id: u64) -> Address {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SPA_CONTRACT_V1:");
    hasher.update(auction_id.to_le_bytes());
    hasher.finalize().into()
}

/// Compute the IBE identity bids for this contract are encrypted to.
pub fn compute_auction_identity(contract: &Address) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SPA_AUCTION_IDENTITY_V1:");
    hasher.update(contract);
    hasher.finalize().into()
}

/// Compute the handle of a typed ciphertext.
pub fn compute_ciphertext_handle(
    width: BitWidth,
    ciphertext: &ThresholdCiphertext,
) -> CiphertextHandle {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SPA_HANDLE_V1:");
    hasher.update([width.tag()]);
    hasher.update(ciphertext.ephemeral_pubkey.0);
    hasher.update(&ciphertext.ciphertext);
    hasher.update(ciphertext.tag);
    hasher.update(ciphertext.nonce);
    CiphertextHandle(hasher.finalize().into())
}

/// Message signed by the input attestor.
pub fn input_proof_digest(
    contract: &Address,
    bidder: &Address,
    epoch: u64,
    values: &[EncryptedValue],
) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"SPA_INPUT_PROOF_V1:");
    hasher.update(contract);
    hasher.update(bidder);
    hasher.update(epoch.to_le_bytes());
    for value in values {
        hasher.update([value.width().tag()]);
        hasher.update(value.handle().0);
    }
    hasher.finalize().into()
}

/// AEAD associated data binding a bid ciphertext to its submitter.
pub fn ciphertext_binding(contract: &Address, bidder: &Address) -> [u8; 64] {
    let mut aad = [0u8; 64];
    aad[..32].copy_from_slice(contract);
    aad[32..].copy_from_slice(bidder);
    aad
}

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ciphertext(byte: u8) -> ThresholdCiphertext {
        ThresholdCiphertext {
            ephemeral_pubkey: G2Point([byte; 96]),
            ciphertext: vec![byte; 9],
            tag: [byte; 16],
            nonce: [byte; 12],
        }
    }

    #[test]
    fn test_contract_address_and_identity_are_distinct_per_auction() {
        let a1 = compute_contract_address(1);
        let a2 = compute_contract_address(2);
        assert_ne!(a1, a2);
        assert_ne!(compute_auction_identity(&a1), compute_auction_identity(&a2));
        assert_ne!(compute_auction_identity(&a1), a1);
    }

    #[test]
    fn test_handle_depends_on_width() {
        let ct = sample_ciphertext(7);
        let h64 = compute_ciphertext_handle(BitWidth::W64, &ct);
        let h32 = compute_ciphertext_handle(BitWidth::W32, &ct);
        assert_ne!(h64, h32);
        assert_eq!(h64, compute_ciphertext_handle(BitWidth::W64, &ct));
    }

    #[test]
    fn test_width_tags_and_limits() {
        for width in [BitWidth::W8, BitWidth::W16, BitWidth::W32, BitWidth::W64] {
            assert_eq!(BitWidth::from_tag(width.tag()), Some(width));
        }
        assert_eq!(BitWidth::W8.max_value(), 255);
        assert_eq!(BitWidth::W16.max_value(), 65_535);
        assert_eq!(BitWidth::W64.max_value(), u64::MAX);
        assert_eq!(BitWidth::from_tag(0x41), None);
    }

    #[test]
    fn test_encrypted_value_accessors() {
        let handle = CiphertextHandle([3u8; 32]);
        let value = EncryptedValue::new(BitWidth::W16, handle);
        assert_eq!(value, EncryptedValue::U16(handle));
        assert_eq!(value.width(), BitWidth::W16);
        assert_eq!(value.handle(), &handle);
    }

    #[test]
    fn test_input_proof_digest_binds_every_field() {
        let values = vec![EncryptedValue::U64(CiphertextHandle([1u8; 32]))];
        let base = input_proof_digest(&[1u8; 32], &[2u8; 32], 0, &values);
        assert_ne!(base, input_proof_digest(&[9u8; 32], &[2u8; 32], 0, &values));
        assert_ne!(base, input_proof_digest(&[1u8; 32], &[9u8; 32], 0, &values));
        assert_ne!(base, input_proof_digest(&[1u8; 32], &[2u8; 32], 1, &values));
        let other = vec![EncryptedValue::U32(CiphertextHandle([1u8; 32]))];
        assert_ne!(base, input_proof_digest(&[1u8; 32], &[2u8; 32], 0, &other));
    }

    #[test]
    fn test_input_proof_blob_decoding() {
        let proof = InputProof {
            contract: [1u8; 32],
            bidder: [2u8; 32],
            epoch: 4,
            signature: G1Point([5u8; 48]),
        };
        let bytes = proof.to_bytes().unwrap();
        assert_eq!(InputProof::from_bytes(&bytes), Some(proof));
        assert_eq!(InputProof::from_bytes(&bytes[..10]), None);
    }

    #[test]
    fn test_phase_predicates() {
        assert!(AuctionPhase::Open.accepts_bids());
        assert!(AuctionPhase::Extended.accepts_bids());
        assert!(!AuctionPhase::Closing.accepts_bids());
        assert!(AuctionPhase::Settled.is_terminal());
        assert!(AuctionPhase::CancelledLowParticipation.is_terminal());
        assert!(!AuctionPhase::Closing.is_terminal());
    }
}
