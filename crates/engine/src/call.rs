//! Call message types for the auction engine.

use borsh::{BorshDeserialize, BorshSerialize};

use spa_types::{Amount, AuctionParams, CiphertextBundle, G2Point};

/// Call messages for the auction engine.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Create a new auction owned by the sender.
    CreateAuction { params: AuctionParams },

    /// Open bidding (owner only).
    StartAuction { auction_id: u64 },

    /// Close bidding, reveal and settle (owner or beneficiary).
    CloseAndSettle { auction_id: u64 },

    // === Bidding ===
    /// Submit an encrypted `(quantity, price)` bid with its input proof.
    SubmitBid {
        auction_id: u64,
        bundle: CiphertextBundle,
        proof: Vec<u8>,
        deposit: Amount,
    },

    /// Replace the sender's active bid.
    ModifyBid {
        auction_id: u64,
        bundle: CiphertextBundle,
        proof: Vec<u8>,
        top_up: Amount,
    },

    /// Withdraw the sender's active bid.
    WithdrawBid { auction_id: u64 },

    /// Claim the sender's refundable deposit.
    ClaimRefund { auction_id: u64 },

    // === Admin ===
    /// Start a new encryption context signed by a new attestor key.
    RotateEncryptionContext { attestor_public_key: G2Point },
}

impl AuctionCall {
    pub fn encode(&self) -> std::io::Result<Vec<u8>> {
        borsh::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> std::io::Result<Self> {
        borsh::from_slice(bytes)
    }
}
