//! Bid preparation and encryption.

use rand::{CryptoRng, RngCore};
use thiserror::Error;

use spa_clearing::max_obligation;
use spa_crypto::{encrypt_value, IbeParams};
use spa_types::{
    ciphertext_binding, compute_auction_identity, compute_ciphertext_handle, Address, Amount,
    BitWidth, CiphertextBundle, EncryptedValue, G2Point,
};

/// Errors that can occur during bid preparation.
#[derive(Debug, Error)]
pub enum BidPrepError {
    #[error("Invalid master public key")]
    InvalidMpk,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Quantity must be positive")]
    ZeroQuantity,
}

/// A prepared bid ready for attestation and submission.
#[derive(Debug, Clone)]
pub struct PreparedBid {
    /// `[quantity, price]` as 64-bit ciphertexts
    pub bundle: CiphertextBundle,
    /// Plaintext quantity (keep secret)
    pub quantity: u64,
    /// Plaintext price (keep secret)
    pub price: u64,
    /// Deposit that fully collateralizes the bid
    pub deposit_preview: Amount,
}

impl PreparedBid {
    /// Deposit to post given the auction's minimum.
    pub fn deposit_for(&self, required_deposit: Amount) -> Amount {
        self.deposit_preview.max(required_deposit)
    }
}

/// Encrypt `(quantity, price)` for `bidder` in the auction at `contract`.
///
/// Both values are sealed to the auction identity under the committee key
/// and bound to `(contract, bidder)`, so the ciphertexts are useless to any
/// other bidder or auction.
pub fn prepare_bid<R: RngCore + CryptoRng>(
    mpk: &G2Point,
    contract: &Address,
    bidder: &Address,
    quantity: u64,
    price: u64,
    rng: &mut R,
) -> Result<PreparedBid, BidPrepError> {
    if quantity == 0 {
        return Err(BidPrepError::ZeroQuantity);
    }

    let params = IbeParams::from_g2_point(mpk).map_err(|_| BidPrepError::InvalidMpk)?;
    let identity = compute_auction_identity(contract);
    let binding = ciphertext_binding(contract, bidder);

    let mut bundle = CiphertextBundle {
        values: Vec::with_capacity(2),
        ciphertexts: Vec::with_capacity(2),
    };
    for value in [quantity, price] {
        let ciphertext = encrypt_value(&params, &identity, BitWidth::W64, value, &binding, rng)
            .map_err(|e| BidPrepError::EncryptionFailed(e.to_string()))?;
        let handle = compute_ciphertext_handle(BitWidth::W64, &ciphertext);
        bundle.values.push(EncryptedValue::new(BitWidth::W64, handle));
        bundle.ciphertexts.push(ciphertext);
    }

    Ok(PreparedBid {
        bundle,
        quantity,
        price,
        deposit_preview: max_obligation(quantity, price),
    })
}

/// Builder for preparing bids against one auction.
pub struct BidBuilder {
    mpk: G2Point,
    contract: Address,
    bidder: Address,
    quantity: u64,
    price: u64,
}

impl BidBuilder {
    pub fn new(mpk: G2Point, contract: Address, bidder: Address) -> Self {
        Self {
            mpk,
            contract,
            bidder,
            quantity: 0,
            price: 0,
        }
    }

    pub fn quantity(mut self, quantity: u64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }

    /// Build the prepared bid.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<PreparedBid, BidPrepError> {
        prepare_bid(
            &self.mpk,
            &self.contract,
            &self.bidder,
            self.quantity,
            self.price,
            rng,
        )
    }
}
