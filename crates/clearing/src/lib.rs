//! Uniform-price clearing for sealed multi-unit auctions.
//!
//! Given revealed `(quantity, price)` bids and a fixed supply, this crate
//! decides:
//! 1. Which bids are admissible (minimum price, non-zero quantity, deposit
//!    covering the bid's maximum obligation)
//! 2. Whether enough participants remain for the auction to clear
//! 3. The single clearing price and each bidder's filled quantity
//!
//! All arithmetic is on unsigned integers in the smallest token unit.

pub mod uniform_price;

pub use uniform_price::{
    compute_clearing, max_obligation, payment_for, ClearedAuction, ClearingError,
    ClearingOutcome, ClearingRules, RevealedBid, UnfilledBid, UnfilledReason,
};
