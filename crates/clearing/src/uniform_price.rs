//! Single-price clearing.
//!
//! Admissible bids are ranked by price (highest first), then by earliest
//! submission time, then by submission sequence. Supply is handed out down
//! the ranking; the bid that exhausts it is the marginal bid and its price is
//! the price everyone pays.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;

use spa_types::{Address, Allocation, Amount, Timestamp};

/// A bid after the oracle revealed its plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedBid {
    pub bidder: Address,
    pub quantity: u64,
    pub price: u64,
    pub submitted_at: Timestamp,
    pub sequence: u64,
    /// Collateral posted for this bid
    pub deposit: Amount,
}

/// Auction-level inputs to clearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearingRules {
    pub total_tokens_offered: u64,
    pub min_bid_value: u64,
    pub min_participants: u32,
}

/// Why a bid received nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnfilledReason {
    /// Revealed price below the auction's minimum bid value
    BelowMinimum,
    /// Revealed quantity was zero
    ZeroQuantity,
    /// Deposit does not cover quantity × price
    Undercollateralized,
    /// Ranked after the marginal bid
    Outbid,
    /// Auction cancelled for low participation
    AuctionCancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnfilledBid {
    pub bidder: Address,
    pub reason: UnfilledReason,
}

/// A successful clearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedAuction {
    pub clearing_price: u64,
    /// Filled bids in ranking order; every entry has a non-zero quantity
    pub allocations: Vec<Allocation>,
    pub unfilled: Vec<UnfilledBid>,
    pub total_filled: u64,
    /// Supply nobody bought
    pub unallocated: u64,
    /// Admissible bids considered for allocation
    pub participants: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearingOutcome {
    Cleared(ClearedAuction),
    /// Fewer admissible bids than `min_participants`; every bid is unfilled
    InsufficientParticipation {
        participants: u32,
        required: u32,
        unfilled: Vec<UnfilledBid>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClearingError {
    #[error("Arithmetic overflow during clearing")]
    Overflow,

    #[error("Auction offers no supply")]
    NoSupply,
}

/// Largest payment a bid can owe: `quantity × price`.
pub fn max_obligation(quantity: u64, price: u64) -> Amount {
    // u64 × u64 always fits in u128
    quantity as Amount * price as Amount
}

/// Payment owed for `filled` units at the clearing price.
pub fn payment_for(filled: u64, clearing_price: u64) -> Amount {
    max_obligation(filled, clearing_price)
}

/// Compute the clearing outcome for a set of revealed bids.
pub fn compute_clearing(
    bids: &[RevealedBid],
    rules: &ClearingRules,
) -> Result<ClearingOutcome, ClearingError> {
    if rules.total_tokens_offered == 0 {
        return Err(ClearingError::NoSupply);
    }

    let mut unfilled = Vec::new();
    let mut admissible: Vec<&RevealedBid> = Vec::with_capacity(bids.len());

    for bid in bids {
        match disqualification(bid, rules) {
            Some(reason) => unfilled.push(UnfilledBid {
                bidder: bid.bidder,
                reason,
            }),
            None => admissible.push(bid),
        }
    }

    let participants = u32::try_from(admissible.len()).map_err(|_| ClearingError::Overflow)?;
    if admissible.is_empty() || participants < rules.min_participants {
        unfilled.extend(admissible.iter().map(|bid| UnfilledBid {
            bidder: bid.bidder,
            reason: UnfilledReason::AuctionCancelled,
        }));
        return Ok(ClearingOutcome::InsufficientParticipation {
            participants,
            required: rules.min_participants,
            unfilled,
        });
    }

    admissible.sort_by_key(|bid| (Reverse(bid.price), bid.submitted_at, bid.sequence));

    let mut remaining = rules.total_tokens_offered;
    let mut clearing_price = 0;
    let mut allocations = Vec::new();

    for bid in admissible {
        if remaining == 0 {
            unfilled.push(UnfilledBid {
                bidder: bid.bidder,
                reason: UnfilledReason::Outbid,
            });
            continue;
        }

        let filled = bid.quantity.min(remaining);
        remaining = remaining.checked_sub(filled).ok_or(ClearingError::Overflow)?;
        clearing_price = bid.price;
        allocations.push(Allocation {
            bidder: bid.bidder,
            filled_quantity: filled,
        });
    }

    let total_filled = rules
        .total_tokens_offered
        .checked_sub(remaining)
        .ok_or(ClearingError::Overflow)?;

    Ok(ClearingOutcome::Cleared(ClearedAuction {
        clearing_price,
        allocations,
        unfilled,
        total_filled,
        unallocated: remaining,
        participants,
    }))
}

fn disqualification(bid: &RevealedBid, rules: &ClearingRules) -> Option<UnfilledReason> {
    if bid.quantity == 0 {
        Some(UnfilledReason::ZeroQuantity)
    } else if bid.price < rules.min_bid_value {
        Some(UnfilledReason::BelowMinimum)
    } else if bid.deposit < max_obligation(bid.quantity, bid.price) {
        Some(UnfilledReason::Undercollateralized)
    } else {
        None
    }
}
