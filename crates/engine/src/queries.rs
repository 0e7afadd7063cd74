//! Query handlers for the auction engine.
//!
//! These functions provide read-only access to engine state. Bid views
//! expose handles and deposits only; plaintext never leaves the oracle.

use serde::{Deserialize, Serialize};

use spa_types::{
    Address, Amount, AuctionParams, AuctionPhase, BidRecord, ClearingResult, G2Point, Timestamp,
};

use crate::auction::Auction;
use crate::state::EngineState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQuery {
    /// Get auction summary by ID.
    GetAuction { auction_id: u64 },

    /// Get all auctions (paginated).
    ListAuctions { offset: u64, limit: u64 },

    /// Get all bids for an auction.
    GetAuctionBids { auction_id: u64 },

    /// Get a specific bid.
    GetBid { auction_id: u64, bidder: Address },

    /// Get auction result.
    GetResult { auction_id: u64 },

    /// Get per-bidder deposits held by an auction.
    GetDeposits { auction_id: u64 },

    /// Get an auction's escrow balance.
    GetEscrowBalance { auction_id: u64 },

    /// Get the current encryption context.
    GetEncryptionContext,

    /// Auctions past their deadline and not yet final.
    PendingSettlement { now: Timestamp },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum AuctionQueryResponse {
    /// Auction summary.
    Auction(Option<AuctionSummary>),

    /// List of auctions.
    AuctionList(Vec<AuctionSummary>),

    /// Bids for an auction.
    Bids(Vec<BidRecord>),

    /// Single bid.
    Bid(Option<BidRecord>),

    /// Auction result.
    Result(Option<ClearingResult>),

    /// Deposits by bidder.
    Deposits(Vec<(Address, Amount)>),

    /// Escrow balance.
    EscrowBalance(Amount),

    /// Current encryption context.
    EncryptionContext(EncryptionContext),

    /// IDs of auctions awaiting settlement.
    PendingSettlement(Vec<u64>),
}

/// Handle a query.
pub fn handle_query(state: &EngineState, query: AuctionQuery) -> AuctionQueryResponse {
    match query {
        AuctionQuery::GetAuction { auction_id } => AuctionQueryResponse::Auction(
            state.get_auction(auction_id).map(AuctionSummary::from_auction),
        ),

        AuctionQuery::ListAuctions { offset, limit } => AuctionQueryResponse::AuctionList(
            get_auction_summaries(state, offset as usize, limit as usize),
        ),

        AuctionQuery::GetAuctionBids { auction_id } => {
            let bids = state
                .get_auction(auction_id)
                .map(|auction| auction.ledger().all().cloned().collect())
                .unwrap_or_default();
            AuctionQueryResponse::Bids(bids)
        }

        AuctionQuery::GetBid { auction_id, bidder } => AuctionQueryResponse::Bid(
            state
                .get_auction(auction_id)
                .and_then(|auction| auction.bid(&bidder))
                .cloned(),
        ),

        AuctionQuery::GetResult { auction_id } => AuctionQueryResponse::Result(
            state
                .get_auction(auction_id)
                .and_then(|auction| auction.result.clone()),
        ),

        AuctionQuery::GetDeposits { auction_id } => {
            let deposits = state
                .get_auction(auction_id)
                .map(|auction| {
                    auction
                        .escrow()
                        .deposits()
                        .iter()
                        .map(|(bidder, amount)| (*bidder, *amount))
                        .collect()
                })
                .unwrap_or_default();
            AuctionQueryResponse::Deposits(deposits)
        }

        AuctionQuery::GetEscrowBalance { auction_id } => AuctionQueryResponse::EscrowBalance(
            state
                .get_auction(auction_id)
                .map(|auction| auction.escrow().balance())
                .unwrap_or(0),
        ),

        AuctionQuery::GetEncryptionContext => {
            AuctionQueryResponse::EncryptionContext(EncryptionContext {
                epoch: state.verifier.current_epoch(),
                attestor_public_key: state.verifier.current_public_key().cloned(),
            })
        }

        AuctionQuery::PendingSettlement { now } => {
            AuctionQueryResponse::PendingSettlement(get_pending_settlement(state, now))
        }
    }
}

/// Summary of an auction for listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSummary {
    pub auction_id: u64,
    pub owner: Address,
    pub contract_address: Address,
    pub phase: AuctionPhase,
    pub params: AuctionParams,
    pub opened_at: Option<Timestamp>,
    pub closes_at: Option<Timestamp>,
    pub hard_deadline: Option<Timestamp>,
    pub active_bids: usize,
    pub escrow_balance: Amount,
    pub clearing_price: Option<u64>,
}

impl AuctionSummary {
    pub fn from_auction(auction: &Auction) -> Self {
        Self {
            auction_id: auction.auction_id,
            owner: auction.owner,
            contract_address: auction.contract_address,
            phase: auction.phase,
            params: auction.params.clone(),
            opened_at: auction.opened_at,
            closes_at: auction.closes_at,
            hard_deadline: auction.hard_deadline,
            active_bids: auction.ledger().count(),
            escrow_balance: auction.escrow().balance(),
            clearing_price: auction.clearing_price(),
        }
    }
}

/// Encryption context bids must currently be attested under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionContext {
    pub epoch: u64,
    pub attestor_public_key: Option<G2Point>,
}

/// Get auction summaries for listing.
pub fn get_auction_summaries(
    state: &EngineState,
    offset: usize,
    limit: usize,
) -> Vec<AuctionSummary> {
    state
        .auctions
        .values()
        .skip(offset)
        .take(limit)
        .map(AuctionSummary::from_auction)
        .collect()
}

/// Get active auctions (currently accepting bids).
pub fn get_active_auctions(state: &EngineState, now: Timestamp) -> Vec<AuctionSummary> {
    state
        .auctions
        .values()
        .filter(|auction| auction.ensure_accepting(now).is_ok())
        .map(AuctionSummary::from_auction)
        .collect()
}

/// Auctions whose deadline passed, or that are stuck in `Closing`.
pub fn get_pending_settlement(state: &EngineState, now: Timestamp) -> Vec<u64> {
    state
        .auctions
        .values()
        .filter(|auction| match auction.phase {
            AuctionPhase::Closing => true,
            phase if phase.accepts_bids() => auction.closes_at.is_some_and(|c| now >= c),
            _ => false,
        })
        .map(|auction| auction.auction_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{
        handle_close_and_settle, handle_create_auction, handle_start_auction, handle_submit_bid,
        CallContext,
    };
    use crate::testing::{test_params, Fixture, OfflineOracle, OWNER};

    fn ctx(sender: Address, timestamp: Timestamp) -> CallContext {
        CallContext {
            sender,
            block_height: 0,
            timestamp,
        }
    }

    fn populated(fx: &Fixture) -> (EngineState, Timestamp) {
        let mut state = EngineState::new([0xAD; 32], fx.attestor.public_key());
        for _ in 0..3 {
            handle_create_auction(&mut state, &ctx(OWNER, 0), test_params()).unwrap();
        }
        let closes_at = handle_start_auction(&mut state, &ctx(OWNER, 100), 1).unwrap();

        let contract = state.get_auction(1).unwrap().contract_address;
        for (id, quantity, price) in [(1u8, 50u64, 10u64), (2, 40, 8)] {
            let bidder = [id; 32];
            let (bundle, proof) = fx.bid_input(&contract, &bidder, quantity, price);
            handle_submit_bid(&mut state, &ctx(bidder, 200), 1, &bundle, &proof, 1_000).unwrap();
        }
        (state, closes_at)
    }

    #[test]
    fn test_summaries_and_pagination() {
        let fx = Fixture::new();
        let (state, _) = populated(&fx);

        let query = AuctionQuery::ListAuctions {
            offset: 1,
            limit: 5,
        };
        match handle_query(&state, query) {
            AuctionQueryResponse::AuctionList(list) => {
                assert_eq!(list.len(), 2);
                assert_eq!(list[0].auction_id, 2);
                assert_eq!(list[0].phase, AuctionPhase::Created);
            }
            other => panic!("unexpected response {:?}", other),
        }

        match handle_query(&state, AuctionQuery::GetAuction { auction_id: 1 }) {
            AuctionQueryResponse::Auction(Some(summary)) => {
                assert_eq!(summary.active_bids, 2);
                assert_eq!(summary.escrow_balance, 2_000);
                assert_eq!(summary.clearing_price, None);
            }
            other => panic!("unexpected response {:?}", other),
        }
        assert!(matches!(
            handle_query(&state, AuctionQuery::GetAuction { auction_id: 99 }),
            AuctionQueryResponse::Auction(None)
        ));
    }

    #[test]
    fn test_bid_views_hold_no_plaintext() {
        let fx = Fixture::new();
        let (state, _) = populated(&fx);

        match handle_query(
            &state,
            AuctionQuery::GetBid {
                auction_id: 1,
                bidder: [1u8; 32],
            },
        ) {
            AuctionQueryResponse::Bid(Some(bid)) => {
                assert_eq!(bid.deposit_posted, 1_000);
                let json = serde_json::to_string(&bid).unwrap();
                assert!(!json.contains("\"quantity\""));
                assert!(!json.contains("\"price\""));
            }
            other => panic!("unexpected response {:?}", other),
        }

        match handle_query(&state, AuctionQuery::GetDeposits { auction_id: 1 }) {
            AuctionQueryResponse::Deposits(deposits) => {
                assert_eq!(deposits, vec![([1u8; 32], 1_000), ([2u8; 32], 1_000)]);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_active_and_pending() {
        let fx = Fixture::new();
        let (mut state, closes_at) = populated(&fx);

        assert_eq!(get_active_auctions(&state, 200).len(), 1);
        assert!(get_pending_settlement(&state, 200).is_empty());
        assert_eq!(get_pending_settlement(&state, closes_at), vec![1]);
        assert!(get_active_auctions(&state, closes_at).is_empty());

        // a failed close stays pending
        let close = handle_close_and_settle(&mut state, &ctx(OWNER, closes_at), 1, &OfflineOracle);
        assert!(close.is_err());
        assert_eq!(get_pending_settlement(&state, closes_at), vec![1]);

        handle_close_and_settle(&mut state, &ctx(OWNER, closes_at), 1, &fx.oracle()).unwrap();
        assert!(get_pending_settlement(&state, closes_at).is_empty());
        match handle_query(&state, AuctionQuery::GetResult { auction_id: 1 }) {
            AuctionQueryResponse::Result(Some(result)) => assert_eq!(result.clearing_price, 8),
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_encryption_context() {
        let fx = Fixture::new();
        let (state, _) = populated(&fx);
        match handle_query(&state, AuctionQuery::GetEncryptionContext) {
            AuctionQueryResponse::EncryptionContext(context) => {
                assert_eq!(context.epoch, 0);
                assert_eq!(context.attestor_public_key, Some(fx.attestor.public_key()));
            }
            other => panic!("unexpected response {:?}", other),
        }
    }
}
