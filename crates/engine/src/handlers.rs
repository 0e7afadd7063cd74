//! Call handlers for the auction engine.
//!
//! These functions implement the public operations: they resolve the
//! auction, verify encrypted inputs and forward to the state machine.

use tracing::info;

use spa_types::{Address, Amount, AuctionParams, CiphertextBundle, G2Point, Timestamp};

use crate::auction::{Auction, BidReceipt, SettlementOutcome};
use crate::call::AuctionCall;
use crate::error::AuctionError;
use crate::oracle::DecryptionOracle;
use crate::state::EngineState;
use crate::verifier::BID_LAYOUT;

/// Context provided by the host for each call.
#[derive(Clone, Debug)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
    /// Current timestamp
    pub timestamp: Timestamp,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, AuctionError>;

/// What a dispatched call returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallOutcome {
    AuctionCreated(u64),
    AuctionStarted { closes_at: Timestamp },
    BidAccepted(BidReceipt),
    BidWithdrawn { refundable: Amount },
    RefundClaimed(Amount),
    Settlement(SettlementOutcome),
    ContextRotated { epoch: u64 },
}

/// Handle CreateAuction call.
pub fn handle_create_auction(
    state: &mut EngineState,
    ctx: &CallContext,
    params: AuctionParams,
) -> HandlerResult<u64> {
    let auction_id = state.next_auction_id;
    let auction = Auction::new(auction_id, ctx.sender, params)?;
    state.allocate_auction_id();

    info!(
        auction_id,
        owner = hex::encode(ctx.sender),
        contract = hex::encode(auction.contract_address),
        total_tokens = auction.params.total_tokens_offered,
        "Created auction"
    );
    state.auctions.insert(auction_id, auction);
    Ok(auction_id)
}

/// Handle StartAuction call.
pub fn handle_start_auction(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<Timestamp> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    auction.start(&ctx.sender, ctx.timestamp)
}

/// Handle SubmitBid call.
pub fn handle_submit_bid(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
    bundle: &CiphertextBundle,
    proof: &[u8],
    deposit: Amount,
) -> HandlerResult<BidReceipt> {
    let auction = state
        .auctions
        .get_mut(&auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    auction.ensure_accepting(ctx.timestamp)?;

    let input = state
        .verifier
        .verify(bundle, proof, &BID_LAYOUT, &ctx.sender, &auction.contract_address)?
        .into_bid()?;
    auction.submit_bid(ctx.sender, input, deposit, ctx.timestamp)
}

/// Handle ModifyBid call.
pub fn handle_modify_bid(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
    bundle: &CiphertextBundle,
    proof: &[u8],
    top_up: Amount,
) -> HandlerResult<BidReceipt> {
    let auction = state
        .auctions
        .get_mut(&auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    auction.ensure_accepting(ctx.timestamp)?;

    let input = state
        .verifier
        .verify(bundle, proof, &BID_LAYOUT, &ctx.sender, &auction.contract_address)?
        .into_bid()?;
    auction.modify_bid(ctx.sender, input, top_up, ctx.timestamp)
}

/// Handle WithdrawBid call.
pub fn handle_withdraw_bid(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<Amount> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    auction.withdraw_bid(&ctx.sender, ctx.timestamp)
}

/// Handle ClaimRefund call.
pub fn handle_claim_refund(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
) -> HandlerResult<Amount> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    let refund = auction.claim_refund(&ctx.sender)?;
    state.collect_transfers(auction_id);
    Ok(refund)
}

/// Handle CloseAndSettle call.
pub fn handle_close_and_settle(
    state: &mut EngineState,
    ctx: &CallContext,
    auction_id: u64,
    oracle: &dyn DecryptionOracle,
) -> HandlerResult<SettlementOutcome> {
    let auction = state
        .get_auction_mut(auction_id)
        .ok_or(AuctionError::AuctionNotFound(auction_id))?;
    let outcome = auction.close_and_settle(&ctx.sender, ctx.timestamp, oracle)?;
    state.collect_transfers(auction_id);
    Ok(outcome)
}

/// Handle RotateEncryptionContext call (admin only).
pub fn handle_rotate_encryption_context(
    state: &mut EngineState,
    ctx: &CallContext,
    attestor_public_key: G2Point,
) -> HandlerResult<u64> {
    if ctx.sender != state.admin {
        return Err(AuctionError::NotAuthorized);
    }
    Ok(state.verifier.rotate_context(attestor_public_key))
}

/// Route a call message to its handler.
pub fn dispatch(
    state: &mut EngineState,
    ctx: &CallContext,
    call: AuctionCall,
    oracle: &dyn DecryptionOracle,
) -> HandlerResult<CallOutcome> {
    match call {
        AuctionCall::CreateAuction { params } => {
            handle_create_auction(state, ctx, params).map(CallOutcome::AuctionCreated)
        }
        AuctionCall::StartAuction { auction_id } => handle_start_auction(state, ctx, auction_id)
            .map(|closes_at| CallOutcome::AuctionStarted { closes_at }),
        AuctionCall::CloseAndSettle { auction_id } => {
            handle_close_and_settle(state, ctx, auction_id, oracle).map(CallOutcome::Settlement)
        }
        AuctionCall::SubmitBid {
            auction_id,
            bundle,
            proof,
            deposit,
        } => handle_submit_bid(state, ctx, auction_id, &bundle, &proof, deposit)
            .map(CallOutcome::BidAccepted),
        AuctionCall::ModifyBid {
            auction_id,
            bundle,
            proof,
            top_up,
        } => handle_modify_bid(state, ctx, auction_id, &bundle, &proof, top_up)
            .map(CallOutcome::BidAccepted),
        AuctionCall::WithdrawBid { auction_id } => handle_withdraw_bid(state, ctx, auction_id)
            .map(|refundable| CallOutcome::BidWithdrawn { refundable }),
        AuctionCall::ClaimRefund { auction_id } => {
            handle_claim_refund(state, ctx, auction_id).map(CallOutcome::RefundClaimed)
        }
        AuctionCall::RotateEncryptionContext {
            attestor_public_key,
        } => handle_rotate_encryption_context(state, ctx, attestor_public_key)
            .map(|epoch| CallOutcome::ContextRotated { epoch }),
    }
}
