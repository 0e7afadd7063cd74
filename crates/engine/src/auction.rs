//! Auction state machine.
//!
//! ```text
//! Created ──start──▶ Open ──late bid──▶ Extended
//!                      │                   │
//!                      └──── deadline ─────┘
//!                               │
//!                            Closing ──oracle──▶ Settled
//!                                        └─────▶ CancelledLowParticipation
//! ```
//!
//! Every operation validates before it mutates. The one exception is
//! `close_and_settle`, which records the move to `Closing` even if the
//! oracle then fails, so a retry picks up where the first attempt stopped.

use tracing::{debug, info, warn};

use spa_clearing::{compute_clearing, ClearingOutcome, ClearingRules, RevealedBid};
use spa_types::{
    ciphertext_binding, compute_auction_identity, compute_contract_address, Address, Amount,
    AuctionParams, AuctionPhase, BidRecord, BidStatus, ClearingResult, Timestamp, Transfer,
    TransferReason,
};

use crate::error::{AuctionError, BidError, EscrowError, OracleError, TimingError};
use crate::escrow::DepositEscrow;
use crate::ledger::{BidAction, BidLedger};
use crate::oracle::{check_response, DecryptionOracle, RevealItem, RevealRequest};
use crate::timing::{deadline_passed, evaluate_extension, opening_window};
use crate::verifier::VerifiedBid;

/// Result of an accepted submission or modification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BidReceipt {
    pub action: BidAction,
    pub modification_count: u32,
    pub deposit_posted: Amount,
    pub closes_at: Timestamp,
    pub extended: bool,
}

/// How `close_and_settle` ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled(ClearingResult),
    Cancelled { participants: u32, required: u32 },
}

#[derive(Debug, Clone)]
pub struct Auction {
    pub auction_id: u64,
    pub owner: Address,
    pub contract_address: Address,
    /// IBE identity bids are encrypted to
    pub identity: [u8; 32],
    pub params: AuctionParams,
    pub phase: AuctionPhase,
    pub opened_at: Option<Timestamp>,
    pub closes_at: Option<Timestamp>,
    /// `opened_at + max_duration`; extensions never pass it
    pub hard_deadline: Option<Timestamp>,
    pub participants_at_close: Option<u32>,
    pub result: Option<ClearingResult>,
    ledger: BidLedger,
    escrow: DepositEscrow,
    next_sequence: u64,
    outbox: Vec<Transfer>,
}

impl Auction {
    /// Construct an auction in `Created`.
    pub fn new(
        auction_id: u64,
        owner: Address,
        params: AuctionParams,
    ) -> Result<Self, AuctionError> {
        validate_params(&params)?;

        let contract_address = compute_contract_address(auction_id);
        let escrow = DepositEscrow::new(
            auction_id,
            params.payment_token,
            params.config.required_deposit,
        );

        Ok(Self {
            auction_id,
            owner,
            contract_address,
            identity: compute_auction_identity(&contract_address),
            params,
            phase: AuctionPhase::Created,
            opened_at: None,
            closes_at: None,
            hard_deadline: None,
            participants_at_close: None,
            result: None,
            ledger: BidLedger::new(),
            escrow,
            next_sequence: 0,
            outbox: Vec::new(),
        })
    }

    pub fn clearing_price(&self) -> Option<u64> {
        self.result.as_ref().map(|r| r.clearing_price)
    }

    pub fn ledger(&self) -> &BidLedger {
        &self.ledger
    }

    pub fn escrow(&self) -> &DepositEscrow {
        &self.escrow
    }

    pub fn bid(&self, bidder: &Address) -> Option<&BidRecord> {
        self.ledger.get(bidder)
    }

    // === Lifecycle ===

    /// Open bidding. Owner only.
    pub fn start(&mut self, sender: &Address, now: Timestamp) -> Result<Timestamp, AuctionError> {
        if sender != &self.owner {
            return Err(AuctionError::NotAuthorized);
        }
        match self.phase {
            AuctionPhase::Created => {}
            phase if phase.is_terminal() => return Err(TimingError::Finalized.into()),
            _ => return Err(TimingError::AlreadyStarted.into()),
        }

        let (opened_at, closes_at, hard_deadline) =
            opening_window(now, self.params.min_duration, self.params.max_duration)?;
        self.opened_at = Some(opened_at);
        self.closes_at = Some(closes_at);
        self.hard_deadline = Some(hard_deadline);
        self.phase = AuctionPhase::Open;

        info!(
            auction_id = self.auction_id,
            opened_at, closes_at, hard_deadline, "Auction started"
        );
        Ok(closes_at)
    }

    /// Fail unless bids are accepted at `now`.
    pub fn ensure_accepting(&self, now: Timestamp) -> Result<(), AuctionError> {
        if self.phase == AuctionPhase::Created {
            return Err(TimingError::NotStarted.into());
        }
        match self.closes_at {
            Some(closes_at) if self.phase.accepts_bids() && !deadline_passed(now, closes_at) => {
                Ok(())
            }
            _ => Err(BidError::AlreadyClosed.into()),
        }
    }

    // === Bidding ===

    /// Place a bid, or replace the active one when modification policy
    /// allows. `deposit` is the first deposit or a top-up respectively.
    pub fn submit_bid(
        &mut self,
        bidder: Address,
        input: VerifiedBid,
        deposit: Amount,
        now: Timestamp,
    ) -> Result<BidReceipt, AuctionError> {
        self.ensure_accepting(now)?;
        let action = self.ledger.check_submit(&bidder, &self.params.config)?;
        self.ledger.check_handles(&bidder, &input)?;
        self.apply_bid(bidder, action, input, deposit, now)
    }

    /// Replace the bidder's active bid, adding `top_up` to the deposit.
    pub fn modify_bid(
        &mut self,
        bidder: Address,
        input: VerifiedBid,
        top_up: Amount,
        now: Timestamp,
    ) -> Result<BidReceipt, AuctionError> {
        self.ensure_accepting(now)?;
        let action = self.ledger.check_modify(&bidder, &self.params.config)?;
        self.ledger.check_handles(&bidder, &input)?;
        self.apply_bid(bidder, action, input, top_up, now)
    }

    fn apply_bid(
        &mut self,
        bidder: Address,
        action: BidAction,
        input: VerifiedBid,
        amount: Amount,
        now: Timestamp,
    ) -> Result<BidReceipt, AuctionError> {
        let deposit_posted = match action {
            BidAction::Place => self.escrow.post_deposit(bidder, amount)?,
            BidAction::Modify => self.escrow.top_up(bidder, amount)?,
        };

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let modification_count = self
            .ledger
            .record(bidder, action, input, deposit_posted, now, sequence)
            .modification_count;

        debug!(
            auction_id = self.auction_id,
            bidder = hex::encode(bidder),
            action = ?action,
            modification_count,
            deposit = %deposit_posted,
            "Bid recorded"
        );

        let extended = self.maybe_extend(now);
        Ok(BidReceipt {
            action,
            modification_count,
            deposit_posted,
            closes_at: self.closes_at.unwrap_or(now),
            extended,
        })
    }

    fn maybe_extend(&mut self, now: Timestamp) -> bool {
        let (Some(closes_at), Some(hard_deadline)) = (self.closes_at, self.hard_deadline) else {
            return false;
        };
        let config = &self.params.config;
        match evaluate_extension(
            now,
            closes_at,
            config.extension_threshold,
            config.extension_time,
            hard_deadline,
        ) {
            Some(new_closes_at) => {
                self.closes_at = Some(new_closes_at);
                self.phase = AuctionPhase::Extended;
                info!(
                    auction_id = self.auction_id,
                    old_closes_at = closes_at,
                    new_closes_at,
                    "Deadline extended"
                );
                true
            }
            None => false,
        }
    }

    /// Withdraw the active bid. The deposit stays in escrow until claimed.
    pub fn withdraw_bid(
        &mut self,
        bidder: &Address,
        now: Timestamp,
    ) -> Result<Amount, AuctionError> {
        self.ensure_accepting(now)?;
        self.ledger.withdraw(bidder)?;
        let refundable = self.escrow.deposit_of(bidder);
        info!(
            auction_id = self.auction_id,
            bidder = hex::encode(bidder),
            refundable = %refundable,
            "Bid withdrawn"
        );
        Ok(refundable)
    }

    /// Pay out the bidder's refundable deposit.
    ///
    /// Allowed after withdrawal or once the auction is final; an active
    /// bid's deposit stays locked. Returns 0 when nothing is owed.
    pub fn claim_refund(&mut self, bidder: &Address) -> Result<Amount, AuctionError> {
        let withdrawn =
            matches!(self.ledger.get(bidder), Some(b) if b.status == BidStatus::Withdrawn);
        if !withdrawn && !self.phase.is_terminal() && self.ledger.get(bidder).is_some() {
            return Err(EscrowError::DepositLocked.into());
        }

        let amount = self.escrow.refund(bidder);
        if amount > 0 {
            info!(
                auction_id = self.auction_id,
                bidder = hex::encode(bidder),
                amount = %amount,
                "Refund claimed"
            );
        }
        Ok(amount)
    }

    // === Settlement ===

    /// Close bidding, reveal every active bid and settle.
    ///
    /// Callable by the owner or the beneficiary once the deadline passed. An
    /// oracle failure leaves the auction in `Closing`; call again to retry.
    pub fn close_and_settle(
        &mut self,
        sender: &Address,
        now: Timestamp,
        oracle: &dyn DecryptionOracle,
    ) -> Result<SettlementOutcome, AuctionError> {
        if sender != &self.owner && sender != &self.params.beneficiary {
            return Err(AuctionError::NotAuthorized);
        }

        match self.phase {
            AuctionPhase::Created => return Err(TimingError::NotStarted.into()),
            phase if phase.is_terminal() => return Err(TimingError::Finalized.into()),
            AuctionPhase::Open | AuctionPhase::Extended => {
                let closes_at = self.closes_at.unwrap_or(now);
                if !deadline_passed(now, closes_at) {
                    return Err(TimingError::DeadlineNotReached { closes_at, now }.into());
                }
                self.phase = AuctionPhase::Closing;
                let participants = u32::try_from(self.ledger.count()).unwrap_or(u32::MAX);
                self.participants_at_close = Some(participants);
                info!(auction_id = self.auction_id, participants, "Auction closing");
            }
            _ => {}
        }

        let request = self.reveal_request()?;
        let revealed = oracle
            .reveal(&request)
            .and_then(|revealed| check_response(&request, &revealed).map(|()| revealed))
            .map_err(|err| {
                warn!(auction_id = self.auction_id, error = %err, "Decryption oracle failed");
                err
            })?;

        // Undecryptable bids sit out clearing and are refunded with the rest.
        let mut bids = Vec::with_capacity(self.ledger.count());
        let mut undecryptable = Vec::new();
        for bid in self.ledger.active() {
            let handles = [bid.encrypted_quantity.handle(), bid.encrypted_price.handle()];
            if handles.iter().any(|h| revealed.is_undecryptable(h)) {
                undecryptable.push(bid.bidder);
                continue;
            }
            let quantity = revealed.get(handles[0]);
            let price = revealed.get(handles[1]);
            let (Some(quantity), Some(price)) = (quantity, price) else {
                return Err(OracleError::Incomplete {
                    revealed: revealed.answered(),
                    requested: request.items.len(),
                }
                .into());
            };
            bids.push(RevealedBid {
                bidder: bid.bidder,
                quantity,
                price,
                submitted_at: bid.submitted_at,
                sequence: bid.sequence,
                deposit: self.escrow.deposit_of(&bid.bidder),
            });
        }

        let rules = ClearingRules {
            total_tokens_offered: self.params.total_tokens_offered,
            min_bid_value: self.params.config.min_bid_value,
            min_participants: self.params.min_participants,
        };

        let outcome = compute_clearing(&bids, &rules)?;
        for bidder in &undecryptable {
            warn!(
                auction_id = self.auction_id,
                bidder = hex::encode(bidder),
                "Bid could not be decrypted, refunding"
            );
            self.ledger.set_status(bidder, BidStatus::Unfilled);
        }

        match outcome {
            ClearingOutcome::Cleared(cleared) => {
                let paid = self.escrow.settle_payouts(
                    &cleared.allocations,
                    cleared.clearing_price,
                    self.params.beneficiary,
                )?;

                for unfilled in &cleared.unfilled {
                    self.ledger.set_status(&unfilled.bidder, BidStatus::Unfilled);
                }
                for allocation in &cleared.allocations {
                    self.ledger.set_status(&allocation.bidder, BidStatus::Filled);
                    self.push_token(
                        allocation.bidder,
                        allocation.filled_quantity,
                        TransferReason::Allocation,
                    );
                }
                if cleared.unallocated > 0 {
                    self.push_token(
                        self.params.beneficiary,
                        cleared.unallocated,
                        TransferReason::UnsoldReturn,
                    );
                }

                let result = ClearingResult {
                    auction_id: self.auction_id,
                    clearing_price: cleared.clearing_price,
                    allocations: cleared.allocations,
                    total_filled: cleared.total_filled,
                    unallocated: cleared.unallocated,
                    participants_at_close: self
                        .participants_at_close
                        .unwrap_or(cleared.participants),
                    settled_at: now,
                };
                self.result = Some(result.clone());
                self.phase = AuctionPhase::Settled;

                info!(
                    auction_id = self.auction_id,
                    clearing_price = result.clearing_price,
                    total_filled = result.total_filled,
                    unallocated = result.unallocated,
                    paid = %paid,
                    "Auction settled"
                );
                Ok(SettlementOutcome::Settled(result))
            }
            ClearingOutcome::InsufficientParticipation {
                participants,
                required,
                unfilled,
            } => {
                for bid in &unfilled {
                    self.ledger.set_status(&bid.bidder, BidStatus::Unfilled);
                }
                let refunded = self.escrow.refund_all();
                self.push_token(
                    self.params.beneficiary,
                    self.params.total_tokens_offered,
                    TransferReason::UnsoldReturn,
                );
                self.phase = AuctionPhase::CancelledLowParticipation;

                info!(
                    auction_id = self.auction_id,
                    participants,
                    required,
                    refunded = %refunded,
                    "Auction cancelled for low participation"
                );
                Ok(SettlementOutcome::Cancelled {
                    participants,
                    required,
                })
            }
        }
    }

    fn reveal_request(&self) -> Result<RevealRequest, AuctionError> {
        let mut items = Vec::new();
        for bid in self.ledger.active() {
            let binding = ciphertext_binding(&self.contract_address, &bid.bidder);
            for value in [&bid.encrypted_quantity, &bid.encrypted_price] {
                let missing = || AuctionError::MissingCiphertext(hex::encode(value.handle().0));
                let ciphertext = self
                    .ledger
                    .ciphertext(&bid.bidder, value.handle())
                    .ok_or_else(missing)?;
                items.push(RevealItem {
                    handle: *value.handle(),
                    width: value.width(),
                    ciphertext: ciphertext.clone(),
                    binding,
                });
            }
        }

        Ok(RevealRequest {
            auction_id: self.auction_id,
            contract: self.contract_address,
            identity: self.identity,
            items,
        })
    }

    fn push_token(&mut self, to: Address, quantity: u64, reason: TransferReason) {
        debug!(
            auction_id = self.auction_id,
            to = hex::encode(to),
            quantity,
            reason = ?reason,
            "Queued token transfer"
        );
        self.outbox.push(Transfer {
            auction_id: self.auction_id,
            token: self.params.token_for_sale,
            to,
            amount: quantity as Amount,
            reason,
        });
    }

    /// Drain every transfer queued since the last call.
    pub fn take_transfers(&mut self) -> Vec<Transfer> {
        let mut transfers = self.escrow.take_transfers();
        transfers.append(&mut self.outbox);
        transfers
    }
}

fn validate_params(params: &AuctionParams) -> Result<(), AuctionError> {
    let invalid = |msg: &str| Err(AuctionError::InvalidConfig(msg.into()));
    let config = &params.config;

    if params.total_tokens_offered == 0 {
        return invalid("total_tokens_offered must be positive");
    }
    if params.min_participants == 0 {
        return invalid("min_participants must be at least 1");
    }
    if params.min_duration == 0 {
        return invalid("min_duration must be positive");
    }
    if params.min_duration > params.max_duration {
        return invalid("min_duration exceeds max_duration");
    }
    if params.min_duration != config.min_duration || params.max_duration != config.max_duration {
        return invalid("durations disagree with the auction config");
    }
    Ok(())
}
