//! Deposit escrow for one auction.
//!
//! Tracks each bidder's outstanding collateral in the payment token. Value
//! never leaves directly: refunds and payouts are queued as [`Transfer`]s for
//! the host ledger to execute.

use std::collections::BTreeMap;

use tracing::debug;

use spa_clearing::payment_for;
use spa_types::{Address, Allocation, Amount, Transfer, TransferReason};

use crate::error::EscrowError;

#[derive(Debug, Clone)]
pub struct DepositEscrow {
    auction_id: u64,
    payment_token: Address,
    required_deposit: Amount,
    deposits: BTreeMap<Address, Amount>,
    balance: Amount,
    outbox: Vec<Transfer>,
}

impl DepositEscrow {
    pub fn new(auction_id: u64, payment_token: Address, required_deposit: Amount) -> Self {
        Self {
            auction_id,
            payment_token,
            required_deposit,
            deposits: BTreeMap::new(),
            balance: 0,
            outbox: Vec::new(),
        }
    }

    /// Accept a first deposit. Returns the bidder's new total.
    pub fn post_deposit(&mut self, bidder: Address, amount: Amount) -> Result<Amount, EscrowError> {
        if amount < self.required_deposit {
            return Err(EscrowError::InsufficientDeposit {
                required: self.required_deposit,
                got: amount,
            });
        }
        self.credit(bidder, amount)
    }

    /// Add collateral of any size on top of an existing deposit.
    pub fn top_up(&mut self, bidder: Address, amount: Amount) -> Result<Amount, EscrowError> {
        self.credit(bidder, amount)
    }

    fn credit(&mut self, bidder: Address, amount: Amount) -> Result<Amount, EscrowError> {
        let current = self.deposit_of(&bidder);
        let total = current.checked_add(amount).ok_or(EscrowError::Overflow)?;
        let balance = self.balance.checked_add(amount).ok_or(EscrowError::Overflow)?;
        self.deposits.insert(bidder, total);
        self.balance = balance;
        Ok(total)
    }

    /// Return the bidder's whole outstanding deposit. A second call returns 0.
    pub fn refund(&mut self, bidder: &Address) -> Amount {
        let amount = self.deposits.remove(bidder).unwrap_or(0);
        if amount > 0 {
            self.balance -= amount;
            self.push(*bidder, amount, TransferReason::Refund);
        }
        amount
    }

    /// Refund every outstanding deposit.
    pub fn refund_all(&mut self) -> Amount {
        let bidders: Vec<Address> = self.deposits.keys().copied().collect();
        bidders.iter().map(|bidder| self.refund(bidder)).sum()
    }

    /// Pay the beneficiary `filled × clearing_price` per allocation, refund
    /// the excess, then refund everything else still held.
    ///
    /// All-or-nothing: an allocation the deposit does not cover aborts the
    /// whole settlement before anything moves. Returns the total paid.
    pub fn settle_payouts(
        &mut self,
        allocations: &[Allocation],
        clearing_price: u64,
        beneficiary: Address,
    ) -> Result<Amount, EscrowError> {
        let mut payments = Vec::with_capacity(allocations.len());
        let mut total: Amount = 0;
        for allocation in allocations {
            let payment = payment_for(allocation.filled_quantity, clearing_price);
            let posted = self.deposit_of(&allocation.bidder);
            if posted < payment {
                return Err(EscrowError::UnderCollateralized {
                    required: payment,
                    posted,
                });
            }
            total = total.checked_add(payment).ok_or(EscrowError::Overflow)?;
            payments.push((allocation.bidder, payment));
        }

        for (bidder, payment) in payments {
            if let Some(deposit) = self.deposits.get_mut(&bidder) {
                *deposit -= payment;
            }
        }
        self.balance -= total;
        if total > 0 {
            self.push(beneficiary, total, TransferReason::Payment);
        }

        self.refund_all();
        Ok(total)
    }

    pub fn deposit_of(&self, bidder: &Address) -> Amount {
        self.deposits.get(bidder).copied().unwrap_or(0)
    }

    /// Outstanding deposits by bidder.
    pub fn deposits(&self) -> &BTreeMap<Address, Amount> {
        &self.deposits
    }

    /// Value currently held.
    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Drain queued transfers.
    pub fn take_transfers(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.outbox)
    }

    fn push(&mut self, to: Address, amount: Amount, reason: TransferReason) {
        debug!(
            auction_id = self.auction_id,
            to = hex::encode(to),
            amount = %amount,
            reason = ?reason,
            "Queued escrow transfer"
        );
        self.outbox.push(Transfer {
            auction_id: self.auction_id,
            token: self.payment_token,
            to,
            amount,
            reason,
        });
    }
}
