//! Encrypted bid ledger.
//!
//! Holds at most one bid per bidder and the ciphertexts behind every active
//! handle. A handle belongs to exactly one live bid. Plaintext never enters
//! the ledger.

use std::collections::{BTreeMap, HashMap};

use spa_types::{
    Address, Amount, AuctionConfig, BidRecord, BidStatus, CiphertextHandle, ThresholdCiphertext,
    Timestamp,
};

use crate::error::BidError;
use crate::verifier::VerifiedBid;

/// What a submission does to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BidAction {
    /// First bid from this bidder
    Place,
    /// Replace the bidder's active bid
    Modify,
}

#[derive(Debug, Clone)]
struct StoredCiphertext {
    owner: Address,
    ciphertext: ThresholdCiphertext,
}

#[derive(Debug, Default, Clone)]
pub struct BidLedger {
    bids: BTreeMap<Address, BidRecord>,
    ciphertexts: HashMap<CiphertextHandle, StoredCiphertext>,
}

impl BidLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide how a `submitBid` from `bidder` is handled under `config`.
    pub fn check_submit(
        &self,
        bidder: &Address,
        config: &AuctionConfig,
    ) -> Result<BidAction, BidError> {
        match self.bids.get(bidder) {
            None => Ok(BidAction::Place),
            Some(bid) if bid.status == BidStatus::Withdrawn => Err(BidError::AlreadyWithdrawn),
            Some(bid) => {
                if !config.allow_bid_modification {
                    return Err(BidError::DuplicateBid);
                }
                check_cap(bid, config)
            }
        }
    }

    /// Decide whether `modifyBid` from `bidder` is allowed under `config`.
    pub fn check_modify(
        &self,
        bidder: &Address,
        config: &AuctionConfig,
    ) -> Result<BidAction, BidError> {
        let bid = self.bids.get(bidder).ok_or(BidError::NoActiveBid)?;
        match bid.status {
            BidStatus::Active => {}
            BidStatus::Withdrawn => return Err(BidError::AlreadyWithdrawn),
            _ => return Err(BidError::NoActiveBid),
        }
        if !config.allow_bid_modification {
            return Err(BidError::ModificationDisabled);
        }
        check_cap(bid, config)
    }

    /// Fail if any handle of `input` backs another bidder's live bid.
    pub fn check_handles(&self, bidder: &Address, input: &VerifiedBid) -> Result<(), BidError> {
        let held_elsewhere = [input.quantity.0.handle(), input.price.0.handle()]
            .into_iter()
            .any(|handle| matches!(self.ciphertexts.get(handle), Some(s) if s.owner != *bidder));
        if held_elsewhere {
            return Err(BidError::HandleInUse);
        }
        Ok(())
    }

    /// Store a verified `(quantity, price)` input. `action` must come from
    /// [`BidLedger::check_submit`] or [`BidLedger::check_modify`], and the
    /// handles must have passed [`BidLedger::check_handles`].
    pub fn record(
        &mut self,
        bidder: Address,
        action: BidAction,
        input: VerifiedBid,
        deposit_posted: Amount,
        now: Timestamp,
        sequence: u64,
    ) -> &BidRecord {
        let VerifiedBid { quantity, price } = input;

        let modification_count = match (action, self.bids.get(&bidder)) {
            (BidAction::Modify, Some(old)) => {
                let handles = [*old.encrypted_quantity.handle(), *old.encrypted_price.handle()];
                let count = old.modification_count + 1;
                self.release(&bidder, &handles);
                count
            }
            _ => 0,
        };

        for (value, ciphertext) in [&quantity, &price] {
            self.ciphertexts.insert(
                *value.handle(),
                StoredCiphertext {
                    owner: bidder,
                    ciphertext: ciphertext.clone(),
                },
            );
        }

        let record = BidRecord {
            bidder,
            encrypted_quantity: quantity.0,
            encrypted_price: price.0,
            deposit_posted,
            modification_count,
            submitted_at: now,
            sequence,
            status: BidStatus::Active,
        };
        self.bids.insert(bidder, record);
        &self.bids[&bidder]
    }

    /// Mark the bidder's active bid as withdrawn and drop its ciphertexts.
    pub fn withdraw(&mut self, bidder: &Address) -> Result<(), BidError> {
        let bid = self.bids.get_mut(bidder).ok_or(BidError::NoActiveBid)?;
        match bid.status {
            BidStatus::Active => {}
            BidStatus::Withdrawn => return Err(BidError::AlreadyWithdrawn),
            _ => return Err(BidError::NoActiveBid),
        }
        bid.status = BidStatus::Withdrawn;
        let handles = [*bid.encrypted_quantity.handle(), *bid.encrypted_price.handle()];
        self.release(bidder, &handles);
        Ok(())
    }

    /// Drop `bidder`'s ciphertexts behind `handles`.
    fn release(&mut self, bidder: &Address, handles: &[CiphertextHandle]) {
        for handle in handles {
            if matches!(self.ciphertexts.get(handle), Some(s) if s.owner == *bidder) {
                self.ciphertexts.remove(handle);
            }
        }
    }

    /// Set the final status of a bid after clearing.
    pub fn set_status(&mut self, bidder: &Address, status: BidStatus) {
        if let Some(bid) = self.bids.get_mut(bidder) {
            bid.status = status;
        }
    }

    /// Number of active bids.
    pub fn count(&self) -> usize {
        self.active().count()
    }

    pub fn active(&self) -> impl Iterator<Item = &BidRecord> {
        self.bids.values().filter(|b| b.status == BidStatus::Active)
    }

    pub fn all(&self) -> impl Iterator<Item = &BidRecord> {
        self.bids.values()
    }

    pub fn get(&self, bidder: &Address) -> Option<&BidRecord> {
        self.bids.get(bidder)
    }

    /// Ciphertext behind `handle`, if it belongs to `bidder`'s live bid.
    pub fn ciphertext(
        &self,
        bidder: &Address,
        handle: &CiphertextHandle,
    ) -> Option<&ThresholdCiphertext> {
        self.ciphertexts
            .get(handle)
            .filter(|s| s.owner == *bidder)
            .map(|s| &s.ciphertext)
    }

    pub fn stored_ciphertexts(&self) -> usize {
        self.ciphertexts.len()
    }
}

fn check_cap(bid: &BidRecord, config: &AuctionConfig) -> Result<BidAction, BidError> {
    if bid.modification_count >= config.max_modifications {
        Err(BidError::ModificationCapExceeded {
            max: config.max_modifications,
        })
    } else {
        Ok(BidAction::Modify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, Fixture};
    use spa_types::compute_contract_address;

    const BIDDER: Address = [7u8; 32];

    fn verified(fx: &Fixture, quantity: u64, price: u64) -> VerifiedBid {
        let contract = compute_contract_address(1);
        let (bundle, proof) = fx.bid_input(&contract, &BIDDER, quantity, price);
        fx.verifier()
            .verify(&bundle, &proof, &crate::verifier::BID_LAYOUT, &BIDDER, &contract)
            .unwrap()
            .into_bid()
            .unwrap()
    }

    #[test]
    fn test_place_then_modify_until_cap() {
        let fx = Fixture::new();
        let config = test_config();
        let mut ledger = BidLedger::new();

        let action = ledger.check_submit(&BIDDER, &config).unwrap();
        assert_eq!(action, BidAction::Place);
        ledger.record(BIDDER, action, verified(&fx, 10, 50), 1000, 100, 0);
        assert_eq!(ledger.count(), 1);

        for round in 1..=config.max_modifications {
            let action = ledger.check_modify(&BIDDER, &config).unwrap();
            let now = 100 + round as u64;
            let bid = verified(&fx, 10, 50);
            let record = ledger.record(BIDDER, action, bid, 1000, now, round as u64);
            assert_eq!(record.modification_count, round);
            assert_eq!(record.submitted_at, 100 + round as u64);
        }

        assert_eq!(
            ledger.check_modify(&BIDDER, &config),
            Err(BidError::ModificationCapExceeded {
                max: config.max_modifications,
            })
        );
        assert_eq!(
            ledger.check_submit(&BIDDER, &config),
            Err(BidError::ModificationCapExceeded {
                max: config.max_modifications,
            })
        );
        assert_eq!(ledger.count(), 1);
        // replaced ciphertexts are dropped
        assert_eq!(ledger.stored_ciphertexts(), 2);
    }

    #[test]
    fn test_modification_disabled() {
        let fx = Fixture::new();
        let mut config = test_config();
        config.allow_bid_modification = false;
        let mut ledger = BidLedger::new();

        ledger.record(BIDDER, BidAction::Place, verified(&fx, 1, 1), 0, 0, 0);
        assert_eq!(ledger.check_submit(&BIDDER, &config), Err(BidError::DuplicateBid));
        assert_eq!(
            ledger.check_modify(&BIDDER, &config),
            Err(BidError::ModificationDisabled)
        );
    }

    #[test]
    fn test_modify_requires_active_bid() {
        let ledger = BidLedger::new();
        assert_eq!(
            ledger.check_modify(&BIDDER, &test_config()),
            Err(BidError::NoActiveBid)
        );
    }

    #[test]
    fn test_withdrawn_bidder_cannot_return() {
        let fx = Fixture::new();
        let config = test_config();
        let mut ledger = BidLedger::new();

        ledger.record(BIDDER, BidAction::Place, verified(&fx, 1, 1), 0, 0, 0);
        ledger.withdraw(&BIDDER).unwrap();

        assert_eq!(ledger.count(), 0);
        assert_eq!(ledger.stored_ciphertexts(), 0);
        assert_eq!(ledger.withdraw(&BIDDER), Err(BidError::AlreadyWithdrawn));
        assert_eq!(
            ledger.check_submit(&BIDDER, &config),
            Err(BidError::AlreadyWithdrawn)
        );
        assert_eq!(
            ledger.check_modify(&BIDDER, &config),
            Err(BidError::AlreadyWithdrawn)
        );
    }

    #[test]
    fn test_one_bid_per_bidder() {
        let fx = Fixture::new();
        let config = test_config();
        let mut ledger = BidLedger::new();

        for i in 0..3u64 {
            let action = ledger.check_submit(&BIDDER, &config).unwrap();
            ledger.record(BIDDER, action, verified(&fx, 1, 1), 0, i, i);
        }
        assert_eq!(ledger.count(), 1);
        assert_eq!(ledger.all().count(), 1);
    }

    #[test]
    fn test_handles_owned_by_one_bidder() {
        let fx = Fixture::new();
        let contract = compute_contract_address(1);
        let other: Address = [8u8; 32];
        let (bundle, proof) = fx.bid_input(&contract, &BIDDER, 5, 5);
        let verify = || {
            fx.verifier()
                .verify(&bundle, &proof, &crate::verifier::BID_LAYOUT, &BIDDER, &contract)
                .unwrap()
                .into_bid()
                .unwrap()
        };

        let mut ledger = BidLedger::new();
        assert_eq!(ledger.check_handles(&other, &verify()), Ok(()));
        ledger.record(BIDDER, BidAction::Place, verify(), 0, 0, 0);

        assert_eq!(ledger.check_handles(&other, &verify()), Err(BidError::HandleInUse));
        assert_eq!(ledger.check_handles(&BIDDER, &verify()), Ok(()));

        let handle = *bundle.values[0].handle();
        assert!(ledger.ciphertext(&BIDDER, &handle).is_some());
        assert!(ledger.ciphertext(&other, &handle).is_none());

        // released once the owner withdraws
        ledger.withdraw(&BIDDER).unwrap();
        assert_eq!(ledger.check_handles(&other, &verify()), Ok(()));
        assert!(ledger.ciphertext(&BIDDER, &handle).is_none());
    }
}
