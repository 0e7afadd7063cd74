//! Engine state: the arena of auctions plus the shared input verifier.

use std::collections::BTreeMap;

use spa_types::{Address, G2Point, Transfer};

use crate::auction::Auction;
use crate::genesis::{DefaultAuctionParams, EngineGenesisConfig};
use crate::verifier::InputVerifier;

/// All engine state. Owned by the host; every call takes `&mut`.
#[derive(Debug)]
pub struct EngineState {
    /// May rotate encryption contexts
    pub admin: Address,

    /// Next auction ID to assign
    pub next_auction_id: u64,

    /// All auctions by ID
    pub auctions: BTreeMap<u64, Auction>,

    /// Input proof verifier shared by every auction
    pub verifier: InputVerifier,

    /// Parameters offered to auction creators
    pub default_params: DefaultAuctionParams,

    /// Transfers waiting for the host ledger
    outbox: Vec<Transfer>,
}

impl EngineState {
    pub fn new(admin: Address, attestor_public_key: G2Point) -> Self {
        Self {
            admin,
            next_auction_id: 1,
            auctions: BTreeMap::new(),
            verifier: InputVerifier::new(attestor_public_key),
            default_params: DefaultAuctionParams::default(),
            outbox: Vec::new(),
        }
    }

    pub fn from_genesis(config: &EngineGenesisConfig, attestor_public_key: G2Point) -> Self {
        Self {
            default_params: config.default_params.clone(),
            ..Self::new(config.admin, attestor_public_key)
        }
    }

    /// Get the next auction ID and increment.
    pub fn allocate_auction_id(&mut self) -> u64 {
        let id = self.next_auction_id;
        self.next_auction_id += 1;
        id
    }

    pub fn get_auction(&self, auction_id: u64) -> Option<&Auction> {
        self.auctions.get(&auction_id)
    }

    pub fn get_auction_mut(&mut self, auction_id: u64) -> Option<&mut Auction> {
        self.auctions.get_mut(&auction_id)
    }

    /// Move an auction's queued transfers into the engine outbox.
    pub fn collect_transfers(&mut self, auction_id: u64) {
        if let Some(auction) = self.auctions.get_mut(&auction_id) {
            self.outbox.extend(auction.take_transfers());
        }
    }

    pub fn pending_transfers(&self) -> &[Transfer] {
        &self.outbox
    }

    /// Hand every pending transfer to the host.
    pub fn drain_transfers(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.outbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_params, OWNER};

    #[test]
    fn test_allocate_auction_id() {
        let mut state = EngineState::new([0u8; 32], G2Point::default());
        assert_eq!(state.allocate_auction_id(), 1);
        assert_eq!(state.allocate_auction_id(), 2);
        assert_eq!(state.allocate_auction_id(), 3);
    }

    #[test]
    fn test_transfers_drain_once() {
        let mut state = EngineState::new([0u8; 32], G2Point::default());
        let auction = Auction::new(1, OWNER, test_params()).unwrap();
        state.auctions.insert(1, auction);

        state.collect_transfers(1);
        assert!(state.pending_transfers().is_empty());
        assert!(state.drain_transfers().is_empty());
    }

    #[test]
    fn test_from_genesis_keeps_defaults() {
        let mut config = EngineGenesisConfig::default();
        config.admin = [4u8; 32];
        config.default_params.min_participants = 3;
        let state = EngineState::from_genesis(&config, G2Point::default());
        assert_eq!(state.admin, [4u8; 32]);
        assert_eq!(state.default_params.min_participants, 3);
        assert_eq!(state.verifier.current_epoch(), 0);
    }
}
