//! Collects partial key shares per auction identity and aggregates them.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use spa_crypto::{aggregate_partial_signatures, verify_decryption_key, verify_partial_signature};
use spa_types::{G1Point, MasterPublicKey, PartialDecryptionShare};

/// Errors that can occur during decryption coordination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Duplicate share from member {0}")]
    DuplicateShare(u32),

    #[error("Invalid DLEQ proof from member {0}")]
    InvalidProof(u32),

    #[error("Threshold not met: have {have}, need {need}")]
    ThresholdNotMet { have: usize, need: usize },

    #[error("Unknown committee member {0}")]
    UnknownMember(u32),

    #[error("No key round for identity {0}")]
    UnknownRound(String),

    #[error("Aggregation failed: {0}")]
    AggregationFailed(String),
}

/// Progress of one identity's key round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Collecting partial shares
    Collecting,
    /// Threshold met, ready to aggregate
    Ready,
    /// Decryption key derived
    Completed,
}

/// Shares collected for one auction identity.
#[derive(Debug, Clone)]
pub struct KeyRound {
    pub auction_id: u64,
    pub identity: [u8; 32],
    /// member index -> verified share
    pub shares: HashMap<u32, PartialDecryptionShare>,
    pub state: RoundState,
    pub decryption_key: Option<G1Point>,
}

impl KeyRound {
    fn new(auction_id: u64, identity: [u8; 32]) -> Self {
        Self {
            auction_id,
            identity,
            shares: HashMap::new(),
            state: RoundState::Collecting,
            decryption_key: None,
        }
    }
}

/// Coordinator for the committee's threshold key rounds.
#[derive(Debug)]
pub struct DecryptionCoordinator {
    master_public_key: MasterPublicKey,
    /// Public keys of committee members (index -> pk)
    member_public_keys: HashMap<u32, G1Point>,
    rounds: HashMap<[u8; 32], KeyRound>,
}

impl DecryptionCoordinator {
    pub fn new(master_public_key: MasterPublicKey) -> Self {
        Self {
            master_public_key,
            member_public_keys: HashMap::new(),
            rounds: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> usize {
        self.master_public_key.threshold as usize
    }

    pub fn master_public_key(&self) -> &MasterPublicKey {
        &self.master_public_key
    }

    /// Register a member's public key.
    pub fn register_member(&mut self, index: u32, public_key: G1Point) {
        info!(member_index = index, "Registered committee member");
        self.member_public_keys.insert(index, public_key);
    }

    /// Open a key round for an identity. Reopening keeps collected shares.
    pub fn open_round(&mut self, auction_id: u64, identity: [u8; 32]) -> RoundState {
        let round = self.rounds.entry(identity).or_insert_with(|| {
            info!(
                auction_id,
                identity = hex::encode(identity),
                "Opened key round"
            );
            KeyRound::new(auction_id, identity)
        });
        round.state
    }

    /// Verify and store a partial share.
    pub fn submit_share(
        &mut self,
        identity: &[u8; 32],
        share: PartialDecryptionShare,
    ) -> Result<RoundState, CoordinatorError> {
        let member_index = share.validator_index;
        let threshold = self.threshold();

        let round = self
            .rounds
            .get_mut(identity)
            .ok_or_else(|| CoordinatorError::UnknownRound(hex::encode(identity)))?;

        if round.shares.contains_key(&member_index) {
            return Err(CoordinatorError::DuplicateShare(member_index));
        }

        let member_pk = self
            .member_public_keys
            .get(&member_index)
            .ok_or(CoordinatorError::UnknownMember(member_index))?;

        if verify_partial_signature(&share, identity, member_pk).is_err() {
            warn!(
                member_index,
                identity = hex::encode(identity),
                "Invalid DLEQ proof"
            );
            return Err(CoordinatorError::InvalidProof(member_index));
        }

        round.shares.insert(member_index, share);
        debug!(
            member_index,
            auction_id = round.auction_id,
            shares_collected = round.shares.len(),
            threshold,
            "Accepted partial share"
        );

        if round.state == RoundState::Collecting && round.shares.len() >= threshold {
            round.state = RoundState::Ready;
            info!(auction_id = round.auction_id, "Threshold met, ready to aggregate");
        }
        Ok(round.state)
    }

    /// Interpolate the identity's decryption key, once enough shares arrived.
    pub fn aggregate(&mut self, identity: &[u8; 32]) -> Result<G1Point, CoordinatorError> {
        let threshold = self.threshold();
        let mpk = self.master_public_key.mpk.clone();

        let round = self
            .rounds
            .get_mut(identity)
            .ok_or_else(|| CoordinatorError::UnknownRound(hex::encode(identity)))?;

        if let Some(key) = &round.decryption_key {
            return Ok(key.clone());
        }
        if round.shares.len() < threshold {
            return Err(CoordinatorError::ThresholdNotMet {
                have: round.shares.len(),
                need: threshold,
            });
        }

        let mut indices: Vec<u32> = round.shares.keys().copied().collect();
        indices.sort_unstable();
        let shares: Vec<(u32, G1Point)> = indices
            .iter()
            .take(threshold)
            .filter_map(|idx| round.shares.get(idx).map(|s| (*idx, s.partial_sig.clone())))
            .collect();

        let key = aggregate_partial_signatures(&shares, threshold)
            .map_err(|e| CoordinatorError::AggregationFailed(e.to_string()))?;
        verify_decryption_key(&key, identity, &mpk)
            .map_err(|e| CoordinatorError::AggregationFailed(e.to_string()))?;

        round.decryption_key = Some(key.clone());
        round.state = RoundState::Completed;
        info!(auction_id = round.auction_id, "Decryption key derived");
        Ok(key)
    }

    pub fn round(&self, identity: &[u8; 32]) -> Option<&KeyRound> {
        self.rounds.get(identity)
    }

    /// Identities still waiting for a key.
    pub fn pending_rounds(&self) -> Vec<[u8; 32]> {
        self.rounds
            .values()
            .filter(|r| r.state != RoundState::Completed)
            .map(|r| r.identity)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use spa_crypto::{deal_committee_keys, generate_partial_signature, CommitteeKeys};

    const IDENTITY: [u8; 32] = [7u8; 32];

    fn setup() -> (CommitteeKeys, DecryptionCoordinator) {
        let keys = deal_committee_keys(2, 3, &mut OsRng).unwrap();
        let mut coordinator = DecryptionCoordinator::new(keys.master_public_key.clone());
        for share in &keys.shares {
            coordinator.register_member(share.index, share.public_key.clone());
        }
        coordinator.open_round(1, IDENTITY);
        (keys, coordinator)
    }

    #[test]
    fn test_threshold_shares_derive_key() {
        let (keys, mut coordinator) = setup();

        let first = generate_partial_signature(&keys.shares[0], &IDENTITY, &mut OsRng).unwrap();
        assert_eq!(coordinator.submit_share(&IDENTITY, first), Ok(RoundState::Collecting));
        assert_eq!(
            coordinator.aggregate(&IDENTITY),
            Err(CoordinatorError::ThresholdNotMet { have: 1, need: 2 })
        );

        let third = generate_partial_signature(&keys.shares[2], &IDENTITY, &mut OsRng).unwrap();
        assert_eq!(coordinator.submit_share(&IDENTITY, third), Ok(RoundState::Ready));

        let key = coordinator.aggregate(&IDENTITY).unwrap();
        assert!(verify_decryption_key(&key, &IDENTITY, &keys.master_public_key.mpk).is_ok());
        assert_eq!(coordinator.round(&IDENTITY).unwrap().state, RoundState::Completed);
        assert!(coordinator.pending_rounds().is_empty());
    }

    #[test]
    fn test_duplicate_share_rejected() {
        let (keys, mut coordinator) = setup();
        let share = generate_partial_signature(&keys.shares[0], &IDENTITY, &mut OsRng).unwrap();
        coordinator.submit_share(&IDENTITY, share.clone()).unwrap();
        assert_eq!(
            coordinator.submit_share(&IDENTITY, share),
            Err(CoordinatorError::DuplicateShare(1))
        );
    }

    #[test]
    fn test_share_for_wrong_member_rejected() {
        let (keys, mut coordinator) = setup();
        let mut share = generate_partial_signature(&keys.shares[0], &IDENTITY, &mut OsRng).unwrap();
        share.validator_index = 2;
        assert_eq!(
            coordinator.submit_share(&IDENTITY, share),
            Err(CoordinatorError::InvalidProof(2))
        );
    }

    #[test]
    fn test_share_for_other_identity_rejected() {
        let (keys, mut coordinator) = setup();
        let share = generate_partial_signature(&keys.shares[0], &[8u8; 32], &mut OsRng).unwrap();
        assert_eq!(
            coordinator.submit_share(&IDENTITY, share),
            Err(CoordinatorError::InvalidProof(1))
        );
    }

    #[test]
    fn test_unknown_member_and_round() {
        let (keys, mut coordinator) = setup();
        let mut share = generate_partial_signature(&keys.shares[0], &IDENTITY, &mut OsRng).unwrap();
        share.validator_index = 99;
        assert_eq!(
            coordinator.submit_share(&IDENTITY, share.clone()),
            Err(CoordinatorError::UnknownMember(99))
        );
        assert!(matches!(
            coordinator.submit_share(&[0u8; 32], share),
            Err(CoordinatorError::UnknownRound(_))
        ));
    }

    #[test]
    fn test_reopen_keeps_shares() {
        let (keys, mut coordinator) = setup();
        let share = generate_partial_signature(&keys.shares[1], &IDENTITY, &mut OsRng).unwrap();
        coordinator.submit_share(&IDENTITY, share).unwrap();
        assert_eq!(coordinator.open_round(1, IDENTITY), RoundState::Collecting);
        assert_eq!(coordinator.round(&IDENTITY).unwrap().shares.len(), 1);
        assert_eq!(coordinator.pending_rounds(), vec![IDENTITY]);
    }
}
