//! Local committee members and the oracle that drives them.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rand::rngs::OsRng;
use tracing::{debug, info, warn};

use spa_crypto::{decrypt_value, generate_partial_signature, CommitteeKeys, SecretKeyShare};
use spa_engine::{DecryptionOracle, OracleError, RevealRequest, RevealedValues};
use spa_types::{G1Point, MasterPublicKey, PartialDecryptionShare};

use crate::coordinator::{DecryptionCoordinator, RoundState};

/// Anything that can answer for one committee seat.
pub trait ShareProvider: Send + Sync {
    fn index(&self) -> u32;

    fn is_available(&self) -> bool {
        true
    }

    /// Partial share for `identity`, or `None` while unreachable.
    fn partial_share(&self, identity: &[u8; 32]) -> Option<PartialDecryptionShare>;
}

/// A committee member holding its key share in-process.
#[derive(Debug)]
pub struct CommitteeMember {
    share: SecretKeyShare,
    online: AtomicBool,
}

impl CommitteeMember {
    pub fn new(share: SecretKeyShare) -> Self {
        Self {
            share,
            online: AtomicBool::new(true),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ShareProvider for CommitteeMember {
    fn index(&self) -> u32 {
        self.share.index
    }

    fn is_available(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn partial_share(&self, identity: &[u8; 32]) -> Option<PartialDecryptionShare> {
        if !self.is_available() {
            return None;
        }
        generate_partial_signature(&self.share, identity, &mut OsRng)
            .map_err(|e| {
                warn!(member_index = self.share.index, error = %e, "Share generation failed")
            })
            .ok()
    }
}

/// Decryption oracle backed by a t-of-n committee.
///
/// Each `reveal` polls every member, feeds the shares through the
/// coordinator and opens the requested ciphertexts once the identity's key
/// is known. Shares from earlier attempts are kept, so a retry only needs
/// the members that were missing.
pub struct ThresholdOracle<P: ShareProvider = CommitteeMember> {
    coordinator: Mutex<DecryptionCoordinator>,
    members: Vec<P>,
}

impl ThresholdOracle<CommitteeMember> {
    /// Seat every share of a dealt committee in-process.
    pub fn from_committee(keys: CommitteeKeys) -> Self {
        let mpk = keys.master_public_key.clone();
        let public_keys: Vec<_> = keys
            .shares
            .iter()
            .map(|share| (share.index, share.public_key.clone()))
            .collect();
        let members = keys.shares.into_iter().map(CommitteeMember::new).collect();

        let oracle = Self::new(mpk, members);
        {
            let mut coordinator = oracle.coordinator.lock();
            for (index, public_key) in public_keys {
                coordinator.register_member(index, public_key);
            }
        }
        oracle
    }

    /// Take every member offline or bring them back.
    pub fn set_online(&self, online: bool) {
        for member in &self.members {
            member.set_online(online);
        }
        info!(online, "Committee availability changed");
    }
}

impl<P: ShareProvider> ThresholdOracle<P> {
    /// Members must still be registered with `register_member`.
    pub fn new(master_public_key: MasterPublicKey, members: Vec<P>) -> Self {
        Self {
            coordinator: Mutex::new(DecryptionCoordinator::new(master_public_key)),
            members,
        }
    }

    pub fn register_member(&self, index: u32, public_key: G1Point) {
        self.coordinator.lock().register_member(index, public_key);
    }

    pub fn members(&self) -> &[P] {
        &self.members
    }

    pub fn master_public_key(&self) -> MasterPublicKey {
        self.coordinator.lock().master_public_key().clone()
    }

    pub fn online_members(&self) -> usize {
        self.members.iter().filter(|m| m.is_available()).count()
    }

    fn collect_shares(&self, auction_id: u64, identity: &[u8; 32]) {
        let mut coordinator = self.coordinator.lock();
        if coordinator.open_round(auction_id, *identity) == RoundState::Completed {
            return;
        }

        for member in &self.members {
            let collected = coordinator
                .round(identity)
                .is_some_and(|r| r.shares.contains_key(&member.index()));
            if collected {
                continue;
            }
            let Some(share) = member.partial_share(identity) else {
                debug!(member_index = member.index(), auction_id, "Member unreachable");
                continue;
            };
            if let Err(e) = coordinator.submit_share(identity, share) {
                warn!(member_index = member.index(), auction_id, error = %e, "Share rejected");
            }
        }
    }
}

impl<P: ShareProvider> DecryptionOracle for ThresholdOracle<P> {
    fn reveal(&self, request: &RevealRequest) -> Result<RevealedValues, OracleError> {
        self.collect_shares(request.auction_id, &request.identity);
        let key = self
            .coordinator
            .lock()
            .aggregate(&request.identity)
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        // The key is verified against the master key, so a ciphertext it
        // cannot open is a property of that ciphertext.
        let mut revealed = RevealedValues::default();
        for item in &request.items {
            match decrypt_value(&item.ciphertext, &key, &item.binding) {
                Ok((width, value)) if width == item.width => {
                    revealed.values.insert(item.handle, value);
                }
                Ok((width, _)) => {
                    warn!(
                        auction_id = request.auction_id,
                        handle = hex::encode(item.handle.0),
                        declared = ?item.width,
                        actual = ?width,
                        "Ciphertext width differs from its handle"
                    );
                    revealed.undecryptable.insert(item.handle);
                }
                Err(e) => {
                    warn!(
                        auction_id = request.auction_id,
                        handle = hex::encode(item.handle.0),
                        error = %e,
                        "Ciphertext does not decrypt"
                    );
                    revealed.undecryptable.insert(item.handle);
                }
            }
        }

        info!(
            auction_id = request.auction_id,
            revealed = revealed.values.len(),
            undecryptable = revealed.undecryptable.len(),
            requested = request.items.len(),
            "Revealed auction bids"
        );
        Ok(revealed)
    }
}
