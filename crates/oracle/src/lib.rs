//! Threshold decryption oracle.
//!
//! Reveals sealed auction bids after close by:
//! 1. Collecting partial key shares from committee members
//! 2. Verifying the DLEQ proof on each share
//! 3. Aggregating shares once the threshold is met
//! 4. Opening every requested ciphertext with the derived identity key

pub mod committee;
pub mod coordinator;

pub use committee::{CommitteeMember, ShareProvider, ThresholdOracle};
pub use coordinator::{CoordinatorError, DecryptionCoordinator, KeyRound, RoundState};
