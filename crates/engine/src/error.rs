//! Engine error types.

use thiserror::Error;

use spa_clearing::ClearingError;
use spa_types::{Amount, Timestamp};

/// Rejections of an encrypted input and its proof.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Input proof is not bound to this bidder and auction")]
    BindingMismatch,

    #[error("Encryption context {epoch} has been rotated out (current {current})")]
    Stale { epoch: u64, current: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BidError {
    #[error("Auction no longer accepts bids")]
    AlreadyClosed,

    #[error("Modification limit of {max} reached")]
    ModificationCapExceeded { max: u32 },

    #[error("Bidder already has an active bid")]
    DuplicateBid,

    #[error("Bid modification is disabled for this auction")]
    ModificationDisabled,

    #[error("No active bid")]
    NoActiveBid,

    #[error("Bid was withdrawn")]
    AlreadyWithdrawn,

    #[error("Ciphertext handle already backs another bid")]
    HandleInUse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    #[error("Insufficient deposit: need {required}, got {got}")]
    InsufficientDeposit { required: Amount, got: Amount },

    #[error("Deposit of {posted} does not cover payment of {required}")]
    UnderCollateralized { required: Amount, posted: Amount },

    #[error("Deposit is locked behind an active bid")]
    DepositLocked,

    #[error("Escrow arithmetic overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("Auction has not started")]
    NotStarted,

    #[error("Auction already started")]
    AlreadyStarted,

    #[error("Deadline not reached: closes at {closes_at}, now {now}")]
    DeadlineNotReached {
        closes_at: Timestamp,
        now: Timestamp,
    },

    #[error("Auction is finalized")]
    Finalized,
}

/// Failures of the decryption oracle. All of them are retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("Decryption oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Decryption oracle revealed {revealed} of {requested} values")]
    Incomplete { revealed: usize, requested: usize },

    #[error("Revealed value does not fit its declared width")]
    ValueOutOfRange,
}

/// Errors that can occur in the auction engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuctionError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(u64),

    #[error("Not authorized")]
    NotAuthorized,

    #[error("Invalid auction configuration: {0}")]
    InvalidConfig(String),

    #[error("Active bid is missing ciphertext {0}")]
    MissingCiphertext(String),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Bid(#[from] BidError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error(transparent)]
    Timing(#[from] TimingError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Clearing(#[from] ClearingError),
}
