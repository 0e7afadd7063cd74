//! Confidential single-price auction engine.
//!
//! Bidders submit encrypted `(quantity, price)` pairs with a deposit. The
//! engine never sees plaintext until the deadline passes, then asks a
//! decryption oracle to reveal every active bid and settles all winners
//! at one uniform clearing price.
//!
//! # Architecture
//!
//! - `verifier`: Checks input proofs binding ciphertexts to a bidder and auction
//! - `ledger`: Encrypted bid records and modification policy
//! - `escrow`: Deposits, refunds and settlement payouts
//! - `timing`: Opening window and anti-sniping extensions
//! - `oracle`: Decryption oracle boundary
//! - `auction`: Per-auction state machine
//! - `state`: Arena of auctions owned by the host
//! - `call`, `handlers`, `queries`, `genesis`: Host-facing surfaces
//!
//! # Example
//!
//! ```ignore
//! use spa_engine::{handlers, EngineState};
//!
//! let mut state = EngineState::new(admin, attestor_public_key);
//! let ctx = handlers::CallContext { ... };
//!
//! let auction_id = handlers::handle_create_auction(&mut state, &ctx, params)?;
//! handlers::handle_start_auction(&mut state, &ctx, auction_id)?;
//! handlers::handle_submit_bid(&mut state, &ctx, auction_id, &bundle, &proof, deposit)?;
//! ```

pub mod auction;
pub mod call;
pub mod error;
pub mod escrow;
pub mod genesis;
pub mod handlers;
pub mod ledger;
pub mod oracle;
pub mod queries;
pub mod state;
pub mod timing;
pub mod verifier;

#[cfg(test)]
mod testing;

pub use auction::{Auction, BidReceipt, SettlementOutcome};
pub use call::AuctionCall;
pub use error::{AuctionError, BidError, EscrowError, OracleError, ProofError, TimingError};
pub use genesis::{DefaultAuctionParams, EngineGenesisConfig, ThresholdConfig};
pub use handlers::{dispatch, CallContext, CallOutcome, HandlerResult};
pub use oracle::{DecryptionOracle, RevealItem, RevealRequest, RevealedValues};
pub use queries::{AuctionQuery, AuctionQueryResponse, AuctionSummary, EncryptionContext};
pub use state::EngineState;
pub use verifier::{InputVerifier, BID_LAYOUT};
