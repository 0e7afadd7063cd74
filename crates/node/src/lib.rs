//! Local host for the confidential auction engine.
//!
//! Serves the engine over JSON-RPC without a real blockchain: a simulated
//! clock, an in-process t-of-n decryption committee, an input attestor and
//! an outbox of transfers for the caller to settle.

pub mod server;

pub use server::{serve, AuctionNode, ChainState};
