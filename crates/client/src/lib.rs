//! Client SDK for bidding in confidential single-price auctions.
//!
//! This crate provides:
//! - Encrypted `(quantity, price)` bid preparation with a deposit preview
//! - The node's JSON-RPC interface, usable as client or server trait
//! - Wire types for RPC requests and responses

pub mod bid;
pub mod rpc;

pub use bid::{prepare_bid, BidBuilder, BidPrepError, PreparedBid};
pub use rpc::{AuctionNodeApiClient, AuctionNodeApiServer};
