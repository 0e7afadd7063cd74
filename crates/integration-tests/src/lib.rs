//! End-to-end integration tests for the confidential auction.
//!
//! These tests exercise the full auction lifecycle:
//! 1. Committee key dealing and attestor setup
//! 2. Auction creation and opening
//! 3. Bid encryption, attestation and submission
//! 4. Threshold decryption at close
//! 5. Uniform-price settlement and escrow payouts
//!
//! The last test drives the same flow through a running node over JSON-RPC.
