//! BLS12-381 primitives for confidential single-price auctions.
//!
//! # Overview
//!
//! 1. **Encryption**: bidders encrypt each bid value to the auction's
//!    identity using only the committee's master public key. The AEAD
//!    associated data binds every ciphertext to its `(contract, bidder)`.
//!
//! 2. **Input attestation**: an attestor key signs the typed handles of a
//!    bid together with the contract, bidder and encryption epoch. The
//!    auction checks the signature before accepting the bid.
//!
//! 3. **Threshold decryption**: after close, committee members publish
//!    partial key shares σ_i = sk_i · H(identity) with DLEQ proofs. Any `t`
//!    of them interpolate to σ = s · H(identity), which opens every bid
//!    ciphertext of that auction.

pub mod attestation;
pub mod error;
pub mod ibe;
pub mod threshold;

pub use attestation::{verify_attestation, AttestorKey};
pub use error::CryptoError;
pub use ibe::{decrypt_value, encrypt_value, IbeParams};
pub use threshold::{
    aggregate_partial_signatures, deal_committee_keys, generate_partial_signature,
    verify_decryption_key, verify_partial_signature, CommitteeKeys, SecretKeyShare,
};
