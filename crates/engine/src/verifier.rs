//! Input proof verification.
//!
//! An encrypted input arrives as a [`CiphertextBundle`] plus an opaque proof
//! blob. Before anything is stored the verifier checks, in order:
//!
//! 1. the blob decodes to an [`InputProof`]
//! 2. the bundle has exactly the expected layout of bit-widths
//! 3. every handle is the hash of its ciphertext and every ephemeral key is
//!    a valid G2 point
//! 4. the proof's encryption context is known and still current
//! 5. the proof names this bidder and this contract
//! 6. the attestation signature covers `(contract, bidder, epoch, handles)`
//!
//! Verification is pure: a failure leaves no trace.

use std::collections::BTreeMap;

use tracing::{info, warn};

use spa_crypto::ibe::decompress_g2;
use spa_crypto::{verify_attestation, CryptoError};
use spa_types::{
    compute_ciphertext_handle, Address, BitWidth, CiphertextBundle, EncryptedValue, G2Point,
    InputProof, ThresholdCiphertext,
};

use crate::error::ProofError;

/// Layout of a bid: `(quantity, price)`, both 64-bit.
pub const BID_LAYOUT: [BitWidth; 2] = [BitWidth::W64, BitWidth::W64];

/// An input that passed verification, ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCiphertext {
    values: Vec<EncryptedValue>,
    ciphertexts: Vec<ThresholdCiphertext>,
}

impl VerifiedCiphertext {
    pub fn values(&self) -> &[EncryptedValue] {
        &self.values
    }

    /// Split a verified [`BID_LAYOUT`] input into quantity and price.
    pub fn into_bid(self) -> Result<VerifiedBid, ProofError> {
        let mut parts = self.values.into_iter().zip(self.ciphertexts);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(quantity), Some(price), None) => Ok(VerifiedBid { quantity, price }),
            _ => Err(ProofError::Malformed("a bid carries exactly two values".into())),
        }
    }
}

/// A verified bid: typed handles with the ciphertexts they name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedBid {
    pub quantity: (EncryptedValue, ThresholdCiphertext),
    pub price: (EncryptedValue, ThresholdCiphertext),
}

/// Verifies input proofs against the attestor keys of each encryption
/// context. Only the newest context accepts inputs.
#[derive(Debug, Clone)]
pub struct InputVerifier {
    contexts: BTreeMap<u64, G2Point>,
    current_epoch: u64,
}

impl InputVerifier {
    /// Create a verifier whose epoch 0 is signed by `attestor_public_key`.
    pub fn new(attestor_public_key: G2Point) -> Self {
        let mut contexts = BTreeMap::new();
        contexts.insert(0, attestor_public_key);
        Self {
            contexts,
            current_epoch: 0,
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    pub fn current_public_key(&self) -> Option<&G2Point> {
        self.contexts.get(&self.current_epoch)
    }

    /// Open a new encryption context. Proofs from older epochs become stale.
    pub fn rotate_context(&mut self, attestor_public_key: G2Point) -> u64 {
        self.current_epoch += 1;
        self.contexts.insert(self.current_epoch, attestor_public_key);
        info!(epoch = self.current_epoch, "Rotated encryption context");
        self.current_epoch
    }

    /// Check that `bundle` is well formed, matches `layout`, and is attested
    /// for exactly `expected_bidder` on `expected_contract`.
    pub fn verify(
        &self,
        bundle: &CiphertextBundle,
        proof_blob: &[u8],
        layout: &[BitWidth],
        expected_bidder: &Address,
        expected_contract: &Address,
    ) -> Result<VerifiedCiphertext, ProofError> {
        let result =
            self.verify_inner(bundle, proof_blob, layout, expected_bidder, expected_contract);
        if let Err(err) = &result {
            warn!(
                bidder = hex::encode(expected_bidder),
                contract = hex::encode(expected_contract),
                error = %err,
                "Rejected encrypted input"
            );
        }
        result
    }

    fn verify_inner(
        &self,
        bundle: &CiphertextBundle,
        proof_blob: &[u8],
        layout: &[BitWidth],
        expected_bidder: &Address,
        expected_contract: &Address,
    ) -> Result<VerifiedCiphertext, ProofError> {
        let proof = InputProof::from_bytes(proof_blob)
            .ok_or_else(|| ProofError::Malformed("undecodable input proof".into()))?;

        check_layout(bundle, layout)?;

        let public_key = match self.contexts.get(&proof.epoch) {
            Some(_) if proof.epoch < self.current_epoch => {
                return Err(ProofError::Stale {
                    epoch: proof.epoch,
                    current: self.current_epoch,
                })
            }
            Some(pk) => pk,
            None => {
                return Err(ProofError::Malformed(format!(
                    "unknown encryption context {}",
                    proof.epoch
                )))
            }
        };

        if &proof.contract != expected_contract || &proof.bidder != expected_bidder {
            return Err(ProofError::BindingMismatch);
        }

        match verify_attestation(&proof, &bundle.values, public_key) {
            Ok(()) => {}
            Err(CryptoError::InvalidG1Point) => {
                return Err(ProofError::Malformed("invalid attestation signature encoding".into()))
            }
            Err(_) => return Err(ProofError::BindingMismatch),
        }

        Ok(VerifiedCiphertext {
            values: bundle.values.clone(),
            ciphertexts: bundle.ciphertexts.clone(),
        })
    }
}

fn check_layout(bundle: &CiphertextBundle, layout: &[BitWidth]) -> Result<(), ProofError> {
    if bundle.values.len() != layout.len() || bundle.ciphertexts.len() != layout.len() {
        return Err(ProofError::Malformed(format!(
            "expected {} values, got {} handles and {} ciphertexts",
            layout.len(),
            bundle.values.len(),
            bundle.ciphertexts.len()
        )));
    }

    for (i, ((value, ciphertext), width)) in bundle
        .values
        .iter()
        .zip(&bundle.ciphertexts)
        .zip(layout)
        .enumerate()
    {
        if value.width() != *width {
            return Err(ProofError::Malformed(format!(
                "value {} has width {}, expected {}",
                i,
                value.width().bits(),
                width.bits()
            )));
        }
        if compute_ciphertext_handle(*width, ciphertext) != *value.handle() {
            return Err(ProofError::Malformed(format!(
                "handle {} does not match its ciphertext",
                i
            )));
        }
        if decompress_g2(&ciphertext.ephemeral_pubkey.0).is_err() {
            return Err(ProofError::Malformed(format!(
                "ciphertext {} has an invalid ephemeral key",
                i
            )));
        }
    }

    Ok(())
}
