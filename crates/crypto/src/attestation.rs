//! Input attestations binding encrypted bid values to a bidder and contract.
//!
//! The attestor checks an encryption client's submission and signs
//! `input_proof_digest(contract, bidder, epoch, handles)` with a BLS key:
//!
//!   signature = sk · H(digest) ∈ G1,  public key = sk · G2
//!
//! and anyone verifies e(signature, G2) = e(H(digest), pk).

use bls12_381::{pairing, G1Projective, G2Affine, G2Projective, Scalar};
use group::Curve;
use rand::{CryptoRng, RngCore};

use spa_types::{input_proof_digest, Address, EncryptedValue, G2Point, InputProof};

use crate::error::CryptoError;
use crate::ibe::{compress_g1, compress_g2, decompress_g1, decompress_g2, hash_to_g1, random_scalar};

const ATTESTATION_DST: &[u8] = b"SPA_INPUT_ATTESTATION_G1_V1";

/// Signing key of one encryption context.
#[derive(Clone)]
pub struct AttestorKey {
    secret: Scalar,
}

impl std::fmt::Debug for AttestorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestorKey")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl AttestorKey {
    /// Generate a fresh key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            secret: random_scalar(rng),
        }
    }

    /// Load a key from its canonical 32-byte encoding.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret: Option<Scalar> = Scalar::from_bytes(bytes).into();
        secret
            .map(|secret| Self { secret })
            .ok_or(CryptoError::InvalidScalar)
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    pub fn public_key(&self) -> G2Point {
        compress_g2(&(G2Projective::generator() * self.secret).to_affine())
    }

    /// Sign the handles of one bid for `(contract, bidder)` under `epoch`.
    pub fn attest(
        &self,
        contract: Address,
        bidder: Address,
        epoch: u64,
        values: &[EncryptedValue],
    ) -> InputProof {
        let digest = input_proof_digest(&contract, &bidder, epoch, values);
        let h = hash_to_g1(ATTESTATION_DST, &digest);
        let signature = compress_g1(&(G1Projective::from(h) * self.secret).to_affine());

        InputProof {
            contract,
            bidder,
            epoch,
            signature,
        }
    }
}

/// Verify that `proof` signs exactly `values` for the contract, bidder and
/// epoch it names.
pub fn verify_attestation(
    proof: &InputProof,
    values: &[EncryptedValue],
    public_key: &G2Point,
) -> Result<(), CryptoError> {
    let signature = decompress_g1(&proof.signature.0)?;
    let pk = decompress_g2(&public_key.0)?;

    let digest = input_proof_digest(&proof.contract, &proof.bidder, proof.epoch, values);
    let h = hash_to_g1(ATTESTATION_DST, &digest);

    if pairing(&signature, &G2Affine::generator()) == pairing(&h, &pk) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}
