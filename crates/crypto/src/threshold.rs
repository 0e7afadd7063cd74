//! Threshold key shares for releasing auction decryption keys.
//!
//! In a (t, n) committee:
//! - member i holds sk_i = f(i) for a degree t-1 polynomial f with f(0) = s
//! - the master public key is MPK = s·G2
//! - member i publishes pk_i = sk_i·G1 so partial shares can be checked
//!
//! # Partial share
//!
//! For identity `id`, member i releases σ_i = sk_i · H(id) and a
//! Chaum-Pedersen proof that log_G1(pk_i) = log_H(id)(σ_i).
//!
//! # Aggregation
//!
//! Any t shares give σ = Σ λ_i · σ_i = s · H(id), with λ_i the Lagrange
//! coefficients at zero.

use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use spa_types::{DiscreteLogProof, G1Point, G2Point, MasterPublicKey, PartialDecryptionShare};

use crate::error::CryptoError;
use crate::ibe::{
    compress_g1, compress_g2, decompress_g1, decompress_g2, hash_to_g1, random_scalar, IDENTITY_DST,
};

/// One committee member's secret share.
#[derive(Clone, Debug)]
pub struct SecretKeyShare {
    /// 1-based evaluation point
    pub index: u32,
    pub secret: Scalar,
    /// sk_i·G1, used to verify this member's partial shares
    pub public_key: G1Point,
}

/// Output of a trusted-dealer key setup.
#[derive(Clone, Debug)]
pub struct CommitteeKeys {
    pub master_public_key: MasterPublicKey,
    pub shares: Vec<SecretKeyShare>,
}

/// Split a fresh committee secret into `total` shares, any `threshold` of
/// which reconstruct decryption keys.
pub fn deal_committee_keys<R: RngCore + CryptoRng>(
    threshold: u32,
    total: u32,
    rng: &mut R,
) -> Result<CommitteeKeys, CryptoError> {
    if threshold == 0 || threshold > total {
        return Err(CryptoError::InvalidThreshold { threshold, total });
    }

    let coefficients: Vec<Scalar> = (0..threshold).map(|_| random_scalar(rng)).collect();

    let shares = (1..=total)
        .map(|index| {
            let secret = evaluate_polynomial(&coefficients, &Scalar::from(index as u64));
            let public_key = compress_g1(&(G1Projective::generator() * secret).to_affine());
            SecretKeyShare {
                index,
                secret,
                public_key,
            }
        })
        .collect();

    let mpk = (G2Projective::generator() * coefficients[0]).to_affine();

    Ok(CommitteeKeys {
        master_public_key: MasterPublicKey {
            mpk: compress_g2(&mpk),
            threshold,
            total_validators: total,
        },
        shares,
    })
}

/// f(x) by Horner's rule.
fn evaluate_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    coefficients
        .iter()
        .rev()
        .fold(Scalar::ZERO, |acc, coeff| acc * x + coeff)
}

/// Produce a member's partial decryption share for an identity.
pub fn generate_partial_signature<R: RngCore + CryptoRng>(
    share: &SecretKeyShare,
    identity: &[u8],
    rng: &mut R,
) -> Result<PartialDecryptionShare, CryptoError> {
    let h = hash_to_g1(IDENTITY_DST, identity);
    let pk = decompress_g1(&share.public_key.0)?;
    let sigma_i = (G1Projective::from(h) * share.secret).to_affine();

    let proof = prove_dleq(&share.secret, &h, &pk, &sigma_i, rng);

    Ok(PartialDecryptionShare {
        validator_index: share.index,
        partial_sig: compress_g1(&sigma_i),
        proof,
    })
}

/// Check a partial share against the member's public key.
pub fn verify_partial_signature(
    share: &PartialDecryptionShare,
    identity: &[u8],
    public_key: &G1Point,
) -> Result<(), CryptoError> {
    let pk = decompress_g1(&public_key.0)?;
    let sigma_i = decompress_g1(&share.partial_sig.0)?;
    let h = hash_to_g1(IDENTITY_DST, identity);

    verify_dleq(&share.proof, &h, &pk, &sigma_i)
}

/// Interpolate `threshold` partial shares into the identity's decryption key.
pub fn aggregate_partial_signatures(
    shares: &[(u32, G1Point)],
    threshold: usize,
) -> Result<G1Point, CryptoError> {
    if shares.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: shares.len(),
        });
    }

    let unique: HashSet<u32> = shares.iter().map(|(idx, _)| *idx).collect();
    if unique.len() != shares.len() {
        return Err(CryptoError::DuplicateShareIndex);
    }

    let indices: Vec<u32> = shares.iter().map(|(idx, _)| *idx).collect();
    let mut sigma = G1Projective::identity();
    for (idx, point) in shares {
        let lambda = lagrange_at_zero(*idx, &indices)?;
        sigma += G1Projective::from(decompress_g1(&point.0)?) * lambda;
    }

    Ok(compress_g1(&sigma.to_affine()))
}

/// Check that `key` is s·H(identity) for the committee behind `mpk`.
pub fn verify_decryption_key(
    key: &G1Point,
    identity: &[u8],
    mpk: &G2Point,
) -> Result<(), CryptoError> {
    let sigma = decompress_g1(&key.0)?;
    let mpk = decompress_g2(&mpk.0)?;
    let h = hash_to_g1(IDENTITY_DST, identity);

    if pairing(&sigma, &G2Affine::generator()) == pairing(&h, &mpk) {
        Ok(())
    } else {
        Err(CryptoError::SignatureVerificationFailed)
    }
}

/// λ_i = Π_{j≠i} x_j / (x_j − x_i)
fn lagrange_at_zero(i: u32, indices: &[u32]) -> Result<Scalar, CryptoError> {
    let x_i = Scalar::from(i as u64);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for &j in indices.iter().filter(|&&j| j != i) {
        let x_j = Scalar::from(j as u64);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    let inverse: Option<Scalar> = denominator.invert().into();
    inverse
        .map(|inv| numerator * inv)
        .ok_or(CryptoError::LagrangeInterpolationFailed)
}

fn dleq_challenge(
    h: &G1Affine,
    pk: &G1Affine,
    sigma: &G1Affine,
    r1: &G1Affine,
    r2: &G1Affine,
) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update(b"SPA_DLEQ_V1");
    for point in [&G1Affine::generator(), h, pk, sigma, r1, r2] {
        hasher.update(point.to_compressed());
    }
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_wide(&wide)
}

fn prove_dleq<R: RngCore + CryptoRng>(
    secret: &Scalar,
    h: &G1Affine,
    pk: &G1Affine,
    sigma: &G1Affine,
    rng: &mut R,
) -> DiscreteLogProof {
    let k = random_scalar(rng);
    let r1 = (G1Projective::generator() * k).to_affine();
    let r2 = (G1Projective::from(*h) * k).to_affine();

    let c = dleq_challenge(h, pk, sigma, &r1, &r2);
    let s = k - c * secret;

    DiscreteLogProof {
        challenge: spa_types::Scalar(c.to_bytes()),
        response: spa_types::Scalar(s.to_bytes()),
    }
}

fn verify_dleq(
    proof: &DiscreteLogProof,
    h: &G1Affine,
    pk: &G1Affine,
    sigma: &G1Affine,
) -> Result<(), CryptoError> {
    let c: Option<Scalar> = Scalar::from_bytes(&proof.challenge.0).into();
    let s: Option<Scalar> = Scalar::from_bytes(&proof.response.0).into();
    let (c, s) = match (c, s) {
        (Some(c), Some(s)) => (c, s),
        _ => return Err(CryptoError::InvalidScalar),
    };

    // g^s·pk^c = g^k and h^s·σ^c = h^k for an honest prover
    let r1 = (G1Projective::generator() * s + G1Projective::from(*pk) * c).to_affine();
    let r2 = (G1Projective::from(*h) * s + G1Projective::from(*sigma) * c).to_affine();

    if dleq_challenge(h, pk, sigma, &r1, &r2) == c {
        Ok(())
    } else {
        Err(CryptoError::DleqVerificationFailed)
    }
}
