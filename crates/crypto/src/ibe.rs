//! Identity-based encryption of bid values using BLS12-381 pairings.
//!
//! A Boneh-Franklin style scheme where the decryption key for an identity is
//! the committee's threshold signature on it.
//!
//! # Encryption
//!
//! To encrypt an integer `v` of width `w` to identity `id`:
//! 1. Compute Q = H_1(id) ∈ G1
//! 2. Sample random scalar r, set U = r·G2
//! 3. Compute shared = e(r·Q, MPK)
//! 4. Derive an AES-256 key from shared with HKDF
//! 5. Seal `tag(w) || le(v)` with AES-GCM, associated data = binding
//!
//! # Decryption
//!
//! Given σ = s·H_1(id), shared = e(σ, U) and the same key falls out.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

use spa_types::{BitWidth, G1Point, G2Point, ThresholdCiphertext};

use crate::error::CryptoError;

/// Domain separation tag for auction identities.
pub(crate) const IDENTITY_DST: &[u8] = b"SPA_IBE_IDENTITY_G1_V1";

/// Encoded plaintext length: width tag plus a little-endian u64.
const PLAINTEXT_LEN: usize = 9;

/// Parameters for IBE encryption.
pub struct IbeParams {
    /// Master public key (MPK = s·G2 where s is the committee secret)
    pub mpk: G2Affine,
}

impl IbeParams {
    /// Create IBE params from a serialized master public key.
    pub fn from_g2_point(point: &G2Point) -> Result<Self, CryptoError> {
        Ok(Self {
            mpk: decompress_g2(&point.0)?,
        })
    }
}

/// Encrypt one integer of the given width to an identity.
///
/// `binding` is authenticated but not encrypted; decryption must present the
/// same bytes.
pub fn encrypt_value<R: RngCore + CryptoRng>(
    params: &IbeParams,
    identity: &[u8],
    width: BitWidth,
    value: u64,
    binding: &[u8],
    rng: &mut R,
) -> Result<ThresholdCiphertext, CryptoError> {
    if value > width.max_value() {
        return Err(CryptoError::ValueOutOfRange {
            value,
            bits: width.bits(),
        });
    }

    let mut plaintext = [0u8; PLAINTEXT_LEN];
    plaintext[0] = width.tag();
    plaintext[1..].copy_from_slice(&value.to_le_bytes());

    seal(params, identity, &plaintext, binding, rng)
}

/// Decrypt a bid value with the identity's decryption key.
///
/// Returns the width recorded inside the ciphertext with the value.
pub fn decrypt_value(
    ciphertext: &ThresholdCiphertext,
    decryption_key: &G1Point,
    binding: &[u8],
) -> Result<(BitWidth, u64), CryptoError> {
    let plaintext = open(ciphertext, decryption_key, binding)?;
    if plaintext.len() != PLAINTEXT_LEN {
        return Err(CryptoError::InvalidPlaintext);
    }

    let width = BitWidth::from_tag(plaintext[0]).ok_or(CryptoError::InvalidPlaintext)?;
    let mut le = [0u8; 8];
    le.copy_from_slice(&plaintext[1..]);
    let value = u64::from_le_bytes(le);

    if value > width.max_value() {
        return Err(CryptoError::ValueOutOfRange {
            value,
            bits: width.bits(),
        });
    }

    Ok((width, value))
}

fn seal<R: RngCore + CryptoRng>(
    params: &IbeParams,
    identity: &[u8],
    plaintext: &[u8],
    binding: &[u8],
    rng: &mut R,
) -> Result<ThresholdCiphertext, CryptoError> {
    let id_point = hash_to_g1(IDENTITY_DST, identity);
    let r = random_scalar(rng);

    let u = (G2Projective::generator() * r).to_affine();

    // e(r·Q, MPK) = e(Q, MPK)^r
    let r_id = (G1Projective::from(id_point) * r).to_affine();
    let key = derive_key(&pairing(&r_id, &params.mpk))?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(format!("cipher init: {}", e)))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: binding,
            },
        )
        .map_err(|e| CryptoError::EncryptionFailed(format!("AES-GCM: {}", e)))?;

    let tag_start = sealed.len() - 16;
    let mut tag = [0u8; 16];
    tag.copy_from_slice(&sealed[tag_start..]);

    Ok(ThresholdCiphertext {
        ephemeral_pubkey: compress_g2(&u),
        ciphertext: sealed[..tag_start].to_vec(),
        tag,
        nonce: nonce_bytes,
    })
}

fn open(
    ciphertext: &ThresholdCiphertext,
    decryption_key: &G1Point,
    binding: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let sigma = decompress_g1(&decryption_key.0)?;
    let u = decompress_g2(&ciphertext.ephemeral_pubkey.0)?;

    // e(s·Q, r·G2) = e(Q, s·G2)^r
    let key = derive_key(&pairing(&sigma, &u))?;

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::KeyDerivationFailed)?;

    let mut sealed = ciphertext.ciphertext.clone();
    sealed.extend_from_slice(&ciphertext.tag);

    cipher
        .decrypt(
            Nonce::from_slice(&ciphertext.nonce),
            Payload {
                msg: &sealed,
                aad: binding,
            },
        )
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Hash arbitrary data to a G1 point under a domain separation tag.
///
/// Try-and-increment over a scalar multiple of the generator.
pub fn hash_to_g1(dst: &[u8], data: &[u8]) -> G1Affine {
    let mut counter = 0u64;
    loop {
        let mut hasher = Sha256::new();
        hasher.update(dst);
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        hasher.update(counter.to_le_bytes());
        let digest: [u8; 32] = hasher.finalize().into();

        let scalar: Option<Scalar> = Scalar::from_bytes(&digest).into();
        if let Some(scalar) = scalar {
            return (G1Projective::generator() * scalar).to_affine();
        }
        counter += 1;
    }
}

/// Sample a uniformly random scalar.
pub(crate) fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_wide(&bytes)
}

/// Derive an AES-256 key from a GT element.
fn derive_key(gt: &bls12_381::Gt) -> Result<[u8; 32], CryptoError> {
    // Gt has no canonical byte encoding in this crate; its debug form is stable.
    let gt_digest = Sha256::digest(format!("{:?}", gt).as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(b"SPA_IBE_V1"), &gt_digest);
    let mut key = [0u8; 32];
    hk.expand(b"bid-value-key", &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(key)
}

/// Compress a G1 point to bytes.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point from bytes.
pub fn decompress_g1(bytes: &[u8; 48]) -> Result<G1Affine, CryptoError> {
    Option::from(G1Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG1Point)
}

/// Compress a G2 point to bytes.
pub fn compress_g2(point: &G2Affine) -> G2Point {
    G2Point(point.to_compressed())
}

/// Decompress a G2 point from bytes.
pub fn decompress_g2(bytes: &[u8; 96]) -> Result<G2Affine, CryptoError> {
    Option::from(G2Affine::from_compressed(bytes)).ok_or(CryptoError::InvalidG2Point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn setup() -> (Scalar, IbeParams) {
        let secret = random_scalar(&mut OsRng);
        let mpk = (G2Projective::generator() * secret).to_affine();
        (secret, IbeParams { mpk })
    }

    fn key_for(secret: &Scalar, identity: &[u8]) -> G1Point {
        let q = hash_to_g1(IDENTITY_DST, identity);
        compress_g1(&(G1Projective::from(q) * secret).to_affine())
    }

    #[test]
    fn test_hash_to_g1_is_deterministic_and_separated() {
        let a = hash_to_g1(IDENTITY_DST, b"auction-1");
        assert_eq!(a, hash_to_g1(IDENTITY_DST, b"auction-1"));
        assert_ne!(a, hash_to_g1(IDENTITY_DST, b"auction-2"));
        assert_ne!(a, hash_to_g1(b"OTHER_DST", b"auction-1"));
    }

    #[test]
    fn test_encrypt_decrypt_value() {
        let (secret, params) = setup();
        let identity = b"auction identity";
        let binding = [7u8; 64];

        let ct = encrypt_value(&params, identity, BitWidth::W64, 1_000_000, &binding, &mut OsRng)
            .unwrap();
        let (width, value) = decrypt_value(&ct, &key_for(&secret, identity), &binding).unwrap();

        assert_eq!(width, BitWidth::W64);
        assert_eq!(value, 1_000_000);
    }

    #[test]
    fn test_wrong_binding_fails() {
        let (secret, params) = setup();
        let identity = b"auction identity";

        let ct =
            encrypt_value(&params, identity, BitWidth::W64, 42, &[1u8; 64], &mut OsRng).unwrap();
        let result = decrypt_value(&ct, &key_for(&secret, identity), &[2u8; 64]);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_wrong_identity_key_fails() {
        let (secret, params) = setup();
        let ct = encrypt_value(&params, b"auction-1", BitWidth::W32, 5, &[], &mut OsRng).unwrap();
        let result = decrypt_value(&ct, &key_for(&secret, b"auction-2"), &[]);
        assert!(result.is_err());
    }

    #[test]
    fn test_value_must_fit_width() {
        let (_, params) = setup();
        let result = encrypt_value(&params, b"id", BitWidth::W8, 256, &[], &mut OsRng);
        assert!(matches!(
            result,
            Err(CryptoError::ValueOutOfRange {
                value: 256,
                bits: 8,
            })
        ));
    }
}
