//! Error types for cryptographic operations.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid G1 point encoding")]
    InvalidG1Point,

    #[error("Invalid G2 point encoding")]
    InvalidG2Point,

    #[error("Invalid scalar encoding")]
    InvalidScalar,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid plaintext encoding")]
    InvalidPlaintext,

    #[error("Value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: u64, bits: u32 },

    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    #[error("DLEQ proof verification failed")]
    DleqVerificationFailed,

    #[error("Insufficient threshold shares: need {required}, got {got}")]
    InsufficientShares { required: usize, got: usize },

    #[error("Invalid threshold parameters: {threshold}-of-{total}")]
    InvalidThreshold { threshold: u32, total: u32 },

    #[error("Duplicate share index")]
    DuplicateShareIndex,

    #[error("Lagrange interpolation failed")]
    LagrangeInterpolationFailed,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}
