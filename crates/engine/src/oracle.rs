//! Boundary to the external decryption oracle.
//!
//! At close the engine asks the oracle to reveal every active bid's
//! ciphertexts. The oracle may be slow, offline or wrong; the engine only
//! trusts a response that answers every requested handle, either with an
//! in-range value or with a verdict that the ciphertext cannot be opened.
//!
//! An unreachable committee is an error and the close is retried. A
//! ciphertext that fails to open under a valid key never will, so it is a
//! verdict on that bid rather than a failure of the oracle.

use std::collections::{BTreeMap, BTreeSet};

use spa_types::{Address, BitWidth, CiphertextHandle, ThresholdCiphertext};

use crate::error::OracleError;

/// One ciphertext to reveal.
#[derive(Clone, Debug)]
pub struct RevealItem {
    pub handle: CiphertextHandle,
    pub width: BitWidth,
    pub ciphertext: ThresholdCiphertext,
    /// AEAD associated data the ciphertext was sealed with
    pub binding: [u8; 64],
}

/// Everything the oracle needs to open an auction's bids.
#[derive(Clone, Debug)]
pub struct RevealRequest {
    pub auction_id: u64,
    pub contract: Address,
    /// IBE identity the bids were encrypted to
    pub identity: [u8; 32],
    pub items: Vec<RevealItem>,
}

/// Plaintexts keyed by handle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealedValues {
    pub values: BTreeMap<CiphertextHandle, u64>,
    /// Handles whose ciphertext does not open under the auction key, or
    /// opens to a different width than its handle declares
    pub undecryptable: BTreeSet<CiphertextHandle>,
}

impl RevealedValues {
    pub fn get(&self, handle: &CiphertextHandle) -> Option<u64> {
        self.values.get(handle).copied()
    }

    pub fn is_undecryptable(&self, handle: &CiphertextHandle) -> bool {
        self.undecryptable.contains(handle)
    }

    /// Number of handles answered either way.
    pub fn answered(&self) -> usize {
        self.values.len() + self.undecryptable.len()
    }
}

/// Reveals plaintexts after an auction closes.
pub trait DecryptionOracle {
    fn reveal(&self, request: &RevealRequest) -> Result<RevealedValues, OracleError>;
}

/// Reject a response that leaves a handle unanswered or overflows a
/// declared width.
pub(crate) fn check_response(
    request: &RevealRequest,
    revealed: &RevealedValues,
) -> Result<(), OracleError> {
    let mut present = 0;
    let mut out_of_range = false;
    for item in &request.items {
        if let Some(value) = revealed.get(&item.handle) {
            present += 1;
            if value > item.width.max_value() {
                out_of_range = true;
            }
        } else if revealed.is_undecryptable(&item.handle) {
            present += 1;
        }
    }

    if present != request.items.len() {
        return Err(OracleError::Incomplete {
            revealed: present,
            requested: request.items.len(),
        });
    }
    if out_of_range {
        return Err(OracleError::ValueOutOfRange);
    }
    Ok(())
}
