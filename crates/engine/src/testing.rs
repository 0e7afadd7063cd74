//! Shared fixtures for unit tests: a real committee, a real attestor and an
//! oracle that decrypts with them.

use rand::rngs::OsRng;

use spa_crypto::{
    aggregate_partial_signatures, decrypt_value, deal_committee_keys, encrypt_value,
    generate_partial_signature, AttestorKey, CommitteeKeys, IbeParams,
};
use spa_types::{
    ciphertext_binding, compute_auction_identity, compute_ciphertext_handle, Address,
    AuctionConfig, AuctionParams, BitWidth, CiphertextBundle, EncryptedValue, G1Point,
};

use crate::error::OracleError;
use crate::oracle::{DecryptionOracle, RevealRequest, RevealedValues};
use crate::verifier::InputVerifier;

pub(crate) const OWNER: Address = [0xA0; 32];
pub(crate) const BENEFICIARY: Address = [0xBE; 32];
pub(crate) const TOKEN_FOR_SALE: Address = [0x70; 32];
pub(crate) const PAYMENT_TOKEN: Address = [0x9A; 32];

pub(crate) fn test_config() -> AuctionConfig {
    AuctionConfig {
        min_duration: 1_000,
        max_duration: 5_000,
        allow_bid_modification: true,
        max_modifications: 2,
        extension_time: 300,
        extension_threshold: 60,
        required_deposit: 100,
        min_bid_value: 1,
    }
}

pub(crate) fn test_params() -> AuctionParams {
    let config = test_config();
    AuctionParams {
        token_for_sale: TOKEN_FOR_SALE,
        payment_token: PAYMENT_TOKEN,
        beneficiary: BENEFICIARY,
        total_tokens_offered: 80,
        min_duration: config.min_duration,
        max_duration: config.max_duration,
        min_participants: 2,
        config,
    }
}

pub(crate) struct Fixture {
    pub attestor: AttestorKey,
    pub committee: CommitteeKeys,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            attestor: AttestorKey::generate(&mut OsRng),
            committee: deal_committee_keys(2, 3, &mut OsRng).unwrap(),
        }
    }

    pub fn verifier(&self) -> InputVerifier {
        InputVerifier::new(self.attestor.public_key())
    }

    /// Encrypt `(quantity, price)` for `bidder` and attest it under epoch 0.
    pub fn bid_input(
        &self,
        contract: &Address,
        bidder: &Address,
        quantity: u64,
        price: u64,
    ) -> (CiphertextBundle, Vec<u8>) {
        let params = IbeParams::from_g2_point(&self.committee.master_public_key.mpk).unwrap();
        let identity = compute_auction_identity(contract);
        let binding = ciphertext_binding(contract, bidder);

        let mut bundle = CiphertextBundle {
            values: Vec::new(),
            ciphertexts: Vec::new(),
        };
        for value in [quantity, price] {
            let ct = encrypt_value(&params, &identity, BitWidth::W64, value, &binding, &mut OsRng)
                .unwrap();
            bundle
                .values
                .push(EncryptedValue::U64(compute_ciphertext_handle(BitWidth::W64, &ct)));
            bundle.ciphertexts.push(ct);
        }

        let proof = self
            .attestor
            .attest(*contract, *bidder, 0, &bundle.values)
            .to_bytes()
            .unwrap();
        (bundle, proof)
    }

    /// Attest an existing bundle on behalf of `bidder`.
    pub fn attest_bundle(
        &self,
        contract: &Address,
        bidder: &Address,
        bundle: &CiphertextBundle,
    ) -> Vec<u8> {
        self.attestor
            .attest(*contract, *bidder, 0, &bundle.values)
            .to_bytes()
            .unwrap()
    }

    /// A bundle that passes every input check but does not open for
    /// `bidder`: sealed to `sealed_for` at `sealed_width`, declared as two
    /// 64-bit handles and attested for `bidder`.
    pub fn undecryptable_input(
        &self,
        contract: &Address,
        bidder: &Address,
        sealed_for: &Address,
        sealed_width: BitWidth,
    ) -> (CiphertextBundle, Vec<u8>) {
        let params = IbeParams::from_g2_point(&self.committee.master_public_key.mpk).unwrap();
        let identity = compute_auction_identity(contract);
        let binding = ciphertext_binding(contract, sealed_for);

        let mut bundle = CiphertextBundle {
            values: Vec::new(),
            ciphertexts: Vec::new(),
        };
        for value in [10, 10] {
            let ct = encrypt_value(&params, &identity, sealed_width, value, &binding, &mut OsRng)
                .unwrap();
            bundle
                .values
                .push(EncryptedValue::U64(compute_ciphertext_handle(BitWidth::W64, &ct)));
            bundle.ciphertexts.push(ct);
        }
        let proof = self.attest_bundle(contract, bidder, &bundle);
        (bundle, proof)
    }

    pub fn oracle(&self) -> CommitteeOracle<'_> {
        CommitteeOracle {
            keys: &self.committee,
        }
    }
}

/// Decrypts with the first `threshold` committee shares.
pub(crate) struct CommitteeOracle<'a> {
    keys: &'a CommitteeKeys,
}

impl DecryptionOracle for CommitteeOracle<'_> {
    fn reveal(&self, request: &RevealRequest) -> Result<RevealedValues, OracleError> {
        let threshold = self.keys.master_public_key.threshold as usize;
        let partials: Vec<(u32, G1Point)> = self
            .keys
            .shares
            .iter()
            .take(threshold)
            .map(|share| {
                let p = generate_partial_signature(share, &request.identity, &mut OsRng).unwrap();
                (p.validator_index, p.partial_sig)
            })
            .collect();
        let key = aggregate_partial_signatures(&partials, threshold).unwrap();

        let mut revealed = RevealedValues::default();
        for item in &request.items {
            match decrypt_value(&item.ciphertext, &key, &item.binding) {
                Ok((width, value)) if width == item.width => {
                    revealed.values.insert(item.handle, value);
                }
                _ => {
                    revealed.undecryptable.insert(item.handle);
                }
            }
        }
        Ok(revealed)
    }
}

/// Always unavailable.
pub(crate) struct OfflineOracle;

impl DecryptionOracle for OfflineOracle {
    fn reveal(&self, _request: &RevealRequest) -> Result<RevealedValues, OracleError> {
        Err(OracleError::Unavailable("committee offline".into()))
    }
}
