//! Genesis configuration for the auction engine.
//!
//! Defines the engine's initial administrator, the decryption committee
//! shape and the default parameters handed to new auctions.

use serde::{Deserialize, Serialize};

use spa_types::{Address, Amount, AuctionConfig, AuctionParams, Duration};

/// Genesis configuration for the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineGenesisConfig {
    /// Account allowed to rotate encryption contexts
    #[serde(with = "hex_address")]
    pub admin: Address,

    /// Clock value at genesis (unix seconds)
    pub initial_timestamp: u64,

    /// Threshold for decryption (t-of-n)
    pub threshold: ThresholdConfig,

    /// Default auction parameters
    pub default_params: DefaultAuctionParams,
}

/// Threshold configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum number of shares required (threshold)
    pub t: u32,
    /// Total number of committee members
    pub n: u32,
}

/// Default parameters for new auctions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAuctionParams {
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub allow_bid_modification: bool,
    pub max_modifications: u32,
    pub extension_time: Duration,
    pub extension_threshold: Duration,
    pub required_deposit: Amount,
    pub min_bid_value: u64,
    pub total_tokens_offered: u64,
    pub min_participants: u32,
}

/// Base period of the reference deployment, in seconds.
const PERIOD: Duration = 3660;

impl Default for DefaultAuctionParams {
    fn default() -> Self {
        Self {
            min_duration: PERIOD,
            max_duration: PERIOD * 24 * 7,
            allow_bid_modification: true,
            max_modifications: 2,
            extension_time: PERIOD * 24,
            extension_threshold: PERIOD,
            required_deposit: 1_000_000_000_000_000,
            min_bid_value: 1_000_000_000_000_000,
            total_tokens_offered: 1_000_000,
            min_participants: 10,
        }
    }
}

impl DefaultAuctionParams {
    /// Build construction parameters for an auction of these defaults.
    pub fn to_params(
        &self,
        token_for_sale: Address,
        payment_token: Address,
        beneficiary: Address,
    ) -> AuctionParams {
        AuctionParams {
            token_for_sale,
            payment_token,
            beneficiary,
            total_tokens_offered: self.total_tokens_offered,
            min_duration: self.min_duration,
            max_duration: self.max_duration,
            min_participants: self.min_participants,
            config: AuctionConfig {
                min_duration: self.min_duration,
                max_duration: self.max_duration,
                allow_bid_modification: self.allow_bid_modification,
                max_modifications: self.max_modifications,
                extension_time: self.extension_time,
                extension_threshold: self.extension_threshold,
                required_deposit: self.required_deposit,
                min_bid_value: self.min_bid_value,
            },
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { t: 2, n: 3 }
    }
}

impl Default for EngineGenesisConfig {
    fn default() -> Self {
        Self {
            admin: [0u8; 32],
            initial_timestamp: 0,
            threshold: ThresholdConfig::default(),
            default_params: DefaultAuctionParams::default(),
        }
    }
}

impl EngineGenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.threshold.t == 0 {
            return Err(GenesisValidationError::InvalidThreshold(
                "Threshold cannot be zero".into(),
            ));
        }
        if self.threshold.t > self.threshold.n {
            return Err(GenesisValidationError::InvalidThreshold(
                "Threshold cannot exceed committee size".into(),
            ));
        }

        let params = &self.default_params;
        if params.min_duration == 0 {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Minimum duration cannot be zero".into(),
            ));
        }
        if params.min_duration > params.max_duration {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Minimum duration exceeds maximum duration".into(),
            ));
        }
        if params.min_participants == 0 || params.total_tokens_offered == 0 {
            return Err(GenesisValidationError::InvalidDefaultParams(
                "Auctions need at least one participant and one token".into(),
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid threshold configuration: {0}")]
    InvalidThreshold(String),

    #[error("Invalid default parameters: {0}")]
    InvalidDefaultParams(String),
}

mod hex_address {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(addr: &[u8; 32], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(addr))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom("address must be 32 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineGenesisConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_threshold_zero() {
        let mut config = EngineGenesisConfig::default();
        config.threshold.t = 0;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_invalid_threshold_exceeds_n() {
        let mut config = EngineGenesisConfig::default();
        config.threshold.t = 5;
        config.threshold.n = 3;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_inverted_durations_rejected() {
        let mut config = EngineGenesisConfig::default();
        config.default_params.min_duration = config.default_params.max_duration + 1;
        assert!(matches!(
            config.validate(),
            Err(GenesisValidationError::InvalidDefaultParams(_))
        ));
    }

    #[test]
    fn test_defaults_build_consistent_params() {
        let params = DefaultAuctionParams::default().to_params([1; 32], [2; 32], [3; 32]);
        assert_eq!(params.min_duration, params.config.min_duration);
        assert_eq!(params.max_duration, 3660 * 24 * 7);
        assert_eq!(params.config.extension_time, 3660 * 24);
        assert_eq!(params.min_participants, 10);
        assert_eq!(params.config.required_deposit, 1_000_000_000_000_000);
    }

    #[test]
    fn test_json_round_trip_with_hex_admin() {
        let json = format!(
            r#"{{
                "admin": "0x{}",
                "initial_timestamp": 1700000000,
                "threshold": {{ "t": 2, "n": 3 }},
                "default_params": {}
            }}"#,
            "ab".repeat(32),
            serde_json::to_string(&DefaultAuctionParams::default()).unwrap()
        );
        let config: EngineGenesisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.admin, [0xab; 32]);
        assert_eq!(config.initial_timestamp, 1_700_000_000);
        assert!(config.validate().is_ok());
    }
}
