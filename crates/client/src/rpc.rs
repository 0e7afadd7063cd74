//! JSON-RPC interface of the auction node.
//!
//! Binary values travel as hex strings. Ciphertext bundles and input proofs
//! are borsh-encoded before hex encoding; amounts are plain integers.

use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use spa_engine::{Auction, BidReceipt, DefaultAuctionParams, SettlementOutcome};
use spa_types::{
    Address, Amount, AuctionParams, BidRecord, BidStatus, CiphertextBundle, ClearingResult,
    Duration, Transfer, TransferReason,
};

/// Errors decoding RPC payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RpcDecodeError {
    #[error("Invalid hex in {field}: {reason}")]
    InvalidHex { field: &'static str, reason: String },

    #[error("{field} must be {expected} bytes, got {got}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid encoding of {0}")]
    InvalidEncoding(&'static str),
}

fn decode_hex(field: &'static str, s: &str) -> Result<Vec<u8>, RpcDecodeError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| RpcDecodeError::InvalidHex {
        field,
        reason: e.to_string(),
    })
}

/// Parse a 32-byte hex address.
pub fn parse_address(field: &'static str, s: &str) -> Result<Address, RpcDecodeError> {
    let bytes = decode_hex(field, s)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| RpcDecodeError::InvalidLength {
        field,
        expected: 32,
        got,
    })
}

/// Parse hex into a fixed-size array.
pub fn parse_fixed<const N: usize>(
    field: &'static str,
    s: &str,
) -> Result<[u8; N], RpcDecodeError> {
    let bytes = decode_hex(field, s)?;
    let got = bytes.len();
    bytes.try_into().map_err(|_| RpcDecodeError::InvalidLength {
        field,
        expected: N,
        got,
    })
}

pub fn encode_bundle(bundle: &CiphertextBundle) -> String {
    hex::encode(borsh::to_vec(bundle).unwrap_or_default())
}

pub fn decode_bundle(s: &str) -> Result<CiphertextBundle, RpcDecodeError> {
    let bytes = decode_hex("bundle", s)?;
    borsh::from_slice(&bytes).map_err(|_| RpcDecodeError::InvalidEncoding("bundle"))
}

pub fn decode_proof(s: &str) -> Result<Vec<u8>, RpcDecodeError> {
    decode_hex("proof", s)
}

// ============ Request Types ============

/// Parameters for creating an auction. Unset fields take the node defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    pub sender: String,
    pub token_for_sale: String,
    pub payment_token: String,
    pub beneficiary: String,
    pub total_tokens_offered: Option<u64>,
    pub min_participants: Option<u32>,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub allow_bid_modification: Option<bool>,
    pub max_modifications: Option<u32>,
    pub extension_time: Option<Duration>,
    pub extension_threshold: Option<Duration>,
    pub required_deposit: Option<Amount>,
    pub min_bid_value: Option<u64>,
}

impl CreateAuctionParams {
    /// Fill unset fields from `defaults`.
    pub fn to_params(
        &self,
        defaults: &DefaultAuctionParams,
    ) -> Result<AuctionParams, RpcDecodeError> {
        let merged = DefaultAuctionParams {
            min_duration: self.min_duration.unwrap_or(defaults.min_duration),
            max_duration: self.max_duration.unwrap_or(defaults.max_duration),
            allow_bid_modification: self
                .allow_bid_modification
                .unwrap_or(defaults.allow_bid_modification),
            max_modifications: self.max_modifications.unwrap_or(defaults.max_modifications),
            extension_time: self.extension_time.unwrap_or(defaults.extension_time),
            extension_threshold: self
                .extension_threshold
                .unwrap_or(defaults.extension_threshold),
            required_deposit: self.required_deposit.unwrap_or(defaults.required_deposit),
            min_bid_value: self.min_bid_value.unwrap_or(defaults.min_bid_value),
            total_tokens_offered: self
                .total_tokens_offered
                .unwrap_or(defaults.total_tokens_offered),
            min_participants: self.min_participants.unwrap_or(defaults.min_participants),
        };
        Ok(merged.to_params(
            parse_address("token_for_sale", &self.token_for_sale)?,
            parse_address("payment_token", &self.payment_token)?,
            parse_address("beneficiary", &self.beneficiary)?,
        ))
    }
}

/// Request to attest a prepared bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestParams {
    /// Hex-encoded contract address
    pub contract: String,
    pub bidder: String,
    /// Hex-encoded borsh `CiphertextBundle`
    pub bundle: String,
}

/// Parameters for submitting a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitBidParams {
    pub sender: String,
    pub auction_id: u64,
    pub bundle: String,
    /// Hex-encoded input proof
    pub proof: String,
    pub deposit: Amount,
}

/// Parameters for replacing a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifyBidParams {
    pub sender: String,
    pub auction_id: u64,
    pub bundle: String,
    pub proof: String,
    pub top_up: Amount,
}

// ============ Response Types ============

/// Block info response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub timestamp: u64,
}

/// Keys a client needs to prepare a bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionContextRpc {
    /// Hex-encoded G2 point (96 bytes)
    pub mpk: String,
    pub threshold: u32,
    pub total_validators: u32,
    pub epoch: u64,
    pub attestor_public_key: Option<String>,
}

/// Auction summary for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRpc {
    pub auction_id: u64,
    pub owner: String,
    pub contract_address: String,
    pub phase: String,
    pub token_for_sale: String,
    pub payment_token: String,
    pub beneficiary: String,
    pub total_tokens_offered: u64,
    pub min_participants: u32,
    pub required_deposit: Amount,
    pub min_bid_value: u64,
    pub opened_at: Option<u64>,
    pub closes_at: Option<u64>,
    pub hard_deadline: Option<u64>,
    pub active_bids: usize,
    pub escrow_balance: Amount,
    pub clearing_price: Option<u64>,
}

impl From<&Auction> for AuctionRpc {
    fn from(a: &Auction) -> Self {
        Self {
            auction_id: a.auction_id,
            owner: hex::encode(a.owner),
            contract_address: hex::encode(a.contract_address),
            phase: a.phase.as_str().to_string(),
            token_for_sale: hex::encode(a.params.token_for_sale),
            payment_token: hex::encode(a.params.payment_token),
            beneficiary: hex::encode(a.params.beneficiary),
            total_tokens_offered: a.params.total_tokens_offered,
            min_participants: a.params.min_participants,
            required_deposit: a.params.config.required_deposit,
            min_bid_value: a.params.config.min_bid_value,
            opened_at: a.opened_at,
            closes_at: a.closes_at,
            hard_deadline: a.hard_deadline,
            active_bids: a.ledger().count(),
            escrow_balance: a.escrow().balance(),
            clearing_price: a.clearing_price(),
        }
    }
}

/// Encrypted bid for RPC responses. Handles only, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRpc {
    pub bidder: String,
    pub quantity_handle: String,
    pub price_handle: String,
    pub deposit_posted: Amount,
    pub modification_count: u32,
    pub submitted_at: u64,
    pub status: String,
}

impl From<&BidRecord> for BidRpc {
    fn from(b: &BidRecord) -> Self {
        Self {
            bidder: hex::encode(b.bidder),
            quantity_handle: hex::encode(b.encrypted_quantity.handle().0),
            price_handle: hex::encode(b.encrypted_price.handle().0),
            deposit_posted: b.deposit_posted,
            modification_count: b.modification_count,
            submitted_at: b.submitted_at,
            status: match b.status {
                BidStatus::Active => "active",
                BidStatus::Withdrawn => "withdrawn",
                BidStatus::Filled => "filled",
                BidStatus::Unfilled => "unfilled",
            }
            .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidReceiptRpc {
    /// "place" or "modify"
    pub action: String,
    pub modification_count: u32,
    pub deposit_posted: Amount,
    pub closes_at: u64,
    pub extended: bool,
}

impl From<BidReceipt> for BidReceiptRpc {
    fn from(r: BidReceipt) -> Self {
        Self {
            action: format!("{:?}", r.action).to_lowercase(),
            modification_count: r.modification_count,
            deposit_posted: r.deposit_posted,
            closes_at: r.closes_at,
            extended: r.extended,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRpc {
    pub bidder: String,
    pub filled_quantity: u64,
}

/// Clearing result for RPC responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearingResultRpc {
    pub auction_id: u64,
    pub clearing_price: u64,
    pub allocations: Vec<AllocationRpc>,
    pub total_filled: u64,
    pub unallocated: u64,
    pub participants_at_close: u32,
    pub settled_at: u64,
}

impl From<ClearingResult> for ClearingResultRpc {
    fn from(r: ClearingResult) -> Self {
        Self {
            auction_id: r.auction_id,
            clearing_price: r.clearing_price,
            allocations: r
                .allocations
                .into_iter()
                .map(|a| AllocationRpc {
                    bidder: hex::encode(a.bidder),
                    filled_quantity: a.filled_quantity,
                })
                .collect(),
            total_filled: r.total_filled,
            unallocated: r.unallocated,
            participants_at_close: r.participants_at_close,
            settled_at: r.settled_at,
        }
    }
}

/// How a close ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SettlementRpc {
    Settled(ClearingResultRpc),
    Cancelled { participants: u32, required: u32 },
}

impl From<SettlementOutcome> for SettlementRpc {
    fn from(outcome: SettlementOutcome) -> Self {
        match outcome {
            SettlementOutcome::Settled(result) => SettlementRpc::Settled(result.into()),
            SettlementOutcome::Cancelled {
                participants,
                required,
            } => SettlementRpc::Cancelled {
                participants,
                required,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRpc {
    pub bidder: String,
    pub amount: Amount,
}

/// A transfer for the host ledger to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRpc {
    pub auction_id: u64,
    pub token: String,
    pub to: String,
    pub amount: Amount,
    /// "refund", "payment", "allocation" or "unsold_return"
    pub reason: String,
}

impl From<&Transfer> for TransferRpc {
    fn from(t: &Transfer) -> Self {
        Self {
            auction_id: t.auction_id,
            token: hex::encode(t.token),
            to: hex::encode(t.to),
            amount: t.amount,
            reason: match t.reason {
                TransferReason::Refund => "refund",
                TransferReason::Payment => "payment",
                TransferReason::Allocation => "allocation",
                TransferReason::UnsoldReturn => "unsold_return",
            }
            .to_string(),
        }
    }
}

/// RPC API of the auction node.
#[rpc(server, client)]
pub trait AuctionNodeApi {
    // ============ Admin Methods ============

    /// Advance the chain by one block.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Set the current timestamp (for testing time-dependent logic).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    /// Take the decryption committee offline or bring it back.
    /// Returns the number of members online.
    #[method(name = "admin_setCommitteeOnline")]
    async fn admin_set_committee_online(&self, online: bool) -> Result<usize, ErrorObjectOwned>;

    /// Start a new encryption context under a fresh attestor key.
    #[method(name = "admin_rotateEncryptionContext")]
    async fn admin_rotate_encryption_context(
        &self,
        sender: String,
    ) -> Result<u64, ErrorObjectOwned>;

    // ============ Attestation ============

    /// Check a prepared bundle and sign its input proof.
    #[method(name = "attestor_attest")]
    async fn attestor_attest(&self, params: AttestParams) -> Result<String, ErrorObjectOwned>;

    // ============ Auction Methods ============

    #[method(name = "auction_create")]
    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned>;

    /// Open bidding. Returns the closing time.
    #[method(name = "auction_start")]
    async fn auction_start(&self, sender: String, auction_id: u64) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "auction_submitBid")]
    async fn auction_submit_bid(
        &self,
        params: SubmitBidParams,
    ) -> Result<BidReceiptRpc, ErrorObjectOwned>;

    #[method(name = "auction_modifyBid")]
    async fn auction_modify_bid(
        &self,
        params: ModifyBidParams,
    ) -> Result<BidReceiptRpc, ErrorObjectOwned>;

    /// Withdraw a bid. Returns the refundable deposit.
    #[method(name = "auction_withdrawBid")]
    async fn auction_withdraw_bid(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<Amount, ErrorObjectOwned>;

    #[method(name = "auction_claimRefund")]
    async fn auction_claim_refund(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<Amount, ErrorObjectOwned>;

    #[method(name = "auction_closeAndSettle")]
    async fn auction_close_and_settle(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned>;

    /// Execute a hex-encoded borsh `AuctionCall`. Returns a description of
    /// the outcome.
    #[method(name = "auction_submitCall")]
    async fn auction_submit_call(
        &self,
        sender: String,
        call: String,
    ) -> Result<String, ErrorObjectOwned>;

    // ============ Chain Methods ============

    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Hand pending transfers to the caller.
    #[method(name = "chain_drainTransfers")]
    async fn chain_drain_transfers(&self) -> Result<Vec<TransferRpc>, ErrorObjectOwned>;

    // ============ Query Methods ============

    #[method(name = "query_getAuction")]
    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRpc>, ErrorObjectOwned>;

    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(&self) -> Result<Vec<AuctionRpc>, ErrorObjectOwned>;

    #[method(name = "query_getAuctionBids")]
    async fn query_get_auction_bids(
        &self,
        auction_id: u64,
    ) -> Result<Vec<BidRpc>, ErrorObjectOwned>;

    #[method(name = "query_getBid")]
    async fn query_get_bid(
        &self,
        auction_id: u64,
        bidder: String,
    ) -> Result<Option<BidRpc>, ErrorObjectOwned>;

    #[method(name = "query_getAuctionResult")]
    async fn query_get_auction_result(
        &self,
        auction_id: u64,
    ) -> Result<Option<ClearingResultRpc>, ErrorObjectOwned>;

    #[method(name = "query_getDeposits")]
    async fn query_get_deposits(
        &self,
        auction_id: u64,
    ) -> Result<Vec<DepositRpc>, ErrorObjectOwned>;

    #[method(name = "query_getEncryptionContext")]
    async fn query_get_encryption_context(&self) -> Result<EncryptionContextRpc, ErrorObjectOwned>;

    /// Auctions past their deadline and not yet final.
    #[method(name = "query_getPendingSettlement")]
    async fn query_get_pending_settlement(&self) -> Result<Vec<u64>, ErrorObjectOwned>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let hex = "ab".repeat(32);
        assert_eq!(parse_address("sender", &hex), Ok([0xab; 32]));
        assert_eq!(parse_address("sender", &format!("0x{}", hex)), Ok([0xab; 32]));
        assert_eq!(
            parse_address("sender", "abcd"),
            Err(RpcDecodeError::InvalidLength {
                field: "sender",
                expected: 32,
                got: 2
            })
        );
        assert!(matches!(
            parse_address("sender", "zz"),
            Err(RpcDecodeError::InvalidHex { .. })
        ));
    }

    #[test]
    fn test_create_params_fill_defaults() {
        let params = CreateAuctionParams {
            sender: "01".repeat(32),
            token_for_sale: "02".repeat(32),
            payment_token: "03".repeat(32),
            beneficiary: "04".repeat(32),
            total_tokens_offered: Some(500),
            min_duration: Some(10),
            ..Default::default()
        };
        let defaults = DefaultAuctionParams::default();
        let built = params.to_params(&defaults).unwrap();

        assert_eq!(built.total_tokens_offered, 500);
        assert_eq!(built.min_duration, 10);
        assert_eq!(built.config.min_duration, 10);
        assert_eq!(built.max_duration, defaults.max_duration);
        assert_eq!(built.beneficiary, [4u8; 32]);
    }

    #[test]
    fn test_settlement_json_is_tagged() {
        let json = serde_json::to_value(SettlementRpc::Cancelled {
            participants: 1,
            required: 2,
        })
        .unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["required"], 2);
    }

    #[test]
    fn test_bad_bundle_rejected() {
        assert_eq!(
            decode_bundle("00ff"),
            Err(RpcDecodeError::InvalidEncoding("bundle"))
        );
    }
}
