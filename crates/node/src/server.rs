//! JSON-RPC server holding the engine, its clock and a local committee.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use jsonrpsee::core::async_trait;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use tracing::{info, warn};

use spa_client::rpc::*;
use spa_crypto::{deal_committee_keys, AttestorKey};
use spa_engine::queries::{handle_query, AuctionQuery, AuctionQueryResponse};
use spa_engine::{dispatch, AuctionCall, CallContext, CallOutcome, EngineGenesisConfig, EngineState};
use spa_oracle::ThresholdOracle;
use spa_types::{compute_ciphertext_handle, Address, Amount};

/// Seconds per simulated block.
const BLOCK_TIME: u64 = 12;

/// Shared chain state.
pub struct ChainState {
    pub engine: EngineState,
    /// Local decryption committee
    pub oracle: ThresholdOracle,
    /// Signs input proofs for the current encryption context
    attestor: AttestorKey,
    /// Current block height (simulated)
    pub block_height: u64,
    /// Current timestamp (simulated, can be advanced)
    pub timestamp: u64,
}

impl ChainState {
    /// Deal a fresh committee and attestor for `config`.
    pub fn from_genesis(config: &EngineGenesisConfig) -> Result<Self> {
        config.validate()?;

        let keys = deal_committee_keys(config.threshold.t, config.threshold.n, &mut OsRng)?;
        let attestor = AttestorKey::generate(&mut OsRng);
        let engine = EngineState::from_genesis(config, attestor.public_key());

        info!(
            threshold = config.threshold.t,
            committee = config.threshold.n,
            admin = hex::encode(config.admin),
            "Chain initialized"
        );

        Ok(Self {
            engine,
            oracle: ThresholdOracle::from_committee(keys),
            attestor,
            block_height: 0,
            timestamp: config.initial_timestamp,
        })
    }

    pub fn advance_block(&mut self) {
        self.block_height += 1;
        self.timestamp += BLOCK_TIME;
    }

    pub fn set_timestamp(&mut self, ts: u64) {
        self.timestamp = ts;
    }

    pub fn context(&self, sender: Address) -> CallContext {
        CallContext {
            sender,
            block_height: self.block_height,
            timestamp: self.timestamp,
        }
    }

    /// Run one call against the engine at the current clock.
    pub fn execute(
        &mut self,
        sender: Address,
        call: AuctionCall,
    ) -> spa_engine::HandlerResult<CallOutcome> {
        let ctx = self.context(sender);
        dispatch(&mut self.engine, &ctx, call, &self.oracle)
    }
}

/// Implementation of the auction node RPC server.
pub struct AuctionNode {
    state: Arc<RwLock<ChainState>>,
}

impl AuctionNode {
    pub fn new(chain: ChainState) -> Self {
        Self {
            state: Arc::new(RwLock::new(chain)),
        }
    }

    pub fn state(&self) -> Arc<RwLock<ChainState>> {
        self.state.clone()
    }

    fn rpc_error(msg: &str) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(-32000, msg.to_string(), None::<()>)
    }

    fn unexpected(outcome: CallOutcome) -> ErrorObjectOwned {
        Self::rpc_error(&format!("Unexpected call outcome: {:?}", outcome))
    }

    fn parse(field: &'static str, s: &str) -> Result<Address, ErrorObjectOwned> {
        parse_address(field, s).map_err(|e| Self::rpc_error(&e.to_string()))
    }

    fn execute(
        &self,
        sender: &str,
        call: AuctionCall,
        action: &str,
    ) -> Result<CallOutcome, ErrorObjectOwned> {
        let sender = Self::parse("sender", sender)?;
        self.state
            .write()
            .execute(sender, call)
            .map_err(|e| Self::rpc_error(&format!("Failed to {}: {}", action, e)))
    }

    fn query(&self, query: AuctionQuery) -> AuctionQueryResponse {
        handle_query(&self.state.read().engine, query)
    }
}

/// Bind the server and start serving `node`.
pub async fn serve(addr: SocketAddr, node: AuctionNode) -> Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(node.into_rpc());
    info!(%local_addr, "Auction node listening");
    Ok((local_addr, handle))
}

#[async_trait]
impl AuctionNodeApiServer for AuctionNode {
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut state = self.state.write();
        state.advance_block();
        Ok(BlockInfo {
            height: state.block_height,
            timestamp: state.timestamp,
        })
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        self.state.write().set_timestamp(timestamp);
        info!(timestamp, "Timestamp set");
        Ok(true)
    }

    async fn admin_set_committee_online(&self, online: bool) -> Result<usize, ErrorObjectOwned> {
        let state = self.state.read();
        state.oracle.set_online(online);
        Ok(state.oracle.online_members())
    }

    async fn admin_rotate_encryption_context(
        &self,
        sender: String,
    ) -> Result<u64, ErrorObjectOwned> {
        let sender = Self::parse("sender", &sender)?;
        let next = AttestorKey::generate(&mut OsRng);

        let mut state = self.state.write();
        let call = AuctionCall::RotateEncryptionContext {
            attestor_public_key: next.public_key(),
        };
        match state
            .execute(sender, call)
            .map_err(|e| Self::rpc_error(&format!("Failed to rotate context: {}", e)))?
        {
            CallOutcome::ContextRotated { epoch } => {
                state.attestor = next;
                info!(epoch, "Encryption context rotated");
                Ok(epoch)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    async fn attestor_attest(&self, params: AttestParams) -> Result<String, ErrorObjectOwned> {
        let contract = Self::parse("contract", &params.contract)?;
        let bidder = Self::parse("bidder", &params.bidder)?;
        let bundle = decode_bundle(&params.bundle).map_err(|e| Self::rpc_error(&e.to_string()))?;

        if bundle.values.len() != bundle.ciphertexts.len() {
            return Err(Self::rpc_error("Bundle has unmatched handles"));
        }
        for (value, ciphertext) in bundle.values.iter().zip(&bundle.ciphertexts) {
            if *value.handle() != compute_ciphertext_handle(value.width(), ciphertext) {
                warn!(bidder = %params.bidder, "Refused to attest mismatched handle");
                return Err(Self::rpc_error("Handle does not match its ciphertext"));
            }
        }

        let state = self.state.read();
        let epoch = state.engine.verifier.current_epoch();
        let proof = state
            .attestor
            .attest(contract, bidder, epoch, &bundle.values)
            .to_bytes()
            .map_err(|e| Self::rpc_error(&format!("Failed to encode proof: {}", e)))?;
        Ok(hex::encode(proof))
    }

    async fn auction_create(&self, params: CreateAuctionParams) -> Result<u64, ErrorObjectOwned> {
        let auction_params = params
            .to_params(&self.state.read().engine.default_params)
            .map_err(|e| Self::rpc_error(&e.to_string()))?;

        match self.execute(
            &params.sender,
            AuctionCall::CreateAuction {
                params: auction_params,
            },
            "create auction",
        )? {
            CallOutcome::AuctionCreated(auction_id) => Ok(auction_id),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_start(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<u64, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::StartAuction { auction_id }, "start auction")? {
            CallOutcome::AuctionStarted { closes_at } => Ok(closes_at),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_submit_bid(
        &self,
        params: SubmitBidParams,
    ) -> Result<BidReceiptRpc, ErrorObjectOwned> {
        let call = AuctionCall::SubmitBid {
            auction_id: params.auction_id,
            bundle: decode_bundle(&params.bundle).map_err(|e| Self::rpc_error(&e.to_string()))?,
            proof: decode_proof(&params.proof).map_err(|e| Self::rpc_error(&e.to_string()))?,
            deposit: params.deposit,
        };
        match self.execute(&params.sender, call, "submit bid")? {
            CallOutcome::BidAccepted(receipt) => {
                info!(
                    auction_id = params.auction_id,
                    bidder = %params.sender,
                    "Bid submitted"
                );
                Ok(receipt.into())
            }
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_modify_bid(
        &self,
        params: ModifyBidParams,
    ) -> Result<BidReceiptRpc, ErrorObjectOwned> {
        let call = AuctionCall::ModifyBid {
            auction_id: params.auction_id,
            bundle: decode_bundle(&params.bundle).map_err(|e| Self::rpc_error(&e.to_string()))?,
            proof: decode_proof(&params.proof).map_err(|e| Self::rpc_error(&e.to_string()))?,
            top_up: params.top_up,
        };
        match self.execute(&params.sender, call, "modify bid")? {
            CallOutcome::BidAccepted(receipt) => Ok(receipt.into()),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_withdraw_bid(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<Amount, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::WithdrawBid { auction_id }, "withdraw bid")? {
            CallOutcome::BidWithdrawn { refundable } => Ok(refundable),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_claim_refund(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<Amount, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::ClaimRefund { auction_id }, "claim refund")? {
            CallOutcome::RefundClaimed(amount) => Ok(amount),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_close_and_settle(
        &self,
        sender: String,
        auction_id: u64,
    ) -> Result<SettlementRpc, ErrorObjectOwned> {
        match self.execute(&sender, AuctionCall::CloseAndSettle { auction_id }, "settle")? {
            CallOutcome::Settlement(outcome) => Ok(outcome.into()),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn auction_submit_call(
        &self,
        sender: String,
        call: String,
    ) -> Result<String, ErrorObjectOwned> {
        let bytes = hex::decode(call.trim_start_matches("0x"))
            .map_err(|e| Self::rpc_error(&format!("Invalid call hex: {}", e)))?;
        let call = AuctionCall::decode(&bytes)
            .map_err(|e| Self::rpc_error(&format!("Invalid call encoding: {}", e)))?;
        let outcome = self.execute(&sender, call, "execute call")?;
        Ok(format!("{:?}", outcome))
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(BlockInfo {
            height: state.block_height,
            timestamp: state.timestamp,
        })
    }

    async fn chain_drain_transfers(&self) -> Result<Vec<TransferRpc>, ErrorObjectOwned> {
        let transfers = self.state.write().engine.drain_transfers();
        Ok(transfers.iter().map(TransferRpc::from).collect())
    }

    async fn query_get_auction(
        &self,
        auction_id: u64,
    ) -> Result<Option<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.engine.get_auction(auction_id).map(AuctionRpc::from))
    }

    async fn query_list_auctions(&self) -> Result<Vec<AuctionRpc>, ErrorObjectOwned> {
        let state = self.state.read();
        Ok(state.engine.auctions.values().map(AuctionRpc::from).collect())
    }

    async fn query_get_auction_bids(
        &self,
        auction_id: u64,
    ) -> Result<Vec<BidRpc>, ErrorObjectOwned> {
        match self.query(AuctionQuery::GetAuctionBids { auction_id }) {
            AuctionQueryResponse::Bids(bids) => Ok(bids.iter().map(BidRpc::from).collect()),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }

    async fn query_get_bid(
        &self,
        auction_id: u64,
        bidder: String,
    ) -> Result<Option<BidRpc>, ErrorObjectOwned> {
        let bidder = Self::parse("bidder", &bidder)?;
        match self.query(AuctionQuery::GetBid { auction_id, bidder }) {
            AuctionQueryResponse::Bid(bid) => Ok(bid.as_ref().map(BidRpc::from)),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }

    async fn query_get_auction_result(
        &self,
        auction_id: u64,
    ) -> Result<Option<ClearingResultRpc>, ErrorObjectOwned> {
        match self.query(AuctionQuery::GetResult { auction_id }) {
            AuctionQueryResponse::Result(result) => Ok(result.map(ClearingResultRpc::from)),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }

    async fn query_get_deposits(
        &self,
        auction_id: u64,
    ) -> Result<Vec<DepositRpc>, ErrorObjectOwned> {
        match self.query(AuctionQuery::GetDeposits { auction_id }) {
            AuctionQueryResponse::Deposits(deposits) => Ok(deposits
                .into_iter()
                .map(|(bidder, amount)| DepositRpc {
                    bidder: hex::encode(bidder),
                    amount,
                })
                .collect()),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }

    async fn query_get_encryption_context(&self) -> Result<EncryptionContextRpc, ErrorObjectOwned> {
        let mpk = self.state.read().oracle.master_public_key();
        match self.query(AuctionQuery::GetEncryptionContext) {
            AuctionQueryResponse::EncryptionContext(context) => Ok(EncryptionContextRpc {
                mpk: hex::encode(mpk.mpk.0),
                threshold: mpk.threshold,
                total_validators: mpk.total_validators,
                epoch: context.epoch,
                attestor_public_key: context.attestor_public_key.map(|pk| hex::encode(pk.0)),
            }),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }

    async fn query_get_pending_settlement(&self) -> Result<Vec<u64>, ErrorObjectOwned> {
        let now = self.state.read().timestamp;
        match self.query(AuctionQuery::PendingSettlement { now }) {
            AuctionQueryResponse::PendingSettlement(ids) => Ok(ids),
            _ => Err(Self::rpc_error("Unexpected query response")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spa_client::prepare_bid;

    const ADMIN: Address = [0xAD; 32];

    fn chain() -> ChainState {
        let mut config = EngineGenesisConfig::default();
        config.admin = ADMIN;
        config.initial_timestamp = 1_000;
        ChainState::from_genesis(&config).unwrap()
    }

    #[test]
    fn test_clock() {
        let mut chain = chain();
        assert_eq!(chain.timestamp, 1_000);
        chain.advance_block();
        assert_eq!((chain.block_height, chain.timestamp), (1, 1_012));
        chain.set_timestamp(5_000);
        assert_eq!(chain.context([1u8; 32]).timestamp, 5_000);
    }

    #[test]
    fn test_invalid_genesis_rejected() {
        let mut config = EngineGenesisConfig::default();
        config.threshold.t = 4;
        assert!(ChainState::from_genesis(&config).is_err());
    }

    #[test]
    fn test_attested_bid_accepted() {
        let mut chain = chain();
        let owner = [1u8; 32];
        let bidder = [2u8; 32];
        let params = chain.engine.default_params.to_params([3; 32], [4; 32], [5; 32]);

        let created = chain
            .execute(owner, AuctionCall::CreateAuction { params })
            .unwrap();
        let auction_id = match created {
            CallOutcome::AuctionCreated(id) => id,
            other => panic!("unexpected outcome {:?}", other),
        };
        chain
            .execute(owner, AuctionCall::StartAuction { auction_id })
            .unwrap();

        let contract = chain.engine.get_auction(auction_id).unwrap().contract_address;
        let mpk = chain.oracle.master_public_key().mpk;
        let price = 2_000_000_000_000_000;
        let bid = prepare_bid(&mpk, &contract, &bidder, 10, price, &mut OsRng).unwrap();
        let proof = chain
            .attestor
            .attest(contract, bidder, 0, &bid.bundle.values)
            .to_bytes()
            .unwrap();

        let outcome = chain
            .execute(
                bidder,
                AuctionCall::SubmitBid {
                    auction_id,
                    bundle: bid.bundle,
                    proof,
                    deposit: bid.deposit_preview,
                },
            )
            .unwrap();
        assert!(matches!(outcome, CallOutcome::BidAccepted(_)));
    }
}
