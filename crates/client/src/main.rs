//! CLI for interacting with confidential single-price auctions.
//!
//! This binary provides commands for:
//! - Creating and starting auctions
//! - Submitting, modifying and withdrawing encrypted bids
//! - Closing auctions and claiming refunds
//! - Querying auction status

use anyhow::{anyhow, Result};
use clap::{ArgAction, Parser, Subcommand};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use rand::rngs::OsRng;
use tracing::info;

use spa_client::rpc::{
    encode_bundle, parse_address, parse_fixed, AttestParams, CreateAuctionParams,
    ModifyBidParams, SettlementRpc, SubmitBidParams,
};
use spa_client::{prepare_bid, AuctionNodeApiClient, PreparedBid};
use spa_types::{Amount, Duration, G2Point};

#[derive(Parser)]
#[command(name = "spa-cli")]
#[command(about = "CLI for confidential single-price auctions")]
struct Cli {
    /// Auction node RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:9944")]
    rpc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new auction
    CreateAuction {
        /// Sender address (hex)
        #[arg(long)]
        sender: String,

        #[arg(long)]
        token_for_sale: String,

        #[arg(long)]
        payment_token: String,

        #[arg(long)]
        beneficiary: String,

        #[arg(long)]
        total_tokens: Option<u64>,

        #[arg(long)]
        min_participants: Option<u32>,

        /// Seconds
        #[arg(long)]
        min_duration: Option<Duration>,

        /// Seconds
        #[arg(long)]
        max_duration: Option<Duration>,

        #[arg(long)]
        required_deposit: Option<Amount>,

        #[arg(long)]
        min_bid_value: Option<u64>,
    },

    /// Open bidding
    Start {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,
    },

    /// Submit an encrypted bid
    Bid {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,

        /// Tokens wanted (will be encrypted)
        #[arg(long)]
        quantity: u64,

        /// Price per token (will be encrypted)
        #[arg(long)]
        price: u64,

        /// Deposit (visible); defaults to full collateral
        #[arg(long)]
        deposit: Option<Amount>,
    },

    /// Replace an active bid
    ModifyBid {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,

        #[arg(long)]
        quantity: u64,

        #[arg(long)]
        price: u64,

        #[arg(long, default_value = "0")]
        top_up: Amount,
    },

    /// Withdraw an active bid
    Withdraw {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,
    },

    /// Claim a refundable deposit
    ClaimRefund {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,
    },

    /// Close, reveal and settle an auction
    Close {
        #[arg(long)]
        sender: String,

        #[arg(long)]
        auction_id: u64,
    },

    /// Get auction details
    GetAuction {
        #[arg(long)]
        auction_id: u64,
    },

    /// List all auctions
    ListAuctions,

    /// Get bids for an auction
    GetBids {
        #[arg(long)]
        auction_id: u64,
    },

    /// Get auction result
    GetResult {
        #[arg(long)]
        auction_id: u64,
    },

    /// Get deposits held by an auction
    GetDeposits {
        #[arg(long)]
        auction_id: u64,
    },

    /// Get the encryption context
    GetContext,

    /// List auctions waiting for settlement
    Pending,

    /// Advance chain time (for testing)
    AdvanceBlock,

    /// Set chain timestamp (for testing)
    SetTimestamp {
        #[arg(long)]
        timestamp: u64,
    },

    /// Toggle the decryption committee (for testing)
    Committee {
        #[arg(long, action = ArgAction::Set)]
        online: bool,
    },

    /// Rotate the encryption context (admin)
    RotateContext {
        #[arg(long)]
        sender: String,
    },

    /// Print and clear pending transfers
    DrainTransfers,
}

/// Encrypt a bid for `sender` and have the node attest it.
async fn prepare_and_attest(
    client: &HttpClient,
    sender: &str,
    auction_id: u64,
    quantity: u64,
    price: u64,
) -> Result<(PreparedBid, String, Amount)> {
    let context = client.query_get_encryption_context().await?;
    let mpk = G2Point(parse_fixed::<96>("mpk", &context.mpk)?);

    let auction = client
        .query_get_auction(auction_id)
        .await?
        .ok_or_else(|| anyhow!("Auction {} not found", auction_id))?;
    let contract = parse_address("contract_address", &auction.contract_address)?;
    let bidder = parse_address("sender", sender)?;

    let prepared = prepare_bid(&mpk, &contract, &bidder, quantity, price, &mut OsRng)?;
    let proof = client
        .attestor_attest(AttestParams {
            contract: auction.contract_address.clone(),
            bidder: sender.to_string(),
            bundle: encode_bundle(&prepared.bundle),
        })
        .await?;

    Ok((prepared, proof, auction.required_deposit))
}

async fn submit_bid_cmd(
    client: &HttpClient,
    sender: &str,
    auction_id: u64,
    quantity: u64,
    price: u64,
    deposit: Option<Amount>,
) -> Result<()> {
    let (prepared, proof, required_deposit) =
        prepare_and_attest(client, sender, auction_id, quantity, price).await?;
    let deposit = deposit.unwrap_or_else(|| prepared.deposit_for(required_deposit));

    let receipt = client
        .auction_submit_bid(SubmitBidParams {
            sender: sender.to_string(),
            auction_id,
            bundle: encode_bundle(&prepared.bundle),
            proof,
            deposit,
        })
        .await?;

    info!(auction_id, "Bid submitted");
    println!("Bid submitted successfully");
    println!("  Auction ID: {}", auction_id);
    println!("  Quantity: {} (encrypted)", quantity);
    println!("  Price: {} (encrypted)", price);
    println!("  Deposit: {}", receipt.deposit_posted);
    println!("  Closes at: {}", receipt.closes_at);
    if receipt.extended {
        println!("  Deadline extended");
    }
    Ok(())
}

async fn modify_bid_cmd(
    client: &HttpClient,
    sender: &str,
    auction_id: u64,
    quantity: u64,
    price: u64,
    top_up: Amount,
) -> Result<()> {
    let (prepared, proof, _) =
        prepare_and_attest(client, sender, auction_id, quantity, price).await?;
    if prepared.deposit_preview > top_up {
        info!(
            collateral = %prepared.deposit_preview,
            "Deposit must cover quantity x price at settlement"
        );
    }

    let receipt = client
        .auction_modify_bid(ModifyBidParams {
            sender: sender.to_string(),
            auction_id,
            bundle: encode_bundle(&prepared.bundle),
            proof,
            top_up,
        })
        .await?;

    println!("Bid modified");
    println!("  Modifications: {}", receipt.modification_count);
    println!("  Deposit: {}", receipt.deposit_posted);
    println!("  Closes at: {}", receipt.closes_at);
    Ok(())
}

async fn close_cmd(client: &HttpClient, sender: &str, auction_id: u64) -> Result<()> {
    match client
        .auction_close_and_settle(sender.to_string(), auction_id)
        .await?
    {
        SettlementRpc::Settled(result) => {
            println!("Auction {} settled:", result.auction_id);
            println!("  Clearing price: {}", result.clearing_price);
            println!("  Filled: {}", result.total_filled);
            println!("  Unsold: {}", result.unallocated);
            for allocation in result.allocations {
                println!("  {} <- {}", allocation.bidder, allocation.filled_quantity);
            }
        }
        SettlementRpc::Cancelled {
            participants,
            required,
        } => {
            println!(
                "Auction {} cancelled: {} participants, {} required",
                auction_id, participants, required
            );
        }
    }
    Ok(())
}

async fn get_auction_cmd(client: &HttpClient, auction_id: u64) -> Result<()> {
    match client.query_get_auction(auction_id).await? {
        Some(a) => {
            println!("Auction {}:", a.auction_id);
            println!("  Phase: {}", a.phase);
            println!("  Owner: {}", a.owner);
            println!("  Contract: {}", a.contract_address);
            println!("  Supply: {}", a.total_tokens_offered);
            println!("  Min participants: {}", a.min_participants);
            println!("  Required deposit: {}", a.required_deposit);
            if let Some(closes_at) = a.closes_at {
                println!("  Closes at: {}", closes_at);
            }
            println!("  Active bids: {}", a.active_bids);
            println!("  Escrow: {}", a.escrow_balance);
            if let Some(price) = a.clearing_price {
                println!("  Clearing price: {}", price);
            }
        }
        None => {
            println!("Auction {} not found", auction_id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("spa_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let client = HttpClientBuilder::default().build(&cli.rpc)?;

    match cli.command {
        Commands::CreateAuction {
            sender,
            token_for_sale,
            payment_token,
            beneficiary,
            total_tokens,
            min_participants,
            min_duration,
            max_duration,
            required_deposit,
            min_bid_value,
        } => {
            let auction_id = client
                .auction_create(CreateAuctionParams {
                    sender,
                    token_for_sale,
                    payment_token,
                    beneficiary,
                    total_tokens_offered: total_tokens,
                    min_participants,
                    min_duration,
                    max_duration,
                    required_deposit,
                    min_bid_value,
                    ..Default::default()
                })
                .await?;
            println!("Auction ID: {}", auction_id);
        }

        Commands::Start { sender, auction_id } => {
            let closes_at = client.auction_start(sender, auction_id).await?;
            println!("Auction {} open until {}", auction_id, closes_at);
        }

        Commands::Bid {
            sender,
            auction_id,
            quantity,
            price,
            deposit,
        } => {
            submit_bid_cmd(&client, &sender, auction_id, quantity, price, deposit).await?;
        }

        Commands::ModifyBid {
            sender,
            auction_id,
            quantity,
            price,
            top_up,
        } => {
            modify_bid_cmd(&client, &sender, auction_id, quantity, price, top_up).await?;
        }

        Commands::Withdraw { sender, auction_id } => {
            let refundable = client.auction_withdraw_bid(sender, auction_id).await?;
            println!("Bid withdrawn; {} refundable", refundable);
        }

        Commands::ClaimRefund { sender, auction_id } => {
            let refund = client.auction_claim_refund(sender, auction_id).await?;
            println!("Refunded {}", refund);
        }

        Commands::Close { sender, auction_id } => {
            close_cmd(&client, &sender, auction_id).await?;
        }

        Commands::GetAuction { auction_id } => {
            get_auction_cmd(&client, auction_id).await?;
        }

        Commands::ListAuctions => {
            let auctions = client.query_list_auctions().await?;
            if auctions.is_empty() {
                println!("No auctions found");
            } else {
                println!("Auctions:");
                for a in auctions {
                    println!("  [{}] {} ({})", a.auction_id, a.phase, a.owner);
                }
            }
        }

        Commands::GetBids { auction_id } => {
            let bids = client.query_get_auction_bids(auction_id).await?;
            if bids.is_empty() {
                println!("No bids for auction {}", auction_id);
            } else {
                println!("Bids for auction {}:", auction_id);
                for (i, bid) in bids.iter().enumerate() {
                    println!("  [{}] Bidder: {} ({})", i, bid.bidder, bid.status);
                    println!("      Deposit: {}", bid.deposit_posted);
                    println!("      Modifications: {}", bid.modification_count);
                }
            }
        }

        Commands::GetResult { auction_id } => {
            match client.query_get_auction_result(auction_id).await? {
                Some(r) => {
                    println!("Result for auction {}:", r.auction_id);
                    println!("  Clearing price: {}", r.clearing_price);
                    println!("  Filled: {}", r.total_filled);
                    println!("  Participants: {}", r.participants_at_close);
                    println!("  Settled at: {}", r.settled_at);
                }
                None => {
                    println!("Auction {} not settled yet", auction_id);
                }
            }
        }

        Commands::GetDeposits { auction_id } => {
            for deposit in client.query_get_deposits(auction_id).await? {
                println!("  {}: {}", deposit.bidder, deposit.amount);
            }
        }

        Commands::GetContext => {
            let context = client.query_get_encryption_context().await?;
            println!("Encryption context {}:", context.epoch);
            println!("  MPK: {}", context.mpk);
            println!("  Threshold: {}/{}", context.threshold, context.total_validators);
            if let Some(attestor) = context.attestor_public_key {
                println!("  Attestor: {}", attestor);
            }
        }

        Commands::Pending => {
            let pending = client.query_get_pending_settlement().await?;
            println!("Awaiting settlement: {:?}", pending);
        }

        Commands::AdvanceBlock => {
            let info = client.admin_advance_block().await?;
            println!("Block advanced: height={}, timestamp={}", info.height, info.timestamp);
        }

        Commands::SetTimestamp { timestamp } => {
            client.admin_set_timestamp(timestamp).await?;
            println!("Timestamp set to {}", timestamp);
        }

        Commands::Committee { online } => {
            let members = client.admin_set_committee_online(online).await?;
            println!("{} committee members online", members);
        }

        Commands::RotateContext { sender } => {
            let epoch = client.admin_rotate_encryption_context(sender).await?;
            println!("Encryption context rotated to epoch {}", epoch);
        }

        Commands::DrainTransfers => {
            for t in client.chain_drain_transfers().await? {
                println!(
                    "  auction {} {} {} -> {} ({})",
                    t.auction_id, t.amount, t.token, t.to, t.reason
                );
            }
        }
    }

    Ok(())
}
