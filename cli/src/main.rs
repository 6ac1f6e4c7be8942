//! Thin CLI wiring over `obscura-core`/`obscura-wallet`/`obscura-network`.
//!
//! Mirrors the reference implementation's three standalone scripts
//! (`toycoin/network/node.py`, `txn_oracle.py`, `listener.py`) as
//! subcommands of one binary. All three are out of scope as *behavioral*
//! requirements (spec.md §1 names them external collaborators); this
//! binary just parses arguments and delegates to the in-scope library
//! crates.

use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::{info, warn};

use obscura_core::block::{self, GENESIS};
use obscura_core::config::ConfigBuilder;
use obscura_core::protocol;
use obscura_core::serialize;
use obscura_core::transaction::{hash_txn, Transaction, COINBASE_SENDER};
use obscura_network::RelayConnection;
use obscura_wallet::Wallet;

#[derive(Parser)]
#[command(name = "obscura")]
#[command(about = "Obscura blockchain CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full node: ingest transactions, mine blocks, gossip the chain.
    Node {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 9000)]
        port: u16,
        #[arg(long, default_value = "obscura")]
        channel: String,
    },
    /// Bootstrap the genesis block and synthesize ongoing test traffic.
    Oracle {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 9000)]
        port: u16,
        #[arg(long, default_value = "obscura")]
        channel: String,
        #[arg(long, default_value_t = 1)]
        min_interval: u64,
        #[arg(long, default_value_t = 5)]
        max_interval: u64,
    },
    /// Subscribe and print every TXN/BLOC frame seen. Never mutates any chain.
    Listen {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 9000)]
        port: u16,
        #[arg(long, default_value = "obscura")]
        channel: String,
    },
}

#[tokio::main]
async fn main() -> obscura_core::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Node { host, port, channel } => run_node(host, port, channel).await,
        Commands::Oracle {
            host,
            port,
            channel,
            min_interval,
            max_interval,
        } => run_oracle(host, port, channel, min_interval, max_interval).await,
        Commands::Listen { host, port, channel } => run_listen(host, port, channel).await,
    }
}

async fn run_node(host: String, port: u16, channel: String) -> obscura_core::Result<()> {
    let config = ConfigBuilder::new()
        .relay_host(host.clone())
        .relay_port(port)
        .channel(channel.clone())
        .finish();

    let conn = RelayConnection::connect(&host, port, &channel).await?;
    let (reader, writer) = conn.into_split();
    info!(%host, port, %channel, "node connected to relay");
    obscura_core::node::run_with_io(reader, writer, config).await
}

/// Builds a coinbase transaction minting `value` to `receiver`
/// (spec.md §3: empty `previous_hashes`, `sender` literally `"genesis"`,
/// both signatures empty, admitted only via `gen_block` at block 0,
/// never through `valid_txn`).
fn coinbase(receiver: &obscura_core::signature::Address, value: u64) -> Transaction {
    Transaction {
        previous_hashes: vec![],
        receiver: receiver.clone(),
        receiver_value: value,
        receiver_signature: vec![],
        sender: COINBASE_SENDER.to_vec(),
        sender_change: 0,
        sender_signature: vec![],
    }
}

async fn run_oracle(
    host: String,
    port: u16,
    channel: String,
    min_interval: u64,
    max_interval: u64,
) -> obscura_core::Result<()> {
    let mut conn = RelayConnection::connect(&host, port, &channel).await?;

    let mut wallet_a = Wallet::new()?;
    let mut wallet_b = Wallet::new()?;

    let txn_a = coinbase(wallet_a.address(), 1_000);
    let txn_b = coinbase(wallet_b.address(), 1_000);
    let (genesis_block, _) = block::gen_block(
        &GENESIS,
        vec![txn_a.clone(), txn_b.clone()],
        1,
        obscura_core::block::BLOCK_MAX_TXNS,
    );
    let genesis_block = genesis_block.expect("two coinbase txns always produce a block");
    let chain = vec![genesis_block];

    let packed = serialize::pack_blockchain(&chain)?;
    conn.publish(&channel, &protocol::bloc_payload(&packed)).await?;
    info!("published genesis block minting two wallets");

    wallet_a.receive(&txn_a);
    wallet_b.receive(&txn_b);

    let wallets = [wallet_a, wallet_b];
    let mut wallets = wallets;
    let mut turn = 0usize;
    loop {
        let delay_secs = {
            let mut rng = rand::thread_rng();
            rng.gen_range(min_interval..=max_interval.max(min_interval))
        };
        tokio::time::sleep(std::time::Duration::from_secs(delay_secs)).await;

        let (sender_idx, receiver_idx) = (turn % 2, (turn + 1) % 2);
        turn += 1;

        let send_value = {
            let balance = wallets[sender_idx].balance();
            if balance == 0 {
                warn!("oracle wallet has zero balance, skipping this round");
                continue;
            }
            1.max(balance / 10)
        };

        let receiver_addr = wallets[receiver_idx].address().clone();
        let sent = wallets[sender_idx].send(&receiver_addr, send_value)?;
        let Some((tokens, txn)) = sent else {
            continue;
        };

        let packed = serialize::pack_txn_pair(&tokens, &txn)?;
        conn.publish(&channel, &protocol::txn_payload(&packed)).await?;
        info!(value = send_value, "oracle published a transaction");

        // Optimistically settle both sides without waiting for the
        // transaction to actually be mined; a real wallet would wait for
        // it to appear in a BLOC frame before confirming.
        let txn_hash = hash_txn(&txn);
        wallets[sender_idx].confirm_send(&txn_hash);
        wallets[sender_idx].receive(&txn);
        wallets[receiver_idx].receive(&txn);
    }
}

async fn run_listen(host: String, port: u16, channel: String) -> obscura_core::Result<()> {
    let mut conn = RelayConnection::connect(&host, port, &channel).await?;
    info!(%host, port, %channel, "listening on channel");

    loop {
        let frame = conn.recv().await?;
        if frame.len() < 4 {
            warn!("frame shorter than a tag, ignoring");
            continue;
        }
        let (tag, body) = frame.split_at(4);
        if tag == protocol::TAG_TXN {
            match serialize::unpack_txn_pair(body) {
                Ok((tokens, txn)) => {
                    info!(tokens = tokens.len(), value = txn.receiver_value, "TXN");
                }
                Err(e) => warn!(error = %e, "undecodable TXN frame"),
            }
        } else if tag == protocol::TAG_BLOC {
            match serialize::unpack_blockchain(body) {
                Ok(chain) => info!(len = chain.len(), "BLOC"),
                Err(e) => warn!(error = %e, "undecodable BLOC frame"),
            }
        } else {
            warn!(?tag, "unrecognized tag");
        }
    }
}
