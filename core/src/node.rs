//! The node's concurrent event loop, per spec.md §4.5–§4.7 and §5.
//!
//! Three cooperative tasks share a node: [`ingress_loop`] reads frames off
//! the relay connection, classifies and validates them, and either
//! forwards a transaction pair to the mining worker or replaces the local
//! chain; [`mining_worker`] applies the double-spend guard, batches pairs,
//! and offloads the CPU-bound proof-of-work search to a blocking task so
//! the scheduler stays responsive; the relay's write half is owned
//! exclusively by the task draining the publish channel, so a mined
//! block's two-frame publish is never interleaved with another write.
//!
//! The chain itself lives behind a [`tokio::sync::RwLock`] owned by the
//! node: ingress and the mining worker both read it, only chain
//! replacement (via a peer's longer valid chain) and a freshly mined
//! block write it.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::block::{self, Blockchain, GENESIS};
use crate::config::Config;
use crate::protocol::{self, TAG_BLOC, TAG_TXN};
use crate::serialize;
use crate::transaction::{self, Token, Transaction};
use crate::Hash;

/// A (tokens, txn) pair admitted by the ingress loop and awaiting
/// inclusion in a block.
pub type PendingPair = (Vec<Token>, Transaction);

/// An outbound publish job: a channel name and the already-framed `tag ||
/// body` payload to send after it.
type PublishJob = (String, Vec<u8>);

/// Shared, lock-guarded chain state.
pub type SharedChain = Arc<RwLock<Blockchain>>;

/// A tuple uniquely identifying a token for double-spend comparisons.
type TokenKey = (Hash, Vec<u8>, u64, Vec<u8>);

fn token_key(token: &Token) -> TokenKey {
    (
        token.txn_hash,
        token.owner.clone(),
        token.value,
        token.signature.clone(),
    )
}

/// Mining-side double-spend guard (spec.md §4.6): a candidate pair is
/// admitted only if every one of its input tokens has a provenance in
/// `chain` AND none of its input tokens is already claimed by a pair
/// already sitting in `pending`.
pub fn admit(pending: &[PendingPair], candidate: &PendingPair, chain: &Blockchain) -> bool {
    let (tokens, _) = candidate;
    if !block::valid_tokens(tokens, chain) {
        return false;
    }
    let claimed: HashSet<TokenKey> = pending
        .iter()
        .flat_map(|(tokens, _)| tokens.iter().map(token_key))
        .collect();
    !tokens.iter().any(|t| claimed.contains(&token_key(t)))
}

/// Runs the node's three cooperative tasks to completion over an
/// already-connected, already-subscribed relay link. The subscription
/// handshake (first frame = channel name) and the TCP connection itself
/// are the `network` crate's responsibility ([`RelayConnection`] in
/// `obscura-network`); `core` stays transport-agnostic and only needs an
/// `AsyncRead`/`AsyncWrite` pair.
pub async fn run_with_io<R, W>(reader: R, writer: W, config: Config) -> crate::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let chain: SharedChain = Arc::new(RwLock::new(Vec::new()));
    let (txn_tx, txn_rx) = mpsc::channel(config.queue_capacity);
    let (publish_tx, publish_rx) = mpsc::channel(config.queue_capacity);

    let ingress = tokio::spawn(ingress_loop(reader, chain.clone(), txn_tx));
    let miner = tokio::spawn(mining_worker(txn_rx, chain.clone(), config.clone(), publish_tx));
    let writer_task = tokio::spawn(writer_loop(publish_rx, writer));

    let _ = tokio::join!(ingress, miner, writer_task);
    Ok(())
}

/// Convenience entry point: connects directly to
/// `config.relay_host:config.relay_port` over TCP, performs the
/// subscription handshake, and runs [`run_with_io`]. Most callers should
/// prefer `obscura-network`'s `RelayConnection` plus `run_with_io` so the
/// connection setup is shared with the other relay-facing binaries
/// (oracle, listener); this wrapper exists for tests and the simplest
/// embedding.
pub async fn run(config: Config) -> crate::Result<()> {
    let addr = format!("{}:{}", config.relay_host, config.relay_port);
    let stream = TcpStream::connect(&addr).await?;
    let (reader, mut writer) = stream.into_split();

    protocol::write_frame(&mut writer, config.channel.as_bytes()).await?;
    info!(channel = %config.channel, %addr, "subscribed to relay");

    run_with_io(reader, writer, config).await
}

/// Reads framed messages from `reader`, classifies them by their 4-byte
/// ASCII tag, and either forwards a valid transaction pair to the miner
/// or atomically replaces the local chain with a longer valid one.
/// Terminates cleanly on peer close.
async fn ingress_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    chain: SharedChain,
    txn_tx: mpsc::Sender<PendingPair>,
) {
    loop {
        let frame = match protocol::read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(crate::Error::IncompleteRead) => {
                info!("relay connection closed, ingress loop exiting");
                return;
            }
            Err(e) => {
                warn!(error = %e, "transport error reading frame, ingress loop exiting");
                return;
            }
        };
        if frame.len() < 4 {
            debug!("dropped frame shorter than a tag");
            continue;
        }
        let (tag, body) = frame.split_at(4);

        if tag == TAG_TXN {
            match serialize::unpack_txn_pair(body) {
                Ok((tokens, txn)) if transaction::valid_txn(&tokens, &txn) => {
                    if txn_tx.send((tokens, txn)).await.is_err() {
                        warn!("mining worker channel closed, ingress loop exiting");
                        return;
                    }
                }
                Ok(_) => debug!("dropped txn pair failing valid_txn"),
                Err(e) => debug!(error = %e, "dropped undecodable TXN frame"),
            }
        } else if tag == TAG_BLOC {
            match serialize::unpack_blockchain(body) {
                Ok(candidate) => {
                    let current_len = chain.read().await.len();
                    if candidate.len() > current_len && block::valid_blockchain(&candidate) {
                        let mut guard = chain.write().await;
                        *guard = candidate;
                        info!(new_len = guard.len(), "replaced local chain");
                    } else {
                        debug!("dropped BLOC frame: not longer or not valid");
                    }
                }
                Err(e) => debug!(error = %e, "dropped undecodable BLOC frame"),
            }
        } else {
            debug!(?tag, "dropped frame with unrecognized tag");
        }
    }
}

/// Consumes admitted transaction pairs, batches them, and offloads mining
/// to a blocking task once the batch reaches `config.min_batch_size`.
async fn mining_worker(
    mut txn_rx: mpsc::Receiver<PendingPair>,
    chain: SharedChain,
    config: Config,
    publish_tx: mpsc::Sender<PublishJob>,
) {
    let mut pending: Vec<PendingPair> = Vec::new();

    while let Some(candidate) = txn_rx.recv().await {
        let snapshot = chain.read().await.clone();

        if !admit(&pending, &candidate, &snapshot) {
            debug!("dropped pending candidate failing the double-spend guard");
            continue;
        }
        pending.push(candidate);

        if pending.len() < config.min_batch_size {
            continue;
        }

        let txns: Vec<Transaction> = pending.iter().map(|(_, t)| t.clone()).collect();
        let previous_hash: Hash = snapshot.last().map(|b| b.header.this_hash).unwrap_or(*GENESIS);
        let difficulty = block::next_difficulty(snapshot.len() as u64) as usize;

        let max_txns = config.block_max_txns;
        let mined =
            tokio::task::spawn_blocking(move || block::gen_block(&previous_hash, txns, difficulty, max_txns)).await;

        let (mined_block, remainder) = match mined {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "mining task panicked, dropping pending batch");
                pending.clear();
                continue;
            }
        };

        let Some(new_block) = mined_block else {
            warn!("gen_block returned no block, dropping pending batch");
            pending.clear();
            continue;
        };

        let mut guard = chain.write().await;
        let mut candidate_chain = guard.clone();
        candidate_chain.push(new_block);

        if !block::valid_blockchain(&candidate_chain) {
            warn!("extended chain failed validation, dropping pending batch");
            drop(guard);
            pending.clear();
            continue;
        }

        *guard = candidate_chain;
        let packed = match serialize::pack_blockchain(&guard) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize mined chain");
                drop(guard);
                pending.clear();
                continue;
            }
        };
        drop(guard);

        let payload = protocol::bloc_payload(&packed);
        if publish_tx.send((config.channel.clone(), payload)).await.is_err() {
            warn!("writer task channel closed, mining worker exiting");
            return;
        }

        let surviving: HashSet<Hash> = remainder.iter().map(transaction::hash_txn).collect();
        pending.retain(|(_, t)| surviving.contains(&transaction::hash_txn(t)));
    }
}

/// Drains the publish queue and writes each job as two back-to-back
/// frames (channel name, then payload), so a single publish is never
/// interleaved with another on the same connection.
async fn writer_loop<W: AsyncWrite + Unpin>(mut publish_rx: mpsc::Receiver<PublishJob>, mut writer: W) {
    while let Some((channel, payload)) = publish_rx.recv().await {
        if let Err(e) = protocol::write_frame(&mut writer, channel.as_bytes()).await {
            warn!(error = %e, "failed to write channel frame, writer task exiting");
            return;
        }
        if let Err(e) = protocol::write_frame(&mut writer, &payload).await {
            warn!(error = %e, "failed to write payload frame, writer task exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{gen_priv_key, pub_key_bytes};
    use crate::transaction::{hash_txn, send, COINBASE_SENDER};

    fn minted(owner: &crate::signature::Address, value: u64) -> (Token, Transaction) {
        let txn = Transaction {
            previous_hashes: vec![],
            receiver: owner.clone(),
            receiver_value: value,
            receiver_signature: vec![],
            sender: COINBASE_SENDER.to_vec(),
            sender_change: 0,
            sender_signature: vec![],
        };
        let token = Token {
            txn_hash: hash_txn(&txn),
            owner: owner.clone(),
            value,
            signature: vec![],
        };
        (token, txn)
    }

    #[test]
    fn admit_rejects_token_already_claimed_by_pending() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let receiver_sk = gen_priv_key().unwrap();
        let receiver_pk = pub_key_bytes(&receiver_sk).unwrap();

        let (token, coinbase) = minted(&pk, 100);
        let (block, _) = block::gen_block(&GENESIS, vec![coinbase], 1, block::BLOCK_MAX_TXNS);
        let chain = vec![block.unwrap()];

        let (tokens1, txn1) = send(&receiver_pk, &pk, &sk, 10, &[token.clone()]).unwrap();
        let pair1 = (tokens1, txn1);
        assert!(admit(&[], &pair1, &chain));

        let pending = vec![pair1];
        let (tokens2, txn2) = send(&receiver_pk, &pk, &sk, 20, &[token]).unwrap();
        let pair2 = (tokens2, txn2);
        assert!(!admit(&pending, &pair2, &chain));
    }

    #[test]
    fn admit_rejects_token_without_chain_provenance() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let receiver_sk = gen_priv_key().unwrap();
        let receiver_pk = pub_key_bytes(&receiver_sk).unwrap();

        let (token, _unminted_coinbase) = minted(&pk, 100);
        let empty_chain: Blockchain = vec![];
        let (tokens, txn) = send(&receiver_pk, &pk, &sk, 10, &[token]).unwrap();
        assert!(!admit(&[], &(tokens, txn), &empty_chain));
    }

    #[tokio::test]
    async fn ingress_loop_exits_cleanly_on_peer_close() {
        let (chain_tx, _chain_rx) = mpsc::channel(1);
        let empty = std::io::Cursor::new(Vec::<u8>::new());
        ingress_loop(empty, Arc::new(RwLock::new(Vec::new())), chain_tx).await;
    }

    async fn framed(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        protocol::write_frame(&mut buf, payload).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn ingress_loop_enqueues_a_valid_txn_frame() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let receiver_sk = gen_priv_key().unwrap();
        let receiver_pk = pub_key_bytes(&receiver_sk).unwrap();

        let (token, _coinbase) = minted(&pk, 100);
        let (tokens, txn) = send(&receiver_pk, &pk, &sk, 10, &[token]).unwrap();
        let body = serialize::pack_txn_pair(&tokens, &txn).unwrap();
        let wire = framed(&protocol::txn_payload(&body)).await;

        let (txn_tx, mut txn_rx) = mpsc::channel(1);
        let chain: SharedChain = Arc::new(RwLock::new(Vec::new()));
        ingress_loop(std::io::Cursor::new(wire), chain, txn_tx).await;

        let (got_tokens, got_txn) = txn_rx.try_recv().expect("valid txn pair forwarded");
        assert_eq!(got_txn, txn);
        assert_eq!(got_tokens, tokens);
    }

    #[tokio::test]
    async fn ingress_loop_drops_a_txn_frame_failing_valid_txn() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let receiver_sk = gen_priv_key().unwrap();
        let receiver_pk = pub_key_bytes(&receiver_sk).unwrap();

        let (token, _coinbase) = minted(&pk, 100);
        let (tokens, mut txn) = send(&receiver_pk, &pk, &sk, 10, &[token]).unwrap();
        txn.receiver_signature = vec![0u8; 4];
        let body = serialize::pack_txn_pair(&tokens, &txn).unwrap();
        let wire = framed(&protocol::txn_payload(&body)).await;

        let (txn_tx, mut txn_rx) = mpsc::channel(1);
        let chain: SharedChain = Arc::new(RwLock::new(Vec::new()));
        ingress_loop(std::io::Cursor::new(wire), chain, txn_tx).await;

        assert!(txn_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ingress_loop_replaces_chain_on_longer_valid_bloc_frame() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let (_, coinbase) = minted(&pk, 100);
        let (block, _) = block::gen_block(&GENESIS, vec![coinbase], 1, block::BLOCK_MAX_TXNS);
        let candidate = vec![block.unwrap()];
        let body = serialize::pack_blockchain(&candidate).unwrap();
        let wire = framed(&protocol::bloc_payload(&body)).await;

        let (txn_tx, _txn_rx) = mpsc::channel(1);
        let chain: SharedChain = Arc::new(RwLock::new(Vec::new()));
        ingress_loop(std::io::Cursor::new(wire), chain.clone(), txn_tx).await;

        let guard = chain.read().await;
        assert_eq!(*guard, candidate);
    }

    #[tokio::test]
    async fn ingress_loop_drops_bloc_frame_when_not_longer_or_invalid() {
        let sk = gen_priv_key().unwrap();
        let pk = pub_key_bytes(&sk).unwrap();
        let (_, coinbase) = minted(&pk, 100);
        let (block, _) = block::gen_block(&GENESIS, vec![coinbase], 1, block::BLOCK_MAX_TXNS);
        let existing = vec![block.unwrap()];

        let mut bad = existing.clone();
        bad[0].header.previous_hash = crate::hash::hash(b"not genesis");
        let body = serialize::pack_blockchain(&bad).unwrap();
        let wire = framed(&protocol::bloc_payload(&body)).await;

        let (txn_tx, _txn_rx) = mpsc::channel(1);
        let chain: SharedChain = Arc::new(RwLock::new(existing.clone()));
        ingress_loop(std::io::Cursor::new(wire), chain.clone(), txn_tx).await;

        let guard = chain.read().await;
        assert_eq!(*guard, existing);
    }
}
