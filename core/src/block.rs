//! Blocks, proof-of-work, and chain validation, per spec.md §3 and §4.4.

use once_cell::sync::Lazy;

use crate::hash;
use crate::merkle::MerkleTree;
use crate::transaction::{self, Token, Transaction};
use crate::utils;
use crate::Hash;

/// Per-block transaction cap (spec.md §6).
pub const BLOCK_MAX_TXNS: usize = 10;

/// The fixed previous-hash of block 0: `SHA-512(b"genesis")`.
pub static GENESIS: Lazy<Hash> = Lazy::new(|| hash::hash(b"genesis"));

/// A block header. `timestamp` and `nonce` are carried as their
/// ASCII-decimal byte strings (the exact bytes hashed into `this_hash`)
/// rather than as integers, so that `valid_header` can recompute the hash
/// without reserializing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub timestamp: Vec<u8>,
    pub previous_hash: Hash,
    pub nonce: Vec<u8>,
    pub merkle_root: Vec<u8>,
    pub this_hash: Hash,
}

/// A header plus its ordered transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub txns: Vec<Transaction>,
}

/// An ordered sequence of blocks, oldest first.
pub type Blockchain = Vec<Block>;

/// Difficulty schedule: the number of leading zero bytes `this_hash` of
/// block `n` must have. `difficulty(n) = 1` for `n < 1`, otherwise
/// `1 + floor(log2(n))`.
pub fn next_difficulty(n: u64) -> u32 {
    if n < 1 {
        1
    } else {
        1 + n.ilog2()
    }
}

/// True iff the first `n` bytes of `h` are all zero. `n == 0` is
/// vacuously true; `h` shorter than `n` bytes is false.
pub fn solved(h: &[u8], n: usize) -> bool {
    if n == 0 {
        return true;
    }
    if h.len() < n {
        return false;
    }
    h[..n].iter().all(|&b| b == 0)
}

fn header_bytes(timestamp: &[u8], previous_hash: &Hash, nonce: &[u8], merkle_root: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(timestamp.len() + 64 + nonce.len() + merkle_root.len());
    buf.extend_from_slice(timestamp);
    buf.extend_from_slice(previous_hash);
    buf.extend_from_slice(nonce);
    buf.extend_from_slice(merkle_root);
    buf
}

/// Serial nonce-search solver. Samples the timestamp once, then
/// increments the nonce until `this_hash` has `difficulty` leading zero
/// bytes. Pure given its inputs, so safe to offload to a blocking task.
pub fn proof_of_work(previous_hash: &Hash, merkle_root: &[u8], difficulty: usize) -> BlockHeader {
    let timestamp = utils::ascii_decimal(utils::timestamp()).into_bytes();
    let mut nonce: u64 = 0;
    loop {
        let nonce_bytes = utils::ascii_decimal(nonce).into_bytes();
        let this_hash = hash::hash(&header_bytes(&timestamp, previous_hash, &nonce_bytes, merkle_root));
        if solved(&this_hash, difficulty) {
            return BlockHeader {
                timestamp,
                previous_hash: *previous_hash,
                nonce: nonce_bytes,
                merkle_root: merkle_root.to_vec(),
                this_hash,
            };
        }
        nonce += 1;
    }
}

/// Recomputes `SHA-512(timestamp || previous_hash || nonce || merkle_root)`
/// and checks it equals `this_hash` and has `difficulty` leading zero bytes.
pub fn valid_header(header: &BlockHeader, difficulty: usize) -> bool {
    let expect = hash::hash(&header_bytes(
        &header.timestamp,
        &header.previous_hash,
        &header.nonce,
        &header.merkle_root,
    ));
    expect == header.this_hash && solved(&header.this_hash, difficulty)
}

/// True iff `header` is valid at `difficulty` AND the Merkle root over
/// `[hash_txn(t) for t in block.txns]` equals `header.merkle_root`.
pub fn valid_block(block: &Block, difficulty: usize) -> bool {
    if !valid_header(&block.header, difficulty) {
        return false;
    }
    let leaves: Vec<Hash> = block.txns.iter().map(transaction::hash_txn).collect();
    let Some(tree) = MerkleTree::from_list(&leaves) else {
        return false;
    };
    tree.label() == block.header.merkle_root.as_slice()
}

/// Takes the first `max_txns` of `txns` (callers pass
/// [`BLOCK_MAX_TXNS`] or a configured cap, e.g. `Config::block_max_txns`),
/// mines a block over their hashes against `previous_hash` at
/// `difficulty`, and returns it along with the untouched remainder.
/// Returns `(None, txns)` if `txns` is empty.
pub fn gen_block(
    previous_hash: &Hash,
    txns: Vec<Transaction>,
    difficulty: usize,
    max_txns: usize,
) -> (Option<Block>, Vec<Transaction>) {
    if txns.is_empty() {
        return (None, txns);
    }
    let split_at = max_txns.min(txns.len());
    let mut remainder = txns;
    let included: Vec<Transaction> = remainder.drain(..split_at).collect();

    let leaves: Vec<Hash> = included.iter().map(transaction::hash_txn).collect();
    let tree = MerkleTree::from_list(&leaves).expect("included is non-empty");
    let header = proof_of_work(previous_hash, tree.label(), difficulty);

    let block = Block {
        header,
        txns: included,
    };
    (Some(block), remainder)
}

/// Chain validity predicate (spec.md §3, §4.4): non-empty,
/// `chain[0].previous_hash == GENESIS`, each adjacent pair links by hash
/// with strictly increasing timestamps, and each block is valid at its
/// index's difficulty.
pub fn valid_blockchain(chain: &Blockchain) -> bool {
    let Some(first) = chain.first() else {
        return false;
    };
    if first.header.previous_hash != *GENESIS {
        return false;
    }
    for (i, block) in chain.iter().enumerate() {
        if !valid_block(block, next_difficulty(i as u64) as usize) {
            return false;
        }
        if i > 0 {
            let prev = &chain[i - 1];
            if block.header.previous_hash != prev.header.this_hash {
                return false;
            }
            if timestamp_value(&block.header.timestamp) <= timestamp_value(&prev.header.timestamp) {
                return false;
            }
        }
    }
    true
}

fn timestamp_value(bytes: &[u8]) -> u64 {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Anti-double-spend mint check: `unique_tokens(tokens)` AND every token
/// has a provenance somewhere in `chain` (some block's transaction `t`
/// with `valid_token(t, token)`). Scans newest-to-oldest for locality.
pub fn valid_tokens(tokens: &[Token], chain: &Blockchain) -> bool {
    if !transaction::unique_tokens(tokens) {
        return false;
    }
    tokens.iter().all(|token| {
        chain
            .iter()
            .rev()
            .any(|block| block.txns.iter().any(|t| transaction::valid_token(t, token)))
    })
}
