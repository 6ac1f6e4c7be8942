//! Canonical wire form: base64-inside-JSON, per spec.md §6.
//!
//! Every byte field (digests, addresses, signatures) is standard-alphabet
//! base64 with padding; integers are plain JSON numbers. `pack` then
//! `unpack` must round-trip exactly: the raw bytes feeding transaction
//! and block hashes must be recoverable byte-for-byte, so this module
//! never re-derives a hash, only carries bytes through.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockHeader, Blockchain};
use crate::error::{Error, Result};
use crate::transaction::{Token, Transaction};
use crate::Hash;

fn encode(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

fn decode(s: &str) -> Result<Vec<u8>> {
    Ok(B64.decode(s)?)
}

fn decode_hash(s: &str) -> Result<Hash> {
    let bytes = decode(s)?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::BadDigestLen(v.len()))
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToken {
    txn_hash: String,
    owner: String,
    value: u64,
    signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTransaction {
    previous_hashes: Vec<String>,
    receiver: String,
    receiver_value: u64,
    receiver_signature: String,
    sender: String,
    sender_change: u64,
    sender_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireHeader {
    timestamp: String,
    previous_hash: String,
    nonce: String,
    merkle_root: String,
    this_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireBlock {
    header: WireHeader,
    txns: Vec<WireTransaction>,
}

fn to_wire_token(t: &Token) -> WireToken {
    WireToken {
        txn_hash: encode(&t.txn_hash),
        owner: encode(&t.owner),
        value: t.value,
        signature: encode(&t.signature),
    }
}

fn from_wire_token(w: WireToken) -> Result<Token> {
    Ok(Token {
        txn_hash: decode_hash(&w.txn_hash)?,
        owner: decode(&w.owner)?,
        value: w.value,
        signature: decode(&w.signature)?,
    })
}

fn to_wire_txn(t: &Transaction) -> WireTransaction {
    WireTransaction {
        previous_hashes: t.previous_hashes.iter().map(|h| encode(h)).collect(),
        receiver: encode(&t.receiver),
        receiver_value: t.receiver_value,
        receiver_signature: encode(&t.receiver_signature),
        sender: encode(&t.sender),
        sender_change: t.sender_change,
        sender_signature: encode(&t.sender_signature),
    }
}

fn from_wire_txn(w: WireTransaction) -> Result<Transaction> {
    let mut previous_hashes = Vec::with_capacity(w.previous_hashes.len());
    for h in &w.previous_hashes {
        previous_hashes.push(decode_hash(h)?);
    }
    Ok(Transaction {
        previous_hashes,
        receiver: decode(&w.receiver)?,
        receiver_value: w.receiver_value,
        receiver_signature: decode(&w.receiver_signature)?,
        sender: decode(&w.sender)?,
        sender_change: w.sender_change,
        sender_signature: decode(&w.sender_signature)?,
    })
}

fn to_wire_header(h: &BlockHeader) -> WireHeader {
    WireHeader {
        timestamp: encode(&h.timestamp),
        previous_hash: encode(&h.previous_hash),
        nonce: encode(&h.nonce),
        merkle_root: encode(&h.merkle_root),
        this_hash: encode(&h.this_hash),
    }
}

fn from_wire_header(w: WireHeader) -> Result<BlockHeader> {
    Ok(BlockHeader {
        timestamp: decode(&w.timestamp)?,
        previous_hash: decode_hash(&w.previous_hash)?,
        nonce: decode(&w.nonce)?,
        merkle_root: decode(&w.merkle_root)?,
        this_hash: decode_hash(&w.this_hash)?,
    })
}

fn to_wire_block(b: &Block) -> WireBlock {
    WireBlock {
        header: to_wire_header(&b.header),
        txns: b.txns.iter().map(to_wire_txn).collect(),
    }
}

fn from_wire_block(w: WireBlock) -> Result<Block> {
    let mut txns = Vec::with_capacity(w.txns.len());
    for t in w.txns {
        txns.push(from_wire_txn(t)?);
    }
    Ok(Block {
        header: from_wire_header(w.header)?,
        txns,
    })
}

/// Serializes a single [`Token`] as UTF-8 JSON.
pub fn pack_token(token: &Token) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&to_wire_token(token))?)
}

/// Parses a single [`Token`] from UTF-8 JSON.
pub fn unpack_token(bytes: &[u8]) -> Result<Token> {
    let wire: WireToken = serde_json::from_slice(bytes)?;
    from_wire_token(wire)
}

/// Serializes a single [`Transaction`] as UTF-8 JSON.
pub fn pack_txn(txn: &Transaction) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&to_wire_txn(txn))?)
}

/// Parses a single [`Transaction`] from UTF-8 JSON.
pub fn unpack_txn(bytes: &[u8]) -> Result<Transaction> {
    let wire: WireTransaction = serde_json::from_slice(bytes)?;
    from_wire_txn(wire)
}

/// Serializes a `(tokens, txn)` pair as the 2-element JSON array that is
/// the "TXN " payload body (spec.md §6).
pub fn pack_txn_pair(tokens: &[Token], txn: &Transaction) -> Result<Vec<u8>> {
    let wire_tokens: Vec<WireToken> = tokens.iter().map(to_wire_token).collect();
    let wire_txn = to_wire_txn(txn);
    Ok(serde_json::to_vec(&(wire_tokens, wire_txn))?)
}

/// Parses a `(tokens, txn)` pair from its "TXN " payload body.
pub fn unpack_txn_pair(bytes: &[u8]) -> Result<(Vec<Token>, Transaction)> {
    let (wire_tokens, wire_txn): (Vec<WireToken>, WireTransaction) = serde_json::from_slice(bytes)?;
    let mut tokens = Vec::with_capacity(wire_tokens.len());
    for t in wire_tokens {
        tokens.push(from_wire_token(t)?);
    }
    Ok((tokens, from_wire_txn(wire_txn)?))
}

/// Serializes a single [`Block`] as UTF-8 JSON.
pub fn pack_block(block: &Block) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&to_wire_block(block))?)
}

/// Parses a single [`Block`] from UTF-8 JSON.
pub fn unpack_block(bytes: &[u8]) -> Result<Block> {
    let wire: WireBlock = serde_json::from_slice(bytes)?;
    from_wire_block(wire)
}

/// Serializes a [`Blockchain`] as the UTF-8 JSON array body of a "BLOC"
/// payload.
pub fn pack_blockchain(chain: &Blockchain) -> Result<Vec<u8>> {
    let wire: Vec<WireBlock> = chain.iter().map(to_wire_block).collect();
    Ok(serde_json::to_vec(&wire)?)
}

/// Parses a [`Blockchain`] from its "BLOC" payload body.
pub fn unpack_blockchain(bytes: &[u8]) -> Result<Blockchain> {
    let wire: Vec<WireBlock> = serde_json::from_slice(bytes)?;
    wire.into_iter().map(from_wire_block).collect()
}
