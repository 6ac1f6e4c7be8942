//! Client-side wallet bookkeeping, per spec.md §4.3 and the "Wallet
//! round-trip" property in §8.
//!
//! A wallet holds an RSA keypair and a FIFO-ordered set of owned
//! [`Token`]s. Spending is two-phase: `send` selects just enough tokens
//! to cover the requested amount (oldest first), moves them into a
//! pending entry keyed by the resulting transaction's hash, and returns
//! the transaction pair for broadcast. The caller must later call either
//! `confirm_send` (the transaction was mined) or `reject_send` (it was
//! dropped), which respectively discards or restores the pending tokens.
//! This mirrors the reference wallet's own two-phase pending design.

use obscura_core::error::Result;
use obscura_core::signature::{self, Address};
use obscura_core::transaction::{self, Token, Transaction};
use obscura_core::Hash;
use rsa::RsaPrivateKey;

/// A client-side wallet: one keypair, a spendable token set, and the
/// in-flight spends awaiting confirmation.
pub struct Wallet {
    priv_key: RsaPrivateKey,
    address: Address,
    tokens: Vec<Token>,
    pending: Vec<(Hash, Vec<Token>)>,
}

impl Wallet {
    /// Generates a fresh keypair and an empty wallet.
    pub fn new() -> Result<Self> {
        let priv_key = signature::gen_priv_key()?;
        let address = signature::pub_key_bytes(&priv_key)?;
        Ok(Self {
            priv_key,
            address,
            tokens: Vec::new(),
            pending: Vec::new(),
        })
    }

    /// This wallet's on-chain address (PEM-encoded public key).
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Sum of the value of tokens currently spendable. Tokens awaiting
    /// confirmation of a prior send are excluded.
    pub fn balance(&self) -> u64 {
        self.tokens.iter().map(|t| t.value).sum()
    }

    /// Attempts to send `send_value` to `receiver`. Selects tokens
    /// oldest-first until their sum covers `send_value`, moves them into
    /// the pending set, and returns the `(tokens, txn)` pair ready for
    /// broadcast. Returns `None` if the balance is insufficient.
    pub fn send(&mut self, receiver: &Address, send_value: u64) -> Result<Option<(Vec<Token>, Transaction)>> {
        if send_value > self.balance() {
            return Ok(None);
        }

        let mut sum = 0u64;
        let mut count = 0usize;
        while sum < send_value {
            sum += self.tokens[count].value;
            count += 1;
        }
        let spent: Vec<Token> = self.tokens.drain(..count).collect();

        let Some((tokens, txn)) = transaction::send(receiver, &self.address, &self.priv_key, send_value, &spent)
        else {
            // Shouldn't happen given the balance check above, but restore
            // the tokens rather than lose them silently.
            self.tokens.splice(0..0, spent);
            return Ok(None);
        };

        let txn_hash = transaction::hash_txn(&txn);
        self.pending.push((txn_hash, spent));
        Ok(Some((tokens, txn)))
    }

    /// Discards a pending send once its transaction has been mined.
    pub fn confirm_send(&mut self, txn_hash: &Hash) {
        self.pending.retain(|(h, _)| h != txn_hash);
    }

    /// Returns a pending send's tokens to the spendable set because its
    /// transaction was dropped rather than mined.
    pub fn reject_send(&mut self, txn_hash: &Hash) {
        let mut restored = Vec::new();
        self.pending.retain(|(h, tokens)| {
            if h == txn_hash {
                restored.extend(tokens.iter().cloned());
                false
            } else {
                true
            }
        });
        self.tokens.splice(0..0, restored);
    }

    /// Adds the token this wallet derives from `txn`: the receiver
    /// token if this wallet is the receiver, the change token if it is
    /// the sender. No-op if this wallet is neither party.
    pub fn receive(&mut self, txn: &Transaction) {
        let txn_hash = transaction::hash_txn(txn);
        if self.address == txn.receiver {
            self.tokens.push(Token {
                txn_hash,
                owner: self.address.clone(),
                value: txn.receiver_value,
                signature: txn.receiver_signature.clone(),
            });
        } else if self.address == txn.sender {
            self.tokens.push(Token {
                txn_hash,
                owner: self.address.clone(),
                value: txn.sender_change,
                signature: txn.sender_signature.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_core::transaction::COINBASE_SENDER;

    fn coinbase(receiver: &Address, value: u64) -> Transaction {
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

    #[test]
    fn genesis_pair_conserves_value_across_send_and_receive() {
        let mut a = Wallet::new().unwrap();
        let mut b = Wallet::new().unwrap();

        let txn0 = coinbase(a.address(), 100);
        a.receive(&txn0);
        assert_eq!(a.balance(), 100);

        let (_, txn1) = a.send(b.address(), 50).unwrap().unwrap();
        assert_eq!(txn1.receiver_value + txn1.sender_change, 100);

        let txn_hash = transaction::hash_txn(&txn1);
        a.confirm_send(&txn_hash);
        a.receive(&txn1);
        b.receive(&txn1);

        assert_eq!(a.balance(), 50);
        assert_eq!(b.balance(), 50);
        assert_eq!(a.balance() + b.balance(), 100);
    }

    #[test]
    fn insufficient_balance_yields_none() {
        let mut a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        let txn0 = coinbase(a.address(), 10);
        a.receive(&txn0);
        assert!(a.send(b.address(), 20).unwrap().is_none());
    }

    #[test]
    fn reject_send_restores_balance() {
        let mut a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        let txn0 = coinbase(a.address(), 100);
        a.receive(&txn0);

        let (_, txn1) = a.send(b.address(), 40).unwrap().unwrap();
        assert_eq!(a.balance(), 0);

        let txn_hash = transaction::hash_txn(&txn1);
        a.reject_send(&txn_hash);
        assert_eq!(a.balance(), 100);
    }

    #[test]
    fn confirm_send_is_idempotent_and_leaves_balance_untouched() {
        let mut a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        let txn0 = coinbase(a.address(), 100);
        a.receive(&txn0);

        let (_, txn1) = a.send(b.address(), 40).unwrap().unwrap();
        let txn_hash = transaction::hash_txn(&txn1);
        a.confirm_send(&txn_hash);
        a.confirm_send(&txn_hash);
        assert_eq!(a.balance(), 0);
    }
}
