//! RSA keypairs and PSS signatures, per spec.md §4.2.
//!
//! Keys are RSA-2048. Signatures use PSS with SHA-512 and MGF1(SHA-512) at
//! maximum salt length. An on-chain [`Address`] is the PEM-encoded
//! SubjectPublicKeyInfo bytes of a public key; the node never interprets an
//! address beyond using it to verify a signature.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::pss::Pss;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;

use crate::error::Result;
use crate::hash;

/// PEM-encoded RSA public key bytes (the on-chain identity).
pub type Address = Vec<u8>;

/// Raw RSA-PSS signature bytes.
pub type Signature = Vec<u8>;

/// RSA modulus size used for all keys minted by this implementation.
pub const KEY_BITS: usize = 2048;

/// SHA-512 digest length in bytes.
const DIGEST_LEN: usize = 64;

/// Generates a fresh RSA-2048 keypair.
pub fn gen_priv_key() -> Result<RsaPrivateKey> {
    Ok(RsaPrivateKey::new(&mut OsRng, KEY_BITS)?)
}

/// Derives the public key.
pub fn get_pub_key(priv_key: &RsaPrivateKey) -> RsaPublicKey {
    RsaPublicKey::from(priv_key)
}

/// Serializes the public half of `priv_key` as a PEM SubjectPublicKeyInfo,
/// the on-chain [`Address`] form.
pub fn pub_key_bytes(priv_key: &RsaPrivateKey) -> Result<Address> {
    let pub_key = get_pub_key(priv_key);
    let pem = pub_key.to_public_key_pem(LineEnding::LF)?;
    Ok(pem.into_bytes())
}

/// Parses a PEM-encoded RSA public key from its on-chain byte form.
pub fn load_pub_key(bytes: &[u8]) -> Result<RsaPublicKey> {
    let pem = std::str::from_utf8(bytes)?;
    Ok(RsaPublicKey::from_public_key_pem(pem)?)
}

/// PSS padding at maximum salt length for a key of `key_size_bytes`.
fn padding(key_size_bytes: usize) -> Pss {
    let salt_len = key_size_bytes.saturating_sub(DIGEST_LEN + 2);
    Pss::new_with_salt::<Sha512>(salt_len)
}

/// Signs `msg` with `priv_key` using RSA-PSS(SHA-512, MGF1, max salt).
pub fn sign(priv_key: &RsaPrivateKey, msg: &[u8]) -> Result<Signature> {
    let digest = hash::hash(msg);
    let sig = priv_key.sign_with_rng(&mut OsRng, padding(priv_key.size()), &digest)?;
    Ok(sig)
}

/// Verifies `signature` over `msg` against `pub_key`. Returns `false` on any
/// failure; the only success path is a clean verification, matching the
/// reference implementation's catch-all exception handling.
pub fn verify(signature: &[u8], pub_key: &RsaPublicKey, msg: &[u8]) -> bool {
    let digest = hash::hash(msg);
    pub_key
        .verify(padding(pub_key.size()), &digest, signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let sk = gen_priv_key().unwrap();
        let pk = get_pub_key(&sk);
        let sig = sign(&sk, b"hello").unwrap();
        assert!(verify(&sig, &pk, b"hello"));
    }

    #[test]
    fn mutated_signature_byte_fails() {
        let sk = gen_priv_key().unwrap();
        let pk = get_pub_key(&sk);
        let mut sig = sign(&sk, b"hello").unwrap();
        sig[0] ^= 0xFF;
        assert!(!verify(&sig, &pk, b"hello"));
    }

    #[test]
    fn mutated_message_fails() {
        let sk = gen_priv_key().unwrap();
        let pk = get_pub_key(&sk);
        let sig = sign(&sk, b"hello").unwrap();
        assert!(!verify(&sig, &pk, b"hellp"));
    }

    #[test]
    fn pem_round_trips_through_bytes() {
        let sk = gen_priv_key().unwrap();
        let bytes = pub_key_bytes(&sk).unwrap();
        let pk = load_pub_key(&bytes).unwrap();
        assert_eq!(pk, get_pub_key(&sk));
    }
}
