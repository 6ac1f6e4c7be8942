//! Error types for the **obscura** core crate.
//!
//! All high-level operations return [`crate::Result`], a convenient alias
//! for `core::result::Result<T, Error>`. The variants follow the error
//! taxonomy of spec.md §7: decode errors (bad framing, non-UTF8, non-JSON,
//! base64 failure, schema mismatch), validation errors, and transport
//! errors. Lower-level library errors are mapped into one of these variants
//! before bubbling up to callers.

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// RSA key generation, signing, or verification failed at the library level.
    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::Error),

    /// PEM/SubjectPublicKeyInfo (de)serialization of an [`Address`](crate::signature::Address) failed.
    #[error("pkcs8 spki error: {0}")]
    Spki(#[from] rsa::pkcs8::spki::Error),

    /// An address or channel name was not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A base64-encoded byte field on the wire failed to decode.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A JSON wire payload was malformed or did not match the expected schema.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A digest field decoded to a length other than 64 bytes.
    #[error("invalid digest length: expected 64 bytes, got {0}")]
    BadDigestLen(usize),

    /// A framed read ended before the declared payload length was consumed.
    #[error("incomplete read: peer closed the connection")]
    IncompleteRead,

    /// Transport-level I/O failure (closed socket, broken pipe, ...).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for conditions that don't warrant a dedicated variant.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
