//! Wire framing and relay envelope constants, per spec.md §4.7 and §6.
//!
//! Every message on every link is 4 bytes of big-endian unsigned length
//! `N` followed by exactly `N` bytes of payload. Readers use
//! read-exactly semantics; a short read is fatal and surfaces as
//! [`crate::Error::IncompleteRead`].

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// Tag prefixing a transaction-pair payload.
pub const TAG_TXN: &[u8; 4] = b"TXN ";

/// Tag prefixing a blockchain payload.
pub const TAG_BLOC: &[u8; 4] = b"BLOC";

/// Reads one length-prefixed frame from `reader`. A closed connection
/// before the length or the full payload is read surfaces as
/// [`Error::IncompleteRead`].
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(Error::IncompleteRead),
        Err(e) => return Err(Error::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(payload),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::IncompleteRead),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Writes one length-prefixed frame to `writer` and flushes it.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::Other("frame payload exceeds u32::MAX"))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Builds the payload for a "TXN " publish: `TAG_TXN || json_body`.
pub fn txn_payload(json_body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + json_body.len());
    buf.extend_from_slice(TAG_TXN);
    buf.extend_from_slice(json_body);
    buf
}

/// Builds the payload for a "BLOC" publish: `TAG_BLOC || json_body`.
pub fn bloc_payload(json_body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + json_body.len());
    buf.extend_from_slice(TAG_BLOC);
    buf.extend_from_slice(json_body);
    buf
}
