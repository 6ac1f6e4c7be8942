//! Relay-facing transport glue, per spec.md §4.7 and §6.
//!
//! `obscura-core` stays transport-agnostic (`core::node::run_with_io`
//! takes any `AsyncRead`/`AsyncWrite` pair); this crate is the one place
//! that opens the actual TCP connection to the relay and performs the
//! subscription handshake, so the three relay-facing binaries (node,
//! oracle, listener) share one connection setup instead of each
//! reimplementing it.
//!
//! The teacher crate reached for `libp2p` here for a gossip/DHT mesh;
//! spec.md's relay is a single bespoke length-prefixed TCP protocol with
//! no peer discovery, so `libp2p` is dropped in favor of bare `tokio`
//! (see DESIGN.md).

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use obscura_core::error::Result;
use obscura_core::protocol;

/// A framed, subscribed connection to the relay.
pub struct RelayConnection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl RelayConnection {
    /// Connects to `host:port` and sends the subscription handshake:
    /// `channel`'s UTF-8 bytes as the first frame (spec.md §4.7).
    pub async fn connect(host: &str, port: u16, channel: &str) -> Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        let (reader, mut writer) = stream.into_split();
        protocol::write_frame(&mut writer, channel.as_bytes()).await?;
        Ok(Self { reader, writer })
    }

    /// Publishes `payload` on `channel`: two back-to-back frames, channel
    /// name then payload, per spec.md §4.7. Must not be called
    /// concurrently with another publish on the same connection.
    pub async fn publish(&mut self, channel: &str, payload: &[u8]) -> Result<()> {
        protocol::write_frame(&mut self.writer, channel.as_bytes()).await?;
        protocol::write_frame(&mut self.writer, payload).await
    }

    /// Reads the next frame published by another peer on a subscribed
    /// channel.
    pub async fn recv(&mut self) -> Result<Vec<u8>> {
        protocol::read_frame(&mut self.reader).await
    }

    /// Splits the connection into its read and write halves so the
    /// read half can be handed to `core::node::run_with_io` and the
    /// write half to its publish-queue drain task.
    pub fn into_split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        (self.reader, self.writer)
    }

    /// Flushes and closes the write half.
    pub async fn shutdown(mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obscura_core::protocol::{bloc_payload, read_frame};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_sends_channel_as_first_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_frame(&mut socket).await.unwrap()
        });

        let _conn = RelayConnection::connect("127.0.0.1", addr.port(), "my-channel")
            .await
            .unwrap();

        let first_frame = server.await.unwrap();
        assert_eq!(first_frame, b"my-channel");
    }

    #[tokio::test]
    async fn publish_sends_channel_then_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let subscribe = read_frame(&mut socket).await.unwrap();
            let channel = read_frame(&mut socket).await.unwrap();
            let payload = read_frame(&mut socket).await.unwrap();
            (subscribe, channel, payload)
        });

        let mut conn = RelayConnection::connect("127.0.0.1", addr.port(), "chan")
            .await
            .unwrap();
        let body = bloc_payload(b"[]");
        conn.publish("chan", &body).await.unwrap();

        let (subscribe, channel, payload) = server.await.unwrap();
        assert_eq!(subscribe, b"chan");
        assert_eq!(channel, b"chan");
        assert_eq!(payload, body);
    }
}
