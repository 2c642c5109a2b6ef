//! Verschluesselte Verbindung zu genau einem Peer
//!
//! Ein geordneter, zuverlaessiger Byte-Stream mit Chunk-Rahmen. Wird per
//! `dial()` oder ueber eingehende Streams erzeugt und gehoert danach genau
//! einer Session.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::io;

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use nostrrtc_core::TransportPublicKey;
use nostrrtc_protocol::ChunkCodec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;

/// Jeder asynchrone Byte-Stream kann eine Verbindung tragen
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> ByteStream for T {}

pub struct Connection {
    remote: TransportPublicKey,
    inner: Framed<Box<dyn ByteStream>, ChunkCodec>,
}

impl Connection {
    /// Umhuellt einen Byte-Stream zum Peer `remote`
    ///
    /// `remote` muss vom Transport authentifiziert sein.
    pub fn neu<S: ByteStream>(remote: TransportPublicKey, io: S) -> Self {
        let io: Box<dyn ByteStream> = Box::new(io);
        Self {
            remote,
            inner: Framed::new(io, ChunkCodec::new()),
        }
    }

    /// Transport-Schluessel der Gegenseite
    pub fn remote(&self) -> TransportPublicKey {
        self.remote
    }

    /// Sendet einen Chunk (in Reihenfolge)
    pub async fn senden(&mut self, chunk: Bytes) -> io::Result<()> {
        self.inner.send(chunk).await
    }

    /// Naechster Chunk; `None` bei Ende des Streams
    pub async fn empfangen(&mut self) -> Option<io::Result<Bytes>> {
        self.inner.next().await
    }

    /// Halb-Schliessen: ausstehende Daten flushen, Schreibseite beenden
    pub async fn schliessen(&mut self) -> io::Result<()> {
        SinkExt::<Bytes>::close(&mut self.inner).await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl Stream for Connection {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

impl Sink<Bytes> for Connection {
    type Error = io::Error;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready_unpin(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        self.inner.start_send_unpin(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_flush_unpin(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_close_unpin(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_kommen_geordnet_an() {
        let (a, b) = tokio::io::duplex(1024);
        let mut links = Connection::neu(TransportPublicKey([1; 32]), a);
        let mut rechts = Connection::neu(TransportPublicKey([2; 32]), b);

        links.senden(Bytes::from_static(b"eins")).await.unwrap();
        links.senden(Bytes::from_static(b"zwei")).await.unwrap();

        assert_eq!(&rechts.empfangen().await.unwrap().unwrap()[..], b"eins");
        assert_eq!(&rechts.empfangen().await.unwrap().unwrap()[..], b"zwei");
        assert_eq!(rechts.remote(), TransportPublicKey([2; 32]));
    }

    #[tokio::test]
    async fn halb_schliessen_beendet_gegenseite() {
        let (a, b) = tokio::io::duplex(1024);
        let mut links = Connection::neu(TransportPublicKey([1; 32]), a);
        let mut rechts = Connection::neu(TransportPublicKey([2; 32]), b);

        links.schliessen().await.unwrap();
        assert!(rechts.empfangen().await.is_none());
    }
}
