//! Wire-Format fuer DHT-Verbindungen
//!
//! Ein libp2p-Stream erhaelt keine Schreibgrenzen. Jeder Chunk (Signaling-Frame
//! oder getunnelter Medien-Datenverkehr) wird deshalb in einen Laengen-Rahmen
//! gepackt. Die Klassifizierung erfolgt danach auf dem Payload.
//!
//! ## Rahmen-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Chunk-Groesse (1 MB)
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// ChunkCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer Chunks auf einer DHT-Verbindung
///
/// Liefert den rohen Payload; ob es sich um Signaling oder Tunnel-Daten
/// handelt, entscheidet [`crate::frame::Frame::klassifizieren`].
#[derive(Debug, Clone)]
pub struct ChunkCodec {
    max_chunk_size: usize,
}

impl ChunkCodec {
    pub fn new() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    /// Erstellt einen `ChunkCodec` mit benutzerdefinierter maximaler Groesse
    pub fn with_max_size(max_chunk_size: usize) -> Self {
        Self { max_chunk_size }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_chunk_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Chunk zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_chunk_size
                ),
            ));
        }

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_chunk_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Chunk zu gross: {} Bytes (Maximum: {} Bytes)",
                    item.len(),
                    self.max_chunk_size
                ),
            ));
        }

        dst.reserve(LENGTH_FIELD_SIZE + item.len());
        dst.put_u32(item.len() as u32);
        dst.put_slice(&item);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_codec_encode_decode() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(b"{not json"), &mut buf).unwrap();

        assert_eq!(buf.len(), LENGTH_FIELD_SIZE + 9);
        let decoded = codec.decode(&mut buf).unwrap().expect("Chunk erwartet");
        assert_eq!(&decoded[..], b"{not json");
        assert!(buf.is_empty());
    }

    #[test]
    fn chunk_codec_unvollstaendiger_chunk() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from(vec![1u8; 64]), &mut buf).unwrap();

        let mut partial = buf.split_to(20);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn chunk_codec_zu_wenig_bytes_fuer_laengenfeld() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::from(&[0x00, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn chunk_codec_ablehnung_zu_grosser_chunk() {
        let mut codec = ChunkCodec::with_max_size(100);

        let mut buf = BytesMut::new();
        buf.put_u32(200);
        buf.put_slice(&[b'x'; 200]);
        assert!(codec.decode(&mut buf).is_err());

        let mut out = BytesMut::new();
        assert!(codec.encode(Bytes::from(vec![0u8; 101]), &mut out).is_err());
    }

    #[test]
    fn chunk_codec_leerer_chunk() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Bytes::new(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().expect("Chunk erwartet");
        assert!(decoded.is_empty());
    }

    #[test]
    fn chunk_codec_mehrere_chunks_im_buffer() {
        let mut codec = ChunkCodec::new();
        let mut buf = BytesMut::new();

        for i in 0..3u8 {
            codec.encode(Bytes::from(vec![i; 3]), &mut buf).unwrap();
        }
        for i in 0..3u8 {
            let chunk = codec.decode(&mut buf).unwrap().expect("Chunk erwartet");
            assert_eq!(&chunk[..], &[i; 3]);
        }
        assert!(buf.is_empty());
    }
}
