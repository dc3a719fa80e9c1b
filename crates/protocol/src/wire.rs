//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Der Codec ist generisch ueber die Eingangs- und Ausgangsrichtung, so dass
//! Relay und Clients denselben Code verwenden.

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::io;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

use crate::events::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// `Ein` ist der Typ der dekodierten Frames, `Aus` der Typ der kodierten.
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use plauder_protocol::wire::ServerCodec;
///
/// // let stream = listener.accept().await?.0;
/// // let framed = Framed::new(stream, ServerCodec::new());
/// ```
pub struct FrameCodec<Ein, Aus> {
    max_frame_size: usize,
    _richtung: PhantomData<fn() -> (Ein, Aus)>,
}

/// Relay-Seite: liest Client-Events, schreibt Server-Events
pub type ServerCodec = FrameCodec<ClientEvent, ServerEvent>;

/// Client-Seite: liest Server-Events, schreibt Client-Events
pub type ClientCodec = FrameCodec<ServerEvent, ClientEvent>;

impl<Ein, Aus> FrameCodec<Ein, Aus> {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            _richtung: PhantomData,
        }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl<Ein, Aus> Default for FrameCodec<Ein, Aus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ein, Aus> Clone for FrameCodec<Ein, Aus> {
    fn clone(&self) -> Self {
        Self::with_max_size(self.max_frame_size)
    }
}

impl<Ein, Aus> std::fmt::Debug for FrameCodec<Ein, Aus> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCodec")
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

fn ungueltig(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein: DeserializeOwned, Aus> Decoder for FrameCodec<Ein, Aus> {
    type Item = Ein;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(ungueltig(format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                length, self.max_frame_size
            )));
        }

        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        let payload = src.split_to(length);

        serde_json::from_slice(&payload)
            .map(Some)
            .map_err(|e| ungueltig(format!("JSON-Deserialisierung fehlgeschlagen: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl<Ein, Aus: Serialize> Encoder<Aus> for FrameCodec<Ein, Aus> {
    type Error = io::Error;

    fn encode(&mut self, item: Aus, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(&item)
            .map_err(|e| ungueltig(format!("JSON-Serialisierung fehlgeschlagen: {e}")))?;

        if json.len() > self.max_frame_size {
            return Err(ungueltig(format!(
                "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                json.len(),
                self.max_frame_size
            )));
        }

        dst.reserve(LENGTH_FIELD_SIZE + json.len());
        dst.put_u32(json.len() as u32);
        dst.put_slice(&json);

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
