//! plauder-signaling – Presence, Chat-Relay und Anruf-Signaling
//!
//! Dieser Crate haelt die Zuordnung von Benutzern zu Verbindungen, die
//! Zustandsmaschine der Anrufe und die Regeln, nach denen Events zwischen
//! zwei unabhaengigen Verbindungen weitergereicht werden.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task, Keepalive, FrameCodec)
//!     |  HubBefehl
//!     v
//! SignalingHub (ein Task, besitzt den gesamten Zustand)
//!     |
//!     +-- SignalingRouter
//!     |       +-- ConnectionRegistry  (UserId <-> ConnectionId)
//!     |       +-- CallSessionTable    (laufende Anrufe)
//!     |       +-- PresenceBroadcaster (Online/Offline-Meldungen)
//!     +-- EventBroadcaster (Send-Queues der Verbindungen)
//!     +-- Persistenz-Worker (Schreibauftraege in Reihenfolge)
//! ```

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod persistence;
pub mod presence;
pub mod registry;
pub mod router;
pub mod session;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use config::SignalingConfig;
pub use connection::ClientConnection;
pub use error::{SignalingError, SignalingResult};
pub use hub::{HubBefehl, HubHandle, SignalingHub};
pub use presence::PresenceBroadcaster;
pub use registry::ConnectionRegistry;
pub use router::{Ausgang, SignalingRouter, SpeicherAuftrag};
pub use session::{CallSession, CallSessionTable};
pub use tcp::SignalingServer;
