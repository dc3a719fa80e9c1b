//! plauder-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Events die zwischen Client und Relay
//! ausgetauscht werden, sowie das Frame-Format der TCP-Verbindung.

pub mod events;
pub mod wire;

pub use events::{ClientEvent, ServerEvent, ZielAngabe};
pub use wire::{ClientCodec, FrameCodec, ServerCodec};
