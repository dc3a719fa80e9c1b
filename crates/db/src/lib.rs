//! plauder-db – Persistenz fuer Nachrichten, Anrufe und Presence
//!
//! Die Repository-Traits beschreiben was der Relay von einem Speicher
//! erwartet. `SqliteDb` ist die Standard-Implementierung. Schreibzugriffe
//! sind fuer den Relay best-effort: Fehler werden geloggt, nie weitergereicht.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{CallStore, DatabaseConfig, DbResult, MessageStore, PresenceStore};
pub use sqlite::SqliteDb;
