//! Repository-Trait-Definitionen
//!
//! Die Traits entkoppeln den Relay von der konkreten Datenbank. Alle
//! Futures sind `Send`, damit Schreibauftraege in eigenen Tasks laufen
//! koennen. Implementierungen duerfen `async fn` verwenden.

use std::future::Future;

use plauder_core::types::{CallId, UserId};

use crate::error::DbError;
use crate::models::{AnrufRecord, AnrufUpdate, NachrichtRecord, NeueNachricht, NeuerAnruf};

/// Result-Alias fuer Datenbankoperationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://plauder.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://plauder.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Speicher fuer Chat-Nachrichten
pub trait MessageStore: Send + Sync {
    /// Speichert eine Nachricht
    fn save(&self, data: NeueNachricht) -> impl Future<Output = DbResult<NachrichtRecord>> + Send;

    /// Laedt den Verlauf zwischen zwei Benutzern (beide Richtungen, aelteste zuerst)
    fn conversation(
        &self,
        a: &UserId,
        b: &UserId,
        limit: i64,
    ) -> impl Future<Output = DbResult<Vec<NachrichtRecord>>> + Send;
}

/// Speicher fuer Anruf-Historie
pub trait CallStore: Send + Sync {
    /// Legt einen Anruf-Datensatz an
    fn create(&self, data: NeuerAnruf) -> impl Future<Output = DbResult<AnrufRecord>> + Send;

    /// Aktualisiert Status und Zeiten eines Anrufs
    fn update(
        &self,
        id: CallId,
        update: AnrufUpdate,
    ) -> impl Future<Output = DbResult<AnrufRecord>> + Send;

    /// Laedt alle Anrufe eines Benutzers als Anrufer oder Angerufener (neueste zuerst)
    fn history(
        &self,
        user_id: &UserId,
        limit: i64,
    ) -> impl Future<Output = DbResult<Vec<AnrufRecord>>> + Send;
}

/// Speicher fuer den zuletzt bekannten Online-Status
pub trait PresenceStore: Send + Sync {
    fn set_online(
        &self,
        user_id: &UserId,
        online: bool,
    ) -> impl Future<Output = DbResult<()>> + Send;

    fn is_online(&self, user_id: &UserId) -> impl Future<Output = DbResult<bool>> + Send;
}
