//! Datenbankmodelle fuer Plauder
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank. Die IDs werden
//! vom Relay vergeben, bevor ein Datensatz geschrieben wird.

use chrono::{DateTime, Utc};
use plauder_core::types::{CallId, CallStatus, CallType, MessageId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Nachrichten
// ---------------------------------------------------------------------------

/// Nachrichten-Datensatz (zugleich Antwortformat der History-API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NachrichtRecord {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Daten zum Speichern einer Nachricht
#[derive(Debug, Clone, PartialEq)]
pub struct NeueNachricht {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Anrufe
// ---------------------------------------------------------------------------

/// Anruf-Datensatz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnrufRecord {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: CallType,
    pub status: CallStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

/// Daten zum Anlegen eines Anrufs
#[derive(Debug, Clone, PartialEq)]
pub struct NeuerAnruf {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub call_type: CallType,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
}

/// Teil-Aktualisierung eines Anrufs (`None` = unveraendert)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnrufUpdate {
    pub status: Option<CallStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}
