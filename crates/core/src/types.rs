//! Gemeinsame Identifikationstypen fuer Plauder
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{PlauderError, Result};

/// Logische Benutzer-Identitaet
///
/// Wird vom externen Account-Store vergeben und hier nur als opaker
/// String weitergereicht.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine UserId aus einem beliebigen String
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die ID als String-Slice zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Handle einer einzelnen, lebenden Verbindung
///
/// Wird beim Accept erzeugt und nach dem Trennen nie wiederverwendet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// Parst eine ConnectionId aus ihrer UUID-Textform
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PlauderError::UngueltigeId(s.to_string()))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ConnectionId {
    type Err = PlauderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Eindeutige ID eines Anrufversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Erstellt eine neue zufaellige CallId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call:{}", self.0)
    }
}

/// Eindeutige ID einer Chat-Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Erstellt eine neue zufaellige MessageId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Signaling-Ziel
// ---------------------------------------------------------------------------

/// Adressat eines Signaling-Events
///
/// Clients kennen ihr Gegenueber entweder ueber die UserId oder nur ueber
/// die Verbindungs-ID, die sie beim `incoming-call` gesehen haben. Beide
/// Formen werden ueber genau eine Funktion im Router aufgeloest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ziel {
    /// Adressierung ueber die logische Identitaet
    User(UserId),
    /// Direkte Adressierung einer Verbindung
    Verbindung(ConnectionId),
}

impl std::fmt::Display for Ziel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(u) => write!(f, "user:{u}"),
            Self::Verbindung(c) => write!(f, "{c}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Anruf-Status und -Typ
// ---------------------------------------------------------------------------

/// Lebenszyklus-Status eines Anrufversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Initiated,
    Accepted,
    Rejected,
    Missed,
    Ended,
}

impl CallStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Missed => "missed",
            Self::Ended => "ended",
        }
    }

    /// `rejected`, `missed` und `ended` sind Endzustaende
    pub fn ist_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Missed | Self::Ended)
    }
}

impl FromStr for CallStatus {
    type Err = PlauderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "initiated" => Ok(Self::Initiated),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "missed" => Ok(Self::Missed),
            "ended" => Ok(Self::Ended),
            other => Err(PlauderError::UnbekannterStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

/// Art des Anrufs (wird nur weitergereicht)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    #[default]
    Video,
}

impl CallType {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for CallType {
    type Err = PlauderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(PlauderError::UnbekannterAnrufTyp(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_parsen() {
        let id = ConnectionId::new();
        let geparst = ConnectionId::parse(&id.inner().to_string()).unwrap();
        assert_eq!(id, geparst);
        assert!(ConnectionId::parse("alice").is_err());
    }

    #[test]
    fn user_id_ist_transparent() {
        let json = serde_json::to_string(&UserId::new("65f0c1")).unwrap();
        assert_eq!(json, "\"65f0c1\"");
    }

    #[test]
    fn ziel_explizite_form() {
        let ziel: Ziel = serde_json::from_str(r#"{"user":"bob"}"#).unwrap();
        assert_eq!(ziel, Ziel::User(UserId::new("bob")));

        let id = ConnectionId::new();
        let json = format!(r#"{{"verbindung":"{}"}}"#, id.inner());
        let ziel: Ziel = serde_json::from_str(&json).unwrap();
        assert_eq!(ziel, Ziel::Verbindung(id));
    }

    #[test]
    fn call_status_terminal() {
        assert!(!CallStatus::Initiated.ist_terminal());
        assert!(!CallStatus::Accepted.ist_terminal());
        assert!(CallStatus::Rejected.ist_terminal());
        assert!(CallStatus::Missed.ist_terminal());
        assert!(CallStatus::Ended.ist_terminal());
    }

    #[test]
    fn call_status_text_form() {
        for status in [
            CallStatus::Initiated,
            CallStatus::Accepted,
            CallStatus::Rejected,
            CallStatus::Missed,
            CallStatus::Ended,
        ] {
            assert_eq!(status.als_str().parse::<CallStatus>().unwrap(), status);
        }
        assert!("klingelt".parse::<CallStatus>().is_err());
    }

    #[test]
    fn call_type_standard_ist_video() {
        assert_eq!(CallType::default(), CallType::Video);
        let t: CallType = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(t, CallType::Audio);
    }
}
