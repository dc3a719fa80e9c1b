//! Signaling-Events (TCP)
//!
//! Definiert alle Events die ueber die TCP-Verbindung zwischen Client und
//! Relay ausgetauscht werden.
//!
//! ## Design
//! - Fire-and-forget: Events haben keine Request-ID und keine Antwortpflicht
//! - JSON-Form `{"event": "<name>", "data": <payload>}`, Namen in kebab-case
//! - Payload-Felder in camelCase, Signal-Daten bleiben opakes JSON

use chrono::{DateTime, Utc};
use plauder_core::types::{CallId, CallType, ConnectionId, MessageId, UserId, Ziel};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Fehler-Codes fuer `error`-Events an den Absender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InternalError,
}

/// Fehler-Meldung an den Absender eines Events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Ziel-Angabe
// ---------------------------------------------------------------------------

/// Wire-Form eines Signaling-Ziels
///
/// Aeltere Clients schicken einen nackten String, der je nach Kenntnis des
/// Absenders eine UserId oder eine Verbindungs-ID ist. Neuere Clients koennen
/// das Ziel explizit taggen. Die Einordnung des nackten Strings erfolgt im
/// Router, weil sie den aktuellen Registry-Inhalt braucht.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZielAngabe {
    Explizit(Ziel),
    Roh(String),
}

impl From<Ziel> for ZielAngabe {
    fn from(ziel: Ziel) -> Self {
        Self::Explizit(ziel)
    }
}

impl From<&str> for ZielAngabe {
    fn from(s: &str) -> Self {
        Self::Roh(s.to_string())
    }
}

impl From<UserId> for ZielAngabe {
    fn from(user_id: UserId) -> Self {
        Self::Explizit(Ziel::User(user_id))
    }
}

impl From<ConnectionId> for ZielAngabe {
    fn from(id: ConnectionId) -> Self {
        Self::Explizit(Ziel::Verbindung(id))
    }
}

// ---------------------------------------------------------------------------
// Eingehende Payloads (Client -> Relay)
// ---------------------------------------------------------------------------

/// Chat-Nachricht senden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
}

/// Anruf starten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUserRequest {
    pub user_to_call: UserId,
    /// Opake Signal-Daten (SDP-Offer o.ae.)
    pub signal_data: serde_json::Value,
    /// Absender-Adresse wie der Anrufer sie bekannt machen will.
    /// Fehlt sie, setzt der Relay die Verbindungs-ID des Anrufers ein.
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub call_type: CallType,
}

/// Anruf annehmen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCallRequest {
    pub signal: serde_json::Value,
    pub to: ZielAngabe,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub call_id: Option<CallId>,
}

/// Anruf ablehnen oder beenden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTargetRequest {
    pub to: ZielAngabe,
    #[serde(default)]
    pub call_id: Option<CallId>,
}

/// Tipp-Indikator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingRequest {
    pub sender_id: UserId,
    pub receiver_id: UserId,
}

/// Mute-Status an das Gegenueber melden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuteStatusRequest {
    pub to: ZielAngabe,
    pub is_muted: bool,
}

// ---------------------------------------------------------------------------
// Ausgehende Payloads (Relay -> Client)
// ---------------------------------------------------------------------------

/// Begruessung direkt nach dem Accept
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedEvent {
    pub connection_id: ConnectionId,
}

/// Momentaufnahme aller registrierten Benutzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUsersEvent {
    pub user_ids: Vec<UserId>,
}

/// Online/Offline-Wechsel eines Benutzers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusChange {
    pub user_id: UserId,
    pub online: bool,
}

/// Zugestellte bzw. bestaetigte Chat-Nachricht
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Eingehender Anruf beim Angerufenen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub signal: serde_json::Value,
    pub from: String,
    pub name: String,
    pub call_type: CallType,
    pub call_id: CallId,
}

/// Angenommener Anruf beim Anrufer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAccepted {
    pub signal: serde_json::Value,
    pub name: String,
}

/// Tipp-Indikator beim Empfaenger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub sender_id: UserId,
}

/// Mute-Status des Gegenuebers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMuteStatus {
    pub is_muted: bool,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (in beide Richtungen)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Eigener Timestamp des Antwortenden
    pub timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Haupt-Enums
// ---------------------------------------------------------------------------

/// Alle Events vom Client an den Relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    RegisterUser(UserId),
    Logout,
    SendMessage(SendMessageRequest),
    CallUser(CallUserRequest),
    AnswerCall(AnswerCallRequest),
    RejectCall(CallTargetRequest),
    EndCall(CallTargetRequest),
    Typing(TypingRequest),
    StopTyping(TypingRequest),
    MuteStatus(MuteStatusRequest),
    Ping(PingMessage),
    Pong(PongMessage),
}

impl ClientEvent {
    /// Event-Name wie auf dem Wire (fuer Logs und Metrik-Labels)
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegisterUser(_) => "register-user",
            Self::Logout => "logout",
            Self::SendMessage(_) => "send-message",
            Self::CallUser(_) => "call-user",
            Self::AnswerCall(_) => "answer-call",
            Self::RejectCall(_) => "reject-call",
            Self::EndCall(_) => "end-call",
            Self::Typing(_) => "typing",
            Self::StopTyping(_) => "stop-typing",
            Self::MuteStatus(_) => "mute-status",
            Self::Ping(_) => "ping",
            Self::Pong(_) => "pong",
        }
    }
}

/// Alle Events vom Relay an den Client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    Connected(ConnectedEvent),
    OnlineUsers(OnlineUsersEvent),
    UserStatusChange(UserStatusChange),
    ReceiveMessage(ChatMessage),
    MessageSent(ChatMessage),
    IncomingCall(IncomingCall),
    CallAccepted(CallAccepted),
    CallRejected,
    CallEnded,
    UserTyping(TypingEvent),
    UserStopTyping(TypingEvent),
    PeerMuteStatus(PeerMuteStatus),
    Ping(PingMessage),
    Pong(PongMessage),
    Error(ErrorResponse),
}

impl ServerEvent {
    /// Erstellt eine Ping-Nachricht
    pub fn ping(timestamp_ms: u64) -> Self {
        Self::Ping(PingMessage { timestamp_ms })
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(echo_timestamp_ms: u64, timestamp_ms: u64) -> Self {
        Self::Pong(PongMessage {
            echo_timestamp_ms,
            timestamp_ms,
        })
    }

    /// Erstellt eine Fehler-Meldung
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            code,
            message: message.into(),
        })
    }

    /// Serialisiert das Event als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
