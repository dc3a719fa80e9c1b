//! Fehlertypen fuer den Signaling-Service

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
///
/// Router-Fehler gibt es nicht: nicht zustellbare oder ungueltige Events
/// werden verworfen. Diese Fehler betreffen Transport und Task-Verwaltung.
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protokollfehler (ungueltiges Frame)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Der Hub-Task laeuft nicht mehr
    #[error("Signaling-Hub beendet")]
    HubBeendet,

    /// Timeout (Keepalive)
    #[error("Timeout")]
    Timeout,
}

impl SignalingError {
    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;
