//! Laufzeit-Konfiguration des Signaling-Service

/// Konfiguration fuer Verbindungen und Router
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale gleichzeitige TCP-Verbindungen
    pub max_verbindungen: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
    /// Laufende Anrufe beim Trennen eines Teilnehmers beenden
    pub anrufe_bei_trennung_beenden: bool,
    /// Maximale Laenge einer Chat-Nachricht in Bytes
    pub max_nachrichten_laenge: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_verbindungen: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
            anrufe_bei_trennung_beenden: true,
            max_nachrichten_laenge: 4096,
        }
    }
}
