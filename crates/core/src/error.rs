//! Fehlertypen fuer Plauder
//!
//! Zentraler Fehler-Enum fuer Parse- und Validierungsfehler der Kerntypen.
//! Untermodule definieren eigene Fehler und konvertieren via `#[from]`.

use thiserror::Error;

/// Globaler Result-Alias fuer Plauder
pub type Result<T> = std::result::Result<T, PlauderError>;

/// Fehler der Kerntypen
#[derive(Debug, Error)]
pub enum PlauderError {
    #[error("Ungueltige ID: {0}")]
    UngueltigeId(String),

    #[error("Unbekannter Anruf-Status: {0}")]
    UnbekannterStatus(String),

    #[error("Unbekannter Anruf-Typ: {0}")]
    UnbekannterAnrufTyp(String),
}
