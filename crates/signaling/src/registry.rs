//! Connection-Registry – Welcher Benutzer ist ueber welche Verbindung erreichbar
//!
//! Haelt die Zuordnung UserId -> ConnectionId und den Rueckwaerts-Index.
//! Beide Maps werden nur gemeinsam veraendert, so dass nie zwei Benutzer
//! auf dieselbe Verbindung zeigen.

use plauder_core::types::{ConnectionId, UserId};
use std::collections::HashMap;

/// Ergebnis einer Registrierung
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registrierung {
    /// Benutzer, der vorher auf dieser Verbindung registriert war
    pub verdraengter_user: Option<UserId>,
    /// Verbindung, die vorher fuer diesen Benutzer registriert war
    pub alte_verbindung: Option<ConnectionId>,
}

/// Zuordnung logischer Benutzer zu lebenden Verbindungen
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    nach_user: HashMap<UserId, ConnectionId>,
    nach_verbindung: HashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Registriert `user_id` auf `verbindung` (last-register-wins)
    ///
    /// Die alte Verbindung des Benutzers bleibt offen, verliert aber ihre
    /// Zuordnung. War auf `verbindung` ein anderer Benutzer registriert,
    /// wird dieser entfernt und im Ergebnis gemeldet.
    pub fn register(&mut self, user_id: UserId, verbindung: ConnectionId) -> Registrierung {
        let mut ergebnis = Registrierung::default();

        if let Some(vorher) = self.nach_verbindung.get(&verbindung) {
            if *vorher != user_id {
                let vorher = vorher.clone();
                self.nach_user.remove(&vorher);
                ergebnis.verdraengter_user = Some(vorher);
            }
        }

        if let Some(alt) = self.nach_user.insert(user_id.clone(), verbindung) {
            if alt != verbindung {
                self.nach_verbindung.remove(&alt);
                ergebnis.alte_verbindung = Some(alt);
            }
        }
        self.nach_verbindung.insert(verbindung, user_id);

        ergebnis
    }

    /// Aktuelle Verbindung eines Benutzers
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.nach_user.get(user_id).copied()
    }

    /// Benutzer, der auf einer Verbindung registriert ist
    pub fn user_von(&self, verbindung: &ConnectionId) -> Option<&UserId> {
        self.nach_verbindung.get(verbindung)
    }

    pub fn ist_registriert(&self, user_id: &UserId) -> bool {
        self.nach_user.contains_key(user_id)
    }

    /// Entfernt die Registrierung einer Verbindung
    ///
    /// Gibt den entfernten Benutzer zurueck, oder `None` wenn auf der
    /// Verbindung nie jemand registriert war.
    pub fn unregister_by_handle(&mut self, verbindung: &ConnectionId) -> Option<UserId> {
        let user_id = self.nach_verbindung.remove(verbindung)?;
        self.nach_user.remove(&user_id);
        Some(user_id)
    }

    /// Alle registrierten Benutzer, sortiert
    pub fn alle_user(&self) -> Vec<UserId> {
        let mut user: Vec<UserId> = self.nach_user.keys().cloned().collect();
        user.sort();
        user
    }

    pub fn anzahl(&self) -> usize {
        self.nach_user.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
