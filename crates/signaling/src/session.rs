//! Anruf-Sessions und ihre Zustandsmaschine
//!
//! ```text
//! initiated -> accepted -> ended
//!     |            |
//!     |            +-----> (ended, wenn vor dem Start abgebrochen: missed)
//!     +--> rejected
//!     +--> missed
//! ```
//!
//! Die `CallSessionTable` haelt jede Session genau einmal und indiziert
//! beide Teilnehmer-Verbindungen auf dieselbe `CallId`.

use chrono::{DateTime, Utc};
use plauder_core::types::{CallId, CallStatus, CallType, ConnectionId, UserId};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

/// Lebenszyklus eines einzelnen Anrufversuchs
#[derive(Debug, Clone, PartialEq)]
pub struct CallSession {
    pub id: CallId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    pub caller_verbindung: ConnectionId,
    /// `None` wenn der Angerufene nie erreichbar war
    pub receiver_verbindung: Option<ConnectionId>,
    pub call_type: CallType,
    pub status: CallStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub created_at: DateTime<Utc>,
}

impl CallSession {
    /// Neue Session im Zustand `initiated`
    pub fn neu(
        caller_id: UserId,
        caller_verbindung: ConnectionId,
        receiver_id: UserId,
        receiver_verbindung: Option<ConnectionId>,
        call_type: CallType,
        jetzt: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CallId::new(),
            caller_id,
            receiver_id,
            caller_verbindung,
            receiver_verbindung,
            call_type,
            status: CallStatus::Initiated,
            start_time: None,
            end_time: None,
            duration_seconds: 0.0,
            created_at: jetzt,
        }
    }

    /// `initiated -> accepted`, setzt die Startzeit
    ///
    /// Gibt `false` zurueck (ohne Aenderung) in jedem anderen Zustand.
    pub fn annehmen(&mut self, jetzt: DateTime<Utc>) -> bool {
        if self.status != CallStatus::Initiated {
            return false;
        }
        self.status = CallStatus::Accepted;
        self.start_time = Some(jetzt);
        true
    }

    /// `initiated -> rejected`
    pub fn ablehnen(&mut self, jetzt: DateTime<Utc>) -> bool {
        if self.status != CallStatus::Initiated {
            return false;
        }
        self.status = CallStatus::Rejected;
        self.end_time = Some(jetzt);
        true
    }

    /// `initiated -> missed` (Angerufener nicht erreichbar)
    pub fn verpassen(&mut self, jetzt: DateTime<Utc>) -> bool {
        if self.status != CallStatus::Initiated {
            return false;
        }
        self.status = CallStatus::Missed;
        self.end_time = Some(jetzt);
        self.duration_seconds = 0.0;
        true
    }

    /// Beendet die Session
    ///
    /// Mit Startzeit wird sie `ended` und die Dauer berechnet, sonst `missed`
    /// mit Dauer 0. Endzustaende bleiben unveraendert (`false`).
    pub fn beenden(&mut self, jetzt: DateTime<Utc>) -> bool {
        if self.status.ist_terminal() {
            return false;
        }
        self.end_time = Some(jetzt);
        match self.start_time {
            Some(start) => {
                self.status = CallStatus::Ended;
                self.duration_seconds = dauer_sekunden(start, jetzt);
            }
            None => {
                self.status = CallStatus::Missed;
                self.duration_seconds = 0.0;
            }
        }
        true
    }

    /// Verbindung des anderen Teilnehmers
    pub fn gegenueber(&self, verbindung: ConnectionId) -> Option<ConnectionId> {
        if verbindung == self.caller_verbindung {
            self.receiver_verbindung
        } else if Some(verbindung) == self.receiver_verbindung {
            Some(self.caller_verbindung)
        } else {
            None
        }
    }

    pub fn ist_teilnehmer_verbindung(&self, verbindung: ConnectionId) -> bool {
        verbindung == self.caller_verbindung || Some(verbindung) == self.receiver_verbindung
    }

    pub fn ist_teilnehmer_user(&self, user_id: &UserId) -> bool {
        *user_id == self.caller_id || *user_id == self.receiver_id
    }
}

/// Sekunden zwischen zwei Zeitpunkten mit Mikrosekunden-Aufloesung
fn dauer_sekunden(start: DateTime<Utc>, ende: DateTime<Utc>) -> f64 {
    let mikros = (ende - start).num_microseconds().unwrap_or(i64::MAX).max(0);
    mikros as f64 / 1_000_000.0
}

// ---------------------------------------------------------------------------
// CallSessionTable
// ---------------------------------------------------------------------------

/// Alle nicht-terminalen Sessions, erreichbar ueber beide Teilnehmer
#[derive(Debug, Default)]
pub struct CallSessionTable {
    sessions: HashMap<CallId, CallSession>,
    index: HashMap<ConnectionId, CallId>,
}

impl CallSessionTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt eine Session auf
    ///
    /// Der Anrufer wird immer auf die neue Session indiziert. Der Angerufene
    /// nur, wenn er noch in keiner anderen Session steckt.
    pub fn einfuegen(&mut self, session: CallSession) -> CallId {
        let id = session.id;
        self.index.insert(session.caller_verbindung, id);
        if let Some(receiver) = session.receiver_verbindung {
            self.index.entry(receiver).or_insert(id);
        }
        self.sessions.insert(id, session);
        id
    }

    pub fn get(&self, id: &CallId) -> Option<&CallSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &CallId) -> Option<&mut CallSession> {
        self.sessions.get_mut(id)
    }

    /// Aktuelle Session einer Verbindung
    pub fn von_verbindung(&self, verbindung: &ConnectionId) -> Option<&CallSession> {
        self.index.get(verbindung).and_then(|id| self.sessions.get(id))
    }

    /// Sucht die Session, auf die sich ein Event von `von` bezieht
    ///
    /// Reihenfolge: explizite `call_id` (Absender muss Teilnehmer sein),
    /// dann eine Session mit `ziel` als Gegenueber, dann die indizierte
    /// Session des Absenders. Wird die Session ueber die UserId des
    /// Absenders gefunden, wird seine Verbindung in der Session neu gebunden.
    pub fn finden(
        &mut self,
        von: ConnectionId,
        von_user: Option<&UserId>,
        call_id: Option<CallId>,
        ziel: Option<ConnectionId>,
    ) -> Option<CallId> {
        if let Some(id) = call_id {
            if let Some(session) = self.sessions.get_mut(&id) {
                if session.ist_teilnehmer_verbindung(von) {
                    return Some(id);
                }
                if let Some(user) = von_user {
                    if session.ist_teilnehmer_user(user) {
                        if let Some(alt) = neu_binden(session, user, von) {
                            if self.index.get(&alt) == Some(&id) {
                                self.index.remove(&alt);
                            }
                        }
                        self.index.insert(von, id);
                        return Some(id);
                    }
                }
            }
        }

        if let Some(ziel) = ziel {
            let treffer = self
                .sessions
                .values()
                .find(|s| s.gegenueber(von) == Some(ziel))
                .map(|s| s.id);
            if treffer.is_some() {
                return treffer;
            }
        }

        self.index.get(&von).copied()
    }

    /// Entfernt eine Session samt aller Index-Eintraege
    pub fn entfernen(&mut self, id: &CallId) -> Option<CallSession> {
        let session = self.sessions.remove(id)?;
        self.index.retain(|_, sid| sid != id);
        Some(session)
    }

    /// Alle Sessions, an denen eine Verbindung beteiligt ist
    pub fn sessions_von(&self, verbindung: ConnectionId) -> Vec<CallId> {
        let mut ids: Vec<CallId> = self
            .sessions
            .values()
            .filter(|s| s.ist_teilnehmer_verbindung(verbindung))
            .map(|s| s.id)
            .collect();
        ids.sort_by_key(|id| id.inner());
        ids
    }

    /// Offene Sessions einer Anrufer-Verbindung zu einem bestimmten Benutzer
    pub fn offene_anrufe(&self, caller_verbindung: ConnectionId, receiver_id: &UserId) -> Vec<CallId> {
        self.sessions
            .values()
            .filter(|s| s.caller_verbindung == caller_verbindung && s.receiver_id == *receiver_id)
            .map(|s| s.id)
            .collect()
    }

    pub fn anzahl(&self) -> usize {
        self.sessions.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.sessions.is_empty() && self.index.is_empty()
    }

    /// Anzahl der Index-Eintraege (beide Teilnehmer zaehlen einzeln)
    pub fn index_anzahl(&self) -> usize {
        self.index.len()
    }
}

/// Bindet die Verbindung des Teilnehmers `user` nach einem Reconnect neu
///
/// Gibt die vorher gebundene Verbindung zurueck.
fn neu_binden(
    session: &mut CallSession,
    user: &UserId,
    verbindung: ConnectionId,
) -> Option<ConnectionId> {
    if *user == session.caller_id {
        Some(std::mem::replace(&mut session.caller_verbindung, verbindung))
    } else {
        session.receiver_verbindung.replace(verbindung)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn session(a: ConnectionId, b: Option<ConnectionId>) -> CallSession {
        CallSession::neu(
            UserId::new("alice"),
            a,
            UserId::new("bob"),
            b,
            CallType::Video,
            t0(),
        )
    }

    #[test]
    fn annehmen_nur_aus_initiated() {
        let mut s = session(ConnectionId::new(), Some(ConnectionId::new()));
        let start = t0() + Duration::seconds(2);

        assert!(s.annehmen(start));
        assert_eq!(s.status, CallStatus::Accepted);
        assert_eq!(s.start_time, Some(start));

        // Zweites Annehmen ist ein No-op
        assert!(!s.annehmen(start + Duration::seconds(5)));
        assert_eq!(s.status, CallStatus::Accepted);
        assert_eq!(s.start_time, Some(start));
    }

    #[test]
    fn beenden_nach_annahme_berechnet_dauer() {
        let mut s = session(ConnectionId::new(), Some(ConnectionId::new()));
        let start = t0() + Duration::seconds(1);
        s.annehmen(start);

        let ende = start + Duration::milliseconds(12_345);
        assert!(s.beenden(ende));
        assert_eq!(s.status, CallStatus::Ended);
        assert_eq!(s.end_time, Some(ende));
        assert!((s.duration_seconds - 12.345).abs() < 1e-6);
    }

    #[test]
    fn beenden_ohne_annahme_ist_verpasst() {
        let mut s = session(ConnectionId::new(), Some(ConnectionId::new()));
        assert!(s.beenden(t0() + Duration::seconds(10)));
        assert_eq!(s.status, CallStatus::Missed);
        assert_eq!(s.duration_seconds, 0.0);
    }

    #[test]
    fn endzustaende_sind_final() {
        let mut s = session(ConnectionId::new(), Some(ConnectionId::new()));
        assert!(s.ablehnen(t0()));
        assert!(!s.annehmen(t0()));
        assert!(!s.beenden(t0()));
        assert!(!s.verpassen(t0()));
        assert_eq!(s.status, CallStatus::Rejected);
    }

    #[test]
    fn ablehnen_nach_annahme_ist_noop() {
        let mut s = session(ConnectionId::new(), Some(ConnectionId::new()));
        s.annehmen(t0());
        assert!(!s.ablehnen(t0()));
        assert_eq!(s.status, CallStatus::Accepted);
    }

    #[test]
    fn gegenueber_in_beide_richtungen() {
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let s = session(a, Some(b));
        assert_eq!(s.gegenueber(a), Some(b));
        assert_eq!(s.gegenueber(b), Some(a));
        assert_eq!(s.gegenueber(ConnectionId::new()), None);
    }

    #[test]
    fn tabelle_indiziert_beide_teilnehmer_auf_dieselbe_session() {
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut tabelle = CallSessionTable::neu();
        let id = tabelle.einfuegen(session(a, Some(b)));

        assert_eq!(tabelle.von_verbindung(&a).map(|s| s.id), Some(id));
        assert_eq!(tabelle.von_verbindung(&b).map(|s| s.id), Some(id));

        // Aenderung ueber einen Schluessel ist ueber den anderen sichtbar
        tabelle.get_mut(&id).unwrap().annehmen(t0());
        assert_eq!(
            tabelle.von_verbindung(&b).unwrap().status,
            CallStatus::Accepted
        );

        tabelle.entfernen(&id);
        assert!(tabelle.ist_leer());
    }

    #[test]
    fn besetzter_angerufener_behaelt_index() {
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        let mut tabelle = CallSessionTable::neu();
        let erste = tabelle.einfuegen(session(a, Some(b)));
        let zweite = tabelle.einfuegen(session(c, Some(b)));

        assert_eq!(tabelle.von_verbindung(&b).map(|s| s.id), Some(erste));
        // Ablehnen an c findet die zweite Session ueber das Gegenueber
        assert_eq!(tabelle.finden(b, None, None, Some(c)), Some(zweite));
        assert_eq!(tabelle.finden(b, None, None, None), Some(erste));
    }

    #[test]
    fn explizite_call_id_bindet_nach_reconnect_neu() {
        let (a, b) = (ConnectionId::new(), ConnectionId::new());
        let mut tabelle = CallSessionTable::neu();
        let id = tabelle.einfuegen(session(a, Some(b)));

        let b_neu = ConnectionId::new();
        let bob = UserId::new("bob");
        assert_eq!(tabelle.finden(b_neu, Some(&bob), Some(id), None), Some(id));
        assert_eq!(tabelle.get(&id).unwrap().receiver_verbindung, Some(b_neu));
        assert_eq!(tabelle.von_verbindung(&b_neu).map(|s| s.id), Some(id));
        assert!(tabelle.von_verbindung(&b).is_none());

        // Fremde duerfen die Session nicht per call_id adressieren
        let mallory = UserId::new("mallory");
        assert_eq!(
            tabelle.finden(ConnectionId::new(), Some(&mallory), Some(id), None),
            None
        );
    }

    #[test]
    fn sessions_von_findet_alle_beteiligungen() {
        let (a, b, c) = (ConnectionId::new(), ConnectionId::new(), ConnectionId::new());
        let mut tabelle = CallSessionTable::neu();
        tabelle.einfuegen(session(a, Some(b)));
        tabelle.einfuegen(session(c, Some(b)));

        assert_eq!(tabelle.sessions_von(b).len(), 2);
        assert_eq!(tabelle.sessions_von(a).len(), 1);
        assert_eq!(tabelle.anzahl(), 2);
        assert_eq!(tabelle.index_anzahl(), 3);
    }
}
