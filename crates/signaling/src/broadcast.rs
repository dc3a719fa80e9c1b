//! Event-Broadcaster – Send-Queues aller lebenden Verbindungen
//!
//! Jede Verbindung hat eine begrenzte Queue, die ihr Verbindungs-Task
//! leert und auf den Socket schreibt. Der Broadcaster gehoert exklusiv dem
//! Hub-Task und braucht deshalb keine Synchronisation.
//!
//! Senden blockiert nie: ist eine Queue voll, wird das Event fuer genau
//! diese Verbindung verworfen.

use plauder_core::types::ConnectionId;
use plauder_protocol::events::ServerEvent;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub verbindung: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ClientSender {
    /// Reiht ein Event nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(verbindung = %self.verbindung, "Send-Queue voll – Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(verbindung = %self.verbindung, "Send-Queue geschlossen (Client getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Verteilt Events an einzelne oder alle Verbindungen
#[derive(Debug, Default)]
pub struct EventBroadcaster {
    clients: HashMap<ConnectionId, ClientSender>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Nimmt die Queue einer neuen Verbindung auf
    pub fn client_registrieren(&mut self, verbindung: ConnectionId, tx: mpsc::Sender<ServerEvent>) {
        self.clients
            .insert(verbindung, ClientSender { verbindung, tx });
        tracing::debug!(verbindung = %verbindung, "Client im Broadcaster registriert");
    }

    pub fn client_entfernen(&mut self, verbindung: &ConnectionId) {
        if self.clients.remove(verbindung).is_some() {
            tracing::debug!(verbindung = %verbindung, "Client aus Broadcaster entfernt");
        }
    }

    /// Sendet ein Event an eine Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung bekannt ist und das Event
    /// eingereiht wurde.
    pub fn senden(&self, verbindung: &ConnectionId, event: ServerEvent) -> bool {
        match self.clients.get(verbindung) {
            Some(sender) => sender.senden(event),
            None => {
                tracing::debug!(verbindung = %verbindung, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Sendet ein Event an alle Verbindungen
    ///
    /// Gibt die Anzahl erfolgreicher Zustellungen zurueck.
    pub fn an_alle(&self, event: &ServerEvent) -> usize {
        self.clients
            .values()
            .filter(|sender| sender.senden(event.clone()))
            .count()
    }

    pub fn anzahl(&self) -> usize {
        self.clients.len()
    }

    pub fn ist_registriert(&self, verbindung: &ConnectionId) -> bool {
        self.clients.contains_key(verbindung)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registrieren(
        broadcaster: &mut EventBroadcaster,
        groesse: usize,
    ) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let c = ConnectionId::new();
        let (tx, rx) = mpsc::channel(groesse);
        broadcaster.client_registrieren(c, tx);
        (c, rx)
    }

    #[tokio::test]
    async fn senden_an_einzelne_verbindung() {
        let mut broadcaster = EventBroadcaster::neu();
        let (c, mut rx) = registrieren(&mut broadcaster, SEND_QUEUE_GROESSE);

        assert!(broadcaster.senden(&c, ServerEvent::CallEnded));
        assert!(matches!(rx.recv().await, Some(ServerEvent::CallEnded)));
    }

    #[tokio::test]
    async fn an_alle_erreicht_jede_verbindung() {
        let mut broadcaster = EventBroadcaster::neu();
        let (_, mut rx1) = registrieren(&mut broadcaster, SEND_QUEUE_GROESSE);
        let (_, mut rx2) = registrieren(&mut broadcaster, SEND_QUEUE_GROESSE);

        assert_eq!(broadcaster.an_alle(&ServerEvent::CallRejected), 2);
        assert!(matches!(rx1.recv().await, Some(ServerEvent::CallRejected)));
        assert!(matches!(rx2.recv().await, Some(ServerEvent::CallRejected)));
    }

    #[test]
    fn volle_queue_verwirft_nur_fuer_diese_verbindung() {
        let mut broadcaster = EventBroadcaster::neu();
        let (langsam, _rx_langsam) = registrieren(&mut broadcaster, 1);
        let (_schnell, mut rx_schnell) = registrieren(&mut broadcaster, SEND_QUEUE_GROESSE);

        assert!(broadcaster.senden(&langsam, ServerEvent::CallEnded));
        assert!(!broadcaster.senden(&langsam, ServerEvent::CallEnded));

        // Die langsame Verbindung blockiert den Broadcast nicht
        assert_eq!(broadcaster.an_alle(&ServerEvent::CallRejected), 1);
        assert!(matches!(rx_schnell.try_recv(), Ok(ServerEvent::CallRejected)));
    }

    #[test]
    fn geschlossene_queue_und_unbekannte_verbindung() {
        let mut broadcaster = EventBroadcaster::neu();
        let (c, rx) = registrieren(&mut broadcaster, SEND_QUEUE_GROESSE);
        drop(rx);

        assert!(!broadcaster.senden(&c, ServerEvent::CallEnded));
        assert!(!broadcaster.senden(&ConnectionId::new(), ServerEvent::CallEnded));

        broadcaster.client_entfernen(&c);
        assert!(!broadcaster.ist_registriert(&c));
        assert_eq!(broadcaster.anzahl(), 0);
    }
}
