//! Signaling-Hub – der einzige Task, der Router und Broadcaster besitzt
//!
//! Verbindungs-Tasks schicken `HubBefehl`e ueber eine mpsc-Queue. Der Hub
//! verarbeitet sie streng nacheinander, stellt die Ausgaenge des Routers zu
//! und reicht Schreibauftraege an den Persistenz-Worker weiter.
//!
//! ```text
//! ClientConnection --HubBefehl--> SignalingHub --Ausgang--> EventBroadcaster
//!                                      |
//!                                      +--SpeicherAuftrag--> Persistenz-Worker
//! ```

use chrono::Utc;
use plauder_core::types::ConnectionId;
use plauder_db::{CallStore, MessageStore, PresenceStore};
use plauder_observability::PlauderMetrics;
use plauder_protocol::events::{ClientEvent, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broadcast::EventBroadcaster;
use crate::config::SignalingConfig;
use crate::error::{SignalingError, SignalingResult};
use crate::persistence::{persistenz_starten, PersistenzSender};
use crate::router::{Ausgang, SignalingRouter, SpeicherAuftrag};

/// Groesse der Befehls-Queue des Hubs
const HUB_QUEUE_GROESSE: usize = 1024;

/// Befehle von Verbindungs-Tasks an den Hub
#[derive(Debug)]
pub enum HubBefehl {
    /// Neue Verbindung mit ihrer Send-Queue
    Verbunden {
        verbindung: ConnectionId,
        tx: mpsc::Sender<ServerEvent>,
    },
    /// Eingehendes Event einer Verbindung
    Eingang {
        verbindung: ConnectionId,
        event: ClientEvent,
    },
    /// Verbindung wurde geschlossen
    Getrennt { verbindung: ConnectionId },
}

// ---------------------------------------------------------------------------
// HubHandle
// ---------------------------------------------------------------------------

/// Clonebarer Zugang zum Hub
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubBefehl>,
}

impl HubHandle {
    pub async fn verbunden(
        &self,
        verbindung: ConnectionId,
        tx: mpsc::Sender<ServerEvent>,
    ) -> SignalingResult<()> {
        self.senden(HubBefehl::Verbunden { verbindung, tx }).await
    }

    pub async fn eingang(&self, verbindung: ConnectionId, event: ClientEvent) -> SignalingResult<()> {
        self.senden(HubBefehl::Eingang { verbindung, event }).await
    }

    pub async fn getrennt(&self, verbindung: ConnectionId) -> SignalingResult<()> {
        self.senden(HubBefehl::Getrennt { verbindung }).await
    }

    async fn senden(&self, befehl: HubBefehl) -> SignalingResult<()> {
        self.tx
            .send(befehl)
            .await
            .map_err(|_| SignalingError::HubBeendet)
    }
}

// ---------------------------------------------------------------------------
// SignalingHub
// ---------------------------------------------------------------------------

/// Besitzer des gesamten Relay-Zustands
pub struct SignalingHub {
    router: SignalingRouter,
    broadcaster: EventBroadcaster,
    persistenz: PersistenzSender,
    metriken: PlauderMetrics,
    rx: mpsc::Receiver<HubBefehl>,
}

impl SignalingHub {
    /// Startet Hub- und Persistenz-Task
    ///
    /// Der zurueckgegebene Task endet, wenn alle `HubHandle`s gedroppt sind.
    /// Er wartet vorher auf das Abarbeiten aller Schreibauftraege.
    pub fn starten<S>(
        config: &SignalingConfig,
        store: Arc<S>,
        metriken: PlauderMetrics,
    ) -> (HubHandle, JoinHandle<()>)
    where
        S: MessageStore + CallStore + PresenceStore + 'static,
    {
        let (tx, rx) = mpsc::channel(HUB_QUEUE_GROESSE);
        let (persistenz, worker) = persistenz_starten(store, metriken.clone());

        let hub = Self {
            router: SignalingRouter::neu(config),
            broadcaster: EventBroadcaster::neu(),
            persistenz,
            metriken,
            rx,
        };

        let handle = tokio::spawn(async move {
            hub.laufen().await;
            if let Err(e) = worker.await {
                tracing::warn!(fehler = %e, "Persistenz-Worker abgebrochen");
            }
        });

        (HubHandle { tx }, handle)
    }

    async fn laufen(mut self) {
        tracing::info!("Signaling-Hub gestartet");

        while let Some(befehl) = self.rx.recv().await {
            self.befehl_verarbeiten(befehl);
        }

        tracing::info!("Signaling-Hub beendet");
    }

    fn befehl_verarbeiten(&mut self, befehl: HubBefehl) {
        match befehl {
            HubBefehl::Verbunden { verbindung, tx } => {
                tracing::info!(verbindung = %verbindung, "Client verbunden");
                self.broadcaster.client_registrieren(verbindung, tx);
                let aus = self.router.verbunden(verbindung);
                self.zustellen(aus);
            }
            HubBefehl::Eingang { verbindung, event } => {
                self.metriken.event_zaehlen(event.name());
                let aus = self.router.verarbeiten(verbindung, event, Utc::now());
                self.zustellen(aus);
            }
            HubBefehl::Getrennt { verbindung } => {
                tracing::info!(verbindung = %verbindung, "Client getrennt");
                let aus = self.router.getrennt(verbindung, Utc::now());
                self.broadcaster.client_entfernen(&verbindung);
                self.zustellen(aus);
            }
        }

        self.metriken
            .connected_clients
            .set(self.router.verbindungen() as f64);
        self.metriken
            .online_users
            .set(self.router.registry().anzahl() as f64);
    }

    fn zustellen(&self, ausgaenge: Vec<Ausgang>) {
        for ausgang in ausgaenge {
            match ausgang {
                Ausgang::An { verbindung, event } => {
                    if !self.broadcaster.senden(&verbindung, event) {
                        self.metriken.events_dropped_total.inc();
                    }
                }
                Ausgang::AnAlle { event } => {
                    self.broadcaster.an_alle(&event);
                }
                Ausgang::Speichern(auftrag) => {
                    if let SpeicherAuftrag::AnrufAktualisieren { update, .. } = &auftrag {
                        if let Some(status) = update.status.filter(|s| s.ist_terminal()) {
                            self.metriken.anruf_zaehlen(status.als_str());
                        }
                    }
                    self.persistenz.einreihen(auftrag);
                }
                Ausgang::Verworfen { event } => {
                    tracing::debug!(event, "Event ohne Empfaenger verworfen");
                    self.metriken.events_dropped_total.inc();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
