//! Persistenz-Worker – fuehrt Schreibauftraege des Routers aus
//!
//! Ein einzelner Task arbeitet die Auftraege in Ausgabereihenfolge ab, so
//! dass ein Anruf-Update nie vor dem zugehoerigen Anlegen ausgefuehrt wird.
//! Fehler werden protokolliert und gezaehlt, aber nie an Clients gemeldet.

use plauder_db::{CallStore, MessageStore, PresenceStore};
use plauder_observability::PlauderMetrics;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::router::SpeicherAuftrag;

/// Groesse der Auftrags-Queue
pub const AUFTRAGS_QUEUE_GROESSE: usize = 1024;

/// Einreihende Seite des Workers
#[derive(Clone)]
pub struct PersistenzSender {
    tx: mpsc::Sender<SpeicherAuftrag>,
    metriken: PlauderMetrics,
}

impl PersistenzSender {
    /// Reiht einen Auftrag ein, ohne zu warten
    ///
    /// Bei voller Queue wird der Auftrag verworfen und als Fehler gezaehlt.
    pub fn einreihen(&self, auftrag: SpeicherAuftrag) {
        match self.tx.try_send(auftrag) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(auftrag)) => {
                tracing::warn!(auftrag = ?auftrag, "Persistenz-Queue voll – Auftrag verworfen");
                self.metriken.persistence_errors_total.inc();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Persistenz-Worker beendet – Auftrag verworfen");
                self.metriken.persistence_errors_total.inc();
            }
        }
    }
}

/// Startet den Worker-Task
///
/// Der Task endet, sobald alle `PersistenzSender` gedroppt sind und die
/// Queue leer ist.
pub fn persistenz_starten<S>(
    store: Arc<S>,
    metriken: PlauderMetrics,
) -> (PersistenzSender, JoinHandle<()>)
where
    S: MessageStore + CallStore + PresenceStore + 'static,
{
    let (tx, mut rx) = mpsc::channel(AUFTRAGS_QUEUE_GROESSE);
    let sender = PersistenzSender {
        tx,
        metriken: metriken.clone(),
    };

    let handle = tokio::spawn(async move {
        while let Some(auftrag) = rx.recv().await {
            if let Err(e) = ausfuehren(store.as_ref(), auftrag).await {
                tracing::warn!(fehler = %e, "Schreibauftrag fehlgeschlagen");
                metriken.persistence_errors_total.inc();
            }
        }
        tracing::debug!("Persistenz-Worker beendet");
    });

    (sender, handle)
}

async fn ausfuehren<S>(store: &S, auftrag: SpeicherAuftrag) -> plauder_db::DbResult<()>
where
    S: MessageStore + CallStore + PresenceStore,
{
    match auftrag {
        SpeicherAuftrag::NachrichtSpeichern(nachricht) => {
            MessageStore::save(store, nachricht).await?;
        }
        SpeicherAuftrag::AnrufAnlegen(anruf) => {
            CallStore::create(store, anruf).await?;
        }
        SpeicherAuftrag::AnrufAktualisieren { id, update } => {
            CallStore::update(store, id, update).await?;
        }
        SpeicherAuftrag::OnlineSetzen { user_id, online } => {
            store.set_online(&user_id, online).await?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use plauder_core::types::{CallId, CallStatus, CallType, MessageId, UserId};
    use plauder_db::models::{AnrufUpdate, NeueNachricht, NeuerAnruf};
    use plauder_db::SqliteDb;

    #[tokio::test]
    async fn auftraege_werden_in_reihenfolge_ausgefuehrt() {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let metriken = PlauderMetrics::neu().unwrap();
        let (sender, handle) = persistenz_starten(Arc::clone(&db), metriken.clone());

        let id = CallId::new();
        let jetzt = Utc::now();
        sender.einreihen(SpeicherAuftrag::AnrufAnlegen(NeuerAnruf {
            id,
            caller_id: UserId::new("alice"),
            receiver_id: UserId::new("bob"),
            call_type: CallType::Audio,
            status: CallStatus::Initiated,
            created_at: jetzt,
        }));
        sender.einreihen(SpeicherAuftrag::AnrufAktualisieren {
            id,
            update: AnrufUpdate {
                status: Some(CallStatus::Missed),
                end_time: Some(jetzt),
                duration_seconds: Some(0.0),
                ..Default::default()
            },
        });
        sender.einreihen(SpeicherAuftrag::NachrichtSpeichern(NeueNachricht {
            id: MessageId::new(),
            sender_id: UserId::new("alice"),
            receiver_id: UserId::new("bob"),
            text: "Ruf zurueck".into(),
            timestamp: jetzt,
        }));
        sender.einreihen(SpeicherAuftrag::OnlineSetzen {
            user_id: UserId::new("alice"),
            online: true,
        });

        drop(sender);
        handle.await.unwrap();

        let anrufe = db.history(&UserId::new("bob"), 10).await.unwrap();
        assert_eq!(anrufe.len(), 1);
        assert_eq!(anrufe[0].status, CallStatus::Missed);

        let verlauf = db
            .conversation(&UserId::new("bob"), &UserId::new("alice"), 10)
            .await
            .unwrap();
        assert_eq!(verlauf.len(), 1);
        assert!(db.is_online(&UserId::new("alice")).await.unwrap());
        assert_eq!(metriken.persistence_errors_total.get(), 0);
    }

    #[tokio::test]
    async fn fehlgeschlagener_auftrag_wird_gezaehlt() {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let metriken = PlauderMetrics::neu().unwrap();
        let (sender, handle) = persistenz_starten(db, metriken.clone());

        // Update ohne vorheriges Anlegen
        sender.einreihen(SpeicherAuftrag::AnrufAktualisieren {
            id: CallId::new(),
            update: AnrufUpdate::default(),
        });
        drop(sender);
        handle.await.unwrap();

        assert_eq!(metriken.persistence_errors_total.get(), 1);
    }
}
