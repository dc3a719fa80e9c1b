//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Sie liest Frames, reicht Events in Reihenfolge an den Hub
//! weiter und schreibt alles aus ihrer Send-Queue auf den Socket.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen Ping
//! - Kommt `verbindungs_timeout_sek` lang kein Frame, wird getrennt
//! - Eingehende Pings beantwortet die Verbindung selbst mit einem Pong

use futures_util::{SinkExt, StreamExt};
use plauder_core::types::ConnectionId;
use plauder_protocol::events::{ClientEvent, ErrorCode, ServerEvent};
use plauder_protocol::wire::ServerCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use crate::broadcast::SEND_QUEUE_GROESSE;
use crate::config::SignalingConfig;
use crate::error::{SignalingError, SignalingResult};
use crate::hub::HubHandle;

/// Aktuelle Unix-Zeit in Millisekunden
fn jetzt_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Verarbeitet eine einzelne Client-Verbindung
pub struct ClientConnection {
    hub: HubHandle,
    config: Arc<SignalingConfig>,
    peer_addr: SocketAddr,
    verbindung: ConnectionId,
}

impl ClientConnection {
    pub fn neu(hub: HubHandle, config: Arc<SignalingConfig>, peer_addr: SocketAddr) -> Self {
        Self {
            hub,
            config,
            peer_addr,
            verbindung: ConnectionId::new(),
        }
    }

    pub fn verbindung(&self) -> ConnectionId {
        self.verbindung
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis der Client trennt, das Timeout greift oder ein
    /// Shutdown-Signal eingeht. Der Hub erfaehrt in jedem Fall von der
    /// Trennung.
    pub async fn verarbeiten<T>(self, stream: T, shutdown_rx: watch::Receiver<bool>)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let verbindung = self.verbindung;
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, verbindung = %verbindung, "Neue Verbindung");

        let (sende_tx, sende_rx) = mpsc::channel::<ServerEvent>(SEND_QUEUE_GROESSE);
        if let Err(e) = self.hub.verbunden(verbindung, sende_tx).await {
            tracing::warn!(verbindung = %verbindung, fehler = %e, "Verbindung nicht angemeldet");
            return;
        }

        let ergebnis = self.schleife(stream, sende_rx, shutdown_rx).await;
        match ergebnis {
            Ok(()) => tracing::info!(verbindung = %verbindung, "Verbindung geschlossen"),
            Err(SignalingError::Timeout) => {
                tracing::warn!(verbindung = %verbindung, "Verbindungs-Timeout")
            }
            Err(e) => tracing::warn!(verbindung = %verbindung, fehler = %e, "Verbindung abgebrochen"),
        }

        if let Err(e) = self.hub.getrennt(verbindung).await {
            tracing::debug!(verbindung = %verbindung, fehler = %e, "Trennung nicht gemeldet");
        }
        tracing::info!(peer = %peer_addr, verbindung = %verbindung, "Verbindungs-Task beendet");
    }

    async fn schleife<T>(
        &self,
        stream: T,
        mut sende_rx: mpsc::Receiver<ServerEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let verbindung = self.verbindung;
        let keepalive_intervall = Duration::from_secs(self.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.config.verbindungs_timeout_sek);

        let mut framed = Framed::new(stream, ServerCodec::default());

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                return Err(SignalingError::Timeout);
            }

            // Aufwachen zum naechsten Ping oder spaetestens zum Timeout
            let frist = naechster_ping.min(letzter_empfang + timeout_dauer);
            let verzoegerung = frist
                .checked_duration_since(jetzt)
                .unwrap_or(Duration::from_millis(1));

            tokio::select! {
                // Eingehendes Event vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(event)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(verbindung = %verbindung, event = event.name(), "Event empfangen");

                            match event {
                                ClientEvent::Ping(ping) => {
                                    framed
                                        .send(ServerEvent::pong(ping.timestamp_ms, jetzt_ms()))
                                        .await?;
                                }
                                ClientEvent::Pong(_) => {}
                                event => self.hub.eingang(verbindung, event).await?,
                            }
                        }
                        Some(Err(e)) => {
                            // Nach einem Decode-Fehler liefert Framed keine Frames mehr
                            let antwort = ServerEvent::error(ErrorCode::InvalidRequest, e.to_string());
                            let _ = framed.send(antwort).await;
                            return Err(SignalingError::protokoll(e.to_string()));
                        }
                        None => {
                            tracing::debug!(verbindung = %verbindung, "Verbindung vom Client getrennt");
                            return Ok(());
                        }
                    }
                }

                // Ausgehendes Event aus dem Hub
                ausgehend = sende_rx.recv() => {
                    match ausgehend {
                        Some(event) => framed.send(event).await?,
                        // Hub hat die Queue verworfen
                        None => return Err(SignalingError::HubBeendet),
                    }
                }

                // Keepalive-Ping bzw. Timeout-Pruefung
                _ = tokio::time::sleep(verzoegerung) => {
                    if Instant::now() >= naechster_ping {
                        framed.send(ServerEvent::ping(jetzt_ms())).await?;
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(verbindung = %verbindung, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = ServerEvent::error(
                            ErrorCode::InternalError,
                            "Server wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::SignalingHub;
    use plauder_db::SqliteDb;
    use plauder_observability::PlauderMetrics;
    use plauder_protocol::events::PingMessage;
    use plauder_protocol::wire::ClientCodec;
    use tokio::io::{duplex, AsyncWriteExt};

    async fn aufbauen(
        config: SignalingConfig,
    ) -> (HubHandle, Framed<tokio::io::DuplexStream, ClientCodec>, watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let metriken = PlauderMetrics::neu().unwrap();
        let (hub, _task) = SignalingHub::starten(&config, db, metriken);

        let (server_seite, client_seite) = duplex(64 * 1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let verbindung = ClientConnection::neu(
            hub.clone(),
            Arc::new(config),
            "127.0.0.1:0".parse().unwrap(),
        );
        let task = tokio::spawn(verbindung.verarbeiten(server_seite, shutdown_rx));

        let client = Framed::new(client_seite, ClientCodec::default());
        (hub, client, shutdown_tx, task)
    }

    #[tokio::test]
    async fn connected_und_pong() {
        let (_hub, mut client, _shutdown, _task) = aufbauen(SignalingConfig::default()).await;

        match client.next().await {
            Some(Ok(ServerEvent::Connected(_))) => {}
            other => panic!("Erwartet connected, erhalten {other:?}"),
        }

        client
            .send(ClientEvent::Ping(PingMessage { timestamp_ms: 1234 }))
            .await
            .unwrap();
        match client.next().await {
            Some(Ok(ServerEvent::Pong(p))) => assert_eq!(p.echo_timestamp_ms, 1234),
            other => panic!("Erwartet pong, erhalten {other:?}"),
        }
    }

    #[tokio::test]
    async fn shutdown_schliesst_verbindung() {
        let (_hub, mut client, shutdown, task) = aufbauen(SignalingConfig::default()).await;
        let _ = client.next().await;

        shutdown.send(true).unwrap();
        match client.next().await {
            Some(Ok(ServerEvent::Error(e))) => assert_eq!(e.code, ErrorCode::InternalError),
            other => panic!("Erwartet Abschied, erhalten {other:?}"),
        }
        task.await.unwrap();
        assert!(client.next().await.is_none());
    }

    #[tokio::test]
    async fn ungueltiges_frame_trennt_mit_fehler() {
        let (_hub, client, _shutdown, task) = aufbauen(SignalingConfig::default()).await;
        let mut roh = client.into_inner();

        let payload = br#"{"event":"gibt-es-nicht"}"#;
        roh.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
        roh.write_all(payload).await.unwrap();

        task.await.unwrap();
        let mut client = Framed::new(roh, ClientCodec::default());
        let mut fehler_gesehen = false;
        while let Some(Ok(event)) = client.next().await {
            if let ServerEvent::Error(e) = event {
                assert_eq!(e.code, ErrorCode::InvalidRequest);
                fehler_gesehen = true;
            }
        }
        assert!(fehler_gesehen);
    }

    #[tokio::test]
    async fn inaktive_verbindung_laeuft_ab() {
        let config = SignalingConfig {
            keepalive_sek: 1,
            verbindungs_timeout_sek: 2,
            ..Default::default()
        };
        let (_hub, mut client, _shutdown, task) = aufbauen(config).await;

        // Client antwortet nie; Pings kommen bis zum Timeout
        let mut pings = 0;
        let lesen = async {
            while let Some(Ok(event)) = client.next().await {
                if matches!(event, ServerEvent::Ping(_)) {
                    pings += 1;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), lesen)
            .await
            .expect("Verbindung haette ablaufen muessen");
        task.await.unwrap();
        assert!(pings >= 1);
    }
}
