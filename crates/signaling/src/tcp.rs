//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientConnection`.
//! Die Anzahl gleichzeitiger Verbindungen ist ueber ein Semaphore begrenzt.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};

use crate::config::SignalingConfig;
use crate::connection::ClientConnection;
use crate::hub::HubHandle;

/// TCP-Signaling-Server
pub struct SignalingServer {
    hub: HubHandle,
    config: Arc<SignalingConfig>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den Socket
    ///
    /// Port 0 waehlt einen freien Port, siehe `lokale_adresse`.
    pub async fn binden(
        bind_addr: SocketAddr,
        hub: HubHandle,
        config: SignalingConfig,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self {
            hub,
            config: Arc::new(config),
            listener,
        })
    }

    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        let plaetze = Arc::new(Semaphore::new(self.config.max_verbindungen));

        tracing::info!(
            adresse = %lokale_addr,
            max_verbindungen = self.config.max_verbindungen,
            "TCP Signaling-Server gestartet"
        );

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Ok(platz) = Arc::clone(&plaetze).try_acquire_owned() else {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.config.max_verbindungen,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            };

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            let verbindung = ClientConnection::neu(
                                self.hub.clone(),
                                Arc::clone(&self.config),
                                peer_addr,
                            );
                            tracing::debug!(
                                peer = %peer_addr,
                                verbindung = %verbindung.verbindung(),
                                "Verbindung akzeptiert"
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                                drop(platz);
                            });
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Signaling-Server gestoppt");
        Ok(())
    }
}
