//! plauder-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod api;
pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use plauder_db::SqliteDb;
use plauder_observability::{
    health_router, http_metriken, metrics_router, request_timing_layer, HealthState,
    PlauderMetrics,
};
use plauder_signaling::{SignalingHub, SignalingServer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

/// Intervall des Datenbank-Health-Checks
const DB_PRUEF_INTERVALL: Duration = Duration::from_secs(30);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

/// Gestartete Subsysteme, bereit zum geordneten Herunterfahren
pub struct LaufenderServer {
    pub tcp_adresse: SocketAddr,
    pub http_adresse: SocketAddr,
    pub metriken: PlauderMetrics,
    shutdown_tx: watch::Sender<bool>,
    tcp_task: JoinHandle<std::io::Result<()>>,
    http_task: JoinHandle<std::io::Result<()>>,
    hub_task: JoinHandle<()>,
    db_pruefung: JoinHandle<()>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let laufend = self.hochfahren().await?;

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        laufend.herunterfahren().await
    }

    /// Bindet alle Sockets und startet die Tasks
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen und migrieren
    /// 2. Signaling-Hub samt Persistenz-Worker starten
    /// 3. TCP-Listener (Signaling-Protokoll)
    /// 4. HTTP-Server (History-API, `/health`, `/metrics`)
    pub async fn hochfahren(&self) -> Result<LaufenderServer> {
        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %self.config.tcp_bind_adresse(),
            http = %self.config.http_bind_adresse(),
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&self.config.datenbank_config())
                .await
                .with_context(|| format!("Datenbank '{}' nicht verfuegbar", self.config.datenbank.url))?,
        );

        let metriken = PlauderMetrics::neu()?;
        let health = HealthState::neu(self.config.server.name.as_str());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Signaling
        let signaling_config = self.config.signaling_config();
        let (hub, hub_task) =
            SignalingHub::starten(&signaling_config, Arc::clone(&db), metriken.clone());
        let tcp_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .context("Ungueltige TCP-Bind-Adresse")?;
        let tcp_server = SignalingServer::binden(tcp_addr, hub, signaling_config)
            .await
            .with_context(|| format!("TCP-Port {tcp_addr} nicht verfuegbar"))?;
        let tcp_adresse = tcp_server.lokale_adresse()?;
        let tcp_task = tokio::spawn(tcp_server.starten(shutdown_rx.clone()));

        // HTTP
        let app = api::api_router(Arc::clone(&db))
            .merge(metrics_router(metriken.clone()))
            .merge(health_router(health.clone()))
            .layer(axum::middleware::from_fn_with_state(
                metriken.clone(),
                http_metriken,
            ))
            .layer(request_timing_layer())
            .layer(CorsLayer::permissive());

        let listener = tokio::net::TcpListener::bind(self.config.http_bind_adresse())
            .await
            .with_context(|| format!("HTTP-Port {} nicht verfuegbar", self.config.http_bind_adresse()))?;
        let http_adresse = listener.local_addr()?;
        let mut http_shutdown = shutdown_rx.clone();
        let http_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while http_shutdown.changed().await.is_ok() {
                        if *http_shutdown.borrow() {
                            break;
                        }
                    }
                })
                .await
        });
        tracing::info!(adresse = %http_adresse, "HTTP-Server gestartet");

        let db_pruefung = tokio::spawn(db_pruefen(db, health, shutdown_rx));

        Ok(LaufenderServer {
            tcp_adresse,
            http_adresse,
            metriken,
            shutdown_tx,
            tcp_task,
            http_task,
            hub_task,
            db_pruefung,
        })
    }
}

impl LaufenderServer {
    /// Signalisiert Shutdown und wartet auf alle Tasks
    ///
    /// Der Hub endet erst, wenn alle Verbindungen getrennt und alle
    /// Schreibauftraege ausgefuehrt sind.
    pub async fn herunterfahren(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        self.tcp_task.await??;
        self.http_task.await??;
        self.hub_task.await?;
        self.db_pruefung.await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Prueft periodisch die Datenbank und setzt den Health-Status
async fn db_pruefen(db: Arc<SqliteDb>, health: HealthState, mut shutdown_rx: watch::Receiver<bool>) {
    let mut intervall = tokio::time::interval(DB_PRUEF_INTERVALL);
    loop {
        tokio::select! {
            _ = intervall.tick() => {
                let verbunden = match db.ping().await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(fehler = %e, "Datenbank nicht erreichbar");
                        false
                    }
                };
                if verbunden != health.db_verbunden() {
                    tracing::info!(verbunden, "Datenbank-Status geaendert");
                }
                health.db_status_setzen(verbunden);
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }
}
