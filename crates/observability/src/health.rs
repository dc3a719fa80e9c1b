//! Health-Check fuer den Relay
//!
//! `GET /health` liefert immer 200, solange der Prozess antwortet. Faellt die
//! Datenbank aus, relayt der Server weiter und meldet `degraded`.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    fn aus_db(db_verbunden: bool) -> Self {
        if db_verbunden {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub server: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub db_connected: bool,
}

/// Von Server und DB-Pruefung geteilter Zustand
#[derive(Clone)]
pub struct HealthState {
    server_name: Arc<str>,
    gestartet: Instant,
    db_verbunden: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu(server_name: impl Into<Arc<str>>) -> Self {
        Self {
            server_name: server_name.into(),
            gestartet: Instant::now(),
            db_verbunden: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn db_verbunden(&self) -> bool {
        self.db_verbunden.load(Ordering::Relaxed)
    }

    pub fn db_status_setzen(&self, verbunden: bool) {
        self.db_verbunden.store(verbunden, Ordering::Relaxed);
    }

    /// Momentaufnahme fuer die Antwort
    pub fn bericht(&self) -> HealthResponse {
        let db_connected = self.db_verbunden();
        HealthResponse {
            status: HealthStatus::aus_db(db_connected),
            server: self.server_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.gestartet.elapsed().as_secs(),
            db_connected,
        }
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    Json(state.bericht())
}
