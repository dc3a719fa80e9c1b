//! Prometheus-kompatible Metriken fuer Plauder
//!
//! Registrierte Metriken:
//! - `plauder_connected_clients` – Gauge: Aktuell verbundene TCP-Clients
//! - `plauder_online_users` – Gauge: Registrierte Benutzer
//! - `plauder_events_total` – Counter: Eingehende Events (event)
//! - `plauder_events_dropped_total` – Counter: Nicht zustellbare Events
//! - `plauder_calls_total` – Counter: Abgeschlossene Anrufe (status)
//! - `plauder_persistence_errors_total` – Counter: Fehlgeschlagene Schreibauftraege
//! - `plauder_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `plauder_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Plauder-Prometheus-Metriken
///
/// Clone teilt die Registry und alle Collector-Handles.
#[derive(Clone)]
pub struct PlauderMetrics {
    pub registry: Arc<Registry>,

    // Relay-Metriken
    pub connected_clients: Gauge,
    pub online_users: Gauge,
    pub events_total: IntCounterVec,
    pub events_dropped_total: IntCounter,
    pub calls_total: IntCounterVec,
    pub persistence_errors_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl PlauderMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Relay-Metriken ---
        let connected_clients = Gauge::with_opts(Opts::new(
            "plauder_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let online_users = Gauge::with_opts(Opts::new(
            "plauder_online_users",
            "Anzahl registrierter Benutzer",
        ))?;
        registry.register(Box::new(online_users.clone()))?;

        let events_total = IntCounterVec::new(
            Opts::new("plauder_events_total", "Gesamtanzahl eingehender Events"),
            &["event"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let events_dropped_total = IntCounter::with_opts(Opts::new(
            "plauder_events_dropped_total",
            "Events ohne erreichbaren Empfaenger",
        ))?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let calls_total = IntCounterVec::new(
            Opts::new("plauder_calls_total", "Abgeschlossene Anrufe nach Endstatus"),
            &["status"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let persistence_errors_total = IntCounter::with_opts(Opts::new(
            "plauder_persistence_errors_total",
            "Fehlgeschlagene oder verworfene Schreibauftraege",
        ))?;
        registry.register(Box::new(persistence_errors_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("plauder_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "plauder_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            online_users,
            events_total,
            events_dropped_total,
            calls_total,
            persistence_errors_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Zaehlt ein eingehendes Event
    pub fn event_zaehlen(&self, event: &str) {
        self.events_total.with_label_values(&[event]).inc();
    }

    /// Zaehlt einen abgeschlossenen Anruf
    pub fn anruf_zaehlen(&self, status: &str) {
        self.calls_total.with_label_values(&[status]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: PlauderMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<PlauderMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
