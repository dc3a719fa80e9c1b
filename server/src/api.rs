//! History-API (`/api/...`)
//!
//! Liest Chat-Verlauf und Anruf-Historie aus dem Speicher. Die Endpunkte
//! laufen unabhaengig vom Signaling-Hub direkt gegen die Datenbank.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use plauder_core::types::UserId;
use plauder_db::{CallStore, MessageStore};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Standard- und Hoechstzahl zurueckgegebener Eintraege
const STANDARD_LIMIT: i64 = 500;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NachrichtenQuery {
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AnrufeQuery {
    pub limit: Option<i64>,
}

/// Erstellt den `/api`-Router
pub fn api_router<S>(store: Arc<S>) -> Router
where
    S: MessageStore + CallStore + 'static,
{
    Router::new()
        .route("/api/messages", get(nachrichten::<S>))
        .route("/api/calls/:user_id", get(anrufe::<S>))
        .with_state(store)
}

fn limit(angefragt: Option<i64>) -> i64 {
    angefragt.unwrap_or(STANDARD_LIMIT).clamp(1, MAX_LIMIT)
}

fn fehler(status: StatusCode, nachricht: impl Into<String>) -> Response {
    (status, Json(json!({ "error": nachricht.into() }))).into_response()
}

/// `GET /api/messages?senderId=..&receiverId=..`
async fn nachrichten<S>(State(store): State<Arc<S>>, Query(params): Query<NachrichtenQuery>) -> Response
where
    S: MessageStore + CallStore + 'static,
{
    let (Some(a), Some(b)) = (params.sender_id, params.receiver_id) else {
        return fehler(
            StatusCode::BAD_REQUEST,
            "senderId und receiverId sind erforderlich",
        );
    };

    match store
        .conversation(&UserId::new(a), &UserId::new(b), limit(params.limit))
        .await
    {
        Ok(verlauf) => (StatusCode::OK, Json(verlauf)).into_response(),
        Err(e) => {
            tracing::warn!(fehler = %e, "Verlauf konnte nicht geladen werden");
            fehler(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// `GET /api/calls/:user_id`
async fn anrufe<S>(
    State(store): State<Arc<S>>,
    Path(user_id): Path<String>,
    Query(params): Query<AnrufeQuery>,
) -> Response
where
    S: MessageStore + CallStore + 'static,
{
    match store
        .history(&UserId::new(user_id), limit(params.limit))
        .await
    {
        Ok(anrufe) => (StatusCode::OK, Json(anrufe)).into_response(),
        Err(e) => {
            tracing::warn!(fehler = %e, "Anruf-Historie konnte nicht geladen werden");
            fehler(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use plauder_core::types::{CallId, CallStatus, CallType, MessageId};
    use plauder_db::models::{NeueNachricht, NeuerAnruf};
    use plauder_db::SqliteDb;
    use tower::ServiceExt;

    async fn json_antwort(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let antwort = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = antwort.status();
        let bytes = to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn verlauf_in_beide_richtungen() {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let start = Utc::now();
        for (i, (von, an)) in [("alice", "bob"), ("bob", "alice"), ("alice", "carol")]
            .into_iter()
            .enumerate()
        {
            db.save(NeueNachricht {
                id: MessageId::new(),
                sender_id: UserId::new(von),
                receiver_id: UserId::new(an),
                text: format!("Nachricht {i}"),
                timestamp: start + Duration::seconds(i as i64),
            })
            .await
            .unwrap();
        }

        let (status, body) =
            json_antwort(api_router(db), "/api/messages?senderId=bob&receiverId=alice").await;
        assert_eq!(status, StatusCode::OK);
        let texte: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["text"].as_str().unwrap())
            .collect();
        assert_eq!(texte, vec!["Nachricht 0", "Nachricht 1"]);
    }

    #[tokio::test]
    async fn fehlende_parameter_ergeben_400() {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let (status, body) = json_antwort(api_router(db), "/api/messages?senderId=bob").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn anruf_historie_eines_benutzers() {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        db.create(NeuerAnruf {
            id: CallId::new(),
            caller_id: UserId::new("alice"),
            receiver_id: UserId::new("bob"),
            call_type: CallType::Video,
            status: CallStatus::Initiated,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        let (status, body) = json_antwort(api_router(Arc::clone(&db)), "/api/calls/bob").await;
        assert_eq!(status, StatusCode::OK);
        let anrufe = body.as_array().unwrap();
        assert_eq!(anrufe.len(), 1);
        assert_eq!(anrufe[0]["callerId"], "alice");
        assert_eq!(anrufe[0]["status"], "initiated");

        let (_, body) = json_antwort(api_router(db), "/api/calls/carol").await;
        assert!(body.as_array().unwrap().is_empty());
    }

    #[test]
    fn limit_wird_begrenzt() {
        assert_eq!(limit(None), STANDARD_LIMIT);
        assert_eq!(limit(Some(5000)), MAX_LIMIT);
        assert_eq!(limit(Some(0)), 1);
    }
}
