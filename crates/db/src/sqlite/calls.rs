//! SQLite-Implementierung des CallStore

use plauder_core::types::{CallId, CallStatus, CallType, UserId};

use crate::error::DbError;
use crate::models::{AnrufRecord, AnrufUpdate, NeuerAnruf};
use crate::repository::{CallStore, DbResult};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_laden, zeit_laden, zeit_speichern};

const SPALTEN: &str = "id, caller_id, receiver_id, call_type, status,
                       start_time, end_time, duration_seconds, created_at";

impl CallStore for SqliteDb {
    async fn create(&self, data: NeuerAnruf) -> DbResult<AnrufRecord> {
        sqlx::query(
            "INSERT INTO calls (id, caller_id, receiver_id, call_type, status, duration_seconds, created_at)
             VALUES (?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(data.id.inner().to_string())
        .bind(data.caller_id.as_str())
        .bind(data.receiver_id.as_str())
        .bind(data.call_type.als_str())
        .bind(data.status.als_str())
        .bind(zeit_speichern(&data.created_at))
        .execute(&self.pool)
        .await?;

        Ok(AnrufRecord {
            id: data.id,
            caller_id: data.caller_id,
            receiver_id: data.receiver_id,
            call_type: data.call_type,
            status: data.status,
            start_time: None,
            end_time: None,
            duration_seconds: 0.0,
            created_at: data.created_at,
        })
    }

    async fn update(&self, id: CallId, update: AnrufUpdate) -> DbResult<AnrufRecord> {
        let id_str = id.inner().to_string();

        let affected = sqlx::query(
            "UPDATE calls SET
                status = COALESCE(?, status),
                start_time = COALESCE(?, start_time),
                end_time = COALESCE(?, end_time),
                duration_seconds = COALESCE(?, duration_seconds)
             WHERE id = ?",
        )
        .bind(update.status.map(|s| s.als_str()))
        .bind(update.start_time.as_ref().map(zeit_speichern))
        .bind(update.end_time.as_ref().map(zeit_speichern))
        .bind(update.duration_seconds)
        .bind(&id_str)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Anruf {id}")));
        }

        let row = sqlx::query(&format!("SELECT {SPALTEN} FROM calls WHERE id = ?"))
            .bind(&id_str)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::intern("Anruf nach Update nicht gefunden"))?;

        row_to_anruf(&row)
    }

    async fn history(&self, user_id: &UserId, limit: i64) -> DbResult<Vec<AnrufRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {SPALTEN} FROM calls
             WHERE caller_id = ? OR receiver_id = ?
             ORDER BY created_at DESC
             LIMIT ?"
        ))
        .bind(user_id.as_str())
        .bind(user_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_anruf).collect()
    }
}

fn row_to_anruf(row: &sqlx::sqlite::SqliteRow) -> DbResult<AnrufRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;

    let typ_str: String = row.try_get("call_type")?;
    let call_type = typ_str
        .parse::<CallType>()
        .map_err(|e| DbError::ungueltig(e.to_string()))?;

    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<CallStatus>()
        .map_err(|e| DbError::ungueltig(e.to_string()))?;

    let start_time: Option<String> = row.try_get("start_time")?;
    let end_time: Option<String> = row.try_get("end_time")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(AnrufRecord {
        id: CallId(uuid_laden(&id_str, "Anruf")?),
        caller_id: UserId::new(row.try_get::<String, _>("caller_id")?),
        receiver_id: UserId::new(row.try_get::<String, _>("receiver_id")?),
        call_type,
        status,
        start_time: start_time.as_deref().map(zeit_laden).transpose()?,
        end_time: end_time.as_deref().map(zeit_laden).transpose()?,
        duration_seconds: row.try_get("duration_seconds")?,
        created_at: zeit_laden(&created_at)?,
    })
}
