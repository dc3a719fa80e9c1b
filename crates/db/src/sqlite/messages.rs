//! SQLite-Implementierung des MessageStore

use plauder_core::types::{MessageId, UserId};

use crate::models::{NachrichtRecord, NeueNachricht};
use crate::repository::{DbResult, MessageStore};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_laden, zeit_laden, zeit_speichern};

impl MessageStore for SqliteDb {
    async fn save(&self, data: NeueNachricht) -> DbResult<NachrichtRecord> {
        sqlx::query(
            "INSERT INTO messages (id, sender_id, receiver_id, text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(data.id.inner().to_string())
        .bind(data.sender_id.as_str())
        .bind(data.receiver_id.as_str())
        .bind(&data.text)
        .bind(zeit_speichern(&data.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(NachrichtRecord {
            id: data.id,
            sender_id: data.sender_id,
            receiver_id: data.receiver_id,
            text: data.text,
            timestamp: data.timestamp,
        })
    }

    async fn conversation(
        &self,
        a: &UserId,
        b: &UserId,
        limit: i64,
    ) -> DbResult<Vec<NachrichtRecord>> {
        // Die neuesten `limit` Nachrichten, danach chronologisch sortiert
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, text, created_at
             FROM messages
             WHERE (sender_id = ? AND receiver_id = ?)
                OR (sender_id = ? AND receiver_id = ?)
             ORDER BY created_at DESC
             LIMIT ?",
        )
        .bind(a.as_str())
        .bind(b.as_str())
        .bind(b.as_str())
        .bind(a.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<NachrichtRecord> =
            rows.iter().map(row_to_nachricht).collect::<DbResult<_>>()?;
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}

fn row_to_nachricht(row: &sqlx::sqlite::SqliteRow) -> DbResult<NachrichtRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let created_str: String = row.try_get("created_at")?;

    Ok(NachrichtRecord {
        id: MessageId(uuid_laden(&id_str, "Nachrichten")?),
        sender_id: UserId::new(row.try_get::<String, _>("sender_id")?),
        receiver_id: UserId::new(row.try_get::<String, _>("receiver_id")?),
        text: row.try_get("text")?,
        timestamp: zeit_laden(&created_str)?,
    })
}
