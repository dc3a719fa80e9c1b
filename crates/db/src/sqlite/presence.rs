//! SQLite-Implementierung des PresenceStore

use chrono::Utc;
use plauder_core::types::UserId;

use crate::repository::{DbResult, PresenceStore};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::zeit_speichern;

impl PresenceStore for SqliteDb {
    async fn set_online(&self, user_id: &UserId, online: bool) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO presence (user_id, is_online, last_seen) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                is_online = excluded.is_online,
                last_seen = excluded.last_seen",
        )
        .bind(user_id.as_str())
        .bind(online)
        .bind(zeit_speichern(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_online(&self, user_id: &UserId) -> DbResult<bool> {
        let online: Option<bool> =
            sqlx::query_scalar("SELECT is_online FROM presence WHERE user_id = ?")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(online.unwrap_or(false))
    }
}
