//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod calls;
pub mod messages;
pub mod pool;
pub mod presence;

pub use pool::SqliteDb;

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::DbResult;

/// Zeitstempel in fester Breite, damit die Textsortierung chronologisch ist
pub(crate) fn zeit_speichern(zeit: &DateTime<Utc>) -> String {
    zeit.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn zeit_laden(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige Zeitangabe '{s}': {e}")))
}

pub(crate) fn uuid_laden(s: &str, feld: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::intern(format!("Ungueltige {feld} UUID '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zeitformat_hat_feste_breite() {
        let a = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1500);
        let (sa, sb) = (zeit_speichern(&a), zeit_speichern(&b));
        assert_eq!(sa.len(), sb.len());
        assert!(sa < sb);
        assert_eq!(zeit_laden(&sb).unwrap(), b);
    }

    #[test]
    fn ungueltige_zeit_ist_fehler() {
        assert!(zeit_laden("gestern").is_err());
    }
}
