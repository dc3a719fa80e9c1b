//! Integration-Tests fuer MessageStore (In-Memory SQLite)

use chrono::{Duration, Utc};
use plauder_core::types::{MessageId, UserId};
use plauder_db::{models::NeueNachricht, MessageStore, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn nachricht(von: &str, an: &str, text: &str, offset_ms: i64) -> NeueNachricht {
    NeueNachricht {
        id: MessageId::new(),
        sender_id: UserId::new(von),
        receiver_id: UserId::new(an),
        text: text.into(),
        timestamp: Utc::now() + Duration::milliseconds(offset_ms),
    }
}

#[tokio::test]
async fn nachricht_speichern_gibt_datensatz_zurueck() {
    let db = db().await;
    let neu = nachricht("alice", "bob", "Hallo Bob", 0);
    let id = neu.id;

    let record = db.save(neu).await.expect("Speichern fehlgeschlagen");
    assert_eq!(record.id, id);
    assert_eq!(record.text, "Hallo Bob");
    assert_eq!(record.sender_id, UserId::new("alice"));
}

#[tokio::test]
async fn verlauf_enthaelt_beide_richtungen_chronologisch() {
    let db = db().await;
    db.save(nachricht("alice", "bob", "eins", 0)).await.unwrap();
    db.save(nachricht("bob", "alice", "zwei", 10)).await.unwrap();
    db.save(nachricht("alice", "bob", "drei", 20)).await.unwrap();
    // Fremde Unterhaltung darf nicht auftauchen
    db.save(nachricht("alice", "carol", "geheim", 30)).await.unwrap();

    let verlauf = db
        .conversation(&UserId::new("bob"), &UserId::new("alice"), 50)
        .await
        .unwrap();

    let texte: Vec<&str> = verlauf.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texte, vec!["eins", "zwei", "drei"]);
}

#[tokio::test]
async fn verlauf_limit_behaelt_neueste() {
    let db = db().await;
    for i in 0..5 {
        db.save(nachricht("alice", "bob", &format!("n{i}"), i * 10))
            .await
            .unwrap();
    }

    let verlauf = db
        .conversation(&UserId::new("alice"), &UserId::new("bob"), 2)
        .await
        .unwrap();

    let texte: Vec<&str> = verlauf.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texte, vec!["n3", "n4"]);
}

#[tokio::test]
async fn leerer_verlauf() {
    let db = db().await;
    let verlauf = db
        .conversation(&UserId::new("x"), &UserId::new("y"), 50)
        .await
        .unwrap();
    assert!(verlauf.is_empty());
}
