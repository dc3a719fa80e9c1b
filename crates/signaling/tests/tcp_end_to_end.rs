//! End-to-End-Tests ueber echte TCP-Verbindungen

use futures_util::{SinkExt, StreamExt};
use plauder_core::types::{CallStatus, CallType, ConnectionId, UserId};
use plauder_db::{CallStore, MessageStore, SqliteDb};
use plauder_observability::PlauderMetrics;
use plauder_protocol::events::{
    AnswerCallRequest, CallTargetRequest, CallUserRequest, ClientEvent, SendMessageRequest,
    ServerEvent, ZielAngabe,
};
use plauder_protocol::wire::ClientCodec;
use plauder_signaling::{SignalingConfig, SignalingHub, SignalingServer};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, ClientCodec>;

struct Testserver {
    adresse: SocketAddr,
    db: Arc<SqliteDb>,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
    hub: JoinHandle<()>,
}

async fn server_starten(config: SignalingConfig) -> Testserver {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let metriken = PlauderMetrics::neu().unwrap();
    let (hub_handle, hub) = SignalingHub::starten(&config, Arc::clone(&db), metriken);

    let server = SignalingServer::binden("127.0.0.1:0".parse().unwrap(), hub_handle, config)
        .await
        .unwrap();
    let adresse = server.lokale_adresse().unwrap();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(server.starten(shutdown_rx));

    Testserver {
        adresse,
        db,
        shutdown,
        server,
        hub,
    }
}

async fn naechstes(client: &mut Client) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("Timeout beim Warten auf Event")
        .expect("Verbindung geschlossen")
        .expect("Frame-Fehler")
}

/// Liest bis ein Event das Praedikat erfuellt
async fn warten_auf(client: &mut Client, mut pruefen: impl FnMut(&ServerEvent) -> bool) -> ServerEvent {
    loop {
        let event = naechstes(client).await;
        if pruefen(&event) {
            return event;
        }
    }
}

async fn verbinden(adresse: SocketAddr) -> (Client, ConnectionId) {
    let stream = TcpStream::connect(adresse).await.unwrap();
    let mut client = Framed::new(stream, ClientCodec::default());
    match naechstes(&mut client).await {
        ServerEvent::Connected(e) => (client, e.connection_id),
        other => panic!("Erwartet connected, erhalten {other:?}"),
    }
}

async fn anmelden(adresse: SocketAddr, user: &str) -> (Client, ConnectionId) {
    let (mut client, id) = verbinden(adresse).await;
    client
        .send(ClientEvent::RegisterUser(UserId::new(user)))
        .await
        .unwrap();
    warten_auf(&mut client, |e| matches!(e, ServerEvent::OnlineUsers(_))).await;
    (client, id)
}

#[tokio::test]
async fn anruf_ueber_tcp_wird_gespeichert() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut alice, alice_id) = anmelden(server.adresse, "alice").await;
    let (mut bob, _) = anmelden(server.adresse, "bob").await;

    alice
        .send(ClientEvent::CallUser(CallUserRequest {
            user_to_call: UserId::new("bob"),
            signal_data: json!({"sdp": "offer"}),
            from: None,
            name: "Alice".into(),
            call_type: CallType::Audio,
        }))
        .await
        .unwrap();

    let eingehend = warten_auf(&mut bob, |e| matches!(e, ServerEvent::IncomingCall(_))).await;
    let ServerEvent::IncomingCall(eingehend) = eingehend else {
        unreachable!()
    };
    assert_eq!(eingehend.from, alice_id.inner().to_string());
    assert_eq!(eingehend.call_type, CallType::Audio);

    bob.send(ClientEvent::AnswerCall(AnswerCallRequest {
        signal: json!({"sdp": "answer"}),
        to: ZielAngabe::Roh(eingehend.from.clone()),
        name: "Bob".into(),
        call_id: Some(eingehend.call_id),
    }))
    .await
    .unwrap();
    match warten_auf(&mut alice, |e| matches!(e, ServerEvent::CallAccepted(_))).await {
        ServerEvent::CallAccepted(a) => assert_eq!(a.signal["sdp"], "answer"),
        other => panic!("Erwartet call-accepted, erhalten {other:?}"),
    }

    alice
        .send(ClientEvent::EndCall(CallTargetRequest {
            to: ZielAngabe::Roh("bob".into()),
            call_id: None,
        }))
        .await
        .unwrap();
    warten_auf(&mut bob, |e| matches!(e, ServerEvent::CallEnded)).await;

    // Alles abbauen, damit der Persistenz-Worker leerlaeuft
    drop(alice);
    drop(bob);
    server.shutdown.send(true).unwrap();
    server.server.await.unwrap().unwrap();
    server.hub.await.unwrap();

    let anrufe = server.db.history(&UserId::new("alice"), 10).await.unwrap();
    assert_eq!(anrufe.len(), 1);
    assert_eq!(anrufe[0].id, eingehend.call_id);
    assert_eq!(anrufe[0].status, CallStatus::Ended);
    assert!(anrufe[0].start_time.is_some());
    assert!(anrufe[0].duration_seconds >= 0.0);
}

#[tokio::test]
async fn chat_und_presence_ueber_tcp() {
    let server = server_starten(SignalingConfig::default()).await;
    let (mut alice, _) = anmelden(server.adresse, "alice").await;
    let (mut bob, _) = anmelden(server.adresse, "bob").await;

    // Alice sieht Bob online gehen
    warten_auf(&mut alice, |e| {
        matches!(e, ServerEvent::UserStatusChange(s) if s.user_id == UserId::new("bob") && s.online)
    })
    .await;

    bob.send(ClientEvent::SendMessage(SendMessageRequest {
        sender_id: UserId::new("bob"),
        receiver_id: UserId::new("alice"),
        text: "Hallo Alice".into(),
    }))
    .await
    .unwrap();

    match warten_auf(&mut alice, |e| matches!(e, ServerEvent::ReceiveMessage(_))).await {
        ServerEvent::ReceiveMessage(m) => assert_eq!(m.text, "Hallo Alice"),
        other => panic!("Erwartet receive-message, erhalten {other:?}"),
    }
    warten_auf(&mut bob, |e| matches!(e, ServerEvent::MessageSent(_))).await;

    // Bob trennt, Alice bekommt offline
    drop(bob);
    warten_auf(&mut alice, |e| {
        matches!(e, ServerEvent::UserStatusChange(s) if s.user_id == UserId::new("bob") && !s.online)
    })
    .await;

    drop(alice);
    server.shutdown.send(true).unwrap();
    server.server.await.unwrap().unwrap();
    server.hub.await.unwrap();

    let verlauf = server
        .db
        .conversation(&UserId::new("alice"), &UserId::new("bob"), 50)
        .await
        .unwrap();
    assert_eq!(verlauf.len(), 1);
    assert_eq!(verlauf[0].text, "Hallo Alice");
}

#[tokio::test]
async fn verbindungslimit_wird_durchgesetzt() {
    let server = server_starten(SignalingConfig {
        max_verbindungen: 1,
        ..Default::default()
    })
    .await;

    let (_erster, _) = verbinden(server.adresse).await;

    let stream = TcpStream::connect(server.adresse).await.unwrap();
    let mut zweiter = Framed::new(stream, ClientCodec::default());
    let ergebnis = tokio::time::timeout(Duration::from_secs(5), zweiter.next())
        .await
        .expect("Verbindung haette geschlossen werden muessen");
    assert!(!matches!(ergebnis, Some(Ok(_))));
}
