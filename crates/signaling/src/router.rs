//! Signaling-Router – Zustandsmaschine fuer Presence, Chat und Anrufe
//!
//! Der Router ist rein synchron: jedes eingehende Event wird vollstaendig
//! verarbeitet (Zustandsaenderung plus Ausgaenge), bevor das naechste
//! beginnt. Er sendet nichts selbst, sondern gibt eine Liste von
//! `Ausgang`-Werten zurueck, die der Hub zustellt bzw. persistiert.
//!
//! ## Zielaufloesung
//! Signaling-Events nennen ihr Ziel entweder explizit oder als nackten
//! String. `ziel_bestimmen` ordnet den String ein (registrierte UserId,
//! sonst Verbindungs-ID), `aufloesen` liefert die lebende Verbindung.
//! Nicht aufloesbare Ziele werden still verworfen.

use chrono::{DateTime, Utc};
use plauder_core::types::{CallId, CallStatus, ConnectionId, MessageId, UserId, Ziel};
use plauder_db::models::{AnrufUpdate, NeueNachricht, NeuerAnruf};
use plauder_protocol::events::{
    AnswerCallRequest, CallAccepted, CallTargetRequest, CallUserRequest, ChatMessage,
    ClientEvent, ConnectedEvent, ErrorCode, IncomingCall, MuteStatusRequest, PeerMuteStatus,
    SendMessageRequest, ServerEvent, TypingEvent, TypingRequest, ZielAngabe,
};
use std::collections::HashSet;

use crate::config::SignalingConfig;
use crate::presence::PresenceBroadcaster;
use crate::registry::ConnectionRegistry;
use crate::session::{CallSession, CallSessionTable};

// ---------------------------------------------------------------------------
// Ausgaenge
// ---------------------------------------------------------------------------

/// Best-effort Schreibauftrag an die Persistenz
#[derive(Debug, Clone, PartialEq)]
pub enum SpeicherAuftrag {
    NachrichtSpeichern(NeueNachricht),
    AnrufAnlegen(NeuerAnruf),
    AnrufAktualisieren { id: CallId, update: AnrufUpdate },
    OnlineSetzen { user_id: UserId, online: bool },
}

/// Ergebnis der Verarbeitung eines Events
#[derive(Debug, Clone)]
pub enum Ausgang {
    /// An genau eine Verbindung senden
    An {
        verbindung: ConnectionId,
        event: ServerEvent,
    },
    /// An alle lebenden Verbindungen senden
    AnAlle { event: ServerEvent },
    /// Persistieren, ohne auf das Ergebnis zu warten
    Speichern(SpeicherAuftrag),
    /// Event hatte keinen erreichbaren Empfaenger
    Verworfen { event: &'static str },
}

impl Ausgang {
    fn an(verbindung: ConnectionId, event: ServerEvent) -> Self {
        Self::An { verbindung, event }
    }
}

// ---------------------------------------------------------------------------
// SignalingRouter
// ---------------------------------------------------------------------------

/// Besitzt Registry und Session-Tabelle und verarbeitet alle Events
#[derive(Debug)]
pub struct SignalingRouter {
    registry: ConnectionRegistry,
    sessions: CallSessionTable,
    lebend: HashSet<ConnectionId>,
    anrufe_bei_trennung_beenden: bool,
    max_nachrichten_laenge: usize,
}

impl SignalingRouter {
    pub fn neu(config: &SignalingConfig) -> Self {
        Self {
            registry: ConnectionRegistry::neu(),
            sessions: CallSessionTable::neu(),
            lebend: HashSet::new(),
            anrufe_bei_trennung_beenden: config.anrufe_bei_trennung_beenden,
            max_nachrichten_laenge: config.max_nachrichten_laenge,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &CallSessionTable {
        &self.sessions
    }

    pub fn verbindungen(&self) -> usize {
        self.lebend.len()
    }

    // -----------------------------------------------------------------------
    // Verbindungs-Lebenszyklus
    // -----------------------------------------------------------------------

    /// Neue Verbindung: als lebend markieren und ihre ID mitteilen
    pub fn verbunden(&mut self, verbindung: ConnectionId) -> Vec<Ausgang> {
        self.lebend.insert(verbindung);
        vec![Ausgang::an(
            verbindung,
            ServerEvent::Connected(ConnectedEvent {
                connection_id: verbindung,
            }),
        )]
    }

    /// Verbindung getrennt: Anrufe beenden, Registrierung entfernen
    pub fn getrennt(&mut self, verbindung: ConnectionId, jetzt: DateTime<Utc>) -> Vec<Ausgang> {
        let mut aus = Vec::new();
        if !self.lebend.remove(&verbindung) {
            return aus;
        }

        if self.anrufe_bei_trennung_beenden {
            for id in self.sessions.sessions_von(verbindung) {
                let Some(mut session) = self.sessions.entfernen(&id) else {
                    continue;
                };
                let gegenueber = session.gegenueber(verbindung);
                if session.beenden(jetzt) {
                    tracing::info!(
                        call_id = %id,
                        verbindung = %verbindung,
                        status = %session.status,
                        "Anruf durch Verbindungsabbruch beendet"
                    );
                    aus.push(Self::abschluss_speichern(&session));
                }
                if let Some(c) = gegenueber.filter(|c| self.lebend.contains(c)) {
                    aus.push(Ausgang::an(c, ServerEvent::CallEnded));
                }
            }
        }

        if let Some(user_id) = self.registry.unregister_by_handle(&verbindung) {
            aus.extend(PresenceBroadcaster::status_geaendert(&user_id, false));
        }
        aus
    }

    // -----------------------------------------------------------------------
    // Event-Dispatch
    // -----------------------------------------------------------------------

    /// Verarbeitet ein eingehendes Event einer Verbindung
    pub fn verarbeiten(
        &mut self,
        von: ConnectionId,
        event: ClientEvent,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        if !self.lebend.contains(&von) {
            tracing::debug!(verbindung = %von, event = event.name(), "Event von unbekannter Verbindung");
            return Vec::new();
        }

        match event {
            ClientEvent::RegisterUser(user_id) => self.register_user(von, user_id),
            ClientEvent::Logout => self.logout(von),
            ClientEvent::SendMessage(req) => self.send_message(von, req, jetzt),
            ClientEvent::CallUser(req) => self.call_user(von, req, jetzt),
            ClientEvent::AnswerCall(req) => self.answer_call(von, req, jetzt),
            ClientEvent::RejectCall(req) => self.reject_call(von, req, jetzt),
            ClientEvent::EndCall(req) => self.end_call(von, req, jetzt),
            ClientEvent::Typing(req) => self.typing(req, "typing", ServerEvent::UserTyping),
            ClientEvent::StopTyping(req) => {
                self.typing(req, "stop-typing", ServerEvent::UserStopTyping)
            }
            ClientEvent::MuteStatus(req) => self.mute_status(req),
            // Keepalive beantwortet die Verbindung selbst
            ClientEvent::Ping(_) | ClientEvent::Pong(_) => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Zielaufloesung
    // -----------------------------------------------------------------------

    /// Ordnet eine Ziel-Angabe ein
    ///
    /// Ein nackter String ist eine UserId, wenn sie registriert ist, sonst
    /// eine Verbindungs-ID wenn er sich als solche parsen laesst.
    pub fn ziel_bestimmen(&self, angabe: ZielAngabe) -> Ziel {
        match angabe {
            ZielAngabe::Explizit(ziel) => ziel,
            ZielAngabe::Roh(s) => {
                let user_id = UserId::new(s);
                if self.registry.ist_registriert(&user_id) {
                    return Ziel::User(user_id);
                }
                match ConnectionId::parse(user_id.as_str()) {
                    Ok(verbindung) => Ziel::Verbindung(verbindung),
                    Err(_) => Ziel::User(user_id),
                }
            }
        }
    }

    /// Lebende Verbindung hinter einem Ziel
    pub fn aufloesen(&self, ziel: &Ziel) -> Option<ConnectionId> {
        match ziel {
            Ziel::User(user_id) => self.registry.lookup(user_id),
            Ziel::Verbindung(c) => self.lebend.contains(c).then_some(*c),
        }
    }

    fn ziel_verbindung(&self, angabe: ZielAngabe) -> Option<ConnectionId> {
        let ziel = self.ziel_bestimmen(angabe);
        let verbindung = self.aufloesen(&ziel);
        if verbindung.is_none() {
            tracing::debug!(ziel = %ziel, "Ziel nicht erreichbar");
        }
        verbindung
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    fn register_user(&mut self, von: ConnectionId, user_id: UserId) -> Vec<Ausgang> {
        let ergebnis = self.registry.register(user_id.clone(), von);
        tracing::info!(
            user_id = %user_id,
            verbindung = %von,
            alte_verbindung = ?ergebnis.alte_verbindung,
            "Benutzer registriert"
        );

        let mut aus = Vec::new();
        if let Some(alt) = ergebnis.verdraengter_user {
            aus.extend(PresenceBroadcaster::status_geaendert(&alt, false));
        }
        aus.extend(PresenceBroadcaster::status_geaendert(&user_id, true));
        aus.push(PresenceBroadcaster::momentaufnahme(&self.registry, von));
        aus
    }

    fn logout(&mut self, von: ConnectionId) -> Vec<Ausgang> {
        match self.registry.unregister_by_handle(&von) {
            Some(user_id) => {
                tracing::info!(user_id = %user_id, verbindung = %von, "Benutzer abgemeldet");
                PresenceBroadcaster::status_geaendert(&user_id, false).into()
            }
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    fn send_message(
        &mut self,
        von: ConnectionId,
        req: SendMessageRequest,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        if req.text.trim().is_empty() {
            return vec![Ausgang::an(
                von,
                ServerEvent::error(ErrorCode::InvalidRequest, "Nachricht darf nicht leer sein"),
            )];
        }
        if req.text.len() > self.max_nachrichten_laenge {
            return vec![Ausgang::an(
                von,
                ServerEvent::error(
                    ErrorCode::InvalidRequest,
                    format!(
                        "Nachricht zu lang ({} Bytes, Maximum {})",
                        req.text.len(),
                        self.max_nachrichten_laenge
                    ),
                ),
            )];
        }

        let nachricht = ChatMessage {
            id: MessageId::new(),
            sender_id: req.sender_id,
            receiver_id: req.receiver_id,
            text: req.text,
            timestamp: jetzt,
        };

        let mut aus = Vec::with_capacity(3);
        match self.registry.lookup(&nachricht.receiver_id) {
            Some(c) => aus.push(Ausgang::an(c, ServerEvent::ReceiveMessage(nachricht.clone()))),
            None => tracing::debug!(
                receiver_id = %nachricht.receiver_id,
                "Empfaenger offline, Nachricht nur gespeichert"
            ),
        }
        aus.push(Ausgang::an(von, ServerEvent::MessageSent(nachricht.clone())));
        aus.push(Ausgang::Speichern(SpeicherAuftrag::NachrichtSpeichern(
            NeueNachricht {
                id: nachricht.id,
                sender_id: nachricht.sender_id,
                receiver_id: nachricht.receiver_id,
                text: nachricht.text,
                timestamp: nachricht.timestamp,
            },
        )));
        aus
    }

    fn typing(
        &self,
        req: TypingRequest,
        name: &'static str,
        event: impl FnOnce(TypingEvent) -> ServerEvent,
    ) -> Vec<Ausgang> {
        match self.registry.lookup(&req.receiver_id) {
            Some(c) => vec![Ausgang::an(
                c,
                event(TypingEvent {
                    sender_id: req.sender_id,
                }),
            )],
            None => vec![Ausgang::Verworfen { event: name }],
        }
    }

    // -----------------------------------------------------------------------
    // Anruf-Signaling
    // -----------------------------------------------------------------------

    fn call_user(
        &mut self,
        von: ConnectionId,
        req: CallUserRequest,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        let Some(caller_id) = self.registry.user_von(&von).cloned() else {
            tracing::warn!(verbindung = %von, "call-user ohne Registrierung verworfen");
            return vec![Ausgang::Verworfen { event: "call-user" }];
        };

        // Wiederholter Anruf ersetzt den vorigen Versuch
        let mut aus = Vec::new();
        for id in self.sessions.offene_anrufe(von, &req.user_to_call) {
            if let Some(mut alt) = self.sessions.entfernen(&id) {
                if alt.beenden(jetzt) {
                    tracing::debug!(call_id = %alt.id, status = %alt.status, "Vorheriger Anrufversuch abgeloest");
                    aus.push(Self::abschluss_speichern(&alt));
                }
            }
        }

        let receiver_verbindung = self.registry.lookup(&req.user_to_call);
        let mut session = CallSession::neu(
            caller_id,
            von,
            req.user_to_call,
            receiver_verbindung,
            req.call_type,
            jetzt,
        );

        aus.push(Ausgang::Speichern(SpeicherAuftrag::AnrufAnlegen(
            NeuerAnruf {
                id: session.id,
                caller_id: session.caller_id.clone(),
                receiver_id: session.receiver_id.clone(),
                call_type: session.call_type,
                status: CallStatus::Initiated,
                created_at: jetzt,
            },
        )));

        match receiver_verbindung {
            Some(c) => {
                tracing::debug!(
                    call_id = %session.id,
                    caller_id = %session.caller_id,
                    receiver_id = %session.receiver_id,
                    "Anruf signalisiert"
                );
                aus.push(Ausgang::an(
                    c,
                    ServerEvent::IncomingCall(IncomingCall {
                        signal: req.signal_data,
                        from: req.from.unwrap_or_else(|| von.inner().to_string()),
                        name: req.name,
                        call_type: session.call_type,
                        call_id: session.id,
                    }),
                ));
                self.sessions.einfuegen(session);
            }
            None => {
                session.verpassen(jetzt);
                tracing::debug!(
                    call_id = %session.id,
                    receiver_id = %session.receiver_id,
                    "Angerufener nicht erreichbar, Anruf verpasst"
                );
                aus.push(Self::abschluss_speichern(&session));
                aus.push(Ausgang::Verworfen { event: "call-user" });
            }
        }
        aus
    }

    fn answer_call(
        &mut self,
        von: ConnectionId,
        req: AnswerCallRequest,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        let ziel = self.ziel_verbindung(req.to);
        let von_user = self.registry.user_von(&von).cloned();
        let mut aus = Vec::new();

        if let Some(session) = self.session_finden(von, req.call_id, ziel) {
            let ist_angerufener = session.receiver_verbindung == Some(von)
                || von_user.as_ref() == Some(&session.receiver_id);
            if !ist_angerufener {
                tracing::debug!(call_id = %session.id, verbindung = %von, "answer-call vom Anrufer ignoriert");
            } else if session.annehmen(jetzt) {
                aus.push(Ausgang::Speichern(SpeicherAuftrag::AnrufAktualisieren {
                    id: session.id,
                    update: AnrufUpdate {
                        status: Some(CallStatus::Accepted),
                        start_time: session.start_time,
                        ..Default::default()
                    },
                }));
            } else {
                tracing::debug!(call_id = %session.id, status = %session.status, "answer-call ohne Wirkung");
            }
        }

        aus.push(match ziel {
            Some(c) => Ausgang::an(
                c,
                ServerEvent::CallAccepted(CallAccepted {
                    signal: req.signal,
                    name: req.name,
                }),
            ),
            None => Ausgang::Verworfen {
                event: "answer-call",
            },
        });
        aus
    }

    fn reject_call(
        &mut self,
        von: ConnectionId,
        req: CallTargetRequest,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        let ziel = self.ziel_verbindung(req.to);
        let mut aus = Vec::new();

        let abgelehnt = self
            .session_finden(von, req.call_id, ziel)
            .and_then(|session| session.ablehnen(jetzt).then_some(session.id));
        if let Some(id) = abgelehnt {
            if let Some(session) = self.sessions.entfernen(&id) {
                aus.push(Self::abschluss_speichern(&session));
            }
        }

        aus.push(match ziel {
            Some(c) => Ausgang::an(c, ServerEvent::CallRejected),
            None => Ausgang::Verworfen {
                event: "reject-call",
            },
        });
        aus
    }

    fn end_call(
        &mut self,
        von: ConnectionId,
        req: CallTargetRequest,
        jetzt: DateTime<Utc>,
    ) -> Vec<Ausgang> {
        let ziel = self.ziel_verbindung(req.to);
        let mut aus = Vec::new();

        let id = self.session_finden(von, req.call_id, ziel).map(|s| s.id);
        if let Some(mut session) = id.and_then(|id| self.sessions.entfernen(&id)) {
            if session.beenden(jetzt) {
                aus.push(Self::abschluss_speichern(&session));
            }
        }

        // call-ended geht auch ohne Session raus
        aus.push(match ziel {
            Some(c) => Ausgang::an(c, ServerEvent::CallEnded),
            None => Ausgang::Verworfen { event: "end-call" },
        });
        aus
    }

    fn mute_status(&self, req: MuteStatusRequest) -> Vec<Ausgang> {
        match self.ziel_verbindung(req.to) {
            Some(c) => vec![Ausgang::an(
                c,
                ServerEvent::PeerMuteStatus(PeerMuteStatus {
                    is_muted: req.is_muted,
                }),
            )],
            None => vec![Ausgang::Verworfen {
                event: "mute-status",
            }],
        }
    }

    fn session_finden(
        &mut self,
        von: ConnectionId,
        call_id: Option<CallId>,
        ziel: Option<ConnectionId>,
    ) -> Option<&mut CallSession> {
        let von_user = self.registry.user_von(&von).cloned();
        let id = self.sessions.finden(von, von_user.as_ref(), call_id, ziel)?;
        self.sessions.get_mut(&id)
    }

    /// Schreibauftrag fuer den Endzustand einer Session
    fn abschluss_speichern(session: &CallSession) -> Ausgang {
        Ausgang::Speichern(SpeicherAuftrag::AnrufAktualisieren {
            id: session.id,
            update: AnrufUpdate {
                status: Some(session.status),
                start_time: None,
                end_time: session.end_time,
                duration_seconds: Some(session.duration_seconds),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
