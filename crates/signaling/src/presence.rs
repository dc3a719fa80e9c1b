//! Presence-Broadcaster – Online/Offline-Meldungen an alle Verbindungen
//!
//! Jede Aenderung der Registry wird an **alle** lebenden Verbindungen
//! gemeldet, nicht nur an Kontakte. Das kostet O(n) pro Login/Logout.

use plauder_core::types::{ConnectionId, UserId};
use plauder_protocol::events::{OnlineUsersEvent, ServerEvent, UserStatusChange};

use crate::registry::ConnectionRegistry;
use crate::router::{Ausgang, SpeicherAuftrag};

/// Erzeugt die Ausgaenge einer Presence-Aenderung
pub struct PresenceBroadcaster;

impl PresenceBroadcaster {
    /// Status-Wechsel eines Benutzers: Broadcast plus Persistenz
    pub fn status_geaendert(user_id: &UserId, online: bool) -> [Ausgang; 2] {
        tracing::info!(
            user_id = %user_id,
            online,
            "Presence geaendert"
        );
        [
            Ausgang::AnAlle {
                event: ServerEvent::UserStatusChange(UserStatusChange {
                    user_id: user_id.clone(),
                    online,
                }),
            },
            Ausgang::Speichern(SpeicherAuftrag::OnlineSetzen {
                user_id: user_id.clone(),
                online,
            }),
        ]
    }

    /// Momentaufnahme aller registrierten Benutzer fuer eine Verbindung
    pub fn momentaufnahme(registry: &ConnectionRegistry, an: ConnectionId) -> Ausgang {
        Ausgang::An {
            verbindung: an,
            event: ServerEvent::OnlineUsers(OnlineUsersEvent {
                user_ids: registry.alle_user(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wechsel_erzeugt_broadcast_und_auftrag() {
        let [broadcast, auftrag] = PresenceBroadcaster::status_geaendert(&UserId::new("a"), false);

        match broadcast {
            Ausgang::AnAlle {
                event: ServerEvent::UserStatusChange(change),
            } => {
                assert_eq!(change.user_id, UserId::new("a"));
                assert!(!change.online);
            }
            other => panic!("Erwartet Broadcast, erhalten {other:?}"),
        }
        assert!(matches!(
            auftrag,
            Ausgang::Speichern(SpeicherAuftrag::OnlineSetzen { online: false, .. })
        ));
    }

    #[test]
    fn momentaufnahme_enthaelt_alle_user() {
        let mut registry = ConnectionRegistry::neu();
        registry.register(UserId::new("bob"), ConnectionId::new());
        registry.register(UserId::new("alice"), ConnectionId::new());
        let an = ConnectionId::new();

        match PresenceBroadcaster::momentaufnahme(&registry, an) {
            Ausgang::An {
                verbindung,
                event: ServerEvent::OnlineUsers(e),
            } => {
                assert_eq!(verbindung, an);
                assert_eq!(e.user_ids, vec![UserId::new("alice"), UserId::new("bob")]);
            }
            other => panic!("Erwartet OnlineUsers, erhalten {other:?}"),
        }
    }
}
