//! Inbound message routing for one Cast connection.
//!
//! The router turns raw [`CastMessage`]s into typed [`StatusEvent`]s for the
//! device's tracker and into the protocol replies the connection owes the
//! device (heartbeat answers, virtual connections to the media app). It
//! holds no I/O so it can be driven directly from tests.

use crate::cast::framing::CastMessage;
use crate::cast::messages::{Inbound, ReceiverStatus, Request};
use crate::cast::types::{PlayerState, StatusEvent};
use crate::protocol_constants::{NS_CONNECTION, NS_HEARTBEAT, NS_MEDIA, NS_RECEIVER};

/// The media app session the connection is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSession {
    pub session_id: String,
    pub transport_id: String,
}

/// Session bookkeeping shared between the reader task and command methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSlot {
    /// Set once the first `RECEIVER_STATUS` has been seen.
    pub status_seen: bool,
    /// App ID in the foreground, after retirement filtering.
    pub running_app_id: Option<String>,
    /// Session ID of the foreground app, whichever app it is.
    pub running_session_id: Option<String>,
    /// Attached media app session, if the expected app is running.
    pub current: Option<AppSession>,
    /// Session stopped by us; reports still naming it are treated as stale.
    pub retired: Option<String>,
}

/// A message the connection must send in response to an inbound one.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub destination_id: String,
    pub namespace: &'static str,
    pub request: Request,
}

/// Result of routing one inbound message.
#[derive(Debug, Default, PartialEq)]
pub struct Routed {
    pub events: Vec<StatusEvent>,
    pub replies: Vec<Reply>,
}

/// Stateful router for one connection.
#[derive(Debug)]
pub struct InboundRouter {
    expected_app_id: String,
}

impl InboundRouter {
    pub fn new(expected_app_id: impl Into<String>) -> Self {
        Self {
            expected_app_id: expected_app_id.into(),
        }
    }

    /// Routes one message, updating `slot` in place.
    ///
    /// `next_request_id` is consulted for replies that need one.
    pub fn route(
        &self,
        message: &CastMessage,
        slot: &mut SessionSlot,
        next_request_id: &mut dyn FnMut() -> i64,
    ) -> Routed {
        let mut routed = Routed::default();
        let Some(inbound) = message.payload_text().and_then(Inbound::parse) else {
            log::trace!(
                "[Cast] Ignoring non-JSON payload on {}",
                message.namespace
            );
            return routed;
        };

        match inbound {
            Inbound::Ping => routed.replies.push(Reply {
                destination_id: message.source_id.clone(),
                namespace: NS_HEARTBEAT,
                request: Request::Pong,
            }),
            Inbound::Pong | Inbound::Other => {}
            Inbound::Close => {
                let closed_current = slot
                    .current
                    .as_ref()
                    .is_some_and(|s| s.transport_id == message.source_id);
                if closed_current {
                    log::debug!("[Cast] Media transport {} closed", message.source_id);
                    slot.current = None;
                    routed.events.push(StatusEvent::player(PlayerState::Unknown));
                }
            }
            Inbound::ReceiverStatus { status } => {
                self.on_receiver_status(&status, slot, next_request_id, &mut routed);
            }
            Inbound::MediaStatus { status } => {
                let state = status
                    .first()
                    .map(|entry| entry.player_state)
                    .unwrap_or(PlayerState::Unknown);
                if let Some(entry) = status.first() {
                    if let Some(reason) = &entry.idle_reason {
                        log::debug!("[Cast] Player idle reason: {}", reason);
                    }
                }
                routed.events.push(StatusEvent::player(state));
            }
            Inbound::LaunchError { reason } => {
                log::warn!("[Cast] Launch failed: {}", reason.unwrap_or_default());
            }
            Inbound::LoadFailed | Inbound::LoadCancelled => {
                log::warn!("[Cast] Media load was rejected by the receiver");
            }
            Inbound::InvalidRequest { reason } => {
                log::warn!("[Cast] Invalid request: {}", reason.unwrap_or_default());
            }
        }

        routed
    }

    fn on_receiver_status(
        &self,
        status: &ReceiverStatus,
        slot: &mut SessionSlot,
        next_request_id: &mut dyn FnMut() -> i64,
        routed: &mut Routed,
    ) {
        slot.status_seen = true;

        let app = status
            .running_app()
            .filter(|app| slot.retired.as_deref() != Some(app.session_id.as_str()));

        let app_id = app.map(|app| app.app_id.clone());
        slot.running_app_id = app_id.clone();
        slot.running_session_id = app.map(|app| app.session_id.clone());
        routed.events.push(StatusEvent::App { app_id });

        let media_app = app.filter(|app| app.app_id == self.expected_app_id);
        match media_app {
            Some(app) => {
                let already_attached = slot
                    .current
                    .as_ref()
                    .is_some_and(|s| s.transport_id == app.transport_id);
                if already_attached {
                    return;
                }
                log::debug!(
                    "[Cast] Attaching to media app session {} on {}",
                    app.session_id,
                    app.transport_id
                );
                routed.replies.push(Reply {
                    destination_id: app.transport_id.clone(),
                    namespace: NS_CONNECTION,
                    request: Request::Connect,
                });
                routed.replies.push(Reply {
                    destination_id: app.transport_id.clone(),
                    namespace: NS_MEDIA,
                    request: Request::GetStatus {
                        request_id: next_request_id(),
                    },
                });
                slot.current = Some(AppSession {
                    session_id: app.session_id.clone(),
                    transport_id: app.transport_id.clone(),
                });
            }
            None => {
                if slot.current.take().is_some() {
                    routed.events.push(StatusEvent::player(PlayerState::Unknown));
                }
            }
        }
    }
}

/// Namespace used for requests addressed to the platform receiver.
pub fn receiver_namespace(request: &Request) -> &'static str {
    match request {
        Request::Connect | Request::Close => NS_CONNECTION,
        Request::Ping | Request::Pong => NS_HEARTBEAT,
        Request::Load { .. } => NS_MEDIA,
        Request::GetStatus { .. } | Request::Launch { .. } | Request::Stop { .. } => NS_RECEIVER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "CC1AD845";

    fn message(source: &str, namespace: &str, payload: &str) -> CastMessage {
        CastMessage::text(source, "sender-0", namespace, payload)
    }

    fn receiver_status(app_id: &str, session: &str, transport: &str) -> CastMessage {
        message(
            "receiver-0",
            NS_RECEIVER,
            &format!(
                r#"{{"type":"RECEIVER_STATUS","status":{{"applications":[{{"appId":"{}","sessionId":"{}","transportId":"{}"}}]}}}}"#,
                app_id, session, transport
            ),
        )
    }

    fn route(router: &InboundRouter, msg: &CastMessage, slot: &mut SessionSlot) -> Routed {
        let mut counter = 0;
        router.route(msg, slot, &mut || {
            counter += 1;
            counter
        })
    }

    #[test]
    fn ping_is_answered_with_pong() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        let routed = route(
            &router,
            &message("receiver-0", NS_HEARTBEAT, r#"{"type":"PING"}"#),
            &mut slot,
        );
        assert!(routed.events.is_empty());
        assert_eq!(
            routed.replies,
            vec![Reply {
                destination_id: "receiver-0".to_string(),
                namespace: NS_HEARTBEAT,
                request: Request::Pong,
            }]
        );
    }

    #[test]
    fn media_app_status_attaches_once() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();

        let routed = route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);
        assert!(slot.status_seen);
        assert_eq!(routed.events, vec![StatusEvent::app(APP)]);
        assert_eq!(routed.replies.len(), 2);
        assert_eq!(routed.replies[0].request, Request::Connect);
        assert_eq!(routed.replies[0].destination_id, "web-1");
        assert_eq!(routed.replies[1].namespace, NS_MEDIA);
        assert_eq!(
            slot.current,
            Some(AppSession {
                session_id: "s1".to_string(),
                transport_id: "web-1".to_string(),
            })
        );

        let routed = route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);
        assert_eq!(routed.events, vec![StatusEvent::app(APP)]);
        assert!(routed.replies.is_empty());
    }

    #[test]
    fn other_app_reports_app_and_drops_media_session() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);

        let routed = route(&router, &receiver_status("233637DE", "s2", "web-2"), &mut slot);
        assert_eq!(
            routed.events,
            vec![
                StatusEvent::app("233637DE"),
                StatusEvent::player(PlayerState::Unknown)
            ]
        );
        assert!(routed.replies.is_empty());
        assert!(slot.current.is_none());
        assert_eq!(slot.running_app_id.as_deref(), Some("233637DE"));
        assert_eq!(slot.running_session_id.as_deref(), Some("s2"));
    }

    #[test]
    fn retired_session_counts_as_no_app() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot {
            retired: Some("s1".to_string()),
            ..SessionSlot::default()
        };
        let routed = route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);
        assert_eq!(routed.events, vec![StatusEvent::no_app()]);
        assert!(routed.replies.is_empty());
        assert!(slot.current.is_none());
    }

    #[test]
    fn media_status_maps_first_entry() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        let routed = route(
            &router,
            &message(
                "web-1",
                NS_MEDIA,
                r#"{"type":"MEDIA_STATUS","status":[{"mediaSessionId":1,"playerState":"PLAYING"}]}"#,
            ),
            &mut slot,
        );
        assert_eq!(routed.events, vec![StatusEvent::player(PlayerState::Playing)]);
    }

    #[test]
    fn empty_media_status_is_unknown() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        let routed = route(
            &router,
            &message("web-1", NS_MEDIA, r#"{"type":"MEDIA_STATUS","status":[]}"#),
            &mut slot,
        );
        assert_eq!(routed.events, vec![StatusEvent::player(PlayerState::Unknown)]);
    }

    #[test]
    fn close_from_media_transport_ends_session() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);

        let routed = route(
            &router,
            &message("web-1", NS_CONNECTION, r#"{"type":"CLOSE"}"#),
            &mut slot,
        );
        assert_eq!(routed.events, vec![StatusEvent::player(PlayerState::Unknown)]);
        assert!(slot.current.is_none());
    }

    #[test]
    fn close_from_unrelated_transport_is_ignored() {
        let router = InboundRouter::new(APP);
        let mut slot = SessionSlot::default();
        route(&router, &receiver_status(APP, "s1", "web-1"), &mut slot);

        let routed = route(
            &router,
            &message("web-9", NS_CONNECTION, r#"{"type":"CLOSE"}"#),
            &mut slot,
        );
        assert!(routed.events.is_empty());
        assert!(slot.current.is_some());
    }

    #[test]
    fn receiver_requests_use_expected_namespaces() {
        assert_eq!(receiver_namespace(&Request::Connect), NS_CONNECTION);
        assert_eq!(receiver_namespace(&Request::Ping), NS_HEARTBEAT);
        assert_eq!(
            receiver_namespace(&Request::GetStatus { request_id: 1 }),
            NS_RECEIVER
        );
    }
}
