//! One live Cast v2 control channel.
//!
//! A [`CastConnection`] owns two background tasks:
//! - a reader that decodes frames, feeds them through the
//!   [`InboundRouter`] and forwards status events to the device's inbox
//! - a heartbeat that keeps the channel open with periodic `PING`s
//!
//! Both stop when the connection handle is dropped or the device closes
//! the socket. The inbox closes at the same time, which is how the
//! device's tracker learns that the event path has ended.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::cast::framing::{CastCodec, CastMessage};
use crate::cast::messages::{MediaInformation, Request};
use crate::cast::router::{receiver_namespace, AppSession, InboundRouter, SessionSlot};
use crate::cast::traits::{CastControl, CastSession};
use crate::cast::types::{CastEndpoint, CastError, CastResult, StatusEvent};
use crate::config::CastConfig;
use crate::protocol_constants::{NS_HEARTBEAT, NS_MEDIA, PLATFORM_RECEIVER_ID};

type FrameWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, CastCodec>;

/// Broadcast destination used by receivers for unsolicited status.
const BROADCAST_ID: &str = "*";

/// Media waiting for the launched app to come up.
#[derive(Debug, Clone)]
struct PendingLoad {
    url: String,
    content_type: String,
    deadline: Instant,
}

/// Session state plus whether the reader has stopped.
#[derive(Debug, Clone, Default)]
struct Link {
    slot: SessionSlot,
    pending_load: Option<PendingLoad>,
    closed: bool,
}

impl Link {
    /// Attached media session, unless it has been stopped by us.
    fn live_session(&self) -> Option<AppSession> {
        self.slot
            .current
            .as_ref()
            .filter(|s| self.slot.retired.as_deref() != Some(s.session_id.as_str()))
            .cloned()
    }
}

/// State shared between the connection handle and its background tasks.
struct Shared {
    name: String,
    sender_id: String,
    writer: Mutex<FrameWriter>,
    link: watch::Sender<Link>,
    request_id: AtomicI64,
}

impl Shared {
    fn next_request_id(&self) -> i64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    async fn send(&self, destination: &str, namespace: &str, request: &Request) -> CastResult<()> {
        let message = CastMessage::text(
            self.sender_id.as_str(),
            destination,
            namespace,
            request.to_payload(),
        );
        let mut writer = self.writer.lock().await;
        writer
            .send(message)
            .await
            .map_err(|e| CastError::Send(self.name.clone(), e.to_string()))
    }

    async fn send_to_receiver(&self, request: &Request) -> CastResult<()> {
        self.send(PLATFORM_RECEIVER_ID, receiver_namespace(request), request)
            .await
    }

    async fn load(&self, session: &AppSession, url: &str, content_type: &str) -> CastResult<()> {
        let request = Request::Load {
            request_id: self.next_request_id(),
            session_id: session.session_id.clone(),
            media: MediaInformation::buffered(url, content_type),
            autoplay: true,
            current_time: 0.0,
        };
        log::debug!("[Cast] {} LOAD {}", self.name, url);
        self.send(&session.transport_id, NS_MEDIA, &request).await
    }

    /// Sends a pending `LOAD` once the launched app is attached.
    async fn flush_pending_load(&self) {
        let mut ready = None;
        self.link.send_if_modified(|link| {
            let Some(session) = link.live_session() else {
                return false;
            };
            ready = link.pending_load.take().map(|load| (session, load));
            ready.is_some()
        });

        let Some((session, load)) = ready else { return };
        if Instant::now() > load.deadline {
            log::warn!(
                "[Cast] {} started the media app too late, dropping {}",
                self.name,
                load.url
            );
            return;
        }
        if let Err(e) = self.load(&session, &load.url, &load.content_type).await {
            log::warn!("[Cast] {}", e);
        }
    }
}

/// Handle to an established Cast connection.
///
/// Implements [`CastControl`]; dropping the last handle stops the
/// background tasks.
pub struct CastConnection {
    shared: Arc<Shared>,
    app_id: String,
    launch_timeout: Duration,
    cancel: CancellationToken,
}

impl CastConnection {
    /// Runs the Cast handshake over an already-secured stream.
    ///
    /// Sends `CONNECT` and `GET_STATUS` to the platform receiver and waits
    /// for the first `RECEIVER_STATUS` so the returned session knows which
    /// app the device is running.
    pub async fn establish<S>(
        endpoint: &CastEndpoint,
        stream: S,
        config: &CastConfig,
    ) -> CastResult<CastSession>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let writer: Box<dyn AsyncWrite + Send + Unpin> = Box::new(write_half);
        let (link, mut link_rx) = watch::channel(Link::default());

        let shared = Arc::new(Shared {
            name: endpoint.name.clone(),
            sender_id: format!("sender-{}", uuid::Uuid::new_v4().simple()),
            writer: Mutex::new(FramedWrite::new(writer, CastCodec::new())),
            link,
            request_id: AtomicI64::new(0),
        });

        let cancel = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));

        tokio::spawn(read_loop(
            Arc::clone(&shared),
            FramedRead::new(read_half, CastCodec::new()),
            InboundRouter::new(config.app_id.clone()),
            events_tx,
            cancel.clone(),
        ));

        let connection = Self {
            shared: Arc::clone(&shared),
            app_id: config.app_id.clone(),
            launch_timeout: Duration::from_millis(config.launch_timeout_ms),
            cancel: cancel.clone(),
        };

        shared.send_to_receiver(&Request::Connect).await?;
        shared
            .send_to_receiver(&Request::GetStatus {
                request_id: shared.next_request_id(),
            })
            .await?;

        let wait = link_rx.wait_for(|link| link.slot.status_seen || link.closed);
        let running_app_id = match timeout(Duration::from_millis(config.connect_timeout_ms), wait).await {
            Ok(Ok(link)) if link.closed && !link.slot.status_seen => {
                return Err(CastError::Disconnected(endpoint.name.clone()));
            }
            Ok(Ok(link)) => link.slot.running_app_id.clone(),
            Ok(Err(_)) => return Err(CastError::Disconnected(endpoint.name.clone())),
            Err(_) => {
                return Err(CastError::Timeout(
                    endpoint.name.clone(),
                    config.connect_timeout_ms,
                ))
            }
        };

        tokio::spawn(heartbeat_loop(
            Arc::clone(&shared),
            Duration::from_millis(config.heartbeat_interval_ms.max(1)),
            cancel,
        ));

        log::info!(
            "[Cast] Connected to {} (running app: {})",
            endpoint,
            running_app_id.as_deref().unwrap_or("none")
        );

        Ok(CastSession {
            endpoint: endpoint.clone(),
            control: Arc::new(connection),
            events: events_rx,
            running_app_id,
        })
    }
}

impl Drop for CastConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl CastControl for CastConnection {
    async fn play_media(&self, url: &str, content_type: &str) -> CastResult<()> {
        let mut live = None;
        self.shared.link.send_if_modified(|link| {
            live = link.live_session();
            if live.is_none() {
                link.pending_load = Some(PendingLoad {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                    deadline: Instant::now() + self.launch_timeout,
                });
            }
            false
        });

        if let Some(session) = live {
            return self.shared.load(&session, url, content_type).await;
        }

        log::debug!("[Cast] {} LAUNCH {}", self.shared.name, self.app_id);
        self.shared
            .send_to_receiver(&Request::Launch {
                request_id: self.shared.next_request_id(),
                app_id: self.app_id.clone(),
            })
            .await
    }

    async fn quit_app(&self) -> CastResult<()> {
        let session_id = self.shared.link.borrow().slot.running_session_id.clone();
        self.shared
            .send_to_receiver(&Request::Stop {
                request_id: self.shared.next_request_id(),
                session_id: session_id.clone(),
            })
            .await?;
        if let Some(session_id) = session_id {
            self.shared
                .link
                .send_modify(|link| link.slot.retired = Some(session_id));
        }
        Ok(())
    }
}

async fn read_loop<R>(
    shared: Arc<Shared>,
    mut frames: FramedRead<R, CastCodec>,
    router: InboundRouter,
    events: mpsc::Sender<StatusEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = frames.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                log::warn!("[Cast] {} read failed: {}", shared.name, e);
                break;
            }
            None => {
                log::info!("[Cast] {} closed the connection", shared.name);
                break;
            }
        };

        if message.destination_id != shared.sender_id && message.destination_id != BROADCAST_ID {
            continue;
        }

        let mut routed = None;
        shared.link.send_modify(|link| {
            routed = Some(router.route(&message, &mut link.slot, &mut || {
                shared.next_request_id()
            }));
        });
        let Some(routed) = routed else { continue };

        for reply in &routed.replies {
            if let Err(e) = shared
                .send(&reply.destination_id, reply.namespace, &reply.request)
                .await
            {
                log::warn!("[Cast] {}", e);
            }
        }
        shared.flush_pending_load().await;

        for event in routed.events {
            if events.send(event).await.is_err() {
                log::debug!("[Cast] {} inbox dropped, stopping reader", shared.name);
                cancel.cancel();
                break;
            }
        }
    }

    shared.link.send_modify(|link| link.closed = true);
    cancel.cancel();
}

async fn heartbeat_loop(shared: Arc<Shared>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if let Err(e) = shared
            .send(PLATFORM_RECEIVER_ID, NS_HEARTBEAT, &Request::Ping)
            .await
        {
            log::warn!("[Cast] Heartbeat stopped: {}", e);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cast::framing::CastMessage;
    use crate::protocol_constants::{NS_CONNECTION, NS_RECEIVER};
    use tokio::io::DuplexStream;
    use tokio_util::codec::Framed;

    type Device = Framed<DuplexStream, CastCodec>;

    fn config() -> CastConfig {
        CastConfig {
            connect_timeout_ms: 2_000,
            launch_timeout_ms: 2_000,
            heartbeat_interval_ms: 60_000,
            ..CastConfig::default()
        }
    }

    async fn recv(device: &mut Device) -> (CastMessage, serde_json::Value) {
        let message = device.next().await.unwrap().unwrap();
        let json = serde_json::from_str(message.payload_text().unwrap()).unwrap();
        (message, json)
    }

    async fn reply(device: &mut Device, to: &str, source: &str, namespace: &str, payload: &str) {
        device
            .send(CastMessage::text(source, to, namespace, payload))
            .await
            .unwrap();
    }

    fn receiver_status(apps: &str) -> String {
        format!(
            r#"{{"type":"RECEIVER_STATUS","status":{{"applications":[{}]}}}}"#,
            apps
        )
    }

    const MEDIA_APP: &str =
        r#"{"appId":"CC1AD845","sessionId":"s1","transportId":"web-1"}"#;

    /// Runs the device side of the handshake and returns the sender id.
    async fn handshake(device: &mut Device, apps: &str) -> String {
        let (connect, json) = recv(device).await;
        assert_eq!(connect.namespace, NS_CONNECTION);
        assert_eq!(json["type"], "CONNECT");
        let (status, json) = recv(device).await;
        assert_eq!(status.namespace, NS_RECEIVER);
        assert_eq!(json["type"], "GET_STATUS");
        let sender = connect.source_id.clone();
        reply(device, &sender, "receiver-0", NS_RECEIVER, &receiver_status(apps)).await;
        sender
    }

    async fn connect(apps: &'static str) -> (CastSession, Device, String) {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let mut device = Framed::new(theirs, CastCodec::new());
        let endpoint = CastEndpoint::new("Kitchen", "127.0.0.1", 8009);
        let config = config();
        let (session, sender) = tokio::join!(
            CastConnection::establish(&endpoint, ours, &config),
            handshake(&mut device, apps)
        );
        (session.unwrap(), device, sender)
    }

    #[tokio::test]
    async fn establish_reports_running_app() {
        let (mut session, _device, _sender) = connect(MEDIA_APP).await;
        assert_eq!(session.running_app_id.as_deref(), Some("CC1AD845"));
        assert_eq!(session.events.recv().await, Some(StatusEvent::app("CC1AD845")));
    }

    #[tokio::test]
    async fn establish_times_out_without_status() {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        let _device = Framed::new(theirs, CastCodec::new());
        let endpoint = CastEndpoint::new("Kitchen", "127.0.0.1", 8009);
        let config = CastConfig {
            connect_timeout_ms: 50,
            ..config()
        };
        let result = CastConnection::establish(&endpoint, ours, &config).await;
        assert!(matches!(result, Err(CastError::Timeout(_, 50))));
    }

    #[tokio::test]
    async fn establish_fails_when_device_hangs_up() {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        drop(theirs);
        let endpoint = CastEndpoint::new("Kitchen", "127.0.0.1", 8009);
        let result = CastConnection::establish(&endpoint, ours, &config()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn play_media_launches_then_loads() {
        let (mut session, mut device, sender) = connect("").await;
        assert_eq!(session.events.recv().await, Some(StatusEvent::no_app()));

        session
            .control
            .play_media("http://host/v.mp4", "video/mp4")
            .await
            .unwrap();

        let (_, launch) = recv(&mut device).await;
        assert_eq!(launch["type"], "LAUNCH");
        assert_eq!(launch["appId"], "CC1AD845");

        reply(&mut device, &sender, "receiver-0", NS_RECEIVER, &receiver_status(MEDIA_APP)).await;
        assert_eq!(session.events.recv().await, Some(StatusEvent::app("CC1AD845")));

        let (connect, json) = recv(&mut device).await;
        assert_eq!(connect.destination_id, "web-1");
        assert_eq!(json["type"], "CONNECT");
        let (media_status, json) = recv(&mut device).await;
        assert_eq!(media_status.namespace, NS_MEDIA);
        assert_eq!(json["type"], "GET_STATUS");

        let (load, json) = recv(&mut device).await;
        assert_eq!(load.destination_id, "web-1");
        assert_eq!(json["type"], "LOAD");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["media"]["contentId"], "http://host/v.mp4");
    }

    #[tokio::test]
    async fn play_media_loads_directly_into_running_app() {
        let (mut session, mut device, _sender) = connect(MEDIA_APP).await;
        assert_eq!(session.events.recv().await, Some(StatusEvent::app("CC1AD845")));
        // attach messages triggered by the handshake status
        recv(&mut device).await;
        recv(&mut device).await;

        session
            .control
            .play_media("http://host/a.mp4", "video/mp4")
            .await
            .unwrap();
        let (_, json) = recv(&mut device).await;
        assert_eq!(json["type"], "LOAD");
    }

    #[tokio::test]
    async fn media_status_reaches_inbox_and_ping_is_answered() {
        let (mut session, mut device, sender) = connect(MEDIA_APP).await;
        session.events.recv().await;
        recv(&mut device).await;
        recv(&mut device).await;

        reply(
            &mut device,
            &sender,
            "web-1",
            NS_MEDIA,
            r#"{"type":"MEDIA_STATUS","status":[{"mediaSessionId":1,"playerState":"BUFFERING"}]}"#,
        )
        .await;
        assert_eq!(
            session.events.recv().await,
            Some(StatusEvent::player(crate::cast::types::PlayerState::Buffering))
        );

        reply(&mut device, &sender, "receiver-0", NS_HEARTBEAT, r#"{"type":"PING"}"#).await;
        let (pong, json) = recv(&mut device).await;
        assert_eq!(pong.namespace, NS_HEARTBEAT);
        assert_eq!(json["type"], "PONG");
    }

    #[tokio::test]
    async fn quit_app_stops_running_session() {
        let (mut session, mut device, sender) = connect(MEDIA_APP).await;
        session.events.recv().await;
        recv(&mut device).await;
        recv(&mut device).await;

        session.control.quit_app().await.unwrap();
        let (_, json) = recv(&mut device).await;
        assert_eq!(json["type"], "STOP");
        assert_eq!(json["sessionId"], "s1");

        // a late status still naming the stopped session reads as "no app"
        reply(&mut device, &sender, "receiver-0", NS_RECEIVER, &receiver_status(MEDIA_APP)).await;
        assert_eq!(session.events.recv().await, Some(StatusEvent::no_app()));
        assert_eq!(
            session.events.recv().await,
            Some(StatusEvent::player(crate::cast::types::PlayerState::Unknown))
        );
    }

    #[tokio::test]
    async fn inbox_closes_when_device_disconnects() {
        let (mut session, device, _sender) = connect("").await;
        session.events.recv().await;
        drop(device);
        assert_eq!(session.events.recv().await, None);
    }
}
