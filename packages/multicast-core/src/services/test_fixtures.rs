//! Shared test doubles for the playback services.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::cast::{
    CastConnector, CastControl, CastDiscovery, CastEndpoint, CastError, CastResult, CastSession,
    PlayerState, StatusEvent,
};
use crate::catalog::{Batch, CatalogProvider, CatalogResult, Item};
use crate::events::{DispatchEvent, EventEmitter};
use crate::protocol_constants::DEFAULT_MEDIA_RECEIVER_APP_ID;

pub const APP: &str = DEFAULT_MEDIA_RECEIVER_APP_ID;

pub fn item(id: &str) -> Item {
    Item::new(id, format!("http://cdn/{}.mp4", id))
}

pub fn batch(ids: &[&str]) -> Batch {
    ids.iter().map(|id| item(id)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Cast
// ─────────────────────────────────────────────────────────────────────────────

struct FakeInner {
    auto_confirm: AtomicBool,
    fail_play: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<StatusEvent>>>,
    receiver: Mutex<Option<mpsc::Receiver<StatusEvent>>>,
    played: Mutex<Vec<String>>,
    content_types: Mutex<Vec<String>>,
    quits: AtomicUsize,
}

/// Scriptable device.
///
/// An auto-confirming fake answers `play_media` with the media app coming
/// up and the player reaching `PLAYING`; a silent one never answers.
#[derive(Clone)]
pub struct FakeCast {
    inner: Arc<FakeInner>,
}

impl FakeCast {
    fn build(auto_confirm: bool) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            inner: Arc::new(FakeInner {
                auto_confirm: AtomicBool::new(auto_confirm),
                fail_play: AtomicBool::new(false),
                sender: Mutex::new(Some(tx)),
                receiver: Mutex::new(Some(rx)),
                played: Mutex::new(Vec::new()),
                content_types: Mutex::new(Vec::new()),
                quits: AtomicUsize::new(0),
            }),
        }
    }

    pub fn auto_confirming() -> Self {
        Self::build(true)
    }

    pub fn silent() -> Self {
        Self::build(false)
    }

    pub fn set_auto_confirm(&self, on: bool) {
        self.inner.auto_confirm.store(on, Ordering::SeqCst);
    }

    pub fn fail_next_play(&self) {
        self.inner.fail_play.store(true, Ordering::SeqCst);
    }

    fn sender(&self) -> Option<mpsc::Sender<StatusEvent>> {
        self.inner.sender.lock().clone()
    }

    fn take_receiver(&self) -> mpsc::Receiver<StatusEvent> {
        self.inner
            .receiver
            .lock()
            .take()
            .expect("fake session already taken")
    }

    /// Pushes a status event as if the device reported it.
    pub async fn emit(&self, event: StatusEvent) {
        if let Some(tx) = self.sender() {
            let _ = tx.send(event).await;
        }
    }

    /// Reports the current item as finished.
    pub async fn finish(&self) {
        self.emit(StatusEvent::player(PlayerState::Idle)).await;
    }

    /// Ends the event path.
    pub fn disconnect(&self) {
        self.inner.sender.lock().take();
    }

    pub fn played(&self) -> Vec<String> {
        self.inner.played.lock().clone()
    }

    pub fn content_types(&self) -> Vec<String> {
        self.inner.content_types.lock().clone()
    }

    pub fn quit_count(&self) -> usize {
        self.inner.quits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CastControl for FakeCast {
    async fn play_media(&self, url: &str, content_type: &str) -> CastResult<()> {
        if self.inner.fail_play.swap(false, Ordering::SeqCst) {
            return Err(CastError::Send("fake".to_string(), "broken pipe".to_string()));
        }
        self.inner.played.lock().push(url.to_string());
        self.inner.content_types.lock().push(content_type.to_string());

        if self.inner.auto_confirm.load(Ordering::SeqCst) {
            self.emit(StatusEvent::app(APP)).await;
            self.emit(StatusEvent::player(PlayerState::Buffering)).await;
            self.emit(StatusEvent::player(PlayerState::Playing)).await;
        }
        Ok(())
    }

    async fn quit_app(&self) -> CastResult<()> {
        self.inner.quits.fetch_add(1, Ordering::SeqCst);
        self.emit(StatusEvent::no_app()).await;
        self.emit(StatusEvent::player(PlayerState::Idle)).await;
        Ok(())
    }
}

/// Builds a session backed by `fake`.
pub fn session(name: &str, fake: &FakeCast, running_app_id: Option<&str>) -> CastSession {
    CastSession {
        endpoint: CastEndpoint::new(name, "127.0.0.1", 8009),
        control: Arc::new(fake.clone()),
        events: fake.take_receiver(),
        running_app_id: running_app_id.map(ToString::to_string),
    }
}

/// Discovery and connector over a fixed set of fakes.
pub struct FakeCastClient {
    pub devices: Vec<(CastEndpoint, FakeCast)>,
    pub fail_connect: Option<String>,
    pub connects: AtomicUsize,
}

impl FakeCastClient {
    pub fn new(names: &[&str]) -> Self {
        let devices = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                (
                    CastEndpoint::new(*name, format!("10.0.0.{}", i + 1), 8009),
                    FakeCast::auto_confirming(),
                )
            })
            .collect();
        Self {
            devices,
            fail_connect: None,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn fake(&self, name: &str) -> &FakeCast {
        &self
            .devices
            .iter()
            .find(|(endpoint, _)| endpoint.name == name)
            .expect("unknown fake device")
            .1
    }
}

#[async_trait]
impl CastDiscovery for FakeCastClient {
    async fn discover(&self) -> CastResult<Vec<CastEndpoint>> {
        Ok(self.devices.iter().map(|(e, _)| e.clone()).collect())
    }
}

#[async_trait]
impl CastConnector for FakeCastClient {
    async fn connect(&self, endpoint: &CastEndpoint) -> CastResult<CastSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.as_deref() == Some(endpoint.name.as_str()) {
            return Err(CastError::Timeout(endpoint.name.clone(), 10));
        }
        let fake = self.fake(&endpoint.name);
        let mut session = session(&endpoint.name, fake, None);
        session.endpoint = endpoint.clone();
        Ok(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Catalog replaying scripted updates; the last one repeats forever.
pub struct FakeCatalog {
    script: VecDeque<CatalogResult<Batch>>,
    last: Batch,
    entry_count: usize,
    updates: Arc<AtomicUsize>,
}

impl FakeCatalog {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self::scripted(batches.into_iter().map(Ok).collect())
    }

    pub fn scripted(script: Vec<CatalogResult<Batch>>) -> Self {
        Self {
            script: script.into(),
            last: Batch::default(),
            entry_count: 0,
            updates: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `update` calls.
    pub fn updates(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.updates)
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn update(&mut self) -> CatalogResult<Batch> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let next = match self.script.pop_front() {
            Some(next) => next,
            None => Ok(self.last.clone()),
        };
        if let Ok(batch) = &next {
            self.last = batch.clone();
            self.entry_count = batch.len();
        }
        next
    }

    fn entry_count(&self) -> usize {
        self.entry_count
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// Emitter that keeps every event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().clone()
    }

    /// `(device, item_id)` of every confirmed playback, in order.
    pub fn confirmed(&self) -> Vec<(String, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                DispatchEvent::PlaybackConfirmed {
                    device, item_id, ..
                } => Some((device.clone(), item_id.clone())),
                _ => None,
            })
            .collect()
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: DispatchEvent) {
        self.events.lock().push(event);
    }
}
