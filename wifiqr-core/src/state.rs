//! Application state: the screen's data as an immutable snapshot, the pure
//! reducer that turns events into new snapshots, and the controller that
//! owns the current snapshot and persists the saved list.

use crate::formatter::{self, AuthType};
use crate::renderer::{self, DEFAULT_QR_SIZE, QrBitmap};
use crate::store::NetworkStore;
use crate::traits::{KeyValueStore, WifiNetwork};
use crate::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// One snapshot of everything the UI shows.
///
/// Snapshots are never modified after publication; every transition builds
/// a new one.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub ssid: String,
    pub password: String,
    pub qr_text: String,
    /// `None` before the first generation, or when rendering failed.
    pub qr_bitmap: Option<Arc<QrBitmap>>,
    pub saved_networks: Arc<[WifiNetwork]>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SsidChanged(String),
    PasswordChanged(String),
    GenerateRequested,
    SaveRequested,
    NetworkSelected(WifiNetwork),
    NetworkDeleted(WifiNetwork),
    /// Result of the startup read of the store.
    NetworksLoaded(Vec<WifiNetwork>),
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Write this full list to the store.
    Persist(Arc<[WifiNetwork]>),
}

/// Settings used whenever a transition produces a QR code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrGenerator {
    pub size: u32,
    pub auth: AuthType,
}

impl Default for QrGenerator {
    fn default() -> Self {
        Self {
            size: DEFAULT_QR_SIZE,
            auth: AuthType::Wpa,
        }
    }
}

impl QrGenerator {
    /// Returns the content string and its bitmap, if it could be rendered.
    pub fn generate(&self, ssid: &str, password: &str) -> (String, Option<Arc<QrBitmap>>) {
        let text = formatter::format_with_auth(ssid, password, self.auth.as_str());
        let bitmap = renderer::render(&text, self.size).map(Arc::new);
        (text, bitmap)
    }
}

/// Applies `event` to `state`.
pub fn reduce(state: &UiState, event: Event, generator: &QrGenerator) -> (UiState, Effect) {
    match event {
        Event::SsidChanged(ssid) => (UiState { ssid, ..state.clone() }, Effect::None),
        Event::PasswordChanged(password) => (
            UiState {
                password,
                ..state.clone()
            },
            Effect::None,
        ),
        Event::GenerateRequested => {
            let (qr_text, qr_bitmap) = generator.generate(&state.ssid, &state.password);
            (
                UiState {
                    qr_text,
                    qr_bitmap,
                    ..state.clone()
                },
                Effect::None,
            )
        }
        Event::SaveRequested => {
            if state.ssid.trim().is_empty()
                || state.saved_networks.iter().any(|n| n.ssid == state.ssid)
            {
                return (state.clone(), Effect::None);
            }
            let saved_networks: Arc<[WifiNetwork]> = state
                .saved_networks
                .iter()
                .cloned()
                .chain(std::iter::once(WifiNetwork::new(
                    state.ssid.clone(),
                    state.password.clone(),
                )))
                .collect();
            (
                UiState {
                    saved_networks: saved_networks.clone(),
                    ..state.clone()
                },
                Effect::Persist(saved_networks),
            )
        }
        Event::NetworkSelected(network) => {
            let (qr_text, qr_bitmap) = generator.generate(&network.ssid, &network.password);
            (
                UiState {
                    ssid: network.ssid,
                    password: network.password,
                    qr_text,
                    qr_bitmap,
                    saved_networks: state.saved_networks.clone(),
                },
                Effect::None,
            )
        }
        Event::NetworkDeleted(network) => {
            let saved_networks: Arc<[WifiNetwork]> = state
                .saved_networks
                .iter()
                .filter(|n| !(n.ssid == network.ssid && n.password == network.password))
                .cloned()
                .collect();
            (
                UiState {
                    saved_networks: saved_networks.clone(),
                    ..state.clone()
                },
                Effect::Persist(saved_networks),
            )
        }
        Event::NetworksLoaded(networks) => (
            UiState {
                saved_networks: networks.into(),
                ..state.clone()
            },
            Effect::None,
        ),
    }
}

struct PersistJob {
    networks: Arc<[WifiNetwork]>,
    reply: Option<oneshot::Sender<Result<()>>>,
}

struct Inner<S> {
    store: Arc<NetworkStore<S>>,
    generator: QrGenerator,
    state_tx: watch::Sender<Arc<UiState>>,
    // Applies events one at a time and keeps queue order equal to event order.
    dispatch_lock: Mutex<()>,
    persist_tx: mpsc::UnboundedSender<PersistJob>,
    persist_failures: Arc<AtomicU64>,
}

/// Owns the current [`UiState`] and runs store I/O on background tasks.
///
/// Cloning yields another handle to the same state.
pub struct StateController<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for StateController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static> StateController<S> {
    /// Creates the controller and spawns its persistence worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: NetworkStore<S>, generator: QrGenerator) -> Self {
        let store = Arc::new(store);
        let (state_tx, _) = watch::channel(Arc::new(UiState::default()));
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let persist_failures = Arc::new(AtomicU64::new(0));

        tokio::spawn(run_persist_worker(
            store.clone(),
            persist_rx,
            persist_failures.clone(),
        ));

        Self {
            inner: Arc::new(Inner {
                store,
                generator,
                state_tx,
                dispatch_lock: Mutex::new(()),
                persist_tx,
                persist_failures,
            }),
        }
    }

    pub fn store(&self) -> &NetworkStore<S> {
        &self.inner.store
    }

    pub fn generator(&self) -> &QrGenerator {
        &self.inner.generator
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<UiState> {
        self.inner.state_tx.borrow().clone()
    }

    /// A receiver notified with every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<UiState>> {
        self.inner.state_tx.subscribe()
    }

    /// Number of background writes that failed since startup.
    pub fn persist_failures(&self) -> u64 {
        self.inner.persist_failures.load(Ordering::Relaxed)
    }

    /// Applies `event` and publishes the new snapshot.
    ///
    /// A requested write is queued and this returns without waiting for it;
    /// failures are logged and counted.
    pub async fn dispatch(&self, event: Event) -> Arc<UiState> {
        let (next, effect) = self.apply(event).await;
        if let Effect::Persist(networks) = effect {
            let job = PersistJob {
                networks,
                reply: None,
            };
            if self.inner.persist_tx.send(job).is_err() {
                error!("Persistence worker stopped; saved networks were not written");
                self.inner.persist_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        next
    }

    /// Like [`dispatch`](Self::dispatch), but waits for a requested write
    /// and returns its error.
    pub async fn dispatch_and_persist(&self, event: Event) -> Result<Arc<UiState>> {
        let (next, effect) = self.apply(event).await;
        if let Effect::Persist(networks) = effect {
            let (reply_tx, reply_rx) = oneshot::channel();
            let job = PersistJob {
                networks,
                reply: Some(reply_tx),
            };
            self.inner
                .persist_tx
                .send(job)
                .map_err(|_| Error::PersistWorkerStopped)?;
            reply_rx.await.map_err(|_| Error::PersistWorkerStopped)??;
        }
        Ok(next)
    }

    /// Reads the saved list in the background and applies it when ready.
    ///
    /// Field edits made while the read is in flight are kept; only the saved
    /// list is replaced.
    pub fn startup_load(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let networks = controller.inner.store.load().await;
            info!(count = networks.len(), "Loaded saved networks");
            controller.dispatch(Event::NetworksLoaded(networks)).await;
        })
    }

    async fn apply(&self, event: Event) -> (Arc<UiState>, Effect) {
        let _guard = self.inner.dispatch_lock.lock().await;
        let current = self.snapshot();
        let (next, effect) = reduce(&current, event, &self.inner.generator);
        let next = Arc::new(next);
        self.inner.state_tx.send_replace(next.clone());
        (next, effect)
    }
}

async fn run_persist_worker<S: KeyValueStore>(
    store: Arc<NetworkStore<S>>,
    mut jobs: mpsc::UnboundedReceiver<PersistJob>,
    failures: Arc<AtomicU64>,
) {
    while let Some(job) = jobs.recv().await {
        let result = store.save(&job.networks).await;
        match &result {
            Ok(()) => debug!(count = job.networks.len(), "Persisted saved networks"),
            Err(e) => {
                error!("Failed to persist saved networks: {}", e);
                failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        if let Some(reply) = job.reply {
            let _ = reply.send(result);
        }
    }
    debug!("Persistence worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn state_with(networks: &[WifiNetwork]) -> UiState {
        UiState {
            saved_networks: networks.to_vec().into(),
            ..UiState::default()
        }
    }

    fn generator() -> QrGenerator {
        QrGenerator {
            size: 64,
            auth: AuthType::Wpa,
        }
    }

    fn controller() -> StateController<MemoryStore> {
        StateController::new(NetworkStore::new(MemoryStore::new()), generator())
    }

    #[test]
    fn test_field_edits() {
        let qr = generator();
        let (state, effect) = reduce(&UiState::default(), Event::SsidChanged("Home".into()), &qr);
        assert_eq!(effect, Effect::None);
        let (state, effect) = reduce(&state, Event::PasswordChanged("pw".into()), &qr);
        assert_eq!(effect, Effect::None);
        assert_eq!(state.ssid, "Home");
        assert_eq!(state.password, "pw");
        assert!(state.qr_bitmap.is_none());
    }

    #[test]
    fn test_generate_sets_text_and_bitmap() {
        let state = UiState {
            ssid: " Home ".into(),
            password: "pw".into(),
            ..UiState::default()
        };
        let (next, effect) = reduce(&state, Event::GenerateRequested, &generator());
        assert_eq!(effect, Effect::None);
        assert_eq!(next.qr_text, "WIFI:S:Home;T:WPA;P:pw;;");
        assert_eq!(next.qr_bitmap.as_ref().map(|b| b.width()), Some(64));
        // Fields keep the untrimmed input.
        assert_eq!(next.ssid, " Home ");
    }

    #[test]
    fn test_generate_failure_keeps_text() {
        let state = UiState {
            ssid: "Home".into(),
            password: "a".repeat(3000),
            ..UiState::default()
        };
        let (next, _) = reduce(&state, Event::GenerateRequested, &generator());
        assert!(next.qr_text.starts_with("WIFI:S:Home;T:WPA;P:aaa"));
        assert!(next.qr_bitmap.is_none());
    }

    #[test]
    fn test_generate_uses_configured_auth() {
        let qr = QrGenerator {
            size: 64,
            auth: AuthType::Wep,
        };
        let state = UiState {
            ssid: "Old".into(),
            password: "k".into(),
            ..UiState::default()
        };
        let (next, _) = reduce(&state, Event::GenerateRequested, &qr);
        assert_eq!(next.qr_text, "WIFI:S:Old;T:WEP;P:k;;");
    }

    #[test]
    fn test_save_appends_and_persists() {
        let state = UiState {
            ssid: "Home".into(),
            password: "pw".into(),
            ..state_with(&[WifiNetwork::new("Cafe", "")])
        };
        let (next, effect) = reduce(&state, Event::SaveRequested, &generator());
        let expected = vec![WifiNetwork::new("Cafe", ""), WifiNetwork::new("Home", "pw")];
        assert_eq!(&*next.saved_networks, expected.as_slice());
        assert_eq!(effect, Effect::Persist(expected.into()));
    }

    #[test]
    fn test_save_blank_ssid_is_noop() {
        for ssid in ["", "   ", "\t\n"] {
            let state = UiState {
                ssid: ssid.into(),
                password: "pw".into(),
                ..UiState::default()
            };
            let (next, effect) = reduce(&state, Event::SaveRequested, &generator());
            assert_eq!(effect, Effect::None);
            assert!(next.saved_networks.is_empty());
        }
    }

    #[test]
    fn test_save_duplicate_ssid_keeps_first_password() {
        let qr = generator();
        let mut state = UiState::default();
        for password in ["first", "second", "first"] {
            state = UiState {
                ssid: "Home".into(),
                password: password.into(),
                ..state
            };
            state = reduce(&state, Event::SaveRequested, &qr).0;
        }
        assert_eq!(&*state.saved_networks, &[WifiNetwork::new("Home", "first")]);

        let (_, effect) = reduce(&state, Event::SaveRequested, &qr);
        assert_eq!(effect, Effect::None);
    }

    #[test]
    fn test_save_duplicate_is_case_sensitive() {
        let state = UiState {
            ssid: "home".into(),
            ..state_with(&[WifiNetwork::new("Home", "pw")])
        };
        let (next, _) = reduce(&state, Event::SaveRequested, &generator());
        assert_eq!(next.saved_networks.len(), 2);
    }

    #[test]
    fn test_delete_requires_exact_match() {
        let state = state_with(&[
            WifiNetwork::new("Home", "a"),
            WifiNetwork::new("Home", "b"),
            WifiNetwork::new("Cafe", "a"),
        ]);
        let (next, effect) = reduce(
            &state,
            Event::NetworkDeleted(WifiNetwork::new("Home", "a")),
            &generator(),
        );
        let expected = vec![WifiNetwork::new("Home", "b"), WifiNetwork::new("Cafe", "a")];
        assert_eq!(&*next.saved_networks, expected.as_slice());
        assert_eq!(effect, Effect::Persist(expected.into()));
    }

    #[test]
    fn test_select_fills_fields_and_generates() {
        let state = UiState {
            ssid: "typed".into(),
            ..state_with(&[WifiNetwork::new("Home", "pw")])
        };
        let (next, effect) = reduce(
            &state,
            Event::NetworkSelected(WifiNetwork::new("Home", "pw")),
            &generator(),
        );
        assert_eq!(effect, Effect::None);
        assert_eq!(next.ssid, "Home");
        assert_eq!(next.password, "pw");
        assert_eq!(next.qr_text, "WIFI:S:Home;T:WPA;P:pw;;");
        assert!(next.qr_bitmap.is_some());
        assert_eq!(next.saved_networks.len(), 1);
    }

    #[test]
    fn test_transition_leaves_previous_snapshot_untouched() {
        let state = state_with(&[WifiNetwork::new("Home", "pw")]);
        let (_, _) = reduce(
            &state,
            Event::NetworkDeleted(WifiNetwork::new("Home", "pw")),
            &generator(),
        );
        assert_eq!(state.saved_networks.len(), 1);
    }

    #[tokio::test]
    async fn test_controller_save_round_trips_through_store() {
        let controller = controller();
        controller.dispatch(Event::SsidChanged("Home".into())).await;
        controller.dispatch(Event::PasswordChanged("pw".into())).await;
        let state = controller.dispatch_and_persist(Event::SaveRequested).await.unwrap();

        assert_eq!(&*state.saved_networks, &[WifiNetwork::new("Home", "pw")]);
        assert_eq!(controller.store().load().await, vec![WifiNetwork::new("Home", "pw")]);
    }

    #[tokio::test]
    async fn test_controller_blank_save_does_not_write() {
        let controller = controller();
        controller.store().backend().set_fail_writes(true);
        let state = controller.dispatch_and_persist(Event::SaveRequested).await.unwrap();
        assert!(state.saved_networks.is_empty());
        assert_eq!(controller.persist_failures(), 0);
    }

    #[tokio::test]
    async fn test_controller_reports_write_failure() {
        let controller = controller();
        controller.store().backend().set_fail_writes(true);
        controller.dispatch(Event::SsidChanged("Home".into())).await;

        let result = controller.dispatch_and_persist(Event::SaveRequested).await;
        assert!(result.is_err());
        assert_eq!(controller.persist_failures(), 1);
        // The in-memory list still reflects the save.
        assert_eq!(controller.snapshot().saved_networks.len(), 1);
    }

    #[tokio::test]
    async fn test_controller_last_write_wins() {
        let controller = controller();
        for ssid in ["A", "B", "C"] {
            controller.dispatch(Event::SsidChanged(ssid.into())).await;
            controller.dispatch(Event::SaveRequested).await;
        }
        controller
            .dispatch_and_persist(Event::NetworkDeleted(WifiNetwork::new("B", "")))
            .await
            .unwrap();

        let stored = controller.store().load().await;
        assert_eq!(stored, vec![WifiNetwork::new("A", ""), WifiNetwork::new("C", "")]);
    }

    #[tokio::test]
    async fn test_startup_load_keeps_concurrent_edits() {
        let store = NetworkStore::new(MemoryStore::new());
        store.save(&[WifiNetwork::new("Home", "pw")]).await.unwrap();
        let controller = StateController::new(store, generator());

        controller.dispatch(Event::SsidChanged("typing".into())).await;
        controller.startup_load().await.unwrap();

        let state = controller.snapshot();
        assert_eq!(state.ssid, "typing");
        assert_eq!(&*state.saved_networks, &[WifiNetwork::new("Home", "pw")]);
    }

    #[tokio::test]
    async fn test_save_after_startup_load_keeps_stored_networks() {
        let store = NetworkStore::new(MemoryStore::new());
        store.save(&[WifiNetwork::new("Home", "pw")]).await.unwrap();
        let controller = StateController::new(store, generator());

        controller.startup_load().await.unwrap();
        controller.dispatch(Event::SsidChanged("Office".into())).await;
        controller.dispatch(Event::PasswordChanged("pw2".into())).await;
        controller
            .dispatch_and_persist(Event::SaveRequested)
            .await
            .unwrap();

        let expected = vec![WifiNetwork::new("Home", "pw"), WifiNetwork::new("Office", "pw2")];
        assert_eq!(controller.store().load().await, expected);
        assert_eq!(controller.snapshot().saved_networks.to_vec(), expected);
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let controller = controller();
        let mut rx = controller.subscribe();
        controller.dispatch(Event::SsidChanged("Home".into())).await;
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().ssid, "Home");
    }
}
