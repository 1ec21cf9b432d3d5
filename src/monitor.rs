//! Proctoring monitor facade
//!
//! `ProctorMonitor` wires the signal source, session lifecycle, status
//! poller and circumvention detector together. It owns the independent
//! cadences (clipboard scrub, viewport skew, session clock), runs the
//! effects the detector asks for, and broadcasts user-facing notices.

use crate::circumvention::{CircumventionMonitor, CircumventionState, Effect, PlatformEvent};
use crate::config::MonitorConfig;
use crate::dashboard::Dashboard;
use crate::error::{ProctorError, Result};
use crate::host::PlatformHost;
use crate::logger::EventLogger;
use crate::poller::StatusPoller;
use crate::session::{MonitoringSession, SessionLifecycle, StartOutcome, UnloadDecision};
use crate::source::SignalSource;
use crate::types::{Notice, Tone};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const STARTED_NOTICE: &str = "Monitoring started";
pub const START_FAILED_NOTICE: &str = "Failed to start monitoring";
pub const STOPPED_NOTICE: &str = "Monitoring stopped";

const CLOCK_TICK: Duration = Duration::from_secs(1);

/// Events emitted by the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Transient message for the user
    Notice(Notice),
    /// Capture overlay raised after a screenshot attempt
    OverlayShown { attempts: u64 },
    OverlayHidden,
    SessionStarted { session_id: String },
    SessionStopped,
}

struct MonitorInner {
    config: MonitorConfig,
    host: Arc<dyn PlatformHost>,
    logger: EventLogger,
    session: SessionLifecycle,
    poller: StatusPoller,
    dashboard: Arc<RwLock<Dashboard>>,
    guard: Mutex<CircumventionMonitor>,
    event_tx: broadcast::Sender<MonitorEvent>,
    epoch: Instant,
    cadences: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for MonitorInner {
    fn drop(&mut self) {
        let tasks = self.cadences.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Exam-proctoring session monitor
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ProctorMonitor {
    inner: Arc<MonitorInner>,
}

impl ProctorMonitor {
    /// Create a monitor; cadences are not started until `start_cadences`
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SignalSource>,
        host: Arc<dyn PlatformHost>,
    ) -> Result<Self> {
        config.validate()?;

        let session = SessionLifecycle::new(source.clone());
        let dashboard = Arc::new(RwLock::new(Dashboard::default()));
        let poller = StatusPoller::new(source.clone(), dashboard.clone(), session.watch());
        let (event_tx, _) = broadcast::channel(100);

        tracing::debug!(source = %source.name(), "Proctor monitor created");

        Ok(Self {
            inner: Arc::new(MonitorInner {
                guard: Mutex::new(CircumventionMonitor::new(config.clone())),
                config,
                host,
                logger: EventLogger::new(source),
                session,
                poller,
                dashboard,
                event_tx,
                epoch: Instant::now(),
                cadences: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    /// Subscribe to notices, overlay and session events
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Snapshot of the last-rendered dashboard
    pub async fn dashboard(&self) -> Dashboard {
        self.inner.dashboard.read().await.clone()
    }

    pub fn session(&self) -> MonitoringSession {
        self.inner.session.current()
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.is_active()
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.inner.poller
    }

    pub fn circumvention_state(&self) -> CircumventionState {
        self.lock_guard().state()
    }

    pub fn is_overlay_visible(&self) -> bool {
        self.lock_guard().is_overlay_visible()
    }

    /// Start the clipboard-scrub, viewport-skew and session-clock cadences
    ///
    /// Replaces any cadences already running.
    pub fn start_cadences(&self) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            ProctorError::Config(format!("Monitor cadences require a tokio runtime: {}", e))
        })?;
        let config = &self.inner.config;

        let tasks = vec![
            self.spawn_cadence(&handle, config.clipboard_scrub_interval(), |monitor| async move {
                monitor.dispatch(PlatformEvent::ClipboardTick);
            }),
            self.spawn_cadence(&handle, config.viewport_check_interval(), |monitor| async move {
                match monitor.inner.host.viewport() {
                    Ok(viewport) => {
                        monitor.dispatch(PlatformEvent::ViewportSample(viewport));
                    }
                    Err(e) => tracing::trace!(error = %e, "Viewport sample skipped"),
                }
            }),
            self.spawn_cadence(&handle, CLOCK_TICK, |monitor| async move {
                let mut dashboard = monitor.inner.dashboard.write().await;
                // Inactive sessions have no elapsed time, which clears the clock
                dashboard.set_clock(monitor.inner.session.elapsed());
            }),
        ];

        let previous = std::mem::replace(&mut *self.lock_cadences(), tasks);
        for task in previous {
            task.abort();
        }

        tracing::info!(
            clipboard_ms = config.clipboard_scrub_interval_ms,
            viewport_ms = config.viewport_check_interval_ms,
            "Monitor cadences started"
        );
        Ok(())
    }

    /// Stop every cadence and the poll loop
    pub fn shutdown(&self) {
        for task in self.lock_cadences().drain(..) {
            task.abort();
        }
        self.inner.poller.stop();
        tracing::info!("Proctor monitor shut down");
    }

    /// Start a session and, once confirmed, the status poll loop
    ///
    /// Returns `Ok(true)` once ACTIVE. A start cancelled by a concurrent
    /// stop or unload returns `Ok(false)` without a failure notice.
    pub async fn start_session(&self) -> Result<bool> {
        let outcome = match self.inner.session.start().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Start monitoring request failed");
                self.notify(START_FAILED_NOTICE, Tone::Danger);
                return Err(e);
            }
        };

        match outcome {
            StartOutcome::Active => {
                if let Err(e) = self.inner.poller.start(self.inner.config.poll_interval()) {
                    tracing::warn!(error = %e, "Status polling could not be started");
                }
                let session = self.inner.session.current();
                if let Some(session_id) = session.id {
                    self.emit(MonitorEvent::SessionStarted { session_id });
                }
                self.notify(STARTED_NOTICE, Tone::Success);
            }
            StartOutcome::Declined => self.notify(START_FAILED_NOTICE, Tone::Danger),
            StartOutcome::Cancelled => {
                tracing::debug!("Start cancelled by stop; no notice");
            }
        }

        Ok(outcome.is_active())
    }

    /// Stop the session and the poll loop; always ends INACTIVE
    pub async fn stop_session(&self) {
        self.inner.poller.stop();
        self.inner.session.stop().await;
        self.inner.dashboard.write().await.set_clock(None);
        self.emit(MonitorEvent::SessionStopped);
        self.notify(STOPPED_NOTICE, Tone::Warning);
    }

    pub fn before_unload(&self) -> UnloadDecision {
        self.inner.session.before_unload()
    }

    /// The user chose to leave the page anyway
    pub fn confirm_unload(&self) {
        let was_active = self.inner.session.is_active();
        self.inner.poller.stop();
        self.inner.session.confirm_unload();

        match self.inner.dashboard.try_write() {
            Ok(mut dashboard) => dashboard.set_clock(None),
            Err(_) => self.spawn_detached("clock reset", |monitor| async move {
                monitor.inner.dashboard.write().await.set_clock(None);
            }),
        }

        if was_active {
            self.emit(MonitorEvent::SessionStopped);
        }
    }

    /// Enter fullscreen; a denied capability is a no-op
    pub async fn request_fullscreen(&self) -> bool {
        match self.inner.host.request_fullscreen().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Fullscreen request ignored");
                false
            }
        }
    }

    pub async fn exit_fullscreen(&self) -> bool {
        match self.inner.host.exit_fullscreen().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Fullscreen exit ignored");
                false
            }
        }
    }

    /// Feed a host signal through the detector and run its effects
    ///
    /// Returns `true` when the host should suppress the event's default
    /// handling.
    pub fn dispatch(&self, event: PlatformEvent) -> bool {
        let active = self.inner.session.is_active();
        let now_ms = self.now_ms();
        let (effects, attempts) = {
            let mut guard = self.lock_guard();
            let effects = guard.handle(event, now_ms, active);
            (effects, guard.screenshot_attempts())
        };

        let mut prevent = false;
        for effect in effects {
            match effect {
                Effect::PreventDefault => prevent = true,
                Effect::Log(event) => self.inner.logger.log(event),
                Effect::Notify(notice) => self.emit(MonitorEvent::Notice(notice)),
                Effect::ShowOverlay { token, duration } => {
                    self.emit(MonitorEvent::OverlayShown { attempts });
                    self.after(duration, PlatformEvent::OverlayExpired { token });
                }
                Effect::HideOverlay => self.emit(MonitorEvent::OverlayHidden),
                Effect::ReadClipboard => self.read_clipboard(),
                Effect::WriteClipboard(text) => self.write_clipboard(text),
                Effect::ScheduleVisibilityRecheck { after } => {
                    self.after(after, PlatformEvent::VisibilityRecheck);
                }
                Effect::RefreshStatus => self.inner.poller.refresh_status(),
            }
        }
        prevent
    }

    fn now_ms(&self) -> u64 {
        self.inner.epoch.elapsed().as_millis() as u64
    }

    fn notify(&self, message: &str, tone: Tone) {
        let notice = Notice::new(message, tone, self.inner.config.notice_duration());
        self.emit(MonitorEvent::Notice(notice));
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine
        let _ = self.inner.event_tx.send(event);
    }

    fn weak(&self) -> Weak<MonitorInner> {
        Arc::downgrade(&self.inner)
    }

    /// Spawn a task holding only a weak reference to the monitor
    fn spawn_detached<F, Fut>(&self, what: &'static str, task: F)
    where
        F: FnOnce(ProctorMonitor) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(task = what, "No async runtime; effect skipped");
            return;
        };
        let weak = self.weak();
        handle.spawn(async move {
            if let Some(inner) = weak.upgrade() {
                task(ProctorMonitor { inner }).await;
            }
        });
    }

    /// Dispatch `event` after `delay`
    fn after(&self, delay: Duration, event: PlatformEvent) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = ?event, "No async runtime; timer skipped");
            return;
        };
        let weak = self.weak();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                ProctorMonitor { inner }.dispatch(event);
            }
        });
    }

    fn read_clipboard(&self) {
        self.spawn_detached("clipboard read", |monitor| async move {
            match monitor.inner.host.read_clipboard().await {
                Ok(text) => {
                    monitor.dispatch(PlatformEvent::ClipboardContents(text));
                }
                Err(e) => tracing::trace!(error = %e, "Clipboard read skipped"),
            }
        });
    }

    fn write_clipboard(&self, text: String) {
        self.spawn_detached("clipboard write", |monitor| async move {
            if let Err(e) = monitor.inner.host.write_clipboard(&text).await {
                tracing::debug!(error = %e, "Clipboard overwrite skipped");
            }
        });
    }

    fn spawn_cadence<F, Fut>(
        &self,
        handle: &tokio::runtime::Handle,
        period: Duration,
        tick: F,
    ) -> JoinHandle<()>
    where
        F: Fn(ProctorMonitor) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let weak = self.weak();
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                tick(ProctorMonitor { inner }).await;
            }
        })
    }

    fn lock_guard(&self) -> MutexGuard<'_, CircumventionMonitor> {
        self.inner.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cadences(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.inner.cadences.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circumvention::{Key, KeyPress};
    use crate::host::MemoryHost;
    use crate::source::memory::MemorySignalSource;
    use crate::source::Query;

    fn monitor() -> (Arc<MemorySignalSource>, Arc<MemoryHost>, ProctorMonitor) {
        let source = Arc::new(MemorySignalSource::new());
        let host = Arc::new(MemoryHost::new());
        let monitor =
            ProctorMonitor::new(MonitorConfig::default(), source.clone(), host.clone()).unwrap();
        (source, host, monitor)
    }

    fn drain(rx: &mut broadcast::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_invalid_config_rejected() {
        let source = Arc::new(MemorySignalSource::new());
        let host = Arc::new(MemoryHost::new());
        let config = MonitorConfig {
            blur_burst_threshold: 0,
            ..MonitorConfig::default()
        };
        assert!(ProctorMonitor::new(config, source, host).is_err());
    }

    #[tokio::test]
    async fn test_start_session_notifies_and_polls() {
        let (_source, _host, monitor) = monitor();
        let mut rx = monitor.subscribe();

        assert!(monitor.start_session().await.unwrap());
        assert!(monitor.is_active());
        assert!(monitor.poller().is_running());

        let events = drain(&mut rx);
        assert!(matches!(events[0], MonitorEvent::SessionStarted { .. }));
        match &events[1] {
            MonitorEvent::Notice(notice) => {
                assert_eq!(notice.message, STARTED_NOTICE);
                assert_eq!(notice.tone, Tone::Success);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        monitor.stop_session().await;
        assert!(!monitor.is_active());
        assert!(!monitor.poller().is_running());
    }

    #[tokio::test]
    async fn test_declined_start_notifies_failure() {
        let (source, _host, monitor) = monitor();
        source.refuse_start(true).await;
        let mut rx = monitor.subscribe();

        assert!(!monitor.start_session().await.unwrap());
        assert!(!monitor.poller().is_running());
        assert_eq!(
            drain(&mut rx),
            vec![MonitorEvent::Notice(Notice::new(
                START_FAILED_NOTICE,
                Tone::Danger,
                Duration::from_secs(3)
            ))]
        );

        source.refuse_start(false).await;
        source.set_failing(Query::Start, true).await;
        assert!(monitor.start_session().await.is_err());
        assert!(!monitor.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_cancelled_by_stop_has_no_failure_notice() {
        let (source, _host, monitor) = monitor();
        source.push_latency(Query::Start, Duration::from_millis(500)).await;
        let mut rx = monitor.subscribe();

        let starter = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.start_session().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.stop_session().await;

        assert!(!starter.await.unwrap().unwrap());
        assert!(!monitor.is_active());
        assert!(!monitor.poller().is_running());

        let events = drain(&mut rx);
        assert!(events.contains(&MonitorEvent::SessionStopped));
        assert!(!events.iter().any(|event| matches!(
            event,
            MonitorEvent::Notice(notice) if notice.message == START_FAILED_NOTICE
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_unload_clears_clock() {
        let (_source, _host, monitor) = monitor();
        monitor.start_cadences().unwrap();
        monitor.start_session().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(monitor.dashboard().await.clock.is_some());

        monitor.confirm_unload();
        assert!(monitor.dashboard().await.clock.is_none());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(monitor.dashboard().await.clock.is_none());
        monitor.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_reports_prevent_default() {
        let (_source, _host, monitor) = monitor();
        assert!(monitor.dispatch(PlatformEvent::Key(KeyPress::new(Key::PrintScreen))));
        assert!(!monitor.dispatch(PlatformEvent::Key(KeyPress::new(Key::Char('a')))));
        assert!(!monitor.dispatch(PlatformEvent::Copy { on_surface: true }));
        assert_eq!(monitor.circumvention_state().screenshot_attempts, 1);
    }

    #[tokio::test]
    async fn test_fullscreen_degrades_when_denied() {
        let (_source, host, monitor) = monitor();
        assert!(monitor.request_fullscreen().await);
        assert!(host.is_fullscreen());
        assert!(monitor.exit_fullscreen().await);

        host.deny(crate::host::Capability::Fullscreen);
        assert!(!monitor.request_fullscreen().await);
        assert!(!host.is_fullscreen());
    }

    #[test]
    fn test_dispatch_without_runtime_does_not_panic() {
        let (_source, _host, monitor) = monitor();
        assert!(monitor.dispatch(PlatformEvent::Key(KeyPress::new(Key::F12))));
        monitor.dispatch(PlatformEvent::VisibilityChanged { hidden: true });
        assert!(monitor.start_cadences().is_err());
    }
}
