//! Periodic status refresh
//!
//! Each cycle issues the status, violation-log and activity-log queries as
//! independent tasks. They are never coalesced, cancelled or serialized:
//! each renders on its own success path, a failure in one leaves the other
//! sections alone, and responses apply in arrival order (last writer
//! wins). A response whose session epoch no longer matches the current
//! session (the session stopped or was replaced) is discarded.

use crate::dashboard::Dashboard;
use crate::error::{ProctorError, Result};
use crate::session::MonitoringSession;
use crate::source::{Query, SignalSource};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Last transition of a query type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryPhase {
    #[default]
    Idle,
    InFlight,
    Applied,
    Discarded,
    Failed,
}

/// Per-query bookkeeping
///
/// Several requests of one type may be in flight at once; `phase` is the
/// most recent transition across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryTracker {
    pub phase: QueryPhase,
    pub in_flight: usize,
    pub issued: u64,
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
    /// Issue sequence of the response rendered last
    pub last_applied_seq: Option<u64>,
}

impl QueryTracker {
    fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.in_flight += 1;
        self.phase = QueryPhase::InFlight;
        self.issued
    }

    fn settle(&mut self, seq: u64, phase: QueryPhase) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.phase = phase;
        match phase {
            QueryPhase::Applied => {
                self.applied += 1;
                self.last_applied_seq = Some(seq);
            }
            QueryPhase::Discarded => self.discarded += 1,
            QueryPhase::Failed => self.failed += 1,
            QueryPhase::Idle | QueryPhase::InFlight => {}
        }
    }
}

#[derive(Clone)]
struct PollContext {
    source: Arc<dyn SignalSource>,
    dashboard: Arc<RwLock<Dashboard>>,
    session: watch::Receiver<MonitoringSession>,
    trackers: Arc<Mutex<HashMap<Query, QueryTracker>>>,
}

impl PollContext {
    fn poll_cycle(&self) {
        self.query_status();
        self.query_violations();
        self.query_activity();
    }

    fn query_status(&self) {
        self.spawn_query(
            Query::Status,
            |source| async move { source.status().await },
            |dashboard, snapshot, session| dashboard.apply_status(&snapshot, session.elapsed()),
        );
    }

    fn query_violations(&self) {
        self.spawn_query(
            Query::Violations,
            |source| async move { source.violations().await },
            |dashboard, log, _| dashboard.apply_violations(log),
        );
    }

    fn query_activity(&self) {
        self.spawn_query(
            Query::Activity,
            |source| async move { source.activity().await },
            |dashboard, log, _| dashboard.apply_activity(log),
        );
    }

    fn spawn_query<T, F, Fut, A>(&self, query: Query, fetch: F, apply: A)
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn SignalSource>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        A: FnOnce(&mut Dashboard, T, &MonitoringSession) + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(query = ?query, "No async runtime; poll query skipped");
            return;
        };

        let ctx = self.clone();
        let issued = ctx.session.borrow().clone();
        let seq = ctx.with_tracker(query, QueryTracker::begin);

        handle.spawn(async move {
            let phase = match fetch(ctx.source.clone()).await {
                Ok(value) => {
                    let mut dashboard = ctx.dashboard.write().await;
                    let current = ctx.session.borrow().clone();
                    if current.same_epoch(&issued) {
                        apply(&mut dashboard, value, &current);
                        QueryPhase::Applied
                    } else {
                        tracing::debug!(query = ?query, seq, "Response arrived after session change; discarded");
                        QueryPhase::Discarded
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        query = ?query,
                        seq,
                        error = %e,
                        "Poll query failed; keeping last rendered state"
                    );
                    QueryPhase::Failed
                }
            };
            ctx.with_tracker(query, |tracker| tracker.settle(seq, phase));
        });
    }

    fn with_tracker<R>(&self, query: Query, f: impl FnOnce(&mut QueryTracker) -> R) -> R {
        let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        f(trackers.entry(query).or_default())
    }
}

/// Owner of the periodic refresh loop
pub struct StatusPoller {
    ctx: PollContext,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn SignalSource>,
        dashboard: Arc<RwLock<Dashboard>>,
        session: watch::Receiver<MonitoringSession>,
    ) -> Self {
        Self {
            ctx: PollContext {
                source,
                dashboard,
                session,
                trackers: Arc::new(Mutex::new(HashMap::new())),
            },
            task: Mutex::new(None),
        }
    }

    /// Begin polling at `interval`, replacing any running loop
    ///
    /// The first cycle runs immediately.
    pub fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(ProctorError::Config(
                "Poll interval must be greater than 0".to_string(),
            ));
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|e| {
            ProctorError::Config(format!("Status polling requires a tokio runtime: {}", e))
        })?;

        let ctx = self.ctx.clone();
        let task = handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                ctx.poll_cycle();
            }
        });

        if let Some(previous) = self.lock_task().replace(task) {
            previous.abort();
        }

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            source = %self.ctx.source.name(),
            "Status polling started"
        );
        Ok(())
    }

    /// Cancel the loop; in-flight responses are left to settle. Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
            tracing::info!("Status polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Run one full cycle out of cadence
    pub fn poll_now(&self) {
        self.ctx.poll_cycle();
    }

    /// Issue a status query out of cadence
    pub fn refresh_status(&self) {
        self.ctx.query_status();
    }

    /// Bookkeeping for one query type
    pub fn tracker(&self, query: Query) -> QueryTracker {
        self.ctx.with_tracker(query, |tracker| *tracker)
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::IndicatorState;
    use crate::session::SessionLifecycle;
    use crate::source::memory::MemorySignalSource;
    use crate::types::{ActivityEntry, ActivityLevel, EyeStatus, StatusSnapshot};

    struct Harness {
        source: Arc<MemorySignalSource>,
        session: SessionLifecycle,
        dashboard: Arc<RwLock<Dashboard>>,
        poller: StatusPoller,
    }

    async fn harness() -> Harness {
        let source = Arc::new(MemorySignalSource::new());
        let session = SessionLifecycle::new(source.clone());
        let dashboard = Arc::new(RwLock::new(Dashboard::default()));
        let poller = StatusPoller::new(source.clone(), dashboard.clone(), session.watch());
        session.start().await.unwrap();
        Harness {
            source,
            session,
            dashboard,
            poller,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_renders_all_three_sections() {
        let h = harness().await;
        h.source
            .set_snapshot(StatusSnapshot {
                face_detected: true,
                person_count: 1,
                ..StatusSnapshot::default()
            })
            .await;

        h.poller.poll_now();
        settle().await;

        let dashboard = h.dashboard.read().await;
        let indicators = dashboard.indicators.as_ref().unwrap();
        assert_eq!(indicators.face.state, IndicatorState::Normal);
        // "System started" from the start command
        assert_eq!(dashboard.activity.rows().len(), 1);
        assert!(dashboard.violations.is_empty());

        for query in [Query::Status, Query::Violations, Query::Activity] {
            let tracker = h.poller.tracker(query);
            assert_eq!(tracker.phase, QueryPhase::Applied);
            assert_eq!(tracker.in_flight, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_failure_keeps_last_render_and_isolates_other_queries() {
        let h = harness().await;
        h.source
            .set_snapshot(StatusSnapshot {
                eye_status: EyeStatus::Left,
                ..StatusSnapshot::default()
            })
            .await;
        h.poller.poll_now();
        settle().await;
        let before = h.dashboard.read().await.indicators.clone();

        h.source.set_failing(Query::Status, true).await;
        h.source
            .set_snapshot(StatusSnapshot {
                eye_status: EyeStatus::Center,
                ..StatusSnapshot::default()
            })
            .await;
        h.source
            .push_activity(ActivityEntry {
                timestamp: "10:00:00".into(),
                level: ActivityLevel::Warning,
                message: "No face detected".into(),
            })
            .await;
        h.poller.poll_now();
        settle().await;

        let dashboard = h.dashboard.read().await;
        assert_eq!(dashboard.indicators, before);
        assert_eq!(dashboard.activity.rows().len(), 2);
        assert_eq!(dashboard.activity.rows()[0].message, "No face detected");
        assert_eq!(h.poller.tracker(Query::Status).phase, QueryPhase::Failed);
        assert!(h.session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_responses_apply_in_arrival_order() {
        let h = harness().await;
        h.source.push_latency(Query::Status, Duration::from_millis(300)).await;
        h.source
            .set_snapshot(StatusSnapshot {
                person_count: 1,
                ..StatusSnapshot::default()
            })
            .await;
        h.poller.refresh_status();
        settle().await;

        h.source
            .set_snapshot(StatusSnapshot {
                person_count: 2,
                ..StatusSnapshot::default()
            })
            .await;
        h.poller.refresh_status();
        settle().await;
        assert_eq!(
            h.dashboard.read().await.indicators.as_ref().unwrap().person.label,
            "2 Persons"
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            h.dashboard.read().await.indicators.as_ref().unwrap().person.label,
            "1 Person"
        );

        let tracker = h.poller.tracker(Query::Status);
        assert_eq!(tracker.applied, 2);
        assert_eq!(tracker.last_applied_seq, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_stop_is_discarded() {
        let h = harness().await;
        h.source.push_latency(Query::Status, Duration::from_millis(300)).await;
        h.poller.refresh_status();
        settle().await;
        assert_eq!(h.poller.tracker(Query::Status).phase, QueryPhase::InFlight);

        h.poller.stop();
        h.session.stop().await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert!(h.dashboard.read().await.indicators.is_none());
        let tracker = h.poller.tracker(Query::Status);
        assert_eq!(tracker.phase, QueryPhase::Discarded);
        assert_eq!(tracker.discarded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_runs_at_configured_cadence() {
        let h = harness().await;
        h.poller.start(Duration::from_millis(500)).unwrap();
        assert!(h.poller.is_running());

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(h.source.call_count(Query::Status).await, 3);
        assert_eq!(h.source.call_count(Query::Violations).await, 3);

        h.poller.stop();
        h.poller.stop();
        assert!(!h.poller.is_running());

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(h.source.call_count(Query::Status).await, 3);
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let h = harness().await;
        assert!(h.poller.start(Duration::ZERO).is_err());
        assert!(!h.poller.is_running());
    }

    #[test]
    fn test_tracker_transitions() {
        let mut tracker = QueryTracker::default();
        assert_eq!(tracker.phase, QueryPhase::Idle);

        let first = tracker.begin();
        let second = tracker.begin();
        assert_eq!(tracker.in_flight, 2);

        tracker.settle(second, QueryPhase::Applied);
        tracker.settle(first, QueryPhase::Discarded);
        assert_eq!(tracker.in_flight, 0);
        assert_eq!(tracker.phase, QueryPhase::Discarded);
        assert_eq!(tracker.last_applied_seq, Some(2));
        assert_eq!(tracker.discarded, 1);
    }
}
