//! In-memory signal source for testing and demos
//!
//! Scriptable stand-in for the detection backend: set the snapshot, seed
//! the logs, inject failures or latency per query, and inspect every
//! integrity event that was reported. Log-event bookkeeping mirrors the
//! backend so activity and violation queries reflect reported events.

use super::{Query, SignalSource};
use crate::error::{ProctorError, Result};
use crate::types::{
    ActivityEntry, ActivityLevel, ActivityLog, EventKind, IntegrityEvent, StartAck,
    StatusSnapshot, Violation, ViolationLog,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::RwLock;

/// Violations retained by the backend
const MAX_VIOLATIONS: usize = 100;
/// Activity entries retained by the backend
const MAX_ACTIVITIES: usize = 50;
/// Violations returned per query
const VIOLATIONS_PAGE: usize = 20;
/// Activity entries returned per query
const ACTIVITY_PAGE: usize = 30;

#[derive(Default)]
struct MemoryState {
    snapshot: StatusSnapshot,
    violations: Vec<Violation>,
    activities: Vec<ActivityEntry>,
    monitoring: bool,
    refuse_start: bool,
    failing: HashSet<Query>,
    latency: HashMap<Query, VecDeque<Duration>>,
    logged: Vec<IntegrityEvent>,
    calls: HashMap<Query, u64>,
}

impl MemoryState {
    /// Count the call, apply failure injection, and take the scripted delay
    fn begin(&mut self, query: Query) -> Result<Duration> {
        *self.calls.entry(query).or_insert(0) += 1;

        if self.failing.contains(&query) {
            return Err(ProctorError::Source(format!(
                "injected failure for {}",
                query.endpoint()
            )));
        }

        Ok(self
            .latency
            .get_mut(&query)
            .and_then(|delays| delays.pop_front())
            .unwrap_or_default())
    }

    fn add_activity(&mut self, message: &str, level: ActivityLevel) {
        self.activities.push(ActivityEntry {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            level,
            message: message.to_string(),
        });
        if self.activities.len() > MAX_ACTIVITIES {
            let excess = self.activities.len() - MAX_ACTIVITIES;
            self.activities.drain(..excess);
        }
    }

    fn add_violation(&mut self, kind: &str, severity: &str) {
        self.snapshot.total_violations += 1;
        self.violations.push(Violation {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: kind.to_string(),
            severity: severity.to_string(),
        });
        if self.violations.len() > MAX_VIOLATIONS {
            let excess = self.violations.len() - MAX_VIOLATIONS;
            self.violations.drain(..excess);
        }
    }
}

/// Scripted in-memory detection backend
#[derive(Default)]
pub struct MemorySignalSource {
    state: RwLock<MemoryState>,
}

impl MemorySignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot returned by status queries
    pub async fn set_snapshot(&self, snapshot: StatusSnapshot) {
        self.state.write().await.snapshot = snapshot;
    }

    /// Append a violation to the stored log
    pub async fn push_violation(&self, violation: Violation) {
        self.state.write().await.violations.push(violation);
    }

    /// Append an activity entry to the stored log
    pub async fn push_activity(&self, entry: ActivityEntry) {
        self.state.write().await.activities.push(entry);
    }

    /// Make start-monitoring answer `monitoring: false` (e.g. no camera)
    pub async fn refuse_start(&self, refuse: bool) {
        self.state.write().await.refuse_start = refuse;
    }

    /// Make every call of `query` fail until cleared
    pub async fn set_failing(&self, query: Query, failing: bool) {
        let mut state = self.state.write().await;
        if failing {
            state.failing.insert(query);
        } else {
            state.failing.remove(&query);
        }
    }

    /// Delay the next call of `query` by `delay`; queued delays apply in order
    pub async fn push_latency(&self, query: Query, delay: Duration) {
        self.state
            .write()
            .await
            .latency
            .entry(query)
            .or_default()
            .push_back(delay);
    }

    /// Whether the backend currently considers itself monitoring
    pub async fn is_monitoring(&self) -> bool {
        self.state.read().await.monitoring
    }

    /// Every integrity event reported so far, in arrival order
    pub async fn logged_events(&self) -> Vec<IntegrityEvent> {
        self.state.read().await.logged.clone()
    }

    /// Number of calls made for `query`, including failed ones
    pub async fn call_count(&self, query: Query) -> u64 {
        self.state
            .read()
            .await
            .calls
            .get(&query)
            .copied()
            .unwrap_or(0)
    }
}

async fn delay(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[async_trait]
impl SignalSource for MemorySignalSource {
    async fn status(&self) -> Result<StatusSnapshot> {
        let (snapshot, wait) = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::Status)?;
            (state.snapshot.clone(), wait)
        };
        delay(wait).await;
        Ok(snapshot)
    }

    async fn violations(&self) -> Result<ViolationLog> {
        let (log, wait) = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::Violations)?;
            let skip = state.violations.len().saturating_sub(VIOLATIONS_PAGE);
            let log = ViolationLog {
                violations: state.violations[skip..].to_vec(),
                total: state.snapshot.total_violations,
            };
            (log, wait)
        };
        delay(wait).await;
        Ok(log)
    }

    async fn activity(&self) -> Result<ActivityLog> {
        let (log, wait) = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::Activity)?;
            let skip = state.activities.len().saturating_sub(ACTIVITY_PAGE);
            let log = ActivityLog {
                activities: state.activities[skip..].to_vec(),
            };
            (log, wait)
        };
        delay(wait).await;
        Ok(log)
    }

    async fn start_monitoring(&self) -> Result<StartAck> {
        let (ack, wait) = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::Start)?;
            if !state.refuse_start && !state.monitoring {
                state.monitoring = true;
                state.add_activity("System started", ActivityLevel::Info);
            }
            let ack = StartAck {
                monitoring: state.monitoring,
                status: Some("started".to_string()),
            };
            (ack, wait)
        };
        delay(wait).await;
        Ok(ack)
    }

    async fn stop_monitoring(&self) -> Result<()> {
        let wait = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::Stop)?;
            state.monitoring = false;
            wait
        };
        delay(wait).await;
        Ok(())
    }

    async fn log_event(&self, event: &IntegrityEvent) -> Result<()> {
        let wait = {
            let mut state = self.state.write().await;
            let wait = state.begin(Query::LogEvent)?;
            state.logged.push(event.clone());

            match event.kind {
                EventKind::PageHidden => {
                    state.add_activity("User switched tab/minimized window", ActivityLevel::Critical);
                    state.add_violation("Page visibility: Tab switched or window hidden", "CRITICAL");
                }
                EventKind::FullscreenExit => {
                    state.add_activity("User exited fullscreen mode", ActivityLevel::Critical);
                    state.add_violation("Fullscreen: User exited fullscreen", "CRITICAL");
                }
                EventKind::FullscreenEnter => {
                    state.add_activity("Fullscreen mode activated", ActivityLevel::Info);
                }
                EventKind::PageVisible => {
                    state.add_activity("User returned to exam tab", ActivityLevel::Info);
                }
                _ => {}
            }
            wait
        };
        delay(wait).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_toggles_monitoring() {
        let source = MemorySignalSource::new();
        assert!(source.start_monitoring().await.unwrap().monitoring);
        assert!(source.is_monitoring().await);

        source.stop_monitoring().await.unwrap();
        assert!(!source.is_monitoring().await);
    }

    #[tokio::test]
    async fn test_refused_start() {
        let source = MemorySignalSource::new();
        source.refuse_start(true).await;
        assert!(!source.start_monitoring().await.unwrap().monitoring);
    }

    #[tokio::test]
    async fn test_failure_injection_is_per_query() {
        let source = MemorySignalSource::new();
        source.set_failing(Query::Status, true).await;

        assert!(source.status().await.is_err());
        assert!(source.violations().await.is_ok());
        assert_eq!(source.call_count(Query::Status).await, 1);

        source.set_failing(Query::Status, false).await;
        assert!(source.status().await.is_ok());
    }

    #[tokio::test]
    async fn test_log_event_bookkeeping() {
        let source = MemorySignalSource::new();
        source
            .log_event(&IntegrityEvent::new(EventKind::PageHidden))
            .await
            .unwrap();
        source
            .log_event(&IntegrityEvent::new(EventKind::Other("WEBCAM_COVERED".into())))
            .await
            .unwrap();

        let violations = source.violations().await.unwrap();
        assert_eq!(violations.violations.len(), 1);
        assert_eq!(violations.total, 1);
        assert_eq!(violations.violations[0].severity, "CRITICAL");

        let activity = source.activity().await.unwrap();
        assert_eq!(activity.activities.len(), 1);
        assert_eq!(activity.activities[0].level, ActivityLevel::Critical);

        assert_eq!(source.logged_events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_query_pages_are_bounded() {
        let source = MemorySignalSource::new();
        for i in 0..25 {
            source
                .push_violation(Violation {
                    timestamp: format!("t{}", i),
                    kind: "NO_FACE".to_string(),
                    severity: "ALERT".to_string(),
                })
                .await;
        }

        let log = source.violations().await.unwrap();
        assert_eq!(log.violations.len(), 20);
        assert_eq!(log.violations[0].timestamp, "t5");
        assert_eq!(log.violations[19].timestamp, "t24");
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_latency_is_consumed_in_order() {
        let source = MemorySignalSource::new();
        source.push_latency(Query::Status, Duration::from_millis(300)).await;

        let started = tokio::time::Instant::now();
        source.status().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));

        let started = tokio::time::Instant::now();
        source.status().await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(300));
    }
}
