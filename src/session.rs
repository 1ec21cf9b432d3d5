//! Monitoring session lifecycle
//!
//! INACTIVE → (backend confirms `monitoring: true`) → ACTIVE →
//! (stop resolves, or unload confirmed) → INACTIVE.
//!
//! `start()` never transitions optimistically. `stop()` always ends
//! INACTIVE, even when the start was never confirmed or the stop command
//! failed. Poll errors never touch the session. The current session is
//! published on a `watch` channel so the poller and the circumvention
//! monitor can gate on it.

use crate::error::Result;
use crate::source::SignalSource;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Prompt shown when leaving the page during an active session
pub const UNLOAD_PROMPT: &str =
    "Are you sure you want to leave? Your exam session will be terminated.";

/// Monitoring session snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitoringSession {
    /// Session identifier (ses-<uuid>), set while active
    pub id: Option<String>,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
}

impl MonitoringSession {
    fn started(now: DateTime<Utc>) -> Self {
        Self {
            id: Some(format!("ses-{}", uuid::Uuid::new_v4())),
            active: true,
            started_at: Some(now),
        }
    }

    /// Time since start as of `now`; `None` if not started or `now` precedes the start
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let started = self.started_at?;
        (now - started).to_std().ok()
    }

    /// Time since start, derived on demand
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_at(Utc::now())
    }

    /// Whether a response issued under `issued` may still be rendered
    pub fn same_epoch(&self, issued: &MonitoringSession) -> bool {
        self.active == issued.active && self.id == issued.id
    }
}

/// What the host should do when the page is about to unload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Proceed,
    Confirm { message: &'static str },
}

/// How a start request resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The backend confirmed and the session is ACTIVE
    Active,
    /// The backend answered `monitoring: false`
    Declined,
    /// A stop or unload happened while the request was in flight
    Cancelled,
}

impl StartOutcome {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Start/stop state machine for a monitoring session
pub struct SessionLifecycle {
    source: Arc<dyn SignalSource>,
    state: watch::Sender<MonitoringSession>,
    /// Bumped by every stop/unload so a late start confirmation is discarded
    generation: AtomicU64,
}

impl SessionLifecycle {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        let (state, _) = watch::channel(MonitoringSession::default());
        Self {
            source,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Watch session transitions
    pub fn watch(&self) -> watch::Receiver<MonitoringSession> {
        self.state.subscribe()
    }

    pub fn current(&self) -> MonitoringSession {
        self.state.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    /// Time since the active session started
    pub fn elapsed(&self) -> Option<Duration> {
        self.state.borrow().elapsed()
    }

    /// Ask the backend to start monitoring
    ///
    /// Transport errors are returned and leave the session INACTIVE.
    pub async fn start(&self) -> Result<StartOutcome> {
        if self.is_active() {
            tracing::debug!("Monitoring session already active");
            return Ok(StartOutcome::Active);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let ack = self.source.start_monitoring().await?;

        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!("Start response arrived after stop; discarded");
            return Ok(StartOutcome::Cancelled);
        }

        if !ack.monitoring {
            tracing::warn!(
                source = %self.source.name(),
                status = ?ack.status,
                "Backend declined to start monitoring"
            );
            return Ok(StartOutcome::Declined);
        }

        let session = MonitoringSession::started(Utc::now());
        tracing::info!(
            session_id = ?session.id,
            source = %self.source.name(),
            "Monitoring session started"
        );
        self.state.send_replace(session);
        Ok(StartOutcome::Active)
    }

    /// Stop monitoring; always ends INACTIVE once the command resolves
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.source.stop_monitoring().await {
            tracing::warn!(error = %e, "Stop command failed; resetting session anyway");
        }

        self.deactivate("stopped");
    }

    /// Unload gate: intercept only while ACTIVE
    pub fn before_unload(&self) -> UnloadDecision {
        if self.is_active() {
            UnloadDecision::Confirm {
                message: UNLOAD_PROMPT,
            }
        } else {
            UnloadDecision::Proceed
        }
    }

    /// The user confirmed leaving the page
    pub fn confirm_unload(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.deactivate("unload confirmed");
    }

    fn deactivate(&self, reason: &str) {
        let previous = self.state.send_replace(MonitoringSession::default());
        if previous.active {
            tracing::info!(
                session_id = ?previous.id,
                elapsed_secs = ?previous.elapsed().map(|d| d.as_secs()),
                reason,
                "Monitoring session ended"
            );
        }
    }
}
