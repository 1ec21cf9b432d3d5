//! Signal source trait: the core abstraction for detection backends
//!
//! The detection backend exposes status/violation/activity queries and
//! start/stop/log-event commands. Backends (HTTP, in-memory) implement
//! `SignalSource` so the poller, session lifecycle and event logger stay
//! backend-agnostic.

use crate::error::Result;
use crate::types::{ActivityLog, IntegrityEvent, StartAck, StatusSnapshot, ViolationLog};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod memory;

/// Core trait for detection backends
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Current detection snapshot
    async fn status(&self) -> Result<StatusSnapshot>;

    /// Violation log, oldest-first as stored
    async fn violations(&self) -> Result<ViolationLog>;

    /// Activity log, oldest-first as stored
    async fn activity(&self) -> Result<ActivityLog>;

    /// Ask the backend to begin monitoring
    async fn start_monitoring(&self) -> Result<StartAck>;

    /// Ask the backend to stop monitoring; the acknowledgment carries nothing
    async fn stop_monitoring(&self) -> Result<()>;

    /// Report a discrete integrity event
    ///
    /// Backends must accept event types they don't recognize.
    async fn log_event(&self, event: &IntegrityEvent) -> Result<()>;

    /// Source name (e.g., "http", "memory")
    fn name(&self) -> &str;

    /// Health check: returns true if the backend answers a status query
    ///
    /// Default implementation delegates to `status()`.
    async fn health(&self) -> Result<bool> {
        self.status().await.map(|_| true)
    }
}

/// Backend call identifier, used for failure/latency scripting and
/// per-query bookkeeping in the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    Status,
    Violations,
    Activity,
    Start,
    Stop,
    LogEvent,
}

impl Query {
    /// Backend endpoint path segment
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Violations => "violations",
            Self::Activity => "activity",
            Self::Start => "start_monitoring",
            Self::Stop => "stop_monitoring",
            Self::LogEvent => "log_event",
        }
    }
}
