//! # a3s-proctor
//!
//! Session monitor for remote exam proctoring in the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-proctor` polls a detection backend for exam-integrity signals
//! (face, eye, head, person, phone, audio), classifies them into per-channel
//! indicators and an overall alert banner, and independently detects
//! attempts to defeat the monitoring session itself (screenshot keys,
//! fullscreen exit, tab switching, developer tools, clipboard abuse).
//! Swap backends (HTTP, in-memory) without changing application code.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_proctor::{MemoryHost, MemorySignalSource, MonitorConfig, ProctorMonitor};
//!
//! # async fn example() -> a3s_proctor::Result<()> {
//! let monitor = ProctorMonitor::new(
//!     MonitorConfig::default(),
//!     Arc::new(MemorySignalSource::new()),
//!     Arc::new(MemoryHost::new()),
//! )?;
//! monitor.start_cadences()?;
//!
//! if monitor.start_session().await? {
//!     let dashboard = monitor.dashboard().await;
//!     println!("{}", dashboard.banner.headline);
//! }
//!
//! monitor.stop_session().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Signal sources
//!
//! - **http**: the backend's REST surface via `reqwest`
//! - **memory**: scripted backend for tests and demos
//!
//! ## Architecture
//!
//! - **SignalSource** trait: status, logs, session commands, event logging
//! - **StatusPoller**: periodic, failure-isolated refresh of the dashboard
//! - **SessionLifecycle**: start/stop state machine and unload gate
//! - **CircumventionMonitor**: pure reducer from platform events to effects
//! - **ProctorMonitor**: facade owning cadences and running effects

pub mod circumvention;
pub mod classifier;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod host;
pub mod logger;
pub mod monitor;
pub mod poller;
pub mod session;
pub mod source;
pub mod types;

// Re-export core types
pub use circumvention::{
    CircumventionMonitor, CircumventionState, Effect, Key, KeyPress, PlatformEvent,
};
pub use classifier::{classify, Classification, IndicatorState};
pub use config::{MonitorConfig, ProctorConfig, SourceConfig, VisibilityWarning};
pub use dashboard::Dashboard;
pub use error::{ProctorError, Result};
pub use host::{Capability, MemoryHost, PlatformHost, Unavailable, Viewport};
pub use logger::EventLogger;
pub use monitor::{MonitorEvent, ProctorMonitor};
pub use poller::{QueryPhase, QueryTracker, StatusPoller};
pub use session::{MonitoringSession, SessionLifecycle, StartOutcome, UnloadDecision};
pub use source::{Query, SignalSource};
pub use types::{
    AlertCode, AlertLevel, EventKind, IntegrityEvent, Notice, StatusSnapshot, Tone,
};

// Re-export sources for convenience
pub use source::http::HttpSignalSource;
pub use source::memory::MemorySignalSource;
