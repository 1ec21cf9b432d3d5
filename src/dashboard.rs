//! Dashboard render model
//!
//! The last-rendered view state. The poller writes each query's result
//! into its own section; a failed query leaves its section untouched, so
//! the dashboard always shows the last good value.

use crate::classifier::{classify, AlertItem, ChannelIndicators};
use crate::types::{ActivityEntry, ActivityLevel, ActivityLog, AlertLevel, StatusSnapshot, Violation, ViolationLog};
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Visual marker set on the banner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerMarker {
    Normal,
    Warning,
    Danger,
}

/// Aggregate exam-integrity banner
///
/// Rendering a level clears the markers of every other level first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Banner {
    markers: BTreeSet<BannerMarker>,
    pub status: String,
    pub badge: String,
    pub headline: String,
}

impl Banner {
    pub fn render(&mut self, level: &AlertLevel) {
        self.markers.clear();

        let (marker, badge, headline) = match level {
            AlertLevel::Normal => (Some(BannerMarker::Normal), "All Good", "Monitoring Active"),
            AlertLevel::Warning => (
                Some(BannerMarker::Warning),
                "Attention Needed",
                "Warning Detected",
            ),
            AlertLevel::Alert => (
                Some(BannerMarker::Danger),
                "Violation Detected",
                "ALERT: Violation!",
            ),
            AlertLevel::Other(raw) => (None, raw.as_str(), raw.as_str()),
        };

        if let Some(marker) = marker {
            self.markers.insert(marker);
        }
        self.status = level.as_str().to_string();
        self.badge = badge.to_string();
        self.headline = headline.to_string();
    }

    pub fn markers(&self) -> &BTreeSet<BannerMarker> {
        &self.markers
    }
}

/// A list section with an empty-state caption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ListView<T> {
    Empty(&'static str),
    Rows(Vec<T>),
}

impl<T> ListView<T> {
    fn from_rows(rows: Vec<T>, empty: &'static str) -> Self {
        if rows.is_empty() {
            Self::Empty(empty)
        } else {
            Self::Rows(rows)
        }
    }

    pub fn rows(&self) -> &[T] {
        match self {
            Self::Empty(_) => &[],
            Self::Rows(rows) => rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }
}

pub const NO_ALERTS: &str = "No active alerts";
pub const NO_VIOLATIONS: &str = "No violations detected";
pub const NO_ACTIVITY: &str = "No activity yet";

/// Violation log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViolationRow {
    pub timestamp: String,
    pub kind: String,
    pub severity: String,
    /// Lowercased severity, used as the styling class
    pub severity_class: String,
}

impl From<Violation> for ViolationRow {
    fn from(violation: Violation) -> Self {
        Self {
            severity_class: violation.severity.to_lowercase(),
            timestamp: violation.timestamp,
            kind: violation.kind,
            severity: violation.severity,
        }
    }
}

/// Icon shown next to an activity row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityIcon {
    Info,
    Warning,
    Critical,
    Generic,
}

/// Activity log row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRow {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub icon: ActivityIcon,
}

impl From<ActivityEntry> for ActivityRow {
    fn from(entry: ActivityEntry) -> Self {
        let icon = match entry.level {
            ActivityLevel::Info => ActivityIcon::Info,
            ActivityLevel::Warning => ActivityIcon::Warning,
            ActivityLevel::Critical => ActivityIcon::Critical,
            ActivityLevel::Other(_) => ActivityIcon::Generic,
        };
        Self {
            timestamp: entry.timestamp,
            level: entry.level.as_str().to_string(),
            message: entry.message,
            icon,
        }
    }
}

/// Statistics strip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub total_violations: u64,
    pub frames_processed: u64,
    /// Backend timestamp of the last applied snapshot
    pub timestamp: String,
    pub fps: String,
    pub volume_level: u8,
}

/// Session clock labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClockLabels {
    /// "MM:SS"
    pub duration: String,
    /// "Session: Xm Ys"
    pub session: String,
}

impl ClockLabels {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let secs = elapsed.as_secs();
        let minutes = secs / 60;
        let seconds = secs % 60;
        Self {
            duration: format!("{:02}:{:02}", minutes, seconds),
            session: format!("Session: {}m {}s", minutes, seconds),
        }
    }
}

/// Frames per second since session start, `None` when it can't be derived
pub fn fps(frames_processed: u64, elapsed: Option<Duration>) -> Option<u64> {
    let secs = elapsed?.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((frames_processed as f64 / secs).round() as u64)
}

/// FPS label; an underivable or zero rate shows a placeholder
pub fn fps_label(fps: Option<u64>) -> String {
    match fps {
        Some(value) if value > 0 => format!("FPS: {}", value),
        _ => "FPS: --".to_string(),
    }
}

/// Last-rendered dashboard state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    /// `None` until the first status query succeeds
    pub indicators: Option<ChannelIndicators>,
    pub banner: Banner,
    pub alerts: ListView<AlertItem>,
    pub stats: Statistics,
    /// Most-recent-first
    pub violations: ListView<ViolationRow>,
    /// Most-recent-first
    pub activity: ListView<ActivityRow>,
    pub clock: Option<ClockLabels>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            indicators: None,
            banner: Banner::default(),
            alerts: ListView::Empty(NO_ALERTS),
            stats: Statistics {
                fps: fps_label(None),
                ..Statistics::default()
            },
            violations: ListView::Empty(NO_VIOLATIONS),
            activity: ListView::Empty(NO_ACTIVITY),
            clock: None,
        }
    }
}

impl Dashboard {
    /// Render a status snapshot; `elapsed` is the time since session start
    pub fn apply_status(&mut self, snapshot: &StatusSnapshot, elapsed: Option<Duration>) {
        let classification = classify(snapshot);

        self.banner.render(&classification.banner);
        self.indicators = Some(classification.indicators);
        self.alerts = ListView::from_rows(classification.alerts, NO_ALERTS);
        self.stats = Statistics {
            total_violations: snapshot.total_violations,
            frames_processed: snapshot.frames_processed,
            timestamp: snapshot.timestamp.clone(),
            fps: fps_label(fps(snapshot.frames_processed, elapsed)),
            volume_level: snapshot.audio.volume_level,
        };
    }

    pub fn apply_violations(&mut self, log: ViolationLog) {
        let rows = log.violations.into_iter().rev().map(ViolationRow::from).collect();
        self.violations = ListView::from_rows(rows, NO_VIOLATIONS);
    }

    pub fn apply_activity(&mut self, log: ActivityLog) {
        let rows = log.activities.into_iter().rev().map(ActivityRow::from).collect();
        self.activity = ListView::from_rows(rows, NO_ACTIVITY);
    }

    pub fn set_clock(&mut self, elapsed: Option<Duration>) {
        self.clock = elapsed.map(ClockLabels::from_elapsed);
    }
}
