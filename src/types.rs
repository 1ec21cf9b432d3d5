//! Core proctoring types shared by the poller, classifier and monitors
//!
//! Backend JSON uses snake_case field names. Every enum that arrives from
//! the backend keeps an `Other(String)` fallback so an unrecognized value
//! renders its raw identifier instead of failing the whole response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gaze direction reported by the eye tracker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EyeStatus {
    Center,
    Left,
    Right,
    Up,
    Down,
    #[default]
    NotDetected,
    Other(String),
}

impl EyeStatus {
    /// Human-readable label, matching the backend's wording
    pub fn label(&self) -> &str {
        match self {
            Self::Center => "Center",
            Self::Left => "Looking Left",
            Self::Right => "Looking Right",
            Self::Up => "Looking Up",
            Self::Down => "Looking Down",
            Self::NotDetected => "Not Detected",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for EyeStatus {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "Center" | "Looking Center" => Self::Center,
            "Left" | "Looking Left" => Self::Left,
            "Right" | "Looking Right" => Self::Right,
            "Up" | "Looking Up" => Self::Up,
            "Down" | "Looking Down" => Self::Down,
            "NotDetected" | "Not Detected" => Self::NotDetected,
            _ => Self::Other(raw),
        }
    }
}

impl From<EyeStatus> for String {
    fn from(status: EyeStatus) -> Self {
        status.label().to_string()
    }
}

/// Head pose reported by the pose estimator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HeadStatus {
    Straight,
    Turned,
    Down,
    Up,
    #[default]
    NotDetected,
    Other(String),
}

impl HeadStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::Straight => "Head Straight",
            Self::Turned => "Head Turned",
            Self::Down => "Head Down",
            Self::Up => "Head Up",
            Self::NotDetected => "Not Detected",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for HeadStatus {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "Straight" | "Head Straight" => Self::Straight,
            "Turned" | "Head Turned" => Self::Turned,
            "Down" | "Head Down" => Self::Down,
            "Up" | "Head Up" => Self::Up,
            "NotDetected" | "Not Detected" => Self::NotDetected,
            _ => Self::Other(raw),
        }
    }
}

impl From<HeadStatus> for String {
    fn from(status: HeadStatus) -> Self {
        status.label().to_string()
    }
}

/// Backend-computed aggregate banner level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertLevel {
    #[default]
    Normal,
    Warning,
    Alert,
    Other(String),
}

impl AlertLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Alert => "ALERT",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for AlertLevel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "NORMAL" => Self::Normal,
            "WARNING" => Self::Warning,
            "ALERT" => Self::Alert,
            _ => Self::Other(raw),
        }
    }
}

impl From<AlertLevel> for String {
    fn from(level: AlertLevel) -> Self {
        level.as_str().to_string()
    }
}

/// Alert-list severity, derived from the alert code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

/// Active alert code reported in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertCode {
    NoFace,
    NoPerson,
    MultiplePeople,
    PhoneDetected,
    SpeechDetected,
    SuspiciousAudio,
    EyeMovement,
    HeadMovement,
    HeadDown,
    HeadUp,
    Other(String),
}

impl AlertCode {
    /// Wire identifier (e.g. `PHONE_DETECTED`), or the raw code if unrecognized
    pub fn code(&self) -> &str {
        match self {
            Self::NoFace => "NO_FACE",
            Self::NoPerson => "NO_PERSON",
            Self::MultiplePeople => "MULTIPLE_PEOPLE",
            Self::PhoneDetected => "PHONE_DETECTED",
            Self::SpeechDetected => "SPEECH_DETECTED",
            Self::SuspiciousAudio => "SUSPICIOUS_AUDIO",
            Self::EyeMovement => "EYE_MOVEMENT",
            Self::HeadMovement => "HEAD_MOVEMENT",
            Self::HeadDown => "HEAD_DOWN",
            Self::HeadUp => "HEAD_UP",
            Self::Other(raw) => raw,
        }
    }

    /// Phone, multiple people and suspicious audio are high; everything
    /// else, including unrecognized codes, is medium
    pub fn severity(&self) -> Severity {
        match self {
            Self::PhoneDetected | Self::MultiplePeople | Self::SuspiciousAudio => Severity::High,
            _ => Severity::Medium,
        }
    }

    /// Alert-list label; unrecognized codes show their raw identifier
    pub fn label(&self) -> &str {
        match self {
            Self::NoFace => "No Face Detected",
            Self::NoPerson => "No Person Detected",
            Self::MultiplePeople => "Multiple People",
            Self::PhoneDetected => "Phone Detected",
            Self::SpeechDetected => "Speech Detected",
            Self::SuspiciousAudio => "Suspicious Audio",
            Self::EyeMovement => "Suspicious Eye Movement",
            Self::HeadMovement => "Head Movement Detected",
            Self::HeadDown => "Head Looking Down",
            Self::HeadUp => "Head Looking Up",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for AlertCode {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "NO_FACE" => Self::NoFace,
            "NO_PERSON" => Self::NoPerson,
            "MULTIPLE_PEOPLE" => Self::MultiplePeople,
            "PHONE_DETECTED" => Self::PhoneDetected,
            "SPEECH_DETECTED" => Self::SpeechDetected,
            "SUSPICIOUS_AUDIO" => Self::SuspiciousAudio,
            "EYE_MOVEMENT" => Self::EyeMovement,
            "HEAD_MOVEMENT" => Self::HeadMovement,
            "HEAD_DOWN" => Self::HeadDown,
            "HEAD_UP" => Self::HeadUp,
            _ => Self::Other(raw),
        }
    }
}

impl From<AlertCode> for String {
    fn from(code: AlertCode) -> Self {
        code.code().to_string()
    }
}

/// Audio channel readings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub speech_detected: bool,

    #[serde(default, deserialize_with = "lenient")]
    pub suspicious_audio: bool,

    #[serde(default, deserialize_with = "lenient")]
    pub audio_detected: bool,

    /// Microphone level, 0–100
    #[serde(default, deserialize_with = "volume")]
    pub volume_level: u8,
}

/// One backend-reported point-in-time detection result
///
/// Fully replaced on every poll. Missing, `null` or wrongly typed fields
/// fall back to their defaults; audio readings are accepted either nested under
/// `audio` or flattened at the top level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireStatus")]
pub struct StatusSnapshot {
    pub face_detected: bool,
    pub eye_status: EyeStatus,
    pub head_status: HeadStatus,
    pub person_count: u32,
    pub phone_detected: bool,
    pub audio: AudioStatus,
    pub alert_level: AlertLevel,
    pub total_violations: u64,
    pub frames_processed: u64,
    pub timestamp: String,
    /// Active alert codes, de-duplicated in arrival order
    pub alerts: Vec<AlertCode>,
}

#[derive(Deserialize)]
struct WireStatus {
    #[serde(default, deserialize_with = "lenient")]
    face_detected: bool,
    #[serde(default, deserialize_with = "lenient")]
    eye_status: EyeStatus,
    #[serde(default, deserialize_with = "lenient")]
    head_status: HeadStatus,
    #[serde(default, deserialize_with = "lenient")]
    person_count: u32,
    #[serde(default, deserialize_with = "lenient")]
    phone_detected: bool,
    #[serde(default, deserialize_with = "lenient")]
    audio: Option<AudioStatus>,
    #[serde(default, deserialize_with = "lenient")]
    speech_detected: bool,
    #[serde(default, deserialize_with = "lenient")]
    suspicious_audio: bool,
    #[serde(default, deserialize_with = "lenient")]
    audio_detected: bool,
    #[serde(default, deserialize_with = "volume")]
    volume_level: u8,
    #[serde(default, deserialize_with = "lenient")]
    alert_level: AlertLevel,
    #[serde(default, deserialize_with = "lenient")]
    total_violations: u64,
    #[serde(default, deserialize_with = "lenient")]
    frames_processed: u64,
    #[serde(default, deserialize_with = "lenient")]
    timestamp: String,
    #[serde(default, deserialize_with = "lenient_list")]
    alerts: Vec<AlertCode>,
}

impl From<WireStatus> for StatusSnapshot {
    fn from(wire: WireStatus) -> Self {
        let audio = wire.audio.unwrap_or(AudioStatus {
            speech_detected: wire.speech_detected,
            suspicious_audio: wire.suspicious_audio,
            audio_detected: wire.audio_detected,
            volume_level: wire.volume_level,
        });

        let mut alerts: Vec<AlertCode> = Vec::new();
        for code in wire.alerts {
            if !alerts.contains(&code) {
                alerts.push(code);
            }
        }

        Self {
            face_detected: wire.face_detected,
            eye_status: wire.eye_status,
            head_status: wire.head_status,
            person_count: wire.person_count,
            phone_detected: wire.phone_detected,
            audio,
            alert_level: wire.alert_level,
            total_violations: wire.total_violations,
            frames_processed: wire.frames_processed,
            timestamp: wire.timestamp,
            alerts,
        }
    }
}

/// One entry of the backend's append-only violation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: String,

    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: String,

    /// Backend severity label (e.g. "CRITICAL", "ALERT", "WARNING")
    #[serde(default, deserialize_with = "lenient")]
    pub severity: String,
}

/// Violation-log query response, oldest-first as stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationLog {
    #[serde(default, deserialize_with = "lenient_list")]
    pub violations: Vec<Violation>,

    #[serde(default, deserialize_with = "lenient")]
    pub total: u64,
}

/// Activity entry level
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityLevel {
    #[default]
    Info,
    Warning,
    Critical,
    Other(String),
}

impl ActivityLevel {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ActivityLevel {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "INFO" => Self::Info,
            "WARNING" => Self::Warning,
            "CRITICAL" => Self::Critical,
            _ => Self::Other(raw),
        }
    }
}

impl From<ActivityLevel> for String {
    fn from(level: ActivityLevel) -> Self {
        level.as_str().to_string()
    }
}

/// One entry of the backend's activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: String,

    #[serde(default, deserialize_with = "lenient")]
    pub level: ActivityLevel,

    #[serde(default, deserialize_with = "lenient")]
    pub message: String,
}

/// Activity-log query response, oldest-first as stored
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLog {
    #[serde(default, deserialize_with = "lenient_list")]
    pub activities: Vec<ActivityEntry>,
}

/// Start-monitoring response; the session is active only if `monitoring` is true
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    #[serde(default)]
    pub monitoring: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Integrity event type sent through the log-event command
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    PageHidden,
    PageVisible,
    FullscreenExit,
    FullscreenEnter,
    ScreenshotAttempt,
    DevtoolsDetected,
    SuspiciousFocus,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PageHidden => "PAGE_HIDDEN",
            Self::PageVisible => "PAGE_VISIBLE",
            Self::FullscreenExit => "FULLSCREEN_EXIT",
            Self::FullscreenEnter => "FULLSCREEN_ENTER",
            Self::ScreenshotAttempt => "SCREENSHOT_ATTEMPT",
            Self::DevtoolsDetected => "DEVTOOLS_DETECTED",
            Self::SuspiciousFocus => "SUSPICIOUS_FOCUS",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for EventKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PAGE_HIDDEN" => Self::PageHidden,
            "PAGE_VISIBLE" => Self::PageVisible,
            "FULLSCREEN_EXIT" => Self::FullscreenExit,
            "FULLSCREEN_ENTER" => Self::FullscreenEnter,
            "SCREENSHOT_ATTEMPT" => Self::ScreenshotAttempt,
            "DEVTOOLS_DETECTED" => Self::DevtoolsDetected,
            "SUSPICIOUS_FOCUS" => Self::SuspiciousFocus,
            _ => Self::Other(raw),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Body of the log-event command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,

    /// Running capture-attempt count, for `SCREENSHOT_ATTEMPT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u64>,
}

impl IntegrityEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            attempts: None,
        }
    }

    pub fn with_attempts(mut self, attempts: u64) -> Self {
        self.attempts = Some(attempts);
        self
    }
}

/// Visual tone of a transient notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Warning,
    Danger,
}

/// A transient, auto-dismissed user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub tone: Tone,
    /// How long the host should keep it on screen
    pub duration: Duration,
}

impl Notice {
    pub fn new(message: impl Into<String>, tone: Tone, duration: Duration) -> Self {
        Self {
            message: message.into(),
            tone,
            duration,
        }
    }
}

/// Field value, or its default when `null` or of the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Every element that parses; anything but an array is an empty list
fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned,
{
    let serde_json::Value::Array(items) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect())
}

/// Any JSON number, rounded and clamped to 0–100
fn volume<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .map(|level| level.clamp(0.0, 100.0).round() as u8)
        .unwrap_or_default())
}
