//! Alert classification: snapshot to per-channel indicator states
//!
//! Pure mapping from one `StatusSnapshot` to normalized indicator states
//! and an alert-list view. The aggregate banner level is taken from the
//! backend as-is, never recomputed here.

use crate::types::{AlertCode, AlertLevel, AudioStatus, EyeStatus, HeadStatus, Severity, StatusSnapshot};
use serde::Serialize;

/// Normalized visual state of one channel indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    Normal,
    Inactive,
    Warning,
    Danger,
}

/// Monitored signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Face,
    Eye,
    Head,
    Person,
    Phone,
    Audio,
}

/// One rendered channel indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub channel: Channel,
    pub state: IndicatorState,
    pub label: String,
}

impl Indicator {
    fn new(channel: Channel, state: IndicatorState, label: impl Into<String>) -> Self {
        Self {
            channel,
            state,
            label: label.into(),
        }
    }

    pub fn is_normal(&self) -> bool {
        self.state == IndicatorState::Normal
    }
}

/// Indicators for every channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelIndicators {
    pub face: Indicator,
    pub eye: Indicator,
    pub head: Indicator,
    pub person: Indicator,
    pub phone: Indicator,
    pub audio: Indicator,
}

impl ChannelIndicators {
    pub fn iter(&self) -> impl Iterator<Item = &Indicator> {
        [
            &self.face,
            &self.eye,
            &self.head,
            &self.person,
            &self.phone,
            &self.audio,
        ]
        .into_iter()
    }
}

/// One row of the active-alert list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertItem {
    pub code: String,
    pub severity: Severity,
    pub label: String,
}

impl From<&AlertCode> for AlertItem {
    fn from(code: &AlertCode) -> Self {
        Self {
            code: code.code().to_string(),
            severity: code.severity(),
            label: code.label().to_string(),
        }
    }
}

/// Classification result for one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub indicators: ChannelIndicators,
    /// Backend-supplied banner level, unmodified
    pub banner: AlertLevel,
    pub alerts: Vec<AlertItem>,
}

/// Classify a snapshot
pub fn classify(snapshot: &StatusSnapshot) -> Classification {
    Classification {
        indicators: ChannelIndicators {
            face: face_indicator(snapshot.face_detected),
            eye: eye_indicator(&snapshot.eye_status),
            head: head_indicator(&snapshot.head_status),
            person: person_indicator(snapshot.person_count),
            phone: phone_indicator(snapshot.phone_detected),
            audio: audio_indicator(&snapshot.audio),
        },
        banner: snapshot.alert_level.clone(),
        alerts: snapshot.alerts.iter().map(AlertItem::from).collect(),
    }
}

/// A missing face shows as inactive, never as danger
pub fn face_indicator(face_detected: bool) -> Indicator {
    if face_detected {
        Indicator::new(Channel::Face, IndicatorState::Normal, "Face Detected")
    } else {
        Indicator::new(Channel::Face, IndicatorState::Inactive, "No Face")
    }
}

pub fn eye_indicator(status: &EyeStatus) -> Indicator {
    let state = match status {
        EyeStatus::NotDetected => IndicatorState::Inactive,
        EyeStatus::Center => IndicatorState::Normal,
        _ => IndicatorState::Warning,
    };
    Indicator::new(Channel::Eye, state, status.label())
}

pub fn head_indicator(status: &HeadStatus) -> Indicator {
    let state = match status {
        HeadStatus::NotDetected => IndicatorState::Inactive,
        HeadStatus::Straight => IndicatorState::Normal,
        _ => IndicatorState::Warning,
    };
    Indicator::new(Channel::Head, state, status.label())
}

/// Exactly one person is normal; nobody and a crowd are both warnings
pub fn person_indicator(count: u32) -> Indicator {
    let state = if count == 1 {
        IndicatorState::Normal
    } else {
        IndicatorState::Warning
    };
    let plural = if count == 1 { "" } else { "s" };
    Indicator::new(Channel::Person, state, format!("{} Person{}", count, plural))
}

/// The only channel whose off-normal state is danger
pub fn phone_indicator(phone_detected: bool) -> Indicator {
    if phone_detected {
        Indicator::new(Channel::Phone, IndicatorState::Danger, "Phone Detected!")
    } else {
        Indicator::new(Channel::Phone, IndicatorState::Normal, "No Phone")
    }
}

pub fn audio_indicator(audio: &AudioStatus) -> Indicator {
    let state = if !audio.speech_detected && !audio.suspicious_audio {
        IndicatorState::Normal
    } else {
        IndicatorState::Warning
    };

    let label = if audio.suspicious_audio {
        "Suspicious Audio"
    } else if audio.speech_detected {
        "Speech Detected"
    } else if audio.audio_detected {
        "Audio Detected"
    } else {
        "No Audio"
    };

    Indicator::new(Channel::Audio, state, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            face_detected: true,
            eye_status: EyeStatus::Center,
            head_status: HeadStatus::Straight,
            person_count: 1,
            ..StatusSnapshot::default()
        }
    }

    #[test]
    fn test_all_clear_snapshot() {
        let result = classify(&snapshot());
        assert!(result.indicators.iter().all(Indicator::is_normal));
        assert_eq!(result.banner, AlertLevel::Normal);
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_phone_snapshot() {
        let result = classify(&StatusSnapshot {
            phone_detected: true,
            alert_level: AlertLevel::Alert,
            alerts: vec![AlertCode::PhoneDetected],
            ..snapshot()
        });

        assert_eq!(result.indicators.phone.state, IndicatorState::Danger);
        assert_eq!(result.banner, AlertLevel::Alert);
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.alerts[0].severity, Severity::High);
        assert_eq!(result.alerts[0].label, "Phone Detected");
    }

    #[test]
    fn test_missing_face_is_inactive_never_danger() {
        let indicator = face_indicator(false);
        assert_eq!(indicator.state, IndicatorState::Inactive);
        assert_eq!(indicator.label, "No Face");
    }

    #[test]
    fn test_person_count_other_than_one_is_warning() {
        assert_eq!(person_indicator(0).state, IndicatorState::Warning);
        assert_eq!(person_indicator(0).label, "0 Persons");
        assert_eq!(person_indicator(1).state, IndicatorState::Normal);
        assert_eq!(person_indicator(1).label, "1 Person");
        for count in 2..10 {
            assert_eq!(person_indicator(count).state, IndicatorState::Warning);
        }
    }

    #[test]
    fn test_phone_is_danger_or_normal_only() {
        assert_eq!(phone_indicator(true).state, IndicatorState::Danger);
        assert_eq!(phone_indicator(false).state, IndicatorState::Normal);
    }

    #[test]
    fn test_eye_and_head_rules() {
        assert_eq!(eye_indicator(&EyeStatus::NotDetected).state, IndicatorState::Inactive);
        assert_eq!(eye_indicator(&EyeStatus::Center).state, IndicatorState::Normal);
        for status in [EyeStatus::Left, EyeStatus::Right, EyeStatus::Up, EyeStatus::Down] {
            assert_eq!(eye_indicator(&status).state, IndicatorState::Warning);
        }

        assert_eq!(head_indicator(&HeadStatus::NotDetected).state, IndicatorState::Inactive);
        assert_eq!(head_indicator(&HeadStatus::Straight).state, IndicatorState::Normal);
        assert_eq!(head_indicator(&HeadStatus::Down).state, IndicatorState::Warning);
        assert_eq!(head_indicator(&HeadStatus::Down).label, "Head Down");
        assert_eq!(
            head_indicator(&HeadStatus::Other("Head Tilted".into())).state,
            IndicatorState::Warning
        );
    }

    #[test]
    fn test_audio_label_priority() {
        let all = AudioStatus {
            speech_detected: true,
            suspicious_audio: true,
            audio_detected: true,
            volume_level: 80,
        };
        let indicator = audio_indicator(&all);
        assert_eq!(indicator.label, "Suspicious Audio");
        assert_eq!(indicator.state, IndicatorState::Warning);

        let speech = AudioStatus {
            suspicious_audio: false,
            ..all.clone()
        };
        assert_eq!(audio_indicator(&speech).label, "Speech Detected");

        let ambient = AudioStatus {
            audio_detected: true,
            ..AudioStatus::default()
        };
        let indicator = audio_indicator(&ambient);
        assert_eq!(indicator.label, "Audio Detected");
        assert_eq!(indicator.state, IndicatorState::Normal);

        assert_eq!(audio_indicator(&AudioStatus::default()).label, "No Audio");
    }

    #[test]
    fn test_unrecognized_alert_code_renders_raw() {
        let result = classify(&StatusSnapshot {
            alerts: vec![AlertCode::Other("GAZE_AWAY".into()), AlertCode::MultiplePeople],
            ..snapshot()
        });
        assert_eq!(result.alerts[0].label, "GAZE_AWAY");
        assert_eq!(result.alerts[0].severity, Severity::Medium);
        assert_eq!(result.alerts[1].severity, Severity::High);
    }

    #[test]
    fn test_banner_is_passed_through() {
        let result = classify(&StatusSnapshot {
            alert_level: AlertLevel::Warning,
            phone_detected: true,
            ..snapshot()
        });
        assert_eq!(result.banner, AlertLevel::Warning);
    }
}
