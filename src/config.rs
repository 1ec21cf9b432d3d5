//! Monitor and backend configuration
//!
//! Every cadence and threshold lives here so deployments can tune them
//! (the poll cadence is typically 500ms or 5000ms). Configuration loads
//! from TOML or JSON; missing keys fall back to defaults.

use crate::error::{ProctorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// When the tab-switch warning is raised after the page was hidden
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityWarning {
    /// Warn if the page is visible again when the deferred check runs
    #[default]
    OnReturn,
    /// Warn if the page is still hidden when the deferred check runs
    WhileHidden,
}

/// Cadences and thresholds for polling and circumvention detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Status/violation/activity poll cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Clipboard scrub cadence while a session is active
    #[serde(default = "default_clipboard_scrub_interval_ms")]
    pub clipboard_scrub_interval_ms: u64,

    /// Viewport/window size skew sampling cadence
    #[serde(default = "default_viewport_check_interval_ms")]
    pub viewport_check_interval_ms: u64,

    /// Outer-minus-inner size above which a skew is reported
    #[serde(default = "default_viewport_skew_threshold")]
    pub viewport_skew_threshold: u32,

    /// Blurs closer together than this belong to the same burst
    #[serde(default = "default_blur_burst_gap_ms")]
    pub blur_burst_gap_ms: u64,

    /// Blurs within one burst that flag suspicious focus
    #[serde(default = "default_blur_burst_threshold")]
    pub blur_burst_threshold: u32,

    /// How long the capture-attempt overlay stays up
    #[serde(default = "default_overlay_duration_ms")]
    pub overlay_duration_ms: u64,

    /// Delay before re-checking visibility after the page was hidden
    #[serde(default = "default_visibility_recheck_ms")]
    pub visibility_recheck_ms: u64,

    #[serde(default)]
    pub visibility_warning: VisibilityWarning,

    /// Text written over clipboard contents
    #[serde(default = "default_clipboard_sentinel")]
    pub clipboard_sentinel: String,

    /// Display duration of transient notices
    #[serde(default = "default_notice_duration_ms")]
    pub notice_duration_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_clipboard_scrub_interval_ms() -> u64 {
    500
}

fn default_viewport_check_interval_ms() -> u64 {
    1000
}

fn default_viewport_skew_threshold() -> u32 {
    160
}

fn default_blur_burst_gap_ms() -> u64 {
    2000
}

fn default_blur_burst_threshold() -> u32 {
    2
}

fn default_overlay_duration_ms() -> u64 {
    3000
}

fn default_visibility_recheck_ms() -> u64 {
    1000
}

fn default_clipboard_sentinel() -> String {
    "SCREENSHOT PROHIBITED".to_string()
}

fn default_notice_duration_ms() -> u64 {
    3000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            clipboard_scrub_interval_ms: default_clipboard_scrub_interval_ms(),
            viewport_check_interval_ms: default_viewport_check_interval_ms(),
            viewport_skew_threshold: default_viewport_skew_threshold(),
            blur_burst_gap_ms: default_blur_burst_gap_ms(),
            blur_burst_threshold: default_blur_burst_threshold(),
            overlay_duration_ms: default_overlay_duration_ms(),
            visibility_recheck_ms: default_visibility_recheck_ms(),
            visibility_warning: VisibilityWarning::default(),
            clipboard_sentinel: default_clipboard_sentinel(),
            notice_duration_ms: default_notice_duration_ms(),
        }
    }
}

impl MonitorConfig {
    /// Set the poll cadence
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set when the tab-switch warning fires
    pub fn with_visibility_warning(mut self, rule: VisibilityWarning) -> Self {
        self.visibility_warning = rule;
        self
    }

    /// Set the clipboard sentinel text
    pub fn with_clipboard_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.clipboard_sentinel = sentinel.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn clipboard_scrub_interval(&self) -> Duration {
        Duration::from_millis(self.clipboard_scrub_interval_ms)
    }

    pub fn viewport_check_interval(&self) -> Duration {
        Duration::from_millis(self.viewport_check_interval_ms)
    }

    pub fn overlay_duration(&self) -> Duration {
        Duration::from_millis(self.overlay_duration_ms)
    }

    pub fn visibility_recheck(&self) -> Duration {
        Duration::from_millis(self.visibility_recheck_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    /// Reject values that would spin a timer or make a detector unreachable
    pub fn validate(&self) -> Result<()> {
        let cadences = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("clipboard_scrub_interval_ms", self.clipboard_scrub_interval_ms),
            ("viewport_check_interval_ms", self.viewport_check_interval_ms),
        ];
        for (name, value) in cadences {
            if value == 0 {
                return Err(ProctorError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.blur_burst_threshold == 0 {
            return Err(ProctorError::Config(
                "blur_burst_threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Detection backend location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the backend (e.g., "http://localhost:5000")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProctorConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub source: SourceConfig,
}

impl ProctorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProctorError::Config(format!("Failed to parse TOML config: {}", e)))?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.monitor.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProctorError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            other => Err(ProctorError::Config(format!(
                "Unsupported config format {:?} for {}",
                other,
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.viewport_skew_threshold, 160);
        assert_eq!(config.blur_burst_gap_ms, 2000);
        assert_eq!(config.blur_burst_threshold, 2);
        assert_eq!(config.overlay_duration(), Duration::from_secs(3));
        assert_eq!(config.visibility_warning, VisibilityWarning::OnReturn);
        assert_eq!(config.clipboard_sentinel, "SCREENSHOT PROHIBITED");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_override() {
        let config = ProctorConfig::from_toml_str(
            r#"
            [monitor]
            poll_interval_ms = 5000
            visibility_warning = "while_hidden"

            [source]
            base_url = "http://proctor.internal:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.monitor.visibility_warning, VisibilityWarning::WhileHidden);
        assert_eq!(config.monitor.clipboard_scrub_interval_ms, 500);
        assert_eq!(config.source.base_url, "http://proctor.internal:8080");
        assert_eq!(config.source.request_timeout_ms, 5000);
    }

    #[test]
    fn test_json_config() {
        let config = ProctorConfig::from_json_str(r#"{"monitor": {"blur_burst_gap_ms": 1500}}"#)
            .unwrap();
        assert_eq!(config.monitor.blur_burst_gap_ms, 1500);
        assert_eq!(config.source, SourceConfig::default());
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let err = ProctorConfig::from_toml_str("[monitor]\npoll_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ProctorError::Config(_)));

        let config = MonitorConfig {
            blur_burst_threshold: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = std::env::temp_dir().join(format!("a3s-proctor-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let toml_path = dir.join("proctor.toml");
        std::fs::write(&toml_path, "[monitor]\noverlay_duration_ms = 2000\n").unwrap();
        let config = ProctorConfig::from_file(&toml_path).unwrap();
        assert_eq!(config.monitor.overlay_duration_ms, 2000);

        let yaml_path = dir.join("proctor.yaml");
        std::fs::write(&yaml_path, "monitor: {}").unwrap();
        assert!(ProctorConfig::from_file(&yaml_path).is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_builders() {
        let config = MonitorConfig::default()
            .with_poll_interval(Duration::from_secs(5))
            .with_visibility_warning(VisibilityWarning::WhileHidden)
            .with_clipboard_sentinel("NO COPYING");
        assert_eq!(config.poll_interval_ms, 5000);
        assert_eq!(config.visibility_warning, VisibilityWarning::WhileHidden);
        assert_eq!(config.clipboard_sentinel, "NO COPYING");
    }
}
