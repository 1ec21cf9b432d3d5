//! Circumvention detection
//!
//! Detects attempts to defeat the monitoring session itself: capture keys,
//! focus-loss bursts, window/viewport skew, tab switches, fullscreen exits,
//! developer-tools shortcuts, and clipboard/context-menu abuse.
//!
//! `CircumventionMonitor` is a pure reducer: every host signal arrives as a
//! `PlatformEvent`, and `handle` returns the `Effect`s to run. It performs
//! no I/O and reads no clock, so bursts and thresholds are testable with
//! explicit timestamps. The caller supplies a monotonic millisecond clock
//! and whether a session is active.
//!
//! Detection is deterrence plus audit logging, not a guarantee: OS-level
//! capture and determined circumvention are out of reach.

use crate::config::{MonitorConfig, VisibilityWarning};
use crate::host::Viewport;
use crate::types::{EventKind, IntegrityEvent, Notice, Tone};
use std::time::Duration;

pub const TAB_SWITCH_WARNING: &str = "Warning: Tab switching detected and logged!";
pub const FULLSCREEN_EXIT_WARNING: &str = "Warning: Exiting fullscreen is not allowed during exam!";
pub const SUSPICIOUS_FOCUS_WARNING: &str = "Repeated window switching detected";
pub const DEVTOOLS_WARNING: &str = "This action is not allowed during the exam";
pub const CONTEXT_MENU_WARNING: &str = "Right-click is disabled during the exam";
pub const CONTEXT_MENU_ADVISORY: &str = "Right-click is disabled on this page";
pub const COPY_WARNING: &str = "Copying is disabled during the exam";

/// Physical key of a key-down event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    PrintScreen,
    F12,
    Char(char),
    Other(String),
}

/// Key-down event with modifier state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    /// Command on macOS, Windows key elsewhere
    pub meta: bool,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    fn char_lower(&self) -> Option<char> {
        match self.key {
            Key::Char(c) => Some(c.to_ascii_lowercase()),
            _ => None,
        }
    }

    /// Print-screen, or a platform screenshot chord
    /// (Cmd+Shift+3/4/5 on macOS, Win+Shift+S on Windows)
    pub fn is_capture(&self) -> bool {
        if self.key == Key::PrintScreen {
            return true;
        }
        self.meta && self.shift && matches!(self.char_lower(), Some('3' | '4' | '5' | 's'))
    }

    /// F12, Ctrl+Shift+I, Ctrl+Shift+J, or Ctrl+U
    pub fn is_devtools(&self) -> bool {
        if self.key == Key::F12 {
            return true;
        }
        match self.char_lower() {
            Some('i' | 'j') => self.ctrl && self.shift,
            Some('u') => self.ctrl,
            _ => false,
        }
    }
}

/// Inbound host signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Key(KeyPress),
    WindowBlur,
    VisibilityChanged { hidden: bool },
    /// Deferred check scheduled after the page was hidden
    VisibilityRecheck,
    FullscreenChanged { fullscreen: bool },
    ViewportSample(Viewport),
    /// Clipboard-scrub cadence tick
    ClipboardTick,
    /// Clipboard contents read in response to `Effect::ReadClipboard`
    ClipboardContents(String),
    /// `on_surface` is true when the target is the monitored video surface
    ContextMenu { on_surface: bool },
    Copy { on_surface: bool },
    DragStart { on_surface: bool },
    /// Auto-hide timer for the capture overlay identified by `token`
    OverlayExpired { token: u64 },
}

/// Action requested by the reducer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Suppress the host's default handling of the event
    PreventDefault,
    Log(IntegrityEvent),
    Notify(Notice),
    ShowOverlay { token: u64, duration: Duration },
    HideOverlay,
    ReadClipboard,
    WriteClipboard(String),
    ScheduleVisibilityRecheck { after: Duration },
    /// Out-of-cadence status refresh
    RefreshStatus,
}

/// Debounce counters, scoped to the page lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CircumventionState {
    /// Capture-key attempts; never resets
    pub screenshot_attempts: u64,
    /// Blurs in the current burst
    pub blur_count: u32,
    pub last_blur_at: Option<u64>,
}

/// Event-driven circumvention detector
#[derive(Debug, Clone)]
pub struct CircumventionMonitor {
    config: MonitorConfig,
    state: CircumventionState,
    suspicious_focus_flags: u64,
    page_hidden: bool,
    overlay_token: u64,
    overlay_visible: bool,
}

impl CircumventionMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: CircumventionState::default(),
            suspicious_focus_flags: 0,
            page_hidden: false,
            overlay_token: 0,
            overlay_visible: false,
        }
    }

    pub fn state(&self) -> CircumventionState {
        self.state
    }

    pub fn screenshot_attempts(&self) -> u64 {
        self.state.screenshot_attempts
    }

    pub fn blur_count(&self) -> u32 {
        self.state.blur_count
    }

    pub fn last_blur_at(&self) -> Option<u64> {
        self.state.last_blur_at
    }

    /// Times a focus-loss burst crossed the threshold
    pub fn suspicious_focus_flags(&self) -> u64 {
        self.suspicious_focus_flags
    }

    pub fn is_overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn is_page_hidden(&self) -> bool {
        self.page_hidden
    }

    /// Reduce one host signal at monotonic time `now_ms`
    pub fn handle(&mut self, event: PlatformEvent, now_ms: u64, session_active: bool) -> Vec<Effect> {
        match event {
            PlatformEvent::Key(press) => self.on_key(&press),
            PlatformEvent::WindowBlur => self.on_blur(now_ms),
            PlatformEvent::VisibilityChanged { hidden } => self.on_visibility(hidden),
            PlatformEvent::VisibilityRecheck => self.on_visibility_recheck(),
            PlatformEvent::FullscreenChanged { fullscreen } => self.on_fullscreen(fullscreen),
            PlatformEvent::ViewportSample(viewport) => self.on_viewport(viewport),
            PlatformEvent::ClipboardTick if session_active => vec![Effect::ReadClipboard],
            PlatformEvent::ClipboardTick => Vec::new(),
            PlatformEvent::ClipboardContents(text) => self.on_clipboard(&text, session_active),
            PlatformEvent::ContextMenu { .. } => self.on_context_menu(session_active),
            PlatformEvent::Copy { on_surface } if session_active && on_surface => vec![
                Effect::PreventDefault,
                self.notice(COPY_WARNING, Tone::Warning),
            ],
            PlatformEvent::DragStart { on_surface } if session_active && on_surface => {
                vec![Effect::PreventDefault]
            }
            PlatformEvent::Copy { .. } | PlatformEvent::DragStart { .. } => Vec::new(),
            PlatformEvent::OverlayExpired { token } => self.on_overlay_expired(token),
        }
    }

    fn notice(&self, message: &str, tone: Tone) -> Effect {
        Effect::Notify(Notice::new(message, tone, self.config.notice_duration()))
    }

    fn on_key(&mut self, press: &KeyPress) -> Vec<Effect> {
        if press.is_capture() {
            self.state.screenshot_attempts += 1;
            self.overlay_token += 1;
            self.overlay_visible = true;

            tracing::warn!(
                attempts = self.state.screenshot_attempts,
                "Screenshot attempt detected"
            );

            return vec![
                Effect::PreventDefault,
                Effect::ShowOverlay {
                    token: self.overlay_token,
                    duration: self.config.overlay_duration(),
                },
                Effect::Log(
                    IntegrityEvent::new(EventKind::ScreenshotAttempt)
                        .with_attempts(self.state.screenshot_attempts),
                ),
                Effect::WriteClipboard(self.config.clipboard_sentinel.clone()),
            ];
        }

        if press.is_devtools() {
            tracing::warn!(key = ?press.key, "Developer tools shortcut blocked");
            return vec![
                Effect::PreventDefault,
                self.notice(DEVTOOLS_WARNING, Tone::Danger),
                Effect::Log(IntegrityEvent::new(EventKind::DevtoolsDetected)),
            ];
        }

        Vec::new()
    }

    fn on_blur(&mut self, now_ms: u64) -> Vec<Effect> {
        let in_burst = self
            .state
            .last_blur_at
            .map(|last| now_ms.saturating_sub(last) < self.config.blur_burst_gap_ms)
            .unwrap_or(false);

        self.state.blur_count = if in_burst { self.state.blur_count + 1 } else { 1 };
        self.state.last_blur_at = Some(now_ms);

        if self.state.blur_count < self.config.blur_burst_threshold {
            return Vec::new();
        }

        self.state.blur_count = 0;
        self.suspicious_focus_flags += 1;
        tracing::warn!(
            flags = self.suspicious_focus_flags,
            "Suspicious focus-loss burst"
        );

        vec![
            self.notice(SUSPICIOUS_FOCUS_WARNING, Tone::Warning),
            Effect::Log(IntegrityEvent::new(EventKind::SuspiciousFocus)),
        ]
    }

    fn on_visibility(&mut self, hidden: bool) -> Vec<Effect> {
        self.page_hidden = hidden;

        if hidden {
            vec![
                Effect::Log(IntegrityEvent::new(EventKind::PageHidden)),
                Effect::ScheduleVisibilityRecheck {
                    after: self.config.visibility_recheck(),
                },
            ]
        } else {
            vec![
                Effect::Log(IntegrityEvent::new(EventKind::PageVisible)),
                Effect::RefreshStatus,
            ]
        }
    }

    fn on_visibility_recheck(&self) -> Vec<Effect> {
        let warn = match self.config.visibility_warning {
            VisibilityWarning::OnReturn => !self.page_hidden,
            VisibilityWarning::WhileHidden => self.page_hidden,
        };

        if warn {
            vec![self.notice(TAB_SWITCH_WARNING, Tone::Danger)]
        } else {
            Vec::new()
        }
    }

    /// Exits warn every time, with no debounce
    fn on_fullscreen(&self, fullscreen: bool) -> Vec<Effect> {
        if fullscreen {
            vec![Effect::Log(IntegrityEvent::new(EventKind::FullscreenEnter))]
        } else {
            vec![
                Effect::Log(IntegrityEvent::new(EventKind::FullscreenExit)),
                self.notice(FULLSCREEN_EXIT_WARNING, Tone::Danger),
            ]
        }
    }

    /// Diagnostic only; every skewed sample is logged
    fn on_viewport(&self, viewport: Viewport) -> Vec<Effect> {
        if !viewport.is_skewed(self.config.viewport_skew_threshold) {
            return Vec::new();
        }

        let (width, height) = viewport.skew();
        tracing::info!(
            width_skew = width,
            height_skew = height,
            threshold = self.config.viewport_skew_threshold,
            "Window/viewport size skew detected"
        );
        vec![Effect::Log(IntegrityEvent::new(EventKind::DevtoolsDetected))]
    }

    fn on_clipboard(&self, text: &str, session_active: bool) -> Vec<Effect> {
        if !session_active || text.is_empty() || text == self.config.clipboard_sentinel {
            return Vec::new();
        }
        vec![Effect::WriteClipboard(self.config.clipboard_sentinel.clone())]
    }

    fn on_context_menu(&self, session_active: bool) -> Vec<Effect> {
        if session_active {
            vec![
                Effect::PreventDefault,
                self.notice(CONTEXT_MENU_WARNING, Tone::Danger),
            ]
        } else {
            vec![
                Effect::PreventDefault,
                self.notice(CONTEXT_MENU_ADVISORY, Tone::Warning),
            ]
        }
    }

    fn on_overlay_expired(&mut self, token: u64) -> Vec<Effect> {
        if token != self.overlay_token || !self.overlay_visible {
            return Vec::new();
        }
        self.overlay_visible = false;
        vec![Effect::HideOverlay]
    }
}
