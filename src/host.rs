//! Platform capability provider
//!
//! The hosting page's clipboard, fullscreen and window-geometry access is
//! behind `PlatformHost`. A denied or missing capability is an explicit
//! `Unavailable` result, never an error that reaches the caller: every
//! detector degrades to a no-op without it.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Host capability that may be denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ClipboardRead,
    ClipboardWrite,
    Fullscreen,
    Viewport,
}

/// The host denied or does not provide a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("platform capability unavailable: {0:?}")]
pub struct Unavailable(pub Capability);

pub type CapabilityResult<T> = std::result::Result<T, Unavailable>;

/// Outer window and inner viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub outer_width: u32,
    pub outer_height: u32,
    pub inner_width: u32,
    pub inner_height: u32,
}

impl Viewport {
    /// Outer-minus-inner on each axis, clamped at zero
    pub fn skew(&self) -> (u32, u32) {
        (
            self.outer_width.saturating_sub(self.inner_width),
            self.outer_height.saturating_sub(self.inner_height),
        )
    }

    /// Whether either axis exceeds `threshold`
    pub fn is_skewed(&self, threshold: u32) -> bool {
        let (width, height) = self.skew();
        width > threshold || height > threshold
    }
}

/// Capability provider implemented by the hosting page
#[async_trait]
pub trait PlatformHost: Send + Sync {
    async fn read_clipboard(&self) -> CapabilityResult<String>;

    async fn write_clipboard(&self, text: &str) -> CapabilityResult<()>;

    async fn request_fullscreen(&self) -> CapabilityResult<()>;

    async fn exit_fullscreen(&self) -> CapabilityResult<()>;

    /// Current window geometry
    fn viewport(&self) -> CapabilityResult<Viewport>;
}

#[derive(Default)]
struct HostState {
    clipboard: String,
    clipboard_writes: Vec<String>,
    fullscreen: bool,
    viewport: Viewport,
    denied: HashSet<Capability>,
}

/// In-memory host for tests and headless use
///
/// Every capability is granted until `deny` is called for it.
#[derive(Default)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, capability: Capability) {
        self.lock().denied.insert(capability);
    }

    pub fn grant(&self, capability: Capability) {
        self.lock().denied.remove(&capability);
    }

    /// Simulate the user copying text
    pub fn set_clipboard(&self, text: impl Into<String>) {
        self.lock().clipboard = text.into();
    }

    pub fn clipboard(&self) -> String {
        self.lock().clipboard.clone()
    }

    /// Every text written through `write_clipboard`, in order
    pub fn clipboard_writes(&self) -> Vec<String> {
        self.lock().clipboard_writes.clone()
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    pub fn is_fullscreen(&self) -> bool {
        self.lock().fullscreen
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, capability: Capability) -> CapabilityResult<MutexGuard<'_, HostState>> {
        let state = self.lock();
        if state.denied.contains(&capability) {
            return Err(Unavailable(capability));
        }
        Ok(state)
    }
}

#[async_trait]
impl PlatformHost for MemoryHost {
    async fn read_clipboard(&self) -> CapabilityResult<String> {
        Ok(self.check(Capability::ClipboardRead)?.clipboard.clone())
    }

    async fn write_clipboard(&self, text: &str) -> CapabilityResult<()> {
        let mut state = self.check(Capability::ClipboardWrite)?;
        state.clipboard = text.to_string();
        state.clipboard_writes.push(text.to_string());
        Ok(())
    }

    async fn request_fullscreen(&self) -> CapabilityResult<()> {
        self.check(Capability::Fullscreen)?.fullscreen = true;
        Ok(())
    }

    async fn exit_fullscreen(&self) -> CapabilityResult<()> {
        self.check(Capability::Fullscreen)?.fullscreen = false;
        Ok(())
    }

    fn viewport(&self) -> CapabilityResult<Viewport> {
        Ok(self.check(Capability::Viewport)?.viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_skew() {
        let docked = Viewport {
            outer_width: 1920,
            outer_height: 1080,
            inner_width: 1500,
            inner_height: 950,
        };
        assert_eq!(docked.skew(), (420, 130));
        assert!(docked.is_skewed(160));

        let plain = Viewport {
            outer_width: 1920,
            outer_height: 1080,
            inner_width: 1920,
            inner_height: 960,
        };
        assert!(!plain.is_skewed(160));

        let inverted = Viewport {
            outer_width: 100,
            inner_width: 200,
            ..Viewport::default()
        };
        assert_eq!(inverted.skew(), (0, 0));
    }

    #[tokio::test]
    async fn test_denied_capabilities_are_unavailable() {
        let host = MemoryHost::new();
        host.set_clipboard("answer key");
        assert_eq!(host.read_clipboard().await.unwrap(), "answer key");

        host.deny(Capability::ClipboardRead);
        assert_eq!(
            host.read_clipboard().await,
            Err(Unavailable(Capability::ClipboardRead))
        );

        host.deny(Capability::Fullscreen);
        assert!(host.request_fullscreen().await.is_err());
        assert!(!host.is_fullscreen());

        host.grant(Capability::Fullscreen);
        host.request_fullscreen().await.unwrap();
        assert!(host.is_fullscreen());
    }

    #[tokio::test]
    async fn test_clipboard_writes_are_recorded() {
        let host = MemoryHost::new();
        host.write_clipboard("SCREENSHOT PROHIBITED").await.unwrap();
        assert_eq!(host.clipboard(), "SCREENSHOT PROHIBITED");
        assert_eq!(host.clipboard_writes(), vec!["SCREENSHOT PROHIBITED"]);
    }
}
