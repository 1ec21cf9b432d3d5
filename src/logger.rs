//! Fire-and-forget reporting of integrity events
//!
//! `EventLogger` hands each event to the signal source on a detached task.
//! The caller never waits and never sees a failure; failures go to the
//! tracing diagnostic channel only.

use crate::source::SignalSource;
use crate::types::{EventKind, IntegrityEvent};
use std::sync::Arc;

/// Non-blocking integrity event reporter
#[derive(Clone)]
pub struct EventLogger {
    source: Arc<dyn SignalSource>,
}

impl EventLogger {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        Self { source }
    }

    /// Report an event without waiting for the backend
    ///
    /// Outside a tokio runtime the event is dropped with a warning.
    pub fn log(&self, event: IntegrityEvent) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(
                    event_type = %event.kind.as_str(),
                    "No async runtime; integrity event dropped"
                );
                return;
            }
        };

        let source = self.source.clone();
        handle.spawn(async move {
            if let Err(e) = source.log_event(&event).await {
                tracing::warn!(
                    event_type = %event.kind.as_str(),
                    source = %source.name(),
                    error = %e,
                    "Failed to log integrity event"
                );
            }
        });
    }

    /// Report an event that carries no extra fields
    pub fn log_kind(&self, kind: EventKind) {
        self.log(IntegrityEvent::new(kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySignalSource;
    use crate::source::Query;
    use std::time::Duration;

    #[tokio::test]
    async fn test_log_is_delivered_in_background() {
        let source = Arc::new(MemorySignalSource::new());
        let logger = EventLogger::new(source.clone());

        logger.log(IntegrityEvent::new(EventKind::ScreenshotAttempt).with_attempts(2));
        logger.log_kind(EventKind::PageVisible);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let logged = source.logged_events().await;
        assert_eq!(logged.len(), 2);
        assert!(logged.contains(&IntegrityEvent::new(EventKind::ScreenshotAttempt).with_attempts(2)));
    }

    #[tokio::test]
    async fn test_backend_failure_is_swallowed() {
        let source = Arc::new(MemorySignalSource::new());
        source.set_failing(Query::LogEvent, true).await;
        let logger = EventLogger::new(source.clone());

        logger.log_kind(EventKind::FullscreenExit);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(source.call_count(Query::LogEvent).await, 1);
        assert!(source.logged_events().await.is_empty());
    }

    #[test]
    fn test_no_runtime_does_not_panic() {
        let logger = EventLogger::new(Arc::new(MemorySignalSource::new()));
        logger.log_kind(EventKind::PageHidden);
    }
}
