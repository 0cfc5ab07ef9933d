//! Event emitter abstraction for decoupling services from transport.
//!
//! The coordinator and request handlers depend on the [`EventEmitter`] trait
//! rather than concrete broadcast channels, so tests can capture events and
//! the server can route them anywhere.

use super::{PlaybackEvent, QueueEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn finish(&self) {
///         self.emitter.emit_playback(PlaybackEvent::QueueEmpty { timestamp: now_millis() });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a playback progress event.
    fn emit_playback(&self, event: PlaybackEvent);

    /// Emits a queue change event.
    fn emit_queue(&self, event: QueueEvent);
}

/// No-op emitter for tests and embedders without a client channel.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_playback(&self, _event: PlaybackEvent) {}

    fn emit_queue(&self, _event: QueueEvent) {}
}

/// Logging emitter for debugging and development.
///
/// Logs all events at debug level.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }

    fn emit_queue(&self, event: QueueEvent) {
        tracing::debug!(?event, "queue_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Test emitter that counts events.
    struct CountingEventEmitter {
        playback_count: AtomicUsize,
        queue_count: AtomicUsize,
    }

    impl CountingEventEmitter {
        fn new() -> Self {
            Self {
                playback_count: AtomicUsize::new(0),
                queue_count: AtomicUsize::new(0),
            }
        }
    }

    impl EventEmitter for CountingEventEmitter {
        fn emit_playback(&self, _event: PlaybackEvent) {
            self.playback_count.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_queue(&self, _event: QueueEvent) {
            self.queue_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn counting_emitter_tracks_events() {
        let emitter = Arc::new(CountingEventEmitter::new());

        emitter.emit_playback(PlaybackEvent::Paused { timestamp: 0 });
        emitter.emit_playback(PlaybackEvent::Resumed { timestamp: 0 });
        emitter.emit_queue(QueueEvent::Cleared { timestamp: 0 });

        assert_eq!(emitter.playback_count.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.queue_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn noop_and_logging_emitters_accept_events() {
        NoopEventEmitter.emit_queue(QueueEvent::Cleared { timestamp: 0 });
        LoggingEventEmitter.emit_playback(PlaybackEvent::Stopped { timestamp: 0 });
    }
}
