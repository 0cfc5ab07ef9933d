//! Bridge that maps domain events onto the broadcast transport.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, PlaybackEvent, QueueEvent};

/// Bridges domain events to the WebSocket broadcast channel.
///
/// Also forwards to an optional external emitter (for example the
/// [`LoggingEventEmitter`](super::LoggingEventEmitter) in verbose server
/// mode) that can be set after construction.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    external_emitter: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a new bridge with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            external_emitter: Arc::new(RwLock::new(None)),
        }
    }

    /// Sets an external emitter that receives every event before broadcast.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.external_emitter.write() = Some(emitter);
    }

    /// Returns a new receiver for the broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Generates an [`EventEmitter`] method that forwards to the external emitter
/// (if set) and then sends to the broadcast channel.
macro_rules! impl_emit {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref emitter) = *self.external_emitter.read() {
                emitter.$method(event.clone());
            }
            if let Err(e) = self.tx.send(BroadcastEvent::$variant(event)) {
                log::trace!("[EventBridge] No broadcast receivers: {}", e);
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    impl_emit!(emit_playback, PlaybackEvent, Playback);
    impl_emit!(emit_queue, QueueEvent, Queue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        playback: Mutex<Vec<PlaybackEvent>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit_playback(&self, event: PlaybackEvent) {
            self.playback.lock().push(event);
        }

        fn emit_queue(&self, _event: QueueEvent) {}
    }

    #[tokio::test]
    async fn subscribers_receive_wrapped_events() {
        let bridge = BroadcastEventBridge::new(8);
        let mut rx = bridge.subscribe();

        bridge.emit_queue(QueueEvent::Cleared { timestamp: 7 });

        match rx.recv().await.unwrap() {
            BroadcastEvent::Queue(QueueEvent::Cleared { timestamp }) => assert_eq!(timestamp, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bridge = BroadcastEventBridge::new(8);
        assert_eq!(bridge.receiver_count(), 0);
        bridge.emit_playback(PlaybackEvent::Stopped { timestamp: 0 });
    }

    #[test]
    fn external_emitter_sees_events() {
        let bridge = BroadcastEventBridge::new(8);
        let external = Arc::new(RecordingEmitter::default());
        bridge.set_external_emitter(external.clone());

        bridge.emit_playback(PlaybackEvent::Paused { timestamp: 1 });

        assert_eq!(
            *external.playback.lock(),
            vec![PlaybackEvent::Paused { timestamp: 1 }]
        );
    }
}
