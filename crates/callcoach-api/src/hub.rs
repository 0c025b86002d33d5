//! Per-call event fan-out.
//!
//! Each call id gets its own broadcast channel, created when the first
//! listener subscribes and dropped once the last listener is gone. Publishing
//! never blocks: a listener that falls behind skips the events it missed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use callcoach_core::CoachEvent;

/// Registry of per-call broadcast channels.
pub struct EventHub {
    channels: Mutex<HashMap<String, broadcast::Sender<CoachEvent>>>,
    capacity: usize,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Receive every event published for `call_id` from now on.
    pub fn subscribe(&self, call_id: &str) -> broadcast::Receiver<CoachEvent> {
        let mut channels = self.lock();
        let sender = channels.entry(call_id.to_string()).or_insert_with(|| {
            tracing::debug!(call_id, "Opened event channel");
            broadcast::channel(self.capacity).0
        });
        sender.subscribe()
    }

    /// Deliver `event` to the call's current listeners.
    ///
    /// Returns the number of listeners reached. Calls nobody watches are a
    /// no-op.
    pub fn publish(&self, call_id: &str, event: CoachEvent) -> usize {
        let mut channels = self.lock();
        let Some(sender) = channels.get(call_id) else {
            return 0;
        };
        let kind = event.kind();
        match sender.send(event) {
            Ok(listeners) => {
                tracing::debug!(call_id, kind, listeners, "Published event");
                listeners
            }
            Err(_) => {
                channels.remove(call_id);
                tracing::debug!(call_id, kind, "No listeners left, closed event channel");
                0
            }
        }
    }

    /// Drop the call's channel if no listener remains.
    ///
    /// Listeners call this after dropping their receiver.
    pub fn release(&self, call_id: &str) {
        let mut channels = self.lock();
        if channels
            .get(call_id)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(call_id);
            tracing::debug!(call_id, "Closed event channel");
        }
    }

    pub fn listener_count(&self, call_id: &str) -> usize {
        self.lock()
            .get(call_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn channel_count(&self) -> usize {
        self.lock().len()
    }

    // The map holds no invariant a panicking holder could break.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<CoachEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use callcoach_core::Turn;
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    fn transcript(text: &str) -> CoachEvent {
        CoachEvent::Transcript(Turn::prospect(1, text))
    }

    #[test]
    fn test_publish_without_listeners_is_noop() {
        let hub = EventHub::new(8);
        assert_eq!(hub.publish("CA1", transcript("hi")), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_events_are_scoped_to_call() {
        let hub = EventHub::new(8);
        let mut a = hub.subscribe("CA1");
        let mut b = hub.subscribe("CA2");

        assert_eq!(hub.publish("CA1", transcript("for a")), 1);

        match a.try_recv().unwrap() {
            CoachEvent::Transcript(turn) => assert_eq!(turn.text, "for a"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(b.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_all_listeners_receive_in_order() {
        let hub = EventHub::new(8);
        let mut first = hub.subscribe("CA1");
        let mut second = hub.subscribe("CA1");
        assert_eq!(hub.listener_count("CA1"), 2);

        hub.publish("CA1", transcript("one"));
        hub.publish("CA1", CoachEvent::connected("CA1"));

        for rx in [&mut first, &mut second] {
            assert_eq!(rx.try_recv().unwrap().kind(), "transcript");
            assert_eq!(rx.try_recv().unwrap().kind(), "system");
        }
    }

    #[test]
    fn test_release_removes_empty_channel() {
        let hub = EventHub::new(8);
        let rx = hub.subscribe("CA1");
        hub.release("CA1");
        assert_eq!(hub.channel_count(), 1);

        drop(rx);
        hub.release("CA1");
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_publish_drops_abandoned_channel() {
        let hub = EventHub::new(8);
        drop(hub.subscribe("CA1"));
        assert_eq!(hub.publish("CA1", transcript("hi")), 0);
        assert_eq!(hub.channel_count(), 0);
    }

    #[test]
    fn test_slow_listener_skips_missed_events() {
        let hub = EventHub::new(2);
        let mut slow = hub.subscribe("CA1");
        for i in 0..5 {
            hub.publish("CA1", transcript(&format!("line {}", i)));
        }
        assert!(matches!(slow.try_recv(), Err(TryRecvError::Lagged(3))));
        match slow.try_recv().unwrap() {
            CoachEvent::Transcript(turn) => assert_eq!(turn.text, "line 3"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_async_receive() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe("CA1");
        hub.publish("CA1", transcript("hi"));
        assert_eq!(rx.recv().await.unwrap().kind(), "transcript");
        drop(hub);
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
