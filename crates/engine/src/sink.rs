//! Bounded event sink between a session loop and its consumer.

use tokio::sync::mpsc;
use tracing::debug;

use crate::stream_event::RefinementEvent;

/// Sending half of a session's event stream.
///
/// `emit` waits for channel capacity, so a slow consumer applies
/// backpressure to the loop and no event is ever dropped.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RefinementEvent>,
}

/// Create a sink and its receiving end with room for `capacity` events.
pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<RefinementEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, rx)
}

impl EventSink {
    /// Deliver an event. Returns `false` once the consumer has gone away.
    pub async fn emit(&self, event: RefinementEvent) -> bool {
        let name = event.event_type();
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(_) => {
                debug!(event = name, "Event consumer disconnected");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
