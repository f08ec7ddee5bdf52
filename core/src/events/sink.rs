use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::RuntimeEvent;

/// A consumer of runtime events (renderers, progress displays, audit logs).
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, event: &RuntimeEvent);

    /// Called once when the event stream closes.
    fn finish(&self) {}
}

/// Drive `sink` from `rx` on a background task until the bus is dropped.
///
/// A lagging sink skips the events it missed rather than stalling the runtime.
pub fn spawn_sink<S>(mut rx: broadcast::Receiver<RuntimeEvent>, sink: S) -> JoinHandle<()>
where
    S: EventSink + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => sink.handle(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(sink = sink.name(), skipped, "event sink lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        sink.finish();
    })
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn handle(&self, event: &RuntimeEvent) {
        (**self).handle(event)
    }

    fn finish(&self) {
        (**self).finish()
    }
}
