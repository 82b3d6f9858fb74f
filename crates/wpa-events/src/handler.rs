use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::event::WpaEvent;

/// A subscriber for parsed supplicant events.
///
/// Called synchronously on the reader thread while the monitor lock is held,
/// so implementations should hand the event off and return quickly.
///
/// The lock is not reentrant: calling back into the same
/// [`WpaEventMonitor`](crate::WpaEventMonitor) from `handle_event` (for
/// example `set_monitoring` or `register_handler`) deadlocks. Forward the
/// event elsewhere, e.g. with [`ChannelHandler`], and act on it there.
pub trait WpaEventHandler: Send + Sync {
    /// Handle a wpa_supplicant event
    fn handle_event(&self, event: WpaEvent);
}

impl<F> WpaEventHandler for F
where
    F: Fn(WpaEvent) + Send + Sync,
{
    fn handle_event(&self, event: WpaEvent) {
        self(event)
    }
}

/// Forwards every event into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler(pub UnboundedSender<WpaEvent>);

impl WpaEventHandler for ChannelHandler {
    fn handle_event(&self, event: WpaEvent) {
        if let Err(e) = self.0.send(event) {
            debug!("Event receiver gone, dropping {}", e.0);
        }
    }
}
