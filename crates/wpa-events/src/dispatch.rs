use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::event::WpaEvent;
use crate::handler::WpaEventHandler;
use crate::registry::SubscriptionRegistry;

impl SubscriptionRegistry {
    /// Deliver `event` to the subscribers of `interface`.
    ///
    /// A registered interface only receives events while it is monitoring.
    /// With no interface, or one nobody registered for, the event goes to
    /// every monitoring interface instead. In both cases the first recipient
    /// gets the event itself and every later recipient its own clone.
    ///
    /// A subscriber that panics is logged and skipped; the rest still get
    /// their copies.
    pub fn dispatch(&self, interface: Option<&str>, event: WpaEvent) {
        let event_type = event.event_type();

        match interface.filter(|iface| self.has_interface(iface)) {
            Some(iface) => {
                if !self.is_monitoring(iface) {
                    debug!("Dropping {} because ({}) is stopped", event_type, iface);
                    return;
                }
                let targets: Vec<&Arc<dyn WpaEventHandler>> =
                    self.handlers_for(iface, event_type).iter().collect();
                deliver(&targets, event);
            }
            None => {
                trace!("Sending {} to all monitors, no matching iface", event_type);
                let targets: Vec<&Arc<dyn WpaEventHandler>> = self
                    .monitoring_interfaces()
                    .flat_map(|iface| self.handlers_for(iface, event_type))
                    .collect();
                deliver(&targets, event);
            }
        }
    }
}

fn deliver(targets: &[&Arc<dyn WpaEventHandler>], event: WpaEvent) {
    let Some((first, rest)) = targets.split_first() else {
        return;
    };
    let copies: Vec<WpaEvent> = rest.iter().map(|_| event.clone()).collect();
    invoke(first, event);
    for (handler, copy) in rest.iter().zip(copies) {
        invoke(handler, copy);
    }
}

fn invoke(handler: &Arc<dyn WpaEventHandler>, event: WpaEvent) {
    let event_type = event.event_type();
    if panic::catch_unwind(AssertUnwindSafe(|| handler.handle_event(event))).is_err() {
        error!("Subscriber panicked while handling {}", event_type);
    }
}
