use std::sync::Arc;

use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{info, warn};
use wpa_events::{EventType, WpaEvent, WpaEventHandler, WpaEventMonitor};

#[derive(Serialize)]
struct Record<'a> {
    interface: &'a str,
    code: u32,
    #[serde(flatten)]
    event: &'a WpaEvent,
}

/// Prints every event it receives for one interface.
#[derive(Debug, Clone)]
pub struct EventPrinter {
    interface: String,
    json: bool,
}

impl EventPrinter {
    pub fn new(interface: &str, json: bool) -> Self {
        Self {
            interface: interface.to_string(),
            json,
        }
    }

    /// Subscribe a printer for `interface` to every event type.
    pub fn subscribe_all(monitor: &WpaEventMonitor, interface: &str, json: bool) {
        let printer: Arc<dyn WpaEventHandler> = Arc::new(Self::new(interface, json));
        for event_type in EventType::iter() {
            monitor.register_handler(interface, event_type, printer.clone());
        }
    }

    fn render(&self, event: &WpaEvent) -> serde_json::Result<String> {
        serde_json::to_string(&Record {
            interface: &self.interface,
            code: event.event_type().code(),
            event,
        })
    }
}

impl WpaEventHandler for EventPrinter {
    fn handle_event(&self, event: WpaEvent) {
        if !self.json {
            info!("[{}] {}", self.interface, event);
            return;
        }
        match self.render(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize {}: {}", event.event_type(), e),
        }
    }
}
