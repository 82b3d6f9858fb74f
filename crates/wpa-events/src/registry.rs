use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::event::EventType;
use crate::handler::WpaEventHandler;

type HandlerTable = HashMap<EventType, Vec<Arc<dyn WpaEventHandler>>>;

/// Per-interface subscriber sets and the monitoring gate.
///
/// Interfaces are kept sorted so broadcast delivery order is stable.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: BTreeMap<String, HandlerTable>,
    monitoring: BTreeMap<String, bool>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Registering the same handler twice delivers twice.
    pub fn register(
        &mut self,
        interface: &str,
        event_type: EventType,
        handler: Arc<dyn WpaEventHandler>,
    ) {
        debug!("Registering handler for {} on {}", event_type, interface);
        self.handlers
            .entry(interface.to_string())
            .or_default()
            .entry(event_type)
            .or_default()
            .push(handler);
    }

    pub fn set_monitoring(&mut self, interface: &str, enabled: bool) {
        self.monitoring.insert(interface.to_string(), enabled);
    }

    pub fn is_monitoring(&self, interface: &str) -> bool {
        self.monitoring.get(interface).copied().unwrap_or(false)
    }

    /// Disable every known interface without dropping its subscribers.
    pub fn clear_all_monitoring(&mut self) {
        for enabled in self.monitoring.values_mut() {
            *enabled = false;
        }
    }

    /// Whether any subscriber was ever registered for `interface`.
    pub fn has_interface(&self, interface: &str) -> bool {
        self.handlers.contains_key(interface)
    }

    pub fn monitoring_interfaces(&self) -> impl Iterator<Item = &str> {
        self.monitoring
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(iface, _)| iface.as_str())
    }

    pub(crate) fn handlers_for(
        &self,
        interface: &str,
        event_type: EventType,
    ) -> &[Arc<dyn WpaEventHandler>] {
        self.handlers
            .get(interface)
            .and_then(|table| table.get(&event_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::WpaEvent;

    fn noop() -> Arc<dyn WpaEventHandler> {
        Arc::new(|_: WpaEvent| {})
    }

    #[test]
    fn monitoring_defaults_to_off() {
        let registry = SubscriptionRegistry::new();
        assert!(!registry.is_monitoring("wlan0"));
    }

    #[test]
    fn clear_all_keeps_subscribers() {
        let mut registry = SubscriptionRegistry::new();
        registry.register("wlan0", EventType::ScanResults, noop());
        registry.set_monitoring("wlan0", true);
        registry.set_monitoring("p2p0", true);

        registry.clear_all_monitoring();

        assert!(!registry.is_monitoring("wlan0"));
        assert!(!registry.is_monitoring("p2p0"));
        assert!(registry.has_interface("wlan0"));
        assert_eq!(registry.handlers_for("wlan0", EventType::ScanResults).len(), 1);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut registry = SubscriptionRegistry::new();
        let handler = noop();
        registry.register("wlan0", EventType::WpsSuccess, handler.clone());
        registry.register("wlan0", EventType::WpsSuccess, handler);
        assert_eq!(registry.handlers_for("wlan0", EventType::WpsSuccess).len(), 2);
        assert!(registry.handlers_for("wlan0", EventType::WpsFail).is_empty());
        assert!(registry.handlers_for("wlan1", EventType::WpsSuccess).is_empty());
    }

    #[test]
    fn monitoring_interfaces_are_sorted() {
        let mut registry = SubscriptionRegistry::new();
        registry.set_monitoring("wlan1", true);
        registry.set_monitoring("p2p0", true);
        registry.set_monitoring("wlan0", false);
        let ifaces: Vec<&str> = registry.monitoring_interfaces().collect();
        assert_eq!(ifaces, vec!["p2p0", "wlan1"]);
    }
}
