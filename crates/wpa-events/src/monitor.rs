use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::event::{EventType, WpaEvent};
use crate::event_log::EventLog;
use crate::handler::WpaEventHandler;
use crate::parser::{ControlSignal, EventParser};
use crate::registry::SubscriptionRegistry;
use crate::transport::SupplicantTransport;

/// Owns the supplicant connection, the reader thread and every subscriber.
///
/// Cloning yields another handle to the same monitor. All operations and
/// every subscriber callback run under one lock.
#[derive(Clone)]
pub struct WpaEventMonitor {
    inner: Arc<Shared>,
}

struct Shared {
    transport: Arc<dyn SupplicantTransport>,
    config: MonitorConfig,
    state: Mutex<MonitorState>,
    verbose: AtomicBool,
    event_log: EventLog,
}

struct MonitorState {
    connected: bool,
    reader_running: bool,
    reader: Option<JoinHandle<()>>,
    registry: SubscriptionRegistry,
    parser: EventParser,
}

impl WpaEventMonitor {
    pub fn new(transport: Arc<dyn SupplicantTransport>, config: MonitorConfig) -> Self {
        let state = MonitorState {
            connected: false,
            reader_running: false,
            reader: None,
            registry: SubscriptionRegistry::new(),
            parser: EventParser::new(&config),
        };
        Self {
            inner: Arc::new(Shared {
                transport,
                verbose: AtomicBool::new(config.verbose),
                event_log: EventLog::new(config.event_log_capacity),
                config,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn register_handler(
        &self,
        interface: &str,
        event_type: EventType,
        handler: Arc<dyn WpaEventHandler>,
    ) {
        self.inner.lock().registry.register(interface, event_type, handler);
    }

    /// Connect if needed, then enable delivery for `interface` and tell its
    /// subscribers the supplicant is up.
    ///
    /// When the supplicant cannot be reached the subscribers get a
    /// disconnection event instead and the monitoring flag is left as it was.
    pub fn start_monitoring(&self, interface: &str) -> Result<(), MonitorError> {
        let mut state = self.inner.lock();
        info!("Starting monitoring for {} (connected: {})", interface, state.connected);

        if self.ensure_connected(&mut state)? {
            state.registry.set_monitoring(interface, true);
            state
                .registry
                .dispatch(Some(interface), WpaEvent::SupplicantConnection);
            return Ok(());
        }

        let was_monitoring = state.registry.is_monitoring(interface);
        state.registry.set_monitoring(interface, true);
        state
            .registry
            .dispatch(Some(interface), WpaEvent::SupplicantDisconnection);
        state.registry.set_monitoring(interface, was_monitoring);
        error!("Could not reach the supplicant for {}", interface);
        Err(MonitorError::ConnectFailed {
            attempts: self.inner.config.connect_attempts,
        })
    }

    pub fn stop_monitoring(&self, interface: &str) {
        let mut state = self.inner.lock();
        self.debug(format_args!("Stopping monitoring for {}", interface));
        state.registry.set_monitoring(interface, true);
        state
            .registry
            .dispatch(Some(interface), WpaEvent::SupplicantDisconnection);
        state.registry.set_monitoring(interface, false);
    }

    /// Mark the connection down and silence every interface. The reader
    /// thread notices after its current read returns.
    pub fn stop_all_monitoring(&self) {
        let mut state = self.inner.lock();
        state.connected = false;
        state.registry.clear_all_monitoring();
    }

    pub fn set_monitoring(&self, interface: &str, enabled: bool) {
        self.inner.lock().registry.set_monitoring(interface, enabled);
    }

    pub fn is_monitoring(&self, interface: &str) -> bool {
        self.inner.lock().registry.is_monitoring(interface)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    pub fn enable_verbose_logging(&self, level: u32) {
        let verbose = level > 0;
        self.inner.verbose.store(verbose, Ordering::Relaxed);
        self.inner.lock().parser.verbose = verbose;
    }

    /// Raw event lines seen recently, oldest first.
    pub fn event_log(&self) -> Vec<String> {
        self.inner.event_log.snapshot()
    }

    /// Deliver an event as if the supplicant had produced it.
    pub fn broadcast(&self, interface: Option<&str>, event: WpaEvent) {
        self.inner.lock().registry.dispatch(interface, event);
    }

    /// Classify and dispatch one line outside the reader thread.
    pub fn process_line(&self, line: &str) -> ControlSignal {
        self.inner.handle_line(line, false)
    }

    /// Wait for the reader thread, if one was started, to exit.
    pub fn join_reader(&self) {
        let handle = self.inner.lock().reader.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Event reader thread panicked");
            }
        }
    }

    fn ensure_connected(&self, state: &mut MonitorState) -> Result<bool, MonitorError> {
        if state.connected {
            return Ok(true);
        }

        self.debug(format_args!("Connecting to supplicant"));
        let attempts = self.inner.config.connect_attempts;
        for attempt in 1..=attempts {
            match self.inner.transport.connect() {
                Ok(()) => {
                    state.connected = true;
                    state.parser.reset_recv_errors();
                    if !state.reader_running {
                        self.spawn_reader(state)?;
                    }
                    return Ok(true);
                }
                Err(e) => {
                    warn!("Connect attempt {}/{} failed: {}", attempt, attempts, e);
                    if attempt < attempts {
                        thread::sleep(self.inner.config.connect_retry_interval());
                    }
                }
            }
        }
        Ok(false)
    }

    fn spawn_reader(&self, state: &mut MonitorState) -> Result<(), MonitorError> {
        let shared = self.inner.clone();
        let handle = thread::Builder::new()
            .name("wpa-monitor".to_string())
            .spawn(move || shared.run_reader())
            .inspect_err(|_| state.connected = false)?;
        state.reader_running = true;
        if let Some(previous) = state.reader.replace(handle) {
            debug!("Replacing finished reader {:?}", previous.thread().id());
        }
        Ok(())
    }

    fn debug(&self, args: std::fmt::Arguments<'_>) {
        if self.inner.verbose.load(Ordering::Relaxed) {
            debug!("{}", args);
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn run_reader(&self) {
        if self.verbose() {
            debug!("Event reader started");
        }
        let _exit = ReaderExit(self);
        loop {
            {
                let mut state = self.lock();
                if !state.connected {
                    if self.verbose() {
                        debug!("Event reader exiting, connection closed");
                    }
                    state.reader_running = false;
                    break;
                }
            }

            let line = self.transport.wait_for_event();
            // Scan updates are too frequent to be worth keeping.
            if !line.contains("BSS-ADDED") && !line.contains("BSS-REMOVED") {
                if self.verbose() {
                    debug!("Event [{}]", line);
                }
                self.event_log.record(&line);
            }

            if self.handle_line(&line, true) == ControlSignal::Terminate {
                if self.verbose() {
                    debug!("Disconnecting from the supplicant, no more events");
                }
                break;
            }
        }
    }

    fn handle_line(&self, line: &str, from_reader: bool) -> ControlSignal {
        let mut state = self.lock();
        let MonitorState { registry, parser, .. } = &mut *state;
        let classified = parser.classify_and_parse(line, registry, self.transport.as_ref());
        if let Some(event) = classified.event {
            registry.dispatch(classified.interface.as_deref(), event);
        }

        if classified.signal == ControlSignal::Terminate {
            state.connected = false;
            if from_reader {
                self.transport.disconnect();
                state.reader_running = false;
            }
        }
        classified.signal
    }
}

/// Tears the connection down if the reader unwinds, so subscribers hear
/// about it and the next `start_monitoring` reconnects.
struct ReaderExit<'a>(&'a Shared);

impl Drop for ReaderExit<'_> {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!("Event reader panicked, dropping the connection");
        let mut state = self.0.lock();
        state.connected = false;
        state.reader_running = false;
        state.registry.dispatch(None, WpaEvent::SupplicantDisconnection);
        self.0.transport.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    struct Unreachable;

    impl SupplicantTransport for Unreachable {
        fn connect(&self) -> io::Result<()> {
            Err(io::Error::from(io::ErrorKind::ConnectionRefused))
        }

        fn wait_for_event(&self) -> String {
            unreachable!("never connected")
        }

        fn query(&self, _: &str) -> Option<String> {
            None
        }

        fn disconnect(&self) {}
    }

    fn monitor() -> WpaEventMonitor {
        let config = MonitorConfig {
            connect_retry_interval_ms: 0,
            ..MonitorConfig::default()
        };
        WpaEventMonitor::new(Arc::new(Unreachable), config)
    }

    #[test]
    fn stop_monitoring_notifies_then_disables() {
        let monitor = monitor();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        monitor.register_handler(
            "wlan0",
            EventType::SupplicantDisconnection,
            Arc::new(move |event: WpaEvent| sink.lock().unwrap().push(event)),
        );

        monitor.stop_monitoring("wlan0");

        assert_eq!(*seen.lock().unwrap(), vec![WpaEvent::SupplicantDisconnection]);
        assert!(!monitor.is_monitoring("wlan0"));
    }

    #[test]
    fn verbose_logging_reaches_parser() {
        let monitor = monitor();
        monitor.enable_verbose_logging(1);
        assert!(monitor.inner.lock().parser.verbose);
        monitor.enable_verbose_logging(0);
        assert!(!monitor.inner.lock().parser.verbose);
    }

    /// Panics on its first read, then behaves.
    #[derive(Default)]
    struct FlakyReader {
        reads: AtomicUsize,
        connects: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl SupplicantTransport for FlakyReader {
        fn connect(&self) -> io::Result<()> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn wait_for_event(&self) -> String {
            if self.reads.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("driver bug");
            }
            "CTRL-EVENT-TERMINATING - signal 15".to_string()
        }

        fn query(&self, _: &str) -> Option<String> {
            None
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn reader_panic_drops_connection_and_allows_restart() {
        let transport = Arc::new(FlakyReader::default());
        let monitor = WpaEventMonitor::new(transport.clone(), MonitorConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        monitor.register_handler(
            "wlan0",
            EventType::SupplicantDisconnection,
            Arc::new(move |event: WpaEvent| sink.lock().unwrap().push(event)),
        );

        monitor.start_monitoring("wlan0").unwrap();
        monitor.join_reader();

        assert!(!monitor.is_connected());
        assert_eq!(*seen.lock().unwrap(), vec![WpaEvent::SupplicantDisconnection]);
        assert_eq!(transport.disconnects.load(Ordering::SeqCst), 1);

        monitor.start_monitoring("wlan0").unwrap();
        monitor.join_reader();
        assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
        assert_eq!(transport.reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn process_line_records_termination() {
        let monitor = monitor();
        assert_eq!(
            monitor.process_line("CTRL-EVENT-TERMINATING - signal 15"),
            ControlSignal::Terminate
        );
        assert!(!monitor.is_connected());
        monitor.join_reader();
    }
}
