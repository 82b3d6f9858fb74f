use std::io;

/// Line reported by transports when a receive fails.
///
/// The parser counts these and only tears the connection down once too many
/// arrive back to back.
pub const RECV_ERROR_EVENT: &str = "CTRL-EVENT-TERMINATING - recv error";

/// The control channel to the supplicant daemon.
pub trait SupplicantTransport: Send + Sync {
    /// Open the control channel and attach for unsolicited events.
    fn connect(&self) -> io::Result<()>;

    /// Block until the next event line arrives.
    ///
    /// Failures are reported as [`RECV_ERROR_EVENT`] rather than an error so
    /// that the reader loop applies its error threshold.
    fn wait_for_event(&self) -> String;

    /// Issue a command and return the daemon's reply, `None` on failure.
    fn query(&self, command: &str) -> Option<String>;

    fn disconnect(&self);
}

/// Issues commands on behalf of one interface.
///
/// The global control socket only routes per-interface commands that carry
/// an `IFNAME=<name> ` prefix; anything else is answered `UNKNOWN COMMAND`.
#[derive(Clone, Copy)]
pub struct InterfaceCommands<'a> {
    transport: &'a dyn SupplicantTransport,
    interface: &'a str,
}

impl<'a> InterfaceCommands<'a> {
    pub fn new(transport: &'a dyn SupplicantTransport, interface: &'a str) -> Self {
        Self {
            transport,
            interface,
        }
    }

    pub fn query(&self, command: &str) -> Option<String> {
        let command = format!("IFNAME={} {}", self.interface, command);
        self.transport.query(&command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Echo(Mutex<Vec<String>>);

    impl SupplicantTransport for Echo {
        fn connect(&self) -> io::Result<()> {
            Ok(())
        }

        fn wait_for_event(&self) -> String {
            String::new()
        }

        fn query(&self, command: &str) -> Option<String> {
            self.0.lock().unwrap().push(command.to_string());
            Some("OK".to_string())
        }

        fn disconnect(&self) {}
    }

    #[test]
    fn commands_are_scoped_to_the_interface() {
        let transport = Echo::default();
        let commands = InterfaceCommands::new(&transport, "wlan1");

        assert_eq!(commands.query("BSS 00:11:22:33:44:55").as_deref(), Some("OK"));
        assert_eq!(*transport.0.lock().unwrap(), vec!["IFNAME=wlan1 BSS 00:11:22:33:44:55"]);
    }
}
