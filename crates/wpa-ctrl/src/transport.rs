use std::io;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info, warn};
use wpa_events::{RECV_ERROR_EVENT, SupplicantTransport};

use crate::config::CtrlConfig;
use crate::socket::CtrlSocket;

/// [`SupplicantTransport`] over the supplicant's Unix control socket.
///
/// Commands and events use separate sockets so a blocked event read never
/// holds up a query.
pub struct UnixCtrlTransport {
    config: CtrlConfig,
    command: RwLock<Option<Arc<CtrlSocket>>>,
    monitor: RwLock<Option<Arc<CtrlSocket>>>,
}

impl UnixCtrlTransport {
    pub fn new(config: CtrlConfig) -> Self {
        Self {
            config,
            command: RwLock::new(None),
            monitor: RwLock::new(None),
        }
    }

    fn open(&self) -> io::Result<CtrlSocket> {
        CtrlSocket::open(&self.config.ctrl_path, &self.config.local_dir)
    }

    fn socket(slot: &RwLock<Option<Arc<CtrlSocket>>>) -> Option<Arc<CtrlSocket>> {
        slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(
        slot: &RwLock<Option<Arc<CtrlSocket>>>,
        socket: Option<CtrlSocket>,
    ) -> Option<Arc<CtrlSocket>> {
        let mut slot = slot.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, socket.map(Arc::new))
    }
}

/// Drop the `<N>` priority prefix of an event datagram.
fn strip_priority(message: &str) -> &str {
    let message = message.trim_end_matches('\n');
    match message.strip_prefix('<').and_then(|rest| rest.split_once('>')) {
        Some((level, event)) if level.bytes().all(|b| b.is_ascii_digit()) => event,
        _ => message,
    }
}

impl SupplicantTransport for UnixCtrlTransport {
    fn connect(&self) -> io::Result<()> {
        let command = self.open()?;
        let monitor = self.open()?;

        let reply = monitor.request("ATTACH", self.config.command_timeout())?;
        if reply.trim_end() != "OK" {
            return Err(io::Error::other(format!("ATTACH rejected: {}", reply.trim_end())));
        }

        info!("Attached to supplicant at {}", self.config.ctrl_path.display());
        Self::replace(&self.command, Some(command));
        Self::replace(&self.monitor, Some(monitor));
        Ok(())
    }

    fn wait_for_event(&self) -> String {
        let Some(monitor) = Self::socket(&self.monitor) else {
            return RECV_ERROR_EVENT.to_string();
        };
        match monitor.recv() {
            Ok(message) => strip_priority(&message).to_string(),
            Err(e) => {
                warn!("Event receive failed: {}", e);
                RECV_ERROR_EVENT.to_string()
            }
        }
    }

    fn query(&self, command: &str) -> Option<String> {
        let socket = Self::socket(&self.command)?;
        match socket.request(command, self.config.command_timeout()) {
            Ok(reply) => Some(reply.trim_end_matches('\n').to_string()),
            Err(e) => {
                warn!("Command '{}' failed: {}", command, e);
                None
            }
        }
    }

    fn disconnect(&self) {
        if let Some(monitor) = Self::replace(&self.monitor, None) {
            if let Err(e) = monitor.request("DETACH", self.config.command_timeout()) {
                debug!("DETACH failed: {}", e);
            }
        }
        Self::replace(&self.command, None);
    }
}
