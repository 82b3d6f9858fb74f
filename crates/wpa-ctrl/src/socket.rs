use std::fs;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::{debug, trace};

/// Large enough for a full `BSS` reply.
const REPLY_BUF_SIZE: usize = 8192;

static SOCKET_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// One datagram connection to the supplicant's control interface.
///
/// The supplicant replies to the address we send from, so each connection
/// binds its own socket file, removed again on drop.
#[derive(Debug)]
pub struct CtrlSocket {
    socket: UnixDatagram,
    local: PathBuf,
}

impl CtrlSocket {
    pub fn open(ctrl_path: &Path, local_dir: &Path) -> io::Result<Self> {
        let n = SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
        let local = local_dir.join(format!("wpa_ctrl_{}-{}", process::id(), n));
        // Left behind by an earlier process with the same pid.
        let _ = fs::remove_file(&local);

        let socket = UnixDatagram::bind(&local)?;
        let ctrl = Self { socket, local };
        ctrl.socket.connect(ctrl_path)?;
        debug!("Opened control socket {} -> {}", ctrl.local.display(), ctrl_path.display());
        Ok(ctrl)
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Send `command` and wait for its reply, skipping unsolicited events.
    pub fn request(&self, command: &str, timeout: Duration) -> io::Result<String> {
        trace!("Sending '{}'", command);
        self.socket.send(command.as_bytes())?;
        self.socket.set_read_timeout(Some(timeout))?;

        let mut buf = vec![0u8; REPLY_BUF_SIZE];
        loop {
            let n = self.socket.recv(&mut buf)?;
            let reply = String::from_utf8_lossy(&buf[..n]);
            if reply.starts_with('<') {
                trace!("Skipping unsolicited {}", reply);
                continue;
            }
            return Ok(reply.into_owned());
        }
    }

    /// Block until the next datagram arrives.
    pub fn recv(&self) -> io::Result<String> {
        self.socket.set_read_timeout(None)?;
        let mut buf = vec![0u8; REPLY_BUF_SIZE];
        let n = self.socket.recv(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }
}

impl Drop for CtrlSocket {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.local) {
            debug!("Failed to remove {}: {}", self.local.display(), e);
        }
    }
}
