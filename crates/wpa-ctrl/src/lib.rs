//! wpa_supplicant control interface over Unix datagram sockets.

pub mod config;
pub mod socket;
pub mod transport;

pub use config::CtrlConfig;
pub use socket::CtrlSocket;
pub use transport::UnixCtrlTransport;
