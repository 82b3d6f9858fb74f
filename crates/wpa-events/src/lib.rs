//! Monitor for wpa_supplicant control events.
//!
//! A [`WpaEventMonitor`] reads event lines from a [`SupplicantTransport`],
//! parses them into [`WpaEvent`]s and hands them to the [`WpaEventHandler`]s
//! registered for the event's interface and type.

pub mod config;
mod control;
mod dispatch;
pub mod error;
pub mod event;
pub mod event_log;
pub mod handler;
pub mod hotspot;
pub mod icon;
pub mod mac;
pub mod monitor;
pub mod p2p;
pub mod parser;
pub mod registry;
pub mod request;
pub mod transport;

pub use config::MonitorConfig;
pub use error::{FetchError, MonitorError, ParseError};
pub use event::{EventType, SupplicantState, WpaEvent};
pub use handler::{ChannelHandler, WpaEventHandler};
pub use mac::MacAddress;
pub use monitor::WpaEventMonitor;
pub use parser::{Classified, ControlSignal, EventParser};
pub use registry::SubscriptionRegistry;
pub use transport::{InterfaceCommands, RECV_ERROR_EVENT, SupplicantTransport};
