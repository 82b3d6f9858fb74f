use thiserror::Error;

/// A recognised event line whose payload could not be decoded.
///
/// These never tear down the reader loop; the line is logged and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed MAC address: {0:?}")]
    InvalidMac(String),

    #[error("unexpected ANQP result notification: {0}")]
    AnqpNotification(String),

    #[error("incorrect number of segments in icon event: expected 4, got {0}")]
    IconSegments(usize),

    #[error("bad numeral for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("bad WNM event: {0}")]
    Wnm(String),
}

/// Failure of a single chunked icon retrieval.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no icon data returned for '{0}'")]
    NoResponse(String),

    #[error("null data for '{command}': {response}")]
    EmptyChunk { command: String, response: String },

    #[error("icon chunk exceeds image size: {offset} + {chunk} > {size}")]
    Overflow { offset: usize, chunk: usize, size: usize },

    #[error("failed to decode response to '{command}'")]
    Decode {
        command: String,
        #[source]
        source: base64::DecodeError,
    },
}

/// Errors surfaced by the monitor control surface.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("unable to connect to supplicant after {attempts} attempts")]
    ConnectFailed { attempts: u32 },

    #[error("failed to spawn event reader thread: {0}")]
    Spawn(#[from] std::io::Error),
}
