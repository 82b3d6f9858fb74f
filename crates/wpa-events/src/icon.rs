//! Chunked retrieval of Hotspot 2.0 operator icons.
//!
//! The supplicant caches a received icon and hands it out in base64 pieces
//! via `GET_HS20_ICON`; the cached copy must be released with
//! `DEL_HS20_ICON` once we are done, whatever the outcome.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::mac::MacAddress;
use crate::transport::InterfaceCommands;

/// Largest chunk requested per round; 2 KiB of base64 minus overhead.
pub const ICON_CHUNK_SIZE: usize = 1400;

pub struct IconFetcher<'a> {
    commands: InterfaceCommands<'a>,
    chunk_size: usize,
}

impl<'a> IconFetcher<'a> {
    pub fn new(commands: InterfaceCommands<'a>) -> Self {
        Self {
            commands,
            chunk_size: ICON_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Fetch `size` bytes of `file_name` as cached for `bssid`.
    pub fn fetch(
        &self,
        bssid: MacAddress,
        file_name: &str,
        size: usize,
    ) -> Result<Vec<u8>, FetchError> {
        let _cleanup = IconCleanup {
            commands: self.commands,
            bssid,
            file_name,
        };

        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let offset = data.len();
            let len = (size - offset).min(self.chunk_size);
            let command = format!("GET_HS20_ICON {bssid} {file_name} {offset} {len}");
            debug!("Issuing '{}'", command);

            let response = match self.commands.query(&command) {
                Some(response) if response.trim_end() != "FAIL" => response,
                _ => return Err(FetchError::NoResponse(command)),
            };
            let encoded: String = response.split_whitespace().collect();
            let fragment = STANDARD
                .decode(encoded.as_bytes())
                .map_err(|source| FetchError::Decode {
                    command: command.clone(),
                    source,
                })?;
            if fragment.is_empty() {
                return Err(FetchError::EmptyChunk { command, response });
            }
            if offset + fragment.len() > size {
                return Err(FetchError::Overflow {
                    offset,
                    chunk: fragment.len(),
                    size,
                });
            }
            data.extend_from_slice(&fragment);
        }

        if data.len() != size {
            warn!("Partial icon data: {}, expected {}", data.len(), size);
        }
        Ok(data)
    }
}

/// Releases the supplicant's cached icon on every exit path.
struct IconCleanup<'a> {
    commands: InterfaceCommands<'a>,
    bssid: MacAddress,
    file_name: &'a str,
}

impl Drop for IconCleanup<'_> {
    fn drop(&mut self) {
        debug!("Deleting icon for {}", self.file_name);
        let result = self
            .commands
            .query(&format!("DEL_HS20_ICON {} {}", self.bssid, self.file_name));
        debug!("Result: {:?}", result);
    }
}
