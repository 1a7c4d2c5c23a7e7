use std::time::Duration;

use crate::error::{Result, SourceQueryError};

/// Query port used when an address does not name one.
pub const DEFAULT_PORT: u16 = 27015;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);
/// According to the Valve wiki, Source query responses use 1400 bytes + IP/UDP headers.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 1400;

/// Smallest receive buffer that can hold a split header plus some payload.
const MIN_DATAGRAM_SIZE: usize = 16;
/// Largest UDP payload over IPv4.
const MAX_DATAGRAM_SIZE: usize = 65507;

/// App ID of The Ship, which sends extra per-player fields.
pub const THE_SHIP_APP_ID: u32 = 2400;

/// Which split-packet header layout the server uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EngineGeneration {
    /// GoldSource: total and index packed into one byte, no split size.
    GoldSource,
    /// Source (Orange Box and later): separate total/index bytes and a split size.
    #[default]
    Source,
}

/// Options for [crate::query::Client::new].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline for each individual send and receive.
    ///
    /// A split answer of `n` fragments may take up to `n` of these.
    pub timeout: Duration,
    /// Receive buffer size. Some games (e.g. Squad) send oversized datagrams.
    pub max_datagram_size: usize,
    pub engine_generation: EngineGeneration,
    /// Steam app ID of the game, if known.
    pub app_id: Option<u32>,
    /// Minimum time between one exchange and the next send.
    pub min_query_interval: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: DEFAULT_TIMEOUT,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            engine_generation: EngineGeneration::default(),
            app_id: None,
            min_query_interval: None,
        }
    }
}

impl ClientOptions {
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(SourceQueryError::InvalidConfiguration(
                "timeout must be greater than zero".to_owned(),
            ));
        }
        if !(MIN_DATAGRAM_SIZE..=MAX_DATAGRAM_SIZE).contains(&self.max_datagram_size) {
            return Err(SourceQueryError::InvalidConfiguration(format!(
                "max datagram size {} is outside {}..={}",
                self.max_datagram_size, MIN_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE
            )));
        }
        Ok(())
    }

    /// Does the game send The Ship's extra player fields?
    pub fn is_the_ship(&self) -> bool {
        self.app_id == Some(THE_SHIP_APP_ID)
    }
}

/// Append [DEFAULT_PORT] to `address` unless it already names a port.
///
/// IPv6 literals need brackets to carry a port (`[::1]:27015`); a bare one
/// gets bracketed here.
pub fn normalize_address(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(SourceQueryError::InvalidConfiguration(
            "address is empty".to_owned(),
        ));
    }

    let has_port = match address.rfind(':') {
        // a bare IPv6 literal has several colons and no brackets
        Some(_) if address.matches(':').count() > 1 && !address.starts_with('[') => false,
        Some(i) => !address.ends_with(']') && i > address.rfind(']').unwrap_or(0),
        None => false,
    };

    if has_port {
        Ok(address.to_owned())
    } else if address.contains(':') && !address.starts_with('[') {
        Ok(format!("[{address}]:{DEFAULT_PORT}"))
    } else {
        Ok(format!("{address}:{DEFAULT_PORT}"))
    }
}
