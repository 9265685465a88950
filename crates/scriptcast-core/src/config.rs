//! Engine configuration.
//!
//! The values here mirror the targets' contract and are fixed in normal
//! operation: targets listen on loopback within `[5553, 5563]`, and both
//! the scan period and the per-attempt connect timeout are 500 ms. Custom
//! values exist for tests and CLI overrides.

use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_PORT_MIN: u16 = 5553;
pub const DEFAULT_PORT_MAX: u16 = 5563;
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Discovery and dispatch settings
#[derive(Debug, Clone)]
pub struct Config {
    /// Address targets listen on
    pub host: IpAddr,
    /// Lowest candidate port (inclusive)
    pub port_min: u16,
    /// Highest candidate port (inclusive)
    pub port_max: u16,
    /// Period of the discovery sweep
    pub scan_interval: Duration,
    /// Timeout for one connection attempt
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST,
            port_min: DEFAULT_PORT_MIN,
            port_max: DEFAULT_PORT_MAX,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl Config {
    /// Default settings with a custom port range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPortRange` if `min > max`.
    pub fn with_port_range(min: u16, max: u16) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidPortRange { min, max });
        }
        Ok(Self {
            port_min: min,
            port_max: max,
            ..Self::default()
        })
    }

    /// Validate a fully custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPortRange` if the range is inverted.
    pub fn validate(self) -> Result<Self> {
        if self.port_min > self.port_max {
            return Err(Error::InvalidPortRange {
                min: self.port_min,
                max: self.port_max,
            });
        }
        Ok(self)
    }

    /// Inclusive candidate port range for a scan cycle.
    #[must_use]
    pub fn ports(&self) -> RangeInclusive<u16> {
        self.port_min..=self.port_max
    }
}
