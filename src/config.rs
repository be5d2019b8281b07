// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration types.
//!
//! All types use builder-style `with_*` setters and can also be loaded from
//! JSON; every field has a default except the host.
//!
//! ```
//! use std::time::Duration;
//! use raritan_pdu::config::{ConnectionConfig, PduConfig};
//!
//! let config = PduConfig::new(
//!     ConnectionConfig::new("192.168.40.14")
//!         .with_port(1161)
//!         .with_communities("public", "private"),
//! )
//! .with_polling_interval(Duration::from_secs(10))?;
//!
//! assert_eq!(config.connection.unique_id(), "192.168.40.14:1161 public private");
//! # Ok::<(), raritan_pdu::Error>(())
//! ```
//!
//! Intervals must be non-zero; setters and deserialization reject
//! `Duration::ZERO`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ParseError, Result, ValueError};

/// How to reach the device.
///
/// The combination of all fields is the device's identity across restarts;
/// see [`unique_id`](Self::unique_id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Hostname or IP address of the PDU.
    pub host: String,
    /// Agent port.
    #[serde(default = "ConnectionConfig::default_port")]
    pub port: u16,
    /// Community used for reads.
    #[serde(default = "ConnectionConfig::default_read_community")]
    pub read_community: String,
    /// Community used for writes.
    #[serde(default = "ConnectionConfig::default_write_community")]
    pub write_community: String,
}

impl ConnectionConfig {
    /// Default agent port.
    pub const DEFAULT_PORT: u16 = 161;

    /// Creates a configuration with default port and communities.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
            read_community: Self::default_read_community(),
            write_community: Self::default_write_community(),
        }
    }

    /// Sets a custom port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the read and write communities.
    #[must_use]
    pub fn with_communities(
        mut self,
        read_community: impl Into<String>,
        write_community: impl Into<String>,
    ) -> Self {
        self.read_community = read_community.into();
        self.write_community = write_community.into();
        self
    }

    /// Returns the stable identifier of the device this connection reaches.
    #[must_use]
    pub fn unique_id(&self) -> String {
        format!(
            "{}:{} {} {}",
            self.host, self.port, self.read_community, self.write_community
        )
    }

    fn default_port() -> u16 {
        Self::DEFAULT_PORT
    }

    fn default_read_community() -> String {
        "public".to_string()
    }

    fn default_write_community() -> String {
        "private".to_string()
    }
}

/// Timing of the command-then-confirm control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Delay between confirmation reads. Never zero.
    #[serde(
        serialize_with = "duration_secs::serialize",
        deserialize_with = "duration_secs::deserialize_nonzero"
    )]
    pub poll_interval: Duration,
    /// Time after the set command before giving up on confirmation.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl ControlConfig {
    /// Default delay between confirmation reads.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    /// Default confirmation ceiling.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Sets the delay between confirmation reads.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::ZeroInterval` if `interval` is zero.
    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self> {
        self.poll_interval = nonzero("poll_interval", interval)?;
        Ok(self)
    }

    /// Sets the confirmation ceiling.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Complete configuration of one monitored PDU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PduConfig {
    /// How to reach the device.
    pub connection: ConnectionConfig,
    /// Interval between scheduled polls. Never zero.
    #[serde(
        default = "PduConfig::default_polling_interval",
        serialize_with = "duration_secs::serialize",
        deserialize_with = "duration_secs::deserialize_nonzero"
    )]
    pub polling_interval: Duration,
    /// Prefix the device description must start with to be accepted.
    #[serde(default = "PduConfig::default_description_prefix")]
    pub description_prefix: String,
    /// Control sequence timing.
    #[serde(default)]
    pub control: ControlConfig,
}

impl PduConfig {
    /// Default interval between scheduled polls.
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);
    /// Description prefix of supported devices.
    pub const DEFAULT_DESCRIPTION_PREFIX: &'static str = "Raritan Dominion PX";

    /// Creates a configuration with default timing.
    #[must_use]
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            polling_interval: Self::DEFAULT_POLLING_INTERVAL,
            description_prefix: Self::default_description_prefix(),
            control: ControlConfig::default(),
        }
    }

    /// Loads a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the document is malformed or
    /// lacks the connection host.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            ParseError::InvalidValue {
                field: "config".to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Sets the interval between scheduled polls.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::ZeroInterval` if `interval` is zero.
    pub fn with_polling_interval(mut self, interval: Duration) -> Result<Self> {
        self.polling_interval = nonzero("polling_interval", interval)?;
        Ok(self)
    }

    /// Sets the accepted device description prefix.
    #[must_use]
    pub fn with_description_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.description_prefix = prefix.into();
        self
    }

    /// Sets control sequence timing.
    #[must_use]
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.control = control;
        self
    }

    fn default_polling_interval() -> Duration {
        Self::DEFAULT_POLLING_INTERVAL
    }

    fn default_description_prefix() -> String {
        Self::DEFAULT_DESCRIPTION_PREFIX.to_string()
    }
}

/// Floor applied to intervals set directly on the public fields.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

fn nonzero(field: &str, interval: Duration) -> Result<Duration> {
    if interval.is_zero() {
        return Err(ValueError::ZeroInterval(field.to_string()).into());
    }
    Ok(interval)
}

/// Durations as (possibly fractional) seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }

    pub fn deserialize_nonzero<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let duration = deserialize(deserializer)?;
        if duration.is_zero() {
            return Err(serde::de::Error::custom("interval must be greater than zero"));
        }
        Ok(duration)
    }
}
