// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device model and the batched poll cycle.
//!
//! A [`Pdu`] owns its outlets and refreshes them with two round-trips per
//! cycle, regardless of the outlet count:
//!
//! 1. one get for the device-level values (description, name, energy
//!    capability, outlet count, CPU temperature);
//! 2. one get for every sensor of every outlet, flattened in outlet order
//!    and then sensor order, and fanned back out by position.
//!
//! A cycle is all-or-nothing. If either request fails, nothing the
//! previous cycle produced is touched and the last snapshot keeps being
//! served. When the outlet count changes, every outlet is recreated and
//! starts over, accumulated energy included.
//!
//! # Examples
//!
//! ```
//! use raritan_pdu::config::{ConnectionConfig, PduConfig};
//! use raritan_pdu::protocol::MemoryTransport;
//! use raritan_pdu::Pdu;
//!
//! # async fn example() -> raritan_pdu::Result<()> {
//! let config = PduConfig::new(ConnectionConfig::new("192.168.40.14"));
//! let pdu = Pdu::new(config, MemoryTransport::dominion_px(8, true));
//!
//! pdu.connect().await?;
//! assert_eq!(pdu.outlets().len(), 8);
//!
//! let outcome = pdu.power_off(3).await?;
//! assert!(outcome.is_confirmed());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::PduConfig;
use crate::control::ControlOutcome;
use crate::error::{DeviceError, ParseError, Result};
use crate::outlet::{Outlet, OutletSnapshot};
use crate::protocol::{Address, Transport, Value, get_checked};
use crate::types::{OutletIndex, SensorUpdate};

/// Device-level attributes read at the start of every poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// System description, e.g. `Raritan Dominion PX - Firmware Version 1.5.20`.
    pub description: String,
    /// Administrator-assigned system name.
    pub system_name: String,
    /// Whether outlets meter their own watt-hours.
    pub energy_support: bool,
    /// Number of outlets reported by the device.
    pub outlet_count: u16,
    /// Controller CPU temperature in degrees Celsius.
    pub cpu_temperature: Option<f64>,
}

impl DeviceInfo {
    /// Returns the display name: the model part of the description followed
    /// by the system name.
    #[must_use]
    pub fn name(&self) -> String {
        let model = self
            .description
            .split(" - ")
            .next()
            .unwrap_or_default()
            .trim();
        format!("{model} {}", self.system_name.trim())
            .trim()
            .to_string()
    }

    const ADDRESSES: usize = 5;

    fn addresses() -> [Address; Self::ADDRESSES] {
        [
            Address::sys_descr(),
            Address::sys_name(),
            Address::outlet_energy_support(),
            Address::outlet_count(),
            Address::unit_cpu_temp(),
        ]
    }

    /// Builds the new device info from the first batch of a poll.
    ///
    /// The CPU temperature is reported in tenths of a degree; a reading that
    /// cannot be interpreted keeps the previous one.
    fn from_values(values: &[Value], previous: &Self) -> Result<Self> {
        let [description, system_name, energy_support, outlet_count, cpu_temp] = values else {
            return Err(ParseError::MissingField("device info".to_string()).into());
        };

        let outlet_count = outlet_count
            .as_i64()
            .and_then(|n| u16::try_from(n).ok())
            .ok_or_else(|| ParseError::InvalidValue {
                field: "outlet_count".to_string(),
                message: format!("expected an outlet count, got {outlet_count}"),
            })?;

        let cpu_temperature = match cpu_temp.as_f64() {
            Some(tenths) => Some(tenths / 10.0),
            None => {
                tracing::debug!(value = %cpu_temp, "Skipping malformed CPU temperature");
                previous.cpu_temperature
            }
        };

        Ok(Self {
            description: description.to_string(),
            system_name: system_name.to_string(),
            energy_support: parse_energy_support(energy_support),
            outlet_count,
            cpu_temperature,
        })
    }
}

/// Interprets the energy capability flag: `"Yes"` in any case, or `1`.
fn parse_energy_support(value: &Value) -> bool {
    match value {
        Value::Text(s) => s.trim().eq_ignore_ascii_case("yes") || s.trim() == "1",
        Value::Integer(n) => *n == 1,
        Value::Float(_) => false,
    }
}

/// Read-only view of the whole device, as served to presentation layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PduSnapshot {
    /// Stable identifier derived from the connection parameters.
    pub unique_id: String,
    /// Display name.
    pub name: String,
    /// Device-level attributes.
    #[serde(flatten)]
    pub info: DeviceInfo,
    /// When the last successful poll completed.
    pub last_updated: Option<DateTime<Utc>>,
    /// Outlets keyed by 1-based index.
    pub outlets: BTreeMap<u16, OutletSnapshot>,
}

impl PduSnapshot {
    /// Returns the snapshot of one outlet.
    #[must_use]
    pub fn outlet(&self, index: u16) -> Option<&OutletSnapshot> {
        self.outlets.get(&index)
    }
}

#[derive(Debug)]
struct PduState<T: Transport> {
    info: DeviceInfo,
    outlets: Vec<Arc<Outlet<T>>>,
    last_updated: Option<DateTime<Utc>>,
}

/// A Raritan PDU reached through a [`Transport`].
///
/// `update_data` calls are serialized per device; control sequences are
/// serialized per outlet and never wait on a poll.
#[derive(Debug)]
pub struct Pdu<T: Transport> {
    config: PduConfig,
    transport: Arc<T>,
    state: RwLock<PduState<T>>,
    poll_lock: Mutex<()>,
}

impl<T: Transport> Pdu<T> {
    /// Creates a device model. No request is made until
    /// [`connect`](Self::connect) or [`update_data`](Self::update_data).
    pub fn new(config: PduConfig, transport: T) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            state: RwLock::new(PduState {
                info: DeviceInfo::default(),
                outlets: Vec::new(),
                last_updated: None,
            }),
            poll_lock: Mutex::new(()),
        }
    }

    /// Returns the transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PduConfig {
        &self.config
    }

    /// Returns the stable identifier derived from the connection parameters.
    #[must_use]
    pub fn unique_id(&self) -> String {
        self.config.connection.unique_id()
    }

    /// Returns the device-level attributes from the last successful poll.
    #[must_use]
    pub fn info(&self) -> DeviceInfo {
        self.state.read().info.clone()
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> String {
        self.state.read().info.name()
    }

    /// Returns when the last successful poll completed.
    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_updated
    }

    /// Checks that the device answers and is a supported model.
    ///
    /// Makes a single identity query. Returns `false` if the query fails or
    /// the description does not start with the configured prefix.
    pub async fn authenticate(&self) -> bool {
        match self.transport.get_one(&Address::sys_descr()).await {
            Ok(description) => {
                let description = description.to_string();
                let supported = description.starts_with(&self.config.description_prefix);
                if !supported {
                    tracing::error!(
                        host = %self.config.connection.host,
                        description = %description,
                        "Unsupported device"
                    );
                }
                supported
            }
            Err(e) => {
                tracing::error!(host = %self.config.connection.host, error = %e, "Authentication failed");
                false
            }
        }
    }

    /// Authenticates and runs the first poll.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::NotReady` if authentication or the first poll fails.
    pub async fn connect(&self) -> Result<()> {
        if !self.authenticate().await {
            return Err(DeviceError::NotReady(format!(
                "{} is unreachable or not a {}",
                self.config.connection.host, self.config.description_prefix
            ))
            .into());
        }
        self.update_data()
            .await
            .map_err(|e| DeviceError::NotReady(e.to_string()))?;
        tracing::info!(host = %self.config.connection.host, name = %self.name(), "Connected");
        Ok(())
    }

    /// Runs one poll cycle.
    ///
    /// Concurrent calls queue behind each other.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if either request fails and `ParseError` if
    /// the outlet count cannot be interpreted. The model is left untouched
    /// in both cases.
    pub async fn update_data(&self) -> Result<()> {
        let _guard = self.poll_lock.lock().await;

        let values = get_checked(self.transport.as_ref(), &DeviceInfo::addresses())
            .await
            .inspect_err(|e| {
                tracing::warn!(host = %self.config.connection.host, error = %e, "Device poll failed");
            })?;

        let (info, outlets, recreated) = {
            let state = self.state.read();
            let info = DeviceInfo::from_values(&values, &state.info).inspect_err(|e| {
                tracing::warn!(host = %self.config.connection.host, error = %e, "Device poll failed");
            })?;

            if usize::from(info.outlet_count) == state.outlets.len() {
                (info, state.outlets.clone(), false)
            } else {
                let outlets = self.create_outlets(info.outlet_count, info.energy_support);
                (info, outlets, true)
            }
        };
        if recreated {
            tracing::info!(outlet_count = info.outlet_count, "Outlet count changed, recreating outlets");
        }

        let addresses: Vec<Address> = outlets
            .iter()
            .flat_map(|outlet| {
                let index = outlet.index();
                outlet.polled_sensors().iter().map(move |kind| kind.address(index))
            })
            .collect();

        let values = if addresses.is_empty() {
            Vec::new()
        } else {
            get_checked(self.transport.as_ref(), &addresses)
                .await
                .inspect_err(|e| {
                    tracing::warn!(host = %self.config.connection.host, error = %e, "Outlet poll failed");
                })?
        };

        let now = Instant::now();
        let mut state = self.state.write();
        let mut values = values.into_iter();
        for outlet in &outlets {
            let update: SensorUpdate = outlet
                .polled_sensors()
                .iter()
                .copied()
                .zip(values.by_ref())
                .collect();
            outlet.update_sensor_data_at(&update, now);
        }
        state.info = info;
        state.outlets = outlets;
        state.last_updated = Some(Utc::now());

        tracing::debug!(
            host = %self.config.connection.host,
            outlets = state.outlets.len(),
            values = addresses.len(),
            "Poll complete"
        );
        Ok(())
    }

    fn create_outlets(&self, count: u16, energy_support: bool) -> Vec<Arc<Outlet<T>>> {
        (1..=count)
            .filter_map(|i| OutletIndex::new(i).ok())
            .map(|index| {
                Arc::new(Outlet::new(
                    index,
                    energy_support,
                    Arc::clone(&self.transport),
                    self.config.control,
                ))
            })
            .collect()
    }

    /// Returns the outlet with the given 1-based index.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::OutletOutOfRange` if no such outlet exists.
    pub fn outlet(&self, index: u16) -> Result<Arc<Outlet<T>>> {
        let state = self.state.read();
        index
            .checked_sub(1)
            .and_then(|position| state.outlets.get(usize::from(position)))
            .cloned()
            .ok_or_else(|| {
                DeviceError::OutletOutOfRange {
                    index,
                    count: u16::try_from(state.outlets.len()).unwrap_or(u16::MAX),
                }
                .into()
            })
    }

    /// Returns all outlets in index order.
    #[must_use]
    pub fn outlets(&self) -> Vec<Arc<Outlet<T>>> {
        self.state.read().outlets.clone()
    }

    /// Returns a copy of the device and all of its outlets.
    #[must_use]
    pub fn snapshot(&self) -> PduSnapshot {
        let state = self.state.read();
        PduSnapshot {
            unique_id: self.unique_id(),
            name: state.info.name(),
            info: state.info.clone(),
            last_updated: state.last_updated,
            outlets: state
                .outlets
                .iter()
                .map(|outlet| (outlet.index().value(), outlet.snapshot()))
                .collect(),
        }
    }

    /// Switches an outlet on.
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range or the command fails.
    pub async fn power_on(&self, index: u16) -> Result<ControlOutcome> {
        self.outlet(index)?.power_on().await
    }

    /// Switches an outlet off.
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range or the command fails.
    pub async fn power_off(&self, index: u16) -> Result<ControlOutcome> {
        self.outlet(index)?.power_off().await
    }

    /// Power cycles an outlet.
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range or the command fails.
    pub async fn power_cycle(&self, index: u16) -> Result<ControlOutcome> {
        self.outlet(index)?.power_cycle().await
    }

    /// Renames an outlet and returns the label the device accepted.
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range or the command fails.
    pub async fn set_label(&self, index: u16, label: &str) -> Result<String> {
        self.outlet(index)?.set_label(label).await
    }

    /// Restores a persisted energy total, in watt-hours, for one outlet.
    ///
    /// # Errors
    ///
    /// Returns error if the index is out of range, the seed is invalid, or
    /// the outlet was already seeded.
    pub fn restore_energy(&self, index: u16, wh: f64) -> Result<()> {
        self.outlet(index)?.initialize_energy_delivered(wh)
    }
}
