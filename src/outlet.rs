// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A single PDU outlet.
//!
//! An [`Outlet`] keeps the two most recent sensor snapshots with their
//! timestamps and integrates active power into delivered energy every time a
//! new snapshot arrives, whether it came from a scheduled poll or from the
//! confirmation step of a control command.
//!
//! Snapshot updates are atomic: the previous/current pair and the energy
//! total are changed under one write lock, so a poll and a control sequence
//! running at the same time cannot interleave halfway through an update.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::ControlConfig;
use crate::control::{ControlOutcome, ControlSequencer};
use crate::energy::left_riemann_wh;
use crate::error::{DeviceError, Error, ParseError, Result};
use crate::protocol::{Transport, Value};
use crate::types::{OperationalState, OutletIndex, OutletSensors, SensorKind, SensorUpdate};

/// One outlet of a PDU.
///
/// Outlets are created and owned by [`Pdu`](crate::Pdu); callers receive
/// them as `Arc<Outlet<T>>` from [`Pdu::outlet`](crate::Pdu::outlet).
#[derive(Debug)]
pub struct Outlet<T: Transport> {
    index: OutletIndex,
    energy_support: bool,
    transport: Arc<T>,
    control: ControlConfig,
    data: RwLock<OutletData>,
    control_lock: Mutex<()>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct OutletData {
    sensors: OutletSensors,
    previous_sensors: OutletSensors,
    timestamp: Option<Instant>,
    previous_timestamp: Option<Instant>,
    energy_delivered: f64,
    initial_energy_delivered: Option<f64>,
}

impl OutletData {
    fn integrate_energy(&mut self) {
        let (Some(previous), Some(current)) = (self.previous_timestamp, self.timestamp) else {
            return;
        };
        let Some(elapsed) = current.checked_duration_since(previous) else {
            return;
        };
        let Some(power) = self.previous_sensors.active_power else {
            return;
        };
        if let Some(wh) = left_riemann_wh(power.max(0.0), elapsed) {
            self.energy_delivered += wh;
        }
    }
}

/// Read-only view of an outlet, as served to presentation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutletSnapshot {
    /// 1-based outlet index.
    pub index: OutletIndex,
    /// Display name derived from the index and label.
    pub name: String,
    /// Latest sensor readings.
    #[serde(flatten)]
    pub sensors: OutletSensors,
    /// Energy delivered in watt-hours, including any restored seed.
    pub energy_delivered: f64,
}

impl<T: Transport> Outlet<T> {
    pub(crate) fn new(
        index: OutletIndex,
        energy_support: bool,
        transport: Arc<T>,
        control: ControlConfig,
    ) -> Self {
        Self {
            index,
            energy_support,
            transport,
            control,
            data: RwLock::new(OutletData::default()),
            control_lock: Mutex::new(()),
        }
    }

    /// Returns the outlet index.
    #[must_use]
    pub fn index(&self) -> OutletIndex {
        self.index
    }

    /// Returns `true` if this outlet polls device-metered watt-hours.
    #[must_use]
    pub fn energy_support(&self) -> bool {
        self.energy_support
    }

    /// Returns the sensors polled for this outlet, in request order.
    #[must_use]
    pub fn polled_sensors(&self) -> &'static [SensorKind] {
        SensorKind::polled(self.energy_support)
    }

    /// Returns the latest sensor readings.
    #[must_use]
    pub fn sensors(&self) -> OutletSensors {
        self.data.read().sensors.clone()
    }

    /// Returns the readings that preceded the latest ones.
    #[must_use]
    pub fn previous_sensors(&self) -> OutletSensors {
        self.data.read().previous_sensors.clone()
    }

    /// Returns when the latest readings were taken.
    #[must_use]
    pub fn sensor_timestamp(&self) -> Option<Instant> {
        self.data.read().timestamp
    }

    /// Returns when the previous readings were taken.
    #[must_use]
    pub fn previous_sensor_timestamp(&self) -> Option<Instant> {
        self.data.read().previous_timestamp
    }

    /// Returns the last known operational state.
    #[must_use]
    pub fn operational_state(&self) -> Option<OperationalState> {
        self.data.read().sensors.operational_state
    }

    /// Returns `true` if the outlet is known to be on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.operational_state() == Some(OperationalState::On)
    }

    /// Returns `true` if the outlet can be switched, i.e. it is on or off.
    #[must_use]
    pub fn is_switchable(&self) -> bool {
        matches!(
            self.operational_state(),
            Some(OperationalState::On | OperationalState::Off)
        )
    }

    /// Returns `true` if a power cycle makes sense, i.e. the outlet is on.
    #[must_use]
    pub fn can_power_cycle(&self) -> bool {
        self.is_on()
    }

    /// Returns the display name: `Outlet N`, followed by the label when the
    /// label differs from the device default.
    #[must_use]
    pub fn name(&self) -> String {
        let default = self.index.default_label();
        match self.data.read().sensors.label.as_deref() {
            Some(label) if !label.is_empty() && label != default => {
                format!("{default} {label}")
            }
            _ => default,
        }
    }

    /// Energy delivered in watt-hours: the integrated total plus the restored seed.
    #[must_use]
    pub fn energy_delivered(&self) -> f64 {
        let data = self.data.read();
        data.energy_delivered + data.initial_energy_delivered.unwrap_or(0.0)
    }

    /// Applies a restored energy total, in watt-hours.
    ///
    /// The seed is meant to be applied once, before the first readings are
    /// integrated.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::EnergyAlreadyInitialized` on a second call and
    /// `ParseError::InvalidValue` for a non-finite or negative seed.
    pub fn initialize_energy_delivered(&self, seed: f64) -> Result<()> {
        if !seed.is_finite() || seed < 0.0 {
            return Err(ParseError::InvalidValue {
                field: "energy_delivered".to_string(),
                message: format!("invalid restored value {seed}"),
            }
            .into());
        }

        let mut data = self.data.write();
        if data.initial_energy_delivered.is_some() {
            return Err(DeviceError::EnergyAlreadyInitialized {
                index: self.index.value(),
            }
            .into());
        }
        data.initial_energy_delivered = Some(seed);
        tracing::debug!(outlet = %self.index, seed, "Restored energy delivered");
        Ok(())
    }

    /// Records fresh readings taken now.
    ///
    /// The current snapshot becomes the previous one, the readings in
    /// `update` overwrite the current values, and the interval since the
    /// previous snapshot is integrated into delivered energy. Readings that
    /// cannot be interpreted are skipped and the field keeps its last value.
    pub fn update_sensor_data(&self, update: &SensorUpdate) {
        self.update_sensor_data_at(update, Instant::now());
    }

    pub(crate) fn update_sensor_data_at(&self, update: &SensorUpdate, now: Instant) {
        let mut guard = self.data.write();
        let data = &mut *guard;

        let now = match data.timestamp {
            Some(last) if now < last => last,
            _ => now,
        };

        data.previous_sensors = data.sensors.clone();
        data.previous_timestamp = data.timestamp;
        data.timestamp = Some(now);

        for (kind, value) in update.iter() {
            if *kind == SensorKind::WattHours && !self.energy_support {
                continue;
            }
            if let Err(e) = data.sensors.apply(*kind, value) {
                tracing::debug!(outlet = %self.index, error = %e, "Skipping malformed reading");
            }
        }

        data.integrate_energy();
    }

    /// Returns a copy of the latest readings and delivered energy.
    #[must_use]
    pub fn snapshot(&self) -> OutletSnapshot {
        OutletSnapshot {
            index: self.index,
            name: self.name(),
            sensors: self.sensors(),
            energy_delivered: self.energy_delivered(),
        }
    }

    /// Requests a new operational state and waits for the device to confirm it.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::NotSettable` for [`OperationalState::Error`] and
    /// `ProtocolError` if the set command itself fails. A confirmation that
    /// never arrives is not an error; see [`ControlOutcome::is_confirmed`].
    pub async fn set_operational_state(&self, target: OperationalState) -> Result<ControlOutcome> {
        let _guard = self.control_lock.lock().await;
        ControlSequencer::new(self.index, self.transport.as_ref(), self.control)
            .run(target, |value| {
                self.update_sensor_data(&SensorUpdate::operational_state(value));
            })
            .await
    }

    /// Switches the outlet on.
    ///
    /// # Errors
    ///
    /// Returns error if the set command fails.
    pub async fn power_on(&self) -> Result<ControlOutcome> {
        self.set_operational_state(OperationalState::On).await
    }

    /// Switches the outlet off.
    ///
    /// # Errors
    ///
    /// Returns error if the set command fails.
    pub async fn power_off(&self) -> Result<ControlOutcome> {
        self.set_operational_state(OperationalState::Off).await
    }

    /// Power cycles the outlet.
    ///
    /// # Errors
    ///
    /// Returns error if the set command fails.
    pub async fn power_cycle(&self) -> Result<ControlOutcome> {
        self.set_operational_state(OperationalState::Cycling).await
    }

    /// Renames the outlet on the device and returns the label it accepted.
    ///
    /// # Errors
    ///
    /// Returns error if the set command fails.
    pub async fn set_label(&self, label: &str) -> Result<String> {
        let address = SensorKind::Label.address(self.index);
        let accepted = self
            .transport
            .set(&address, Value::from(label))
            .await
            .map_err(Error::Protocol)?;

        let accepted = accepted.to_string();
        self.data.write().sensors.label = Some(accepted.clone());
        tracing::info!(outlet = %self.index, label = %accepted, "Outlet label changed");
        Ok(accepted)
    }
}
