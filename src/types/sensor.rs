// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-outlet sensor schema.
//!
//! Every outlet polls the same fixed set of sensors. Watt-hours are only
//! polled when the device reports energy support, so that field is the one
//! capability-gated member of [`OutletSensors`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::protocol::{Address, Value};

use super::{OperationalState, OutletIndex};

/// One sensor polled for every outlet.
///
/// The declaration order here is the order in which values are requested
/// and fanned back out during a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// User-assigned outlet label.
    Label,
    /// Power state of the outlet.
    OperationalState,
    /// RMS current in milliamps.
    Current,
    /// RMS voltage in millivolts.
    Voltage,
    /// Real power in watts.
    ActivePower,
    /// Power factor as a percentage.
    PowerFactor,
    /// Cumulative energy in watt-hours, as metered by the device.
    WattHours,
}

const BASE_SENSORS: [SensorKind; 6] = [
    SensorKind::Label,
    SensorKind::OperationalState,
    SensorKind::Current,
    SensorKind::Voltage,
    SensorKind::ActivePower,
    SensorKind::PowerFactor,
];

const ENERGY_SENSORS: [SensorKind; 7] = [
    SensorKind::Label,
    SensorKind::OperationalState,
    SensorKind::Current,
    SensorKind::Voltage,
    SensorKind::ActivePower,
    SensorKind::PowerFactor,
    SensorKind::WattHours,
];

impl SensorKind {
    /// Returns the sensors polled for an outlet, in request order.
    #[must_use]
    pub fn polled(energy_support: bool) -> &'static [SensorKind] {
        if energy_support {
            &ENERGY_SENSORS
        } else {
            &BASE_SENSORS
        }
    }

    /// Returns the snapshot key for this sensor.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::OperationalState => "operational_state",
            Self::Current => "current",
            Self::Voltage => "voltage",
            Self::ActivePower => "active_power",
            Self::PowerFactor => "power_factor",
            Self::WattHours => "watt_hours",
        }
    }

    /// Returns the `PDU-MIB` object name for this sensor.
    #[must_use]
    pub const fn object_name(&self) -> &'static str {
        match self {
            Self::Label => "outletLabel",
            Self::OperationalState => "outletOperationalState",
            Self::Current => "outletCurrent",
            Self::Voltage => "outletVoltage",
            Self::ActivePower => "outletActivePower",
            Self::PowerFactor => "outletPowerFactor",
            Self::WattHours => "outletWattHours",
        }
    }

    /// Returns the address of this sensor on the given outlet.
    #[must_use]
    pub fn address(&self, index: OutletIndex) -> Address {
        Address::outlet(self.object_name(), index.value())
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Latest readings of one outlet.
///
/// Fields are `None` until the device has reported a usable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletSensors {
    /// User-assigned outlet label.
    pub label: Option<String>,
    /// Power state of the outlet.
    pub operational_state: Option<OperationalState>,
    /// RMS current in milliamps.
    pub current: Option<f64>,
    /// RMS voltage in millivolts.
    pub voltage: Option<f64>,
    /// Real power in watts.
    pub active_power: Option<f64>,
    /// Power factor as a percentage.
    pub power_factor: Option<f64>,
    /// Device-metered energy in watt-hours. Only present on energy-capable devices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watt_hours: Option<f64>,
}

impl OutletSensors {
    /// Stores `value` into the field for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidValue` if the value does not fit the
    /// sensor. The field is left untouched in that case.
    pub fn apply(&mut self, kind: SensorKind, value: &Value) -> Result<(), ParseError> {
        match kind {
            SensorKind::Label => {
                self.label = Some(value.to_string());
            }
            SensorKind::OperationalState => {
                let state =
                    OperationalState::from_value(value).map_err(|e| ParseError::InvalidValue {
                        field: kind.key().to_string(),
                        message: e.to_string(),
                    })?;
                self.operational_state = Some(state);
            }
            SensorKind::Current => self.current = Some(numeric(kind, value)?),
            SensorKind::Voltage => self.voltage = Some(numeric(kind, value)?),
            SensorKind::ActivePower => self.active_power = Some(numeric(kind, value)?),
            SensorKind::PowerFactor => self.power_factor = Some(numeric(kind, value)?),
            SensorKind::WattHours => self.watt_hours = Some(numeric(kind, value)?),
        }
        Ok(())
    }

    /// Returns the current in amps.
    #[must_use]
    pub fn current_amps(&self) -> Option<f64> {
        self.current.map(|ma| ma / 1000.0)
    }

    /// Returns the voltage in volts.
    #[must_use]
    pub fn voltage_volts(&self) -> Option<f64> {
        self.voltage.map(|mv| mv / 1000.0)
    }
}

fn numeric(kind: SensorKind, value: &Value) -> Result<f64, ParseError> {
    value.as_f64().ok_or_else(|| ParseError::InvalidValue {
        field: kind.key().to_string(),
        message: format!("expected a number, got {value:?}"),
    })
}

/// A batch of fresh readings for one outlet.
///
/// # Examples
///
/// ```
/// use raritan_pdu::protocol::Value;
/// use raritan_pdu::types::{SensorKind, SensorUpdate};
///
/// let update = SensorUpdate::new()
///     .with(SensorKind::ActivePower, Value::Integer(100))
///     .with(SensorKind::OperationalState, Value::from("on"));
/// assert_eq!(update.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorUpdate {
    values: Vec<(SensorKind, Value)>,
}

impl SensorUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an update carrying only an operational state reading.
    #[must_use]
    pub fn operational_state(value: Value) -> Self {
        Self::new().with(SensorKind::OperationalState, value)
    }

    /// Adds a reading.
    #[must_use]
    pub fn with(mut self, kind: SensorKind, value: Value) -> Self {
        self.push(kind, value);
        self
    }

    /// Adds a reading in place.
    pub fn push(&mut self, kind: SensorKind, value: Value) {
        self.values.push((kind, value));
    }

    /// Returns the number of readings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the update carries no readings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the readings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &(SensorKind, Value)> {
        self.values.iter()
    }
}

impl FromIterator<(SensorKind, Value)> for SensorUpdate {
    fn from_iter<I: IntoIterator<Item = (SensorKind, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
