// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-related types for PDU outlets.
//!
//! This module provides the outlet operational state and the 1-based index
//! used to address a single outlet.

use std::fmt;
use std::num::NonZeroU16;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;
use crate::protocol::Value;

/// Operational state of an outlet.
///
/// The device reports and accepts the lower-case names; numeric codes
/// (`on` = 1, `cycling` = 2, `off` = 0, `error` = -1) are accepted on read.
///
/// # Examples
///
/// ```
/// use raritan_pdu::types::OperationalState;
///
/// assert_eq!("on".parse::<OperationalState>().unwrap(), OperationalState::On);
/// assert_eq!("2".parse::<OperationalState>().unwrap(), OperationalState::Cycling);
/// assert_eq!(OperationalState::Off.as_str(), "off");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalState {
    /// Outlet is powered.
    On,
    /// Outlet is not powered.
    Off,
    /// Outlet is going through a power cycle.
    Cycling,
    /// The device reports a fault on the outlet.
    Error,
}

impl OperationalState {
    /// Returns the name used by the device.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Cycling => "cycling",
            Self::Error => "error",
        }
    }

    /// Returns the numeric code used by the device.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::On => 1,
            Self::Off => 0,
            Self::Cycling => 2,
            Self::Error => -1,
        }
    }

    /// Returns `true` if this state can be requested with a set command.
    #[must_use]
    pub const fn is_settable(&self) -> bool {
        !matches!(self, Self::Error)
    }

    /// Interprets a device value as an operational state.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::InvalidOperationalState` for unknown names/codes.
    pub fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(code) => Self::from_code(*code),
            Value::Text(s) => s.parse(),
            Value::Float(_) => Err(ValueError::InvalidOperationalState(value.to_string())),
        }
    }

    fn from_code(code: i64) -> Result<Self, ValueError> {
        match code {
            1 => Ok(Self::On),
            0 => Ok(Self::Off),
            2 => Ok(Self::Cycling),
            -1 => Ok(Self::Error),
            _ => Err(ValueError::InvalidOperationalState(code.to_string())),
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationalState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        // Some agents render enums as "on(1)".
        let name = trimmed.split('(').next().unwrap_or(trimmed);
        match name.to_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "cycling" => Ok(Self::Cycling),
            "error" => Ok(Self::Error),
            _ => Err(ValueError::InvalidOperationalState(s.to_string())),
        }
    }
}

impl From<OperationalState> for Value {
    fn from(state: OperationalState) -> Self {
        Value::Text(state.as_str().to_string())
    }
}

/// 1-based index of an outlet on the device.
///
/// # Examples
///
/// ```
/// use raritan_pdu::types::OutletIndex;
///
/// let idx = OutletIndex::new(3).unwrap();
/// assert_eq!(idx.value(), 3);
/// assert!(OutletIndex::new(0).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u16", into = "u16")]
pub struct OutletIndex(NonZeroU16);

impl OutletIndex {
    /// Creates a new outlet index.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `index` is zero.
    pub fn new(index: u16) -> Result<Self, ValueError> {
        NonZeroU16::new(index)
            .map(Self)
            .ok_or(ValueError::OutOfRange {
                min: 1,
                max: i64::from(u16::MAX),
                actual: 0,
            })
    }

    /// Returns the numeric value of the index.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0.get()
    }

    /// Returns the zero-based position of this outlet.
    #[must_use]
    pub fn position(&self) -> usize {
        usize::from(self.0.get() - 1)
    }

    /// Returns the default label the device gives this outlet.
    #[must_use]
    pub fn default_label(&self) -> String {
        format!("Outlet {}", self.0)
    }
}

impl TryFrom<u16> for OutletIndex {
    type Error = ValueError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OutletIndex> for u16 {
    fn from(index: OutletIndex) -> Self {
        index.value()
    }
}

impl fmt::Display for OutletIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_state_as_str() {
        assert_eq!(OperationalState::On.as_str(), "on");
        assert_eq!(OperationalState::Off.as_str(), "off");
        assert_eq!(OperationalState::Cycling.as_str(), "cycling");
        assert_eq!(OperationalState::Error.as_str(), "error");
    }

    #[test]
    fn operational_state_from_str() {
        assert_eq!("ON".parse::<OperationalState>().unwrap(), OperationalState::On);
        assert_eq!("off(0)".parse::<OperationalState>().unwrap(), OperationalState::Off);
        assert_eq!("-1".parse::<OperationalState>().unwrap(), OperationalState::Error);
        assert_eq!(
            "cycling".parse::<OperationalState>().unwrap(),
            OperationalState::Cycling
        );
    }

    #[test]
    fn operational_state_from_str_invalid() {
        let result = "toggle".parse::<OperationalState>();
        assert!(matches!(
            result.unwrap_err(),
            ValueError::InvalidOperationalState(_)
        ));
        assert!("7".parse::<OperationalState>().is_err());
    }

    #[test]
    fn operational_state_from_value() {
        assert_eq!(
            OperationalState::from_value(&Value::Integer(2)).unwrap(),
            OperationalState::Cycling
        );
        assert_eq!(
            OperationalState::from_value(&Value::from("off")).unwrap(),
            OperationalState::Off
        );
        assert!(OperationalState::from_value(&Value::Float(1.0)).is_err());
    }

    #[test]
    fn only_error_is_not_settable() {
        assert!(OperationalState::On.is_settable());
        assert!(OperationalState::Off.is_settable());
        assert!(OperationalState::Cycling.is_settable());
        assert!(!OperationalState::Error.is_settable());
    }

    #[test]
    fn outlet_index_position_and_label() {
        let idx = OutletIndex::new(1).unwrap();
        assert_eq!(idx.position(), 0);
        assert_eq!(idx.default_label(), "Outlet 1");
        assert_eq!(OutletIndex::new(24).unwrap().to_string(), "24");
    }

    #[test]
    fn outlet_index_serde() {
        let idx: OutletIndex = serde_json::from_str("5").unwrap();
        assert_eq!(idx.value(), 5);
        assert!(serde_json::from_str::<OutletIndex>("0").is_err());
        assert_eq!(serde_json::to_string(&idx).unwrap(), "5");
    }
}
