// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-to-energy integration.
//!
//! Outlets report instantaneous real power only; energy is accumulated on
//! the host by integrating power over the irregular intervals between polls.
//!
//! The rule is the **left Riemann sum**: each interval contributes the power
//! read at its *start* multiplied by its length. A trapezoidal rule would
//! average the two endpoints instead and give a different total; the left
//! rule is kept because a reading describes the load from the moment it was
//! taken until the next one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Energy added over one polling interval, in watt-hours.
///
/// Returns `None` when the interval is empty, which callers treat as
/// "nothing to integrate".
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use raritan_pdu::energy::left_riemann_wh;
///
/// // 100 W for one hour is 100 Wh, whatever the power at the end of the hour.
/// assert_eq!(left_riemann_wh(100.0, Duration::from_secs(3600)), Some(100.0));
/// assert_eq!(left_riemann_wh(100.0, Duration::ZERO), None);
/// ```
#[must_use]
pub fn left_riemann_wh(start_power_w: f64, elapsed: Duration) -> Option<f64> {
    if elapsed.is_zero() {
        return None;
    }
    Some(start_power_w * elapsed.as_secs_f64() / SECONDS_PER_HOUR)
}

/// Unit an energy value is expressed in.
///
/// The library accumulates watt-hours. Hosts frequently persist totals in
/// kilowatt-hours, so restored seeds are converted with [`EnergyUnit::to_wh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnergyUnit {
    /// Watt-hours.
    #[default]
    #[serde(rename = "Wh")]
    WattHour,
    /// Kilowatt-hours.
    #[serde(rename = "kWh")]
    KiloWattHour,
}

impl EnergyUnit {
    /// Converts `value` in this unit to watt-hours.
    #[must_use]
    pub fn to_wh(self, value: f64) -> f64 {
        match self {
            Self::WattHour => value,
            Self::KiloWattHour => value * 1000.0,
        }
    }

    /// Converts `wh` watt-hours to this unit.
    #[must_use]
    pub fn from_wh(self, wh: f64) -> f64 {
        match self {
            Self::WattHour => wh,
            Self::KiloWattHour => wh / 1000.0,
        }
    }
}
