// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types for PDU outlets.
//!
//! # Types
//!
//! - [`OperationalState`] - On/Off/Cycling/Error outlet states
//! - [`OutletIndex`] - 1-based outlet index
//! - [`SensorKind`] - The sensors polled for every outlet
//! - [`OutletSensors`] - Fixed-schema record of an outlet's latest readings
//! - [`SensorUpdate`] - A batch of fresh readings for one outlet

mod power;
mod sensor;

pub use power::{OperationalState, OutletIndex};
pub use sensor::{OutletSensors, SensorKind, SensorUpdate};
