// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Named value locators.

use std::fmt;

/// MIB module holding the standard system group.
pub const SNMPV2_MIB: &str = "SNMPv2-MIB";
/// MIB module holding the Raritan PDU objects.
pub const PDU_MIB: &str = "PDU-MIB";

/// Locates one named value on the device: a MIB module, an object name and
/// an instance index.
///
/// Scalar objects use instance `0`; per-outlet objects use the 1-based
/// outlet index.
///
/// # Examples
///
/// ```
/// use raritan_pdu::protocol::Address;
///
/// let addr = Address::outlet("outletActivePower", 3);
/// assert_eq!(addr.to_string(), "PDU-MIB::outletActivePower.3");
/// assert_eq!(Address::sys_descr().to_string(), "SNMPv2-MIB::sysDescr.0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    module: String,
    object: String,
    instance: u32,
}

impl Address {
    /// Creates an address from its parts.
    #[must_use]
    pub fn new(module: impl Into<String>, object: impl Into<String>, instance: u32) -> Self {
        Self {
            module: module.into(),
            object: object.into(),
            instance,
        }
    }

    /// Creates a `PDU-MIB` address for a per-outlet object.
    #[must_use]
    pub fn outlet(object: impl Into<String>, index: u16) -> Self {
        Self::new(PDU_MIB, object, u32::from(index))
    }

    /// `SNMPv2-MIB::sysDescr.0`, the device description.
    #[must_use]
    pub fn sys_descr() -> Self {
        Self::new(SNMPV2_MIB, "sysDescr", 0)
    }

    /// `SNMPv2-MIB::sysName.0`, the administratively assigned name.
    #[must_use]
    pub fn sys_name() -> Self {
        Self::new(SNMPV2_MIB, "sysName", 0)
    }

    /// `PDU-MIB::outletEnergySupport.0`, whether outlets meter watt-hours.
    #[must_use]
    pub fn outlet_energy_support() -> Self {
        Self::new(PDU_MIB, "outletEnergySupport", 0)
    }

    /// `PDU-MIB::outletCount.0`, the number of outlets.
    #[must_use]
    pub fn outlet_count() -> Self {
        Self::new(PDU_MIB, "outletCount", 0)
    }

    /// `PDU-MIB::unitCpuTemp.0`, the controller temperature in tenths of a degree.
    #[must_use]
    pub fn unit_cpu_temp() -> Self {
        Self::new(PDU_MIB, "unitCpuTemp", 0)
    }

    /// Returns the MIB module name.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the object name.
    #[must_use]
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Returns the instance index.
    #[must_use]
    pub fn instance(&self) -> u32 {
        self.instance
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}.{}", self.module, self.object, self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlet_address_uses_index_as_instance() {
        let addr = Address::outlet("outletCurrent", 12);
        assert_eq!(addr.module(), PDU_MIB);
        assert_eq!(addr.object(), "outletCurrent");
        assert_eq!(addr.instance(), 12);
    }

    #[test]
    fn device_addresses_are_scalars() {
        for addr in [
            Address::sys_descr(),
            Address::sys_name(),
            Address::outlet_energy_support(),
            Address::outlet_count(),
            Address::unit_cpu_temp(),
        ] {
            assert_eq!(addr.instance(), 0, "{addr}");
        }
    }
}
