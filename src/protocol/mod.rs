// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport seam for talking to the PDU's management agent.
//!
//! The library does not speak the management protocol itself. It needs two
//! primitives from whatever client the host application provides:
//!
//! - [`Transport::get`]: read several named values in one round-trip
//! - [`Transport::set`]: write one value and return what the device accepted
//!
//! Values are addressed by [`Address`] (module, object, instance) and come
//! back as loosely typed [`Value`]s, mirroring how SNMP agents report them.
//!
//! [`MemoryTransport`] is an in-memory device that implements the trait. It
//! backs the test suite and the `simulated_pdu` demo.

mod address;
mod memory;
mod value;

use std::future::Future;

pub use address::Address;
pub use memory::{MemoryTransport, SetBehavior};
pub use value::Value;

use crate::error::ProtocolError;

/// A client able to read and write named values on a PDU.
///
/// Implementations own per-request timeouts and retries; the library never
/// retries a failed call itself. A failed call must leave no partial result:
/// either every requested value is returned, in request order, or an error.
pub trait Transport: Send + Sync {
    /// Reads all `addresses` in a single request.
    ///
    /// The returned vector has one entry per address, in the same order.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device cannot be reached or rejects
    /// any of the addresses.
    fn get(
        &self,
        addresses: &[Address],
    ) -> impl Future<Output = Result<Vec<Value>, ProtocolError>> + Send;

    /// Writes `value` to `address` and returns the value the device accepted.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the device cannot be reached or refuses
    /// the write.
    fn set(
        &self,
        address: &Address,
        value: Value,
    ) -> impl Future<Output = Result<Value, ProtocolError>> + Send;

    /// Reads a single value.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the read fails or the device answers with
    /// anything but exactly one value.
    fn get_one(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<Value, ProtocolError>> + Send {
        let request = [address.clone()];
        async move {
            let mut values = self.get(&request).await?;
            if values.len() != 1 {
                return Err(ProtocolError::UnexpectedResultCount {
                    expected: 1,
                    actual: values.len(),
                });
            }
            Ok(values.swap_remove(0))
        }
    }
}

/// Reads `addresses` and checks that the answer lines up with the request.
///
/// # Errors
///
/// Returns `ProtocolError::UnexpectedResultCount` when the transport returns
/// more or fewer values than were requested.
pub(crate) async fn get_checked<T: Transport>(
    transport: &T,
    addresses: &[Address],
) -> Result<Vec<Value>, ProtocolError> {
    let values = transport.get(addresses).await?;
    if values.len() != addresses.len() {
        return Err(ProtocolError::UnexpectedResultCount {
            expected: addresses.len(),
            actual: values.len(),
        });
    }
    Ok(values)
}
