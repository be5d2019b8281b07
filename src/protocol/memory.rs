// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory device implementing [`Transport`].

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ProtocolError;
use crate::types::{OutletIndex, SensorKind};

use super::{Address, Transport, Value};

type FailurePredicate = Arc<dyn Fn(&[Address]) -> bool + Send + Sync>;

/// How a [`MemoryTransport`] reacts to set requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SetBehavior {
    /// Store the value and echo it back.
    #[default]
    Apply,
    /// Echo the value back without storing it, as a device that acknowledges
    /// a command but never carries it out.
    EchoOnly,
    /// Store the value but answer with a different accepted value.
    Answer(Value),
    /// Refuse every set.
    Reject,
}

/// A PDU held entirely in memory.
///
/// Gets are all-or-nothing: if any requested address is unknown the whole
/// request fails, like an agent answering `noSuchName`. Values queued with
/// [`script`](Self::script) are returned by successive reads of an address
/// before it falls back to its stored value.
///
/// # Examples
///
/// ```
/// use raritan_pdu::protocol::{Address, MemoryTransport, Transport, Value};
///
/// # async fn example() {
/// let transport = MemoryTransport::dominion_px(8, true);
/// let count = transport.get_one(&Address::outlet_count()).await.unwrap();
/// assert_eq!(count, Value::Integer(8));
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    values: HashMap<Address, Value>,
    scripted: HashMap<Address, VecDeque<Value>>,
    set_behavior: SetBehavior,
    offline: bool,
    fail_when: Option<FailurePredicate>,
    get_calls: usize,
    set_calls: usize,
    writes: Vec<(Address, Value)>,
}

impl MemoryTransport {
    /// Creates an empty device.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Dominion PX with `outlets` outlets, all switched on and idle.
    #[must_use]
    pub fn dominion_px(outlets: u16, energy_support: bool) -> Self {
        let transport = Self::new();
        transport.insert(
            Address::sys_descr(),
            Value::from("Raritan Dominion PX - Firmware Version 1.5.20"),
        );
        transport.insert(Address::sys_name(), Value::from("pdu-rack-a"));
        transport.insert(
            Address::outlet_energy_support(),
            Value::from(if energy_support { "Yes" } else { "No" }),
        );
        transport.insert(Address::unit_cpu_temp(), Value::Integer(415));
        transport.set_outlet_count(outlets);
        transport
    }

    /// Sets the outlet count, seeding readings for any outlet not yet present.
    pub fn set_outlet_count(&self, outlets: u16) {
        self.insert(Address::outlet_count(), Value::Integer(i64::from(outlets)));
        for index in (1..=outlets).filter_map(|i| OutletIndex::new(i).ok()) {
            let mut inner = self.inner.lock();
            let defaults = [
                (SensorKind::Label, Value::from(index.default_label())),
                (SensorKind::OperationalState, Value::from("on")),
                (SensorKind::Current, Value::Integer(0)),
                (SensorKind::Voltage, Value::Integer(230_000)),
                (SensorKind::ActivePower, Value::Integer(0)),
                (SensorKind::PowerFactor, Value::Integer(100)),
                (SensorKind::WattHours, Value::Integer(0)),
            ];
            for (kind, value) in defaults {
                inner.values.entry(kind.address(index)).or_insert(value);
            }
        }
    }

    /// Stores a value.
    pub fn insert(&self, address: Address, value: Value) {
        self.inner.lock().values.insert(address, value);
    }

    /// Stores a reading for one outlet sensor.
    pub fn set_outlet_value(&self, index: OutletIndex, kind: SensorKind, value: Value) {
        self.insert(kind.address(index), value);
    }

    /// Removes a value, making reads of it fail.
    pub fn remove(&self, address: &Address) {
        self.inner.lock().values.remove(address);
    }

    /// Returns the stored value of an address.
    #[must_use]
    pub fn value(&self, address: &Address) -> Option<Value> {
        self.inner.lock().values.get(address).cloned()
    }

    /// Queues values returned by the next reads of `address`, oldest first.
    pub fn script(&self, address: Address, values: impl IntoIterator<Item = Value>) {
        self.inner
            .lock()
            .scripted
            .entry(address)
            .or_default()
            .extend(values);
    }

    /// Changes how set requests are answered.
    pub fn set_behavior(&self, behavior: SetBehavior) {
        self.inner.lock().set_behavior = behavior;
    }

    /// Makes every request fail as if the device were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Fails any get whose address list matches `predicate`.
    pub fn fail_gets_when<F>(&self, predicate: F)
    where
        F: Fn(&[Address]) -> bool + Send + Sync + 'static,
    {
        self.inner.lock().fail_when = Some(Arc::new(predicate));
    }

    /// Removes a predicate installed with [`fail_gets_when`](Self::fail_gets_when).
    pub fn clear_failures(&self) {
        self.inner.lock().fail_when = None;
    }

    /// Number of get requests received.
    #[must_use]
    pub fn get_calls(&self) -> usize {
        self.inner.lock().get_calls
    }

    /// Number of set requests received.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.inner.lock().set_calls
    }

    /// Every set request received, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(Address, Value)> {
        self.inner.lock().writes.clone()
    }

    fn read(&self, addresses: &[Address]) -> Result<Vec<Value>, ProtocolError> {
        let mut inner = self.inner.lock();
        inner.get_calls += 1;

        if inner.offline {
            return Err(ProtocolError::Timeout(5000));
        }
        if inner.fail_when.as_ref().is_some_and(|fail| fail(addresses)) {
            return Err(ProtocolError::ConnectionFailed(
                "injected failure".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(addresses.len());
        for address in addresses {
            let scripted = inner
                .scripted
                .get_mut(address)
                .and_then(VecDeque::pop_front);
            let value = match scripted {
                Some(value) => value,
                None => inner
                    .values
                    .get(address)
                    .cloned()
                    .ok_or_else(|| ProtocolError::Rejected {
                        address: address.to_string(),
                    })?,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn write(&self, address: &Address, value: Value) -> Result<Value, ProtocolError> {
        let mut inner = self.inner.lock();
        inner.set_calls += 1;
        inner.writes.push((address.clone(), value.clone()));

        if inner.offline {
            return Err(ProtocolError::Timeout(5000));
        }

        match inner.set_behavior.clone() {
            SetBehavior::Apply => {
                inner.values.insert(address.clone(), value.clone());
                Ok(value)
            }
            SetBehavior::EchoOnly => Ok(value),
            SetBehavior::Answer(accepted) => {
                inner.values.insert(address.clone(), value);
                Ok(accepted)
            }
            SetBehavior::Reject => Err(ProtocolError::Rejected {
                address: address.to_string(),
            }),
        }
    }
}

impl Transport for MemoryTransport {
    async fn get(&self, addresses: &[Address]) -> Result<Vec<Value>, ProtocolError> {
        tracing::trace!(count = addresses.len(), "In-memory get");
        self.read(addresses)
    }

    async fn set(&self, address: &Address, value: Value) -> Result<Value, ProtocolError> {
        tracing::trace!(address = %address, value = %value, "In-memory set");
        self.write(address, value)
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryTransport")
            .field("values", &inner.values.len())
            .field("offline", &inner.offline)
            .field("set_behavior", &inner.set_behavior)
            .finish_non_exhaustive()
    }
}
