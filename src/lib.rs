// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `raritan_pdu` - Monitoring and outlet control for Raritan Dominion PX PDUs.
//!
//! This library keeps a host-side model of a power distribution unit: its
//! identity, its outlets and their sensor readings. It refreshes that model
//! with batched polls and switches outlets with a command-then-confirm
//! sequence.
//!
//! # Supported Features
//!
//! - **Batched polling**: two requests per cycle regardless of outlet count
//! - **Energy accounting**: delivered energy integrated from active power
//!   with a left Riemann sum, seeded from a restored total
//! - **Outlet control**: on, off and power cycle, confirmed by read-back
//! - **Outlet labels**: rename outlets on the device
//! - **Background polling**: a tokio task publishing snapshots on a watch channel
//!
//! The management protocol itself is not implemented here. Hosts plug in a
//! client through the [`Transport`](protocol::Transport) trait;
//! [`MemoryTransport`](protocol::MemoryTransport) is an in-memory device
//! for tests and dry runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use raritan_pdu::config::{ConnectionConfig, PduConfig};
//! use raritan_pdu::protocol::MemoryTransport;
//! use raritan_pdu::{Pdu, Poller};
//!
//! #[tokio::main]
//! async fn main() -> raritan_pdu::Result<()> {
//!     let config = PduConfig::new(ConnectionConfig::new("192.168.40.14"));
//!     let pdu = Arc::new(Pdu::new(config, MemoryTransport::dominion_px(8, true)));
//!
//!     // Authenticate and run the first poll
//!     pdu.connect().await?;
//!
//!     // Seed outlet 1 with the total persisted by the host
//!     pdu.restore_energy(1, 12_500.0)?;
//!
//!     // Keep the model fresh in the background
//!     let poller = Poller::spawn(Arc::clone(&pdu));
//!
//!     // Switch an outlet and wait for the device to confirm
//!     let outcome = pdu.power_off(3).await?;
//!     println!("outlet 3: {} after {} polls", outcome.phase, outcome.polls);
//!     poller.request_refresh();
//!
//!     for (index, outlet) in &poller.snapshot().outlets {
//!         println!("{index}: {} {:.1} Wh", outlet.name, outlet.energy_delivered);
//!     }
//!
//!     poller.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Failure Handling
//!
//! A failed poll never changes the model: the previous snapshot keeps being
//! served and the next cycle tries again. A control sequence that is not
//! confirmed within its timeout ends in
//! [`ControlPhase::TimedOut`](control::ControlPhase::TimedOut), which is a
//! result rather than an error.

pub mod config;
pub mod control;
pub mod energy;
pub mod error;
pub mod outlet;
pub mod pdu;
pub mod poller;
pub mod protocol;
pub mod types;

pub use config::{ConnectionConfig, ControlConfig, PduConfig};
pub use control::{ControlOutcome, ControlPhase};
pub use energy::EnergyUnit;
pub use error::{DeviceError, Error, ParseError, ProtocolError, Result, ValueError};
pub use outlet::{Outlet, OutletSnapshot};
pub use pdu::{DeviceInfo, Pdu, PduSnapshot};
pub use poller::{Poller, PollerHandle};
pub use protocol::{Address, MemoryTransport, SetBehavior, Transport, Value};
pub use types::{OperationalState, OutletIndex, OutletSensors, SensorKind, SensorUpdate};
