// SPDX-License-Identifier: MPL-2.0

//! Simulated PDU example.
//!
//! Drives an in-memory Dominion PX through a few poll cycles: restores an
//! energy total, changes outlet loads, switches outlets and prints the
//! published snapshots.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example simulated_pdu -- [outlets] [cycles]
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example simulated_pdu -- 8 5
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use raritan_pdu::protocol::{MemoryTransport, Value};
use raritan_pdu::types::{OutletIndex, SensorKind};
use raritan_pdu::{ConnectionConfig, EnergyUnit, Pdu, PduConfig, PduSnapshot, Poller};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let outlets: u16 = args.get(1).map_or(Ok(4), |s| s.parse())?;
    let cycles: usize = args.get(2).map_or(Ok(3), |s| s.parse())?;

    let transport = MemoryTransport::dominion_px(outlets, true);
    let config = PduConfig::new(ConnectionConfig::new("simulated"))
        .with_polling_interval(Duration::from_secs(1))?;
    let pdu = Arc::new(Pdu::new(config, transport.clone()));

    println!("=== Raritan PDU Simulator ===");
    println!("Outlets: {outlets}");
    println!();

    pdu.connect().await?;
    println!("Connected to {}", pdu.name());

    // Pretend the host persisted 1.2 kWh for the first outlet.
    pdu.restore_energy(1, EnergyUnit::KiloWattHour.to_wh(1.2))?;

    let poller = Poller::spawn(Arc::clone(&pdu));
    let mut snapshots = poller.subscribe();

    for cycle in 0..cycles {
        for index in (1..=outlets).filter_map(|i| OutletIndex::new(i).ok()) {
            let watts = i64::from(index.value()) * 40 + i64::try_from(cycle)? * 10;
            transport.set_outlet_value(index, SensorKind::ActivePower, Value::Integer(watts));
            transport.set_outlet_value(index, SensorKind::Current, Value::Integer(watts * 1000 / 230));
        }

        snapshots.changed().await?;
        print_snapshot(&snapshots.borrow_and_update());
    }

    if outlets >= 2 {
        let outcome = pdu.power_off(2).await?;
        println!("Outlet 2 off: {} after {} polls", outcome.phase, outcome.polls);

        let accepted = pdu.set_label(2, "Spare").await?;
        println!("Outlet 2 renamed to {accepted:?}");
        poller.request_refresh();
        snapshots.changed().await?;
        print_snapshot(&snapshots.borrow_and_update());
    }

    poller.shutdown().await;
    Ok(())
}

fn print_snapshot(snapshot: &PduSnapshot) {
    println!();
    println!("{} (CPU {:?} °C)", snapshot.name, snapshot.info.cpu_temperature);
    for outlet in snapshot.outlets.values() {
        let state = outlet
            .sensors
            .operational_state
            .map_or("unknown", |s| s.as_str());
        println!(
            "  {:<20} {:>8} {:>7.1} W {:>10.3} Wh",
            outlet.name,
            state,
            outlet.sensors.active_power.unwrap_or_default(),
            outlet.energy_delivered,
        );
    }
}
