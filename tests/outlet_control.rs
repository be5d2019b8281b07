// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for outlet control and background polling.

use std::sync::Arc;
use std::time::Duration;

use raritan_pdu::protocol::{MemoryTransport, SetBehavior, Value};
use raritan_pdu::types::{OperationalState, OutletIndex, SensorKind};
use raritan_pdu::{
    ConnectionConfig, ControlConfig, ControlPhase, DeviceError, Error, Pdu, PduConfig, Poller,
};
use tokio::time::Instant;

fn outlet(i: u16) -> OutletIndex {
    OutletIndex::new(i).unwrap()
}

async fn connected(outlets: u16) -> (Pdu<MemoryTransport>, MemoryTransport) {
    let transport = MemoryTransport::dominion_px(outlets, false);
    let config = PduConfig::new(ConnectionConfig::new("192.168.40.14"));
    let pdu = Pdu::new(config, transport.clone());
    pdu.connect().await.unwrap();
    (pdu, transport)
}

// ============================================================================
// Control sequence
// ============================================================================

mod control {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn power_off_confirms_on_first_tick() {
        let (pdu, transport) = connected(2).await;

        let outcome = pdu.power_off(2).await.unwrap();

        assert_eq!(outcome.phase, ControlPhase::Confirmed);
        assert_eq!(outcome.polls, 1);
        assert_eq!(pdu.outlet(2).unwrap().operational_state(), Some(OperationalState::Off));
        assert_eq!(pdu.outlet(1).unwrap().operational_state(), Some(OperationalState::On));
        assert_eq!(
            transport.writes(),
            vec![(
                SensorKind::OperationalState.address(outlet(2)),
                Value::from("off")
            )]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn power_on_and_cycle_send_device_names() {
        let (pdu, transport) = connected(1).await;

        pdu.power_on(1).await.unwrap();
        pdu.power_cycle(1).await.unwrap();

        let values: Vec<Value> = transport.writes().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![Value::from("on"), Value::from("cycling")]);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_command_times_out() {
        let (pdu, transport) = connected(1).await;
        transport.set_behavior(SetBehavior::EchoOnly);
        let start = Instant::now();

        let outcome = pdu.power_off(1).await.unwrap();

        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert_eq!(outcome.last_read, Some(Value::from("on")));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
        // The last value read is applied even though it is stale.
        assert!(pdu.outlet(1).unwrap().is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timing_is_used() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::EchoOnly);
        let config = PduConfig::new(ConnectionConfig::new("pdu.lan")).with_control(
            ControlConfig::default()
                .with_poll_interval(Duration::from_millis(500))
                .unwrap()
                .with_timeout(Duration::from_secs(3)),
        );
        let pdu = Pdu::new(config, transport);
        pdu.connect().await.unwrap();

        // Outlets start on, so an unconfirmed off never matches.
        let outcome = pdu.power_off(1).await.unwrap();
        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert_eq!(outcome.polls, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn control_update_feeds_energy_integration() {
        let (pdu, transport) = connected(1).await;
        transport.set_outlet_value(outlet(1), SensorKind::ActivePower, Value::Integer(360));
        pdu.update_data().await.unwrap();

        // Confirmation arrives one second after the poll.
        pdu.power_off(1).await.unwrap();

        let energy = pdu.outlet(1).unwrap().energy_delivered();
        assert!((energy - 0.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rejected_command_changes_nothing() {
        let (pdu, transport) = connected(1).await;
        transport.set_behavior(SetBehavior::Reject);
        let before = pdu.snapshot();

        let err = pdu.power_off(1).await.unwrap_err();

        assert!(err.is_connectivity());
        assert_eq!(pdu.snapshot(), before);
    }

    #[tokio::test]
    async fn out_of_range_index() {
        let (pdu, transport) = connected(2).await;

        for index in [0, 3] {
            let err = pdu.power_on(index).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Device(DeviceError::OutletOutOfRange { count: 2, .. })
            ));
        }
        assert_eq!(transport.set_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn same_outlet_commands_queue() {
        let (pdu, transport) = connected(1).await;
        let target = pdu.outlet(1).unwrap();
        let start = Instant::now();

        let (a, b) = tokio::join!(target.power_off(), target.power_on());

        assert!(a.unwrap().is_confirmed());
        assert!(b.unwrap().is_confirmed());
        // Each sequence waited one full tick after its own command.
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(transport.set_calls(), 2);
        assert!(target.is_on());
    }

    #[tokio::test(start_paused = true)]
    async fn control_does_not_block_polling() {
        let (pdu, transport) = connected(2).await;
        transport.set_behavior(SetBehavior::EchoOnly);
        let start = Instant::now();

        let (outcome, polled_at) = tokio::join!(pdu.power_off(1), async {
            pdu.update_data().await.unwrap();
            Instant::now()
        });

        assert_eq!(outcome.unwrap().phase, ControlPhase::TimedOut);
        assert!(polled_at.duration_since(start) < Duration::from_secs(1));
    }
}

// ============================================================================
// Background polling
// ============================================================================

mod poller {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn refresh_after_control_publishes_new_state() {
        let (pdu, _) = connected(2).await;
        let pdu = Arc::new(pdu);
        let poller = Poller::spawn(Arc::clone(&pdu));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        pdu.power_off(2).await.unwrap();
        poller.request_refresh();
        rx.changed().await.unwrap();

        let snapshot = rx.borrow().clone();
        assert_eq!(
            snapshot.outlet(2).unwrap().sensors.operational_state,
            Some(OperationalState::Off)
        );
        assert!(snapshot.last_updated.is_some());
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn handle_snapshot_tracks_latest() {
        let (pdu, transport) = connected(1).await;
        let poller = Poller::spawn(Arc::new(pdu));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        transport.set_outlet_value(outlet(1), SensorKind::Label, Value::from("Router"));
        rx.changed().await.unwrap();

        assert_eq!(poller.snapshot().outlets[&1].name, "Outlet 1 Router");
        poller.shutdown().await;
    }
}
