// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background polling of a [`Pdu`].
//!
//! [`Poller::spawn`] starts a task that runs [`Pdu::update_data`] every
//! `polling_interval` and publishes a [`PduSnapshot`] on a watch channel
//! after every cycle, successful or not. Failed cycles are logged by the
//! device model and the previous snapshot is republished unchanged.
//!
//! # Examples
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
//!     pdu.connect().await?;
//!
//!     let poller = Poller::spawn(Arc::clone(&pdu));
//!     let mut snapshots = poller.subscribe();
//!
//!     pdu.power_off(1).await?;
//!     poller.request_refresh();
//!
//!     snapshots.changed().await.ok();
//!     println!("{:?}", snapshots.borrow().outlet(1));
//!
//!     poller.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::MIN_POLL_INTERVAL;
use crate::pdu::{Pdu, PduSnapshot};
use crate::protocol::Transport;

/// Spawns polling tasks.
#[derive(Debug, Clone, Copy)]
pub struct Poller;

impl Poller {
    /// Starts polling `pdu` at its configured interval.
    ///
    /// The first cycle runs immediately. Must be called within a tokio runtime.
    pub fn spawn<T>(pdu: Arc<Pdu<T>>) -> PollerHandle
    where
        T: Transport + 'static,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(pdu.snapshot());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let refresh = Arc::new(Notify::new());

        let task = tokio::spawn(run(pdu, snapshot_tx, shutdown_rx, Arc::clone(&refresh)));

        PollerHandle {
            snapshots: snapshot_rx,
            refresh,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

async fn run<T: Transport>(
    pdu: Arc<Pdu<T>>,
    snapshots: watch::Sender<PduSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
    refresh: Arc<Notify>,
) {
    // `interval` panics on a zero period; the field is public.
    let period = pdu.config().polling_interval.max(MIN_POLL_INTERVAL);
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(
        host = %pdu.config().connection.host,
        interval = ?period,
        "Starting poller"
    );

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
            () = refresh.notified() => {
                tracing::debug!(host = %pdu.config().connection.host, "Refresh requested");
                interval.reset();
            }
        }

        // Failures are already logged at warn by the device model.
        if let Err(e) = pdu.update_data().await {
            tracing::trace!(error = %e, "Poll cycle failed");
        }
        snapshots.send_replace(pdu.snapshot());
    }

    tracing::debug!(host = %pdu.config().connection.host, "Poller stopped");
}

/// Handle to a running poller.
///
/// Dropping the handle without calling [`shutdown`](Self::shutdown) stops
/// the task at its next wake-up.
#[derive(Debug)]
pub struct PollerHandle {
    snapshots: watch::Receiver<PduSnapshot>,
    refresh: Arc<Notify>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Creates a receiver that sees every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PduSnapshot> {
        self.snapshots.clone()
    }

    /// Returns the most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> PduSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Runs a poll cycle as soon as possible instead of waiting for the next
    /// tick. Requests made while a cycle is running collapse into one.
    pub fn request_refresh(&self) {
        self.refresh.notify_one();
    }

    /// Stops the poller and waits for the in-flight cycle, if any, to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Poller task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{ConnectionConfig, PduConfig};
    use crate::protocol::MemoryTransport;

    fn pdu(transport: &MemoryTransport) -> Arc<Pdu<MemoryTransport>> {
        let config = PduConfig::new(ConnectionConfig::new("10.0.0.5"))
            .with_polling_interval(Duration::from_secs(5))
            .unwrap();
        Arc::new(Pdu::new(config, transport.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn first_cycle_runs_immediately() {
        let transport = MemoryTransport::dominion_px(2, false);
        let poller = Poller::spawn(pdu(&transport));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().outlets.len(), 2);

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval() {
        let transport = MemoryTransport::dominion_px(1, false);
        let poller = Poller::spawn(pdu(&transport));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        rx.changed().await.unwrap();
        rx.changed().await.unwrap();

        // Two requests per cycle.
        assert_eq!(transport.get_calls(), 6);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_skips_the_wait() {
        let transport = MemoryTransport::dominion_px(1, false);
        let poller = Poller::spawn(pdu(&transport));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        let start = tokio::time::Instant::now();
        poller.request_refresh();
        rx.changed().await.unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_republishes_last_snapshot() {
        let transport = MemoryTransport::dominion_px(1, false);
        let poller = Poller::spawn(pdu(&transport));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();
        let before = rx.borrow_and_update().clone();

        transport.set_offline(true);
        rx.changed().await.unwrap();

        assert_eq!(*rx.borrow(), before);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_field_still_polls() {
        let transport = MemoryTransport::dominion_px(1, false);
        let mut config = PduConfig::new(ConnectionConfig::new("10.0.0.5"));
        config.polling_interval = Duration::ZERO;
        let poller = Poller::spawn(Arc::new(Pdu::new(config, transport.clone())));
        let mut rx = poller.subscribe();

        rx.changed().await.unwrap();
        rx.changed().await.unwrap();

        assert!(transport.get_calls() >= 4);
        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let transport = MemoryTransport::dominion_px(1, false);
        let poller = Poller::spawn(pdu(&transport));
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();

        poller.shutdown().await;
        let calls = transport.get_calls();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(transport.get_calls(), calls);
        assert!(rx.changed().await.is_err());
    }
}
