// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-then-confirm control of an outlet's power state.
//!
//! A control sequence moves through these phases:
//!
//! ```text
//! Idle -> Commanding -> Confirming -> Confirmed
//!                                  \-> TimedOut
//! ```
//!
//! - **Commanding**: one set of the outlet's operational state; the value
//!   the device reports back is what confirmation waits for.
//! - **Confirming**: the state is read every `poll_interval` until a read
//!   matches the accepted value.
//! - **TimedOut**: `timeout` elapsed since the command without a match. This
//!   is a terminal state, not an error; the last value read is still applied
//!   to the outlet and may be stale.
//!
//! Whichever way the sequence ends, the last value read is fed to the outlet
//! as a regular sensor update, so control actions take part in energy
//! integration just like scheduled polls.
//!
//! Dropping the future abandons the sequence; the device is left in
//! whatever state it reached.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::{ControlConfig, MIN_POLL_INTERVAL};
use crate::error::{Error, Result, ValueError};
use crate::protocol::{Transport, Value};
use crate::types::{OperationalState, OutletIndex, SensorKind};

/// Phase of a control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPhase {
    /// Not started.
    Idle,
    /// Set command in flight.
    Commanding,
    /// Waiting for the device to report the accepted state.
    Confirming,
    /// The device reported the accepted state.
    Confirmed,
    /// The device did not report the accepted state in time.
    TimedOut,
}

impl ControlPhase {
    /// Returns `true` for `Confirmed` and `TimedOut`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::TimedOut)
    }
}

impl fmt::Display for ControlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Commanding => "commanding",
            Self::Confirming => "confirming",
            Self::Confirmed => "confirmed",
            Self::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

/// Result of a finished control sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlOutcome {
    /// Outlet the command was sent to.
    pub outlet: OutletIndex,
    /// Requested state.
    pub target: OperationalState,
    /// Value the device reported when accepting the command.
    pub accepted: Value,
    /// Last value read during confirmation, if any read succeeded.
    pub last_read: Option<Value>,
    /// Terminal phase reached.
    pub phase: ControlPhase,
    /// Number of confirmation reads attempted.
    pub polls: u32,
    /// Time spent confirming.
    pub elapsed: Duration,
}

impl ControlOutcome {
    /// Returns `true` if the device confirmed the accepted state.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.phase == ControlPhase::Confirmed
    }

    /// Returns the last state read, if it could be interpreted.
    #[must_use]
    pub fn state(&self) -> Option<OperationalState> {
        self.last_read
            .as_ref()
            .and_then(|v| OperationalState::from_value(v).ok())
    }
}

/// Drives one control sequence against a transport.
pub(crate) struct ControlSequencer<'a, T: Transport> {
    outlet: OutletIndex,
    transport: &'a T,
    config: ControlConfig,
    phase: ControlPhase,
}

impl<'a, T: Transport> ControlSequencer<'a, T> {
    pub(crate) fn new(outlet: OutletIndex, transport: &'a T, config: ControlConfig) -> Self {
        Self {
            outlet,
            transport,
            config,
            phase: ControlPhase::Idle,
        }
    }

    /// Runs the sequence to a terminal phase.
    ///
    /// `apply` receives the last value read, once, after the sequence ends.
    /// It is not called if the set command fails or no read ever succeeded.
    pub(crate) async fn run<F>(mut self, target: OperationalState, apply: F) -> Result<ControlOutcome>
    where
        F: FnOnce(Value),
    {
        if !target.is_settable() {
            return Err(ValueError::NotSettable(target.to_string()).into());
        }

        let address = SensorKind::OperationalState.address(self.outlet);

        self.enter(ControlPhase::Commanding);
        let accepted = self
            .transport
            .set(&address, Value::from(target))
            .await
            .map_err(|e| {
                tracing::warn!(outlet = %self.outlet, target = %target, error = %e, "Power command failed");
                Error::Protocol(e)
            })?;
        let commanded_at = Instant::now();

        self.enter(ControlPhase::Confirming);
        let mut last_read = None;
        let mut polls = 0;
        loop {
            tokio::time::sleep(self.config.poll_interval.max(MIN_POLL_INTERVAL)).await;
            polls += 1;

            match self.transport.get_one(&address).await {
                Ok(value) => {
                    let matched = same_state(&value, &accepted);
                    last_read = Some(value);
                    if matched {
                        self.enter(ControlPhase::Confirmed);
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(outlet = %self.outlet, error = %e, "Confirmation read failed");
                }
            }

            if commanded_at.elapsed() >= self.config.timeout {
                self.enter(ControlPhase::TimedOut);
                break;
            }
        }

        let elapsed = commanded_at.elapsed();
        match &last_read {
            Some(value) => apply(value.clone()),
            None => tracing::warn!(outlet = %self.outlet, "No confirmation read succeeded"),
        }

        let outcome = ControlOutcome {
            outlet: self.outlet,
            target,
            accepted,
            last_read,
            phase: self.phase,
            polls,
            elapsed,
        };
        tracing::info!(
            outlet = %outcome.outlet,
            target = %outcome.target,
            phase = %outcome.phase,
            polls = outcome.polls,
            "Power command finished"
        );
        Ok(outcome)
    }

    fn enter(&mut self, phase: ControlPhase) {
        tracing::trace!(outlet = %self.outlet, from = %self.phase, to = %phase, "Control phase");
        self.phase = phase;
    }
}

/// Compares two state values, tolerating name/code differences.
fn same_state(read: &Value, expected: &Value) -> bool {
    match (
        OperationalState::from_value(read),
        OperationalState::from_value(expected),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => read == expected,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::protocol::{MemoryTransport, SetBehavior};

    fn index() -> OutletIndex {
        OutletIndex::new(1).unwrap()
    }

    fn state_address() -> crate::protocol::Address {
        SensorKind::OperationalState.address(index())
    }

    #[tokio::test(start_paused = true)]
    async fn confirms_on_first_read() {
        let transport = MemoryTransport::dominion_px(1, false);
        let applied = RefCell::new(None);

        let outcome = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::Off, |v| *applied.borrow_mut() = Some(v))
            .await
            .unwrap();

        assert_eq!(outcome.phase, ControlPhase::Confirmed);
        assert_eq!(outcome.polls, 1);
        assert!(outcome.elapsed >= Duration::from_secs(1));
        assert_eq!(outcome.state(), Some(OperationalState::Off));
        assert_eq!(applied.into_inner(), Some(Value::from("off")));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_seen_value() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::EchoOnly);
        let applied = RefCell::new(None);

        let outcome = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::Off, |v| *applied.borrow_mut() = Some(v))
            .await
            .unwrap();

        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert!(!outcome.is_confirmed());
        assert_eq!(outcome.polls, 10);
        assert!(outcome.elapsed >= Duration::from_secs(10));
        assert!(outcome.elapsed < Duration::from_secs(11));
        assert_eq!(outcome.state(), Some(OperationalState::On));
        assert_eq!(applied.into_inner(), Some(Value::from("on")));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_accepted_value() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.script(
            state_address(),
            [Value::from("on"), Value::from("on"), Value::Integer(0)],
        );

        let outcome = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::Off, |_| {})
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.polls, 3);
        assert_eq!(outcome.last_read, Some(Value::Integer(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn compares_against_accepted_not_target() {
        let transport = MemoryTransport::dominion_px(1, false);
        // Device acknowledges a cycle request with "cycling" then settles on "on".
        transport.set_behavior(SetBehavior::Answer(Value::from("cycling")));
        transport.script(state_address(), [Value::from("off"), Value::from("cycling")]);

        let outcome = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::Cycling, |_| {})
            .await
            .unwrap();

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.accepted, Value::from("cycling"));
        assert_eq!(outcome.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reads_keep_polling() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::EchoOnly);
        transport.fail_gets_when(|_| true);
        let applied = RefCell::new(false);

        let outcome = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::On, |_| *applied.borrow_mut() = true)
            .await
            .unwrap();

        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert_eq!(outcome.last_read, None);
        assert_eq!(transport.get_calls(), 10);
        assert!(!applied.into_inner());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_timing() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::EchoOnly);
        let config = ControlConfig::default()
            .with_poll_interval(Duration::from_millis(250))
            .unwrap()
            .with_timeout(Duration::from_secs(2));

        let outcome = ControlSequencer::new(index(), &transport, config)
            .run(OperationalState::Off, |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert_eq!(outcome.polls, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_field_is_floored() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::EchoOnly);
        let mut config = ControlConfig::default().with_timeout(Duration::from_millis(10));
        config.poll_interval = Duration::ZERO;

        let outcome = ControlSequencer::new(index(), &transport, config)
            .run(OperationalState::Off, |_| {})
            .await
            .unwrap();

        assert_eq!(outcome.phase, ControlPhase::TimedOut);
        assert_eq!(outcome.polls, 10);
    }

    #[tokio::test]
    async fn rejected_command_is_an_error() {
        let transport = MemoryTransport::dominion_px(1, false);
        transport.set_behavior(SetBehavior::Reject);

        let err = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::On, |_| panic!("nothing to apply"))
            .await
            .unwrap_err();

        assert!(err.is_connectivity());
        assert_eq!(transport.get_calls(), 0);
    }

    #[tokio::test]
    async fn error_state_cannot_be_requested() {
        let transport = MemoryTransport::dominion_px(1, false);

        let err = ControlSequencer::new(index(), &transport, ControlConfig::default())
            .run(OperationalState::Error, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Value(ValueError::NotSettable(_))));
        assert_eq!(transport.set_calls(), 0);
    }

    #[test]
    fn same_state_tolerates_codes() {
        assert!(same_state(&Value::Integer(1), &Value::from("on")));
        assert!(!same_state(&Value::from("off"), &Value::from("on")));
        assert!(same_state(&Value::from("weird"), &Value::from("weird")));
    }
}
