// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `raritan_pdu` library.
//!
//! Transport failures ([`ProtocolError`]) are never fatal: a failed poll
//! leaves the cached model untouched and the caller retries on the next
//! cycle. Index errors ([`DeviceError::OutletOutOfRange`]) are propagated
//! to the caller as-is.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// The transport failed to reach the device or returned an unusable answer.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A value returned by the device could not be interpreted.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred during device operations.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

impl Error {
    /// Returns `true` if this error came from the transport layer.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },

    /// An operational state string or code was not recognised.
    #[error("invalid operational state: {0}")]
    InvalidOperationalState(String),

    /// A polling interval was zero.
    #[error("{0} must be greater than zero")]
    ZeroInterval(String),

    /// The operational state cannot be requested from the device.
    #[error("operational state {0} cannot be set")]
    NotSettable(String),
}

/// Errors raised by a [`Transport`](crate::protocol::Transport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Connection to the device failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device refused a get or set for the given address.
    #[error("request rejected for {address}")]
    Rejected {
        /// The address the device complained about.
        address: String,
    },

    /// The device answered with a different number of values than requested.
    #[error("expected {expected} values, got {actual}")]
    UnexpectedResultCount {
        /// Number of addresses requested.
        expected: usize,
        /// Number of values received.
        actual: usize,
    },
}

/// Errors related to interpreting device values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// Errors related to device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The requested outlet does not exist on the device.
    #[error("outlet {index} is out of range [1, {count}]")]
    OutletOutOfRange {
        /// The 1-based index that was requested.
        index: u16,
        /// Number of outlets the device currently reports.
        count: u16,
    },

    /// The device could not be authenticated or reached during setup.
    #[error("device not ready: {0}")]
    NotReady(String),

    /// The restored energy seed was already applied to this outlet.
    #[error("energy seed already applied to outlet {index}")]
    EnergyAlreadyInitialized {
        /// The 1-based outlet index.
        index: u16,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
