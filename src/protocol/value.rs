// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Loosely typed values as reported by the management agent.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value read from or written to the device.
///
/// Agents report everything as text on the wire; [`Value::from_wire`]
/// recovers numbers from numeric-looking tokens and keeps the rest as text.
///
/// # Examples
///
/// ```
/// use raritan_pdu::protocol::Value;
///
/// assert_eq!(Value::from_wire("230"), Value::Integer(230));
/// assert_eq!(Value::from_wire("0.98"), Value::Float(0.98));
/// assert_eq!(Value::from_wire("on"), Value::Text("on".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Whole number.
    Integer(i64),
    /// Fractional number.
    Float(f64),
    /// Anything that is not a number.
    Text(String),
}

impl Value {
    /// Infers a typed value from its textual wire representation.
    #[must_use]
    pub fn from_wire(token: &str) -> Self {
        let token = token.trim();
        if let Ok(n) = token.parse::<i64>() {
            return Self::Integer(n);
        }
        if looks_decimal(token) {
            if let Ok(f) = token.parse::<f64>() {
                return Self::Float(f);
            }
        }
        Self::Text(token.to_string())
    }

    /// Returns the value as a float, parsing text if it holds a number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            // Device readings stay well within f64's exact integer range.
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(n) => Some(*n as f64),
            Self::Float(f) if f.is_finite() => Some(*f),
            Self::Float(_) => None,
            Self::Text(s) => match Self::from_wire(s) {
                Self::Text(_) => None,
                other => other.as_f64(),
            },
        }
    }

    /// Returns the value as an integer, if it is a whole number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

fn looks_decimal(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty()
        && digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
