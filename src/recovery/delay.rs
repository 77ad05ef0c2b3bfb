// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery delay input and countdown formatting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ValidationError;

/// Default floor for the recovery timelock: 6 hours.
pub const DEFAULT_MINIMUM_DELAY_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Secs,
    Mins,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Secs => 1,
            TimeUnit::Mins => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
        }
    }

    fn label(self, plural: bool) -> &'static str {
        match (self, plural) {
            (TimeUnit::Secs, false) => "Sec",
            (TimeUnit::Secs, true) => "Secs",
            (TimeUnit::Mins, false) => "Min",
            (TimeUnit::Mins, true) => "Mins",
            (TimeUnit::Hours, false) => "Hour",
            (TimeUnit::Hours, true) => "Hours",
            (TimeUnit::Days, false) => "Day",
            (TimeUnit::Days, true) => "Days",
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => Ok(TimeUnit::Secs),
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(TimeUnit::Mins),
            "h" | "hour" | "hours" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" => Ok(TimeUnit::Days),
            other => Err(format!("unknown time unit `{other}`")),
        }
    }
}

/// A delay as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryDelay {
    pub value: u64,
    pub unit: TimeUnit,
}

impl RecoveryDelay {
    pub fn new(value: u64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn as_secs(&self) -> Result<u64, ValidationError> {
        self.value
            .checked_mul(self.unit.seconds())
            .ok_or_else(|| ValidationError::DelayOverflow(self.to_string()))
    }

    /// Seconds, rejecting anything shorter than `minimum_secs`.
    pub fn validated_secs(&self, minimum_secs: u64) -> Result<u64, ValidationError> {
        let secs = self.as_secs()?;
        ensure_minimum_delay(secs, minimum_secs)?;
        Ok(secs)
    }
}

impl fmt::Display for RecoveryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.label(self.value != 1))
    }
}

pub fn ensure_minimum_delay(delay_secs: u64, minimum_secs: u64) -> Result<(), ValidationError> {
    if delay_secs < minimum_secs {
        return Err(ValidationError::DelayBelowMinimum {
            requested_secs: delay_secs,
            minimum_secs,
        });
    }
    Ok(())
}

/// Render a remaining duration as e.g. `"1 Day, 2 Hours and 5 Secs"`.
///
/// Zero-valued components are skipped; zero itself renders as `"0 Secs"`.
pub fn format_countdown(total_secs: u64) -> String {
    let mut rest = total_secs;
    let mut parts = Vec::with_capacity(4);
    for unit in [TimeUnit::Days, TimeUnit::Hours, TimeUnit::Mins, TimeUnit::Secs] {
        let amount = rest / unit.seconds();
        rest %= unit.seconds();
        if amount > 0 {
            parts.push(format!("{amount} {}", unit.label(amount != 1)));
        }
    }

    match parts.len() {
        0 => "0 Secs".to_string(),
        1 => parts.remove(0),
        n => {
            let last = parts.remove(n - 1);
            format!("{} and {last}", parts.join(", "))
        }
    }
}
