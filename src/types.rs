use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

/// Identifier of a compute node (the key of a `[node.<id>]` table).
pub type NodeId = String;

/// Identifier of a submitted job.
pub type JobId = String;

/// Identifier of a workflow instance.
pub type InstanceId = String;

/// Scheduling priority in the range `0.0..=10.0`; higher runs first.
///
/// In config it may be given either as a named level or as a number:
///
/// ```toml
/// priority = "high"
/// priority = 6.5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Priority(f64);

impl Priority {
    pub const LOWEST: Priority = Priority(0.0);
    pub const LOW: Priority = Priority(2.5);
    pub const NORMAL: Priority = Priority(5.0);
    pub const HIGH: Priority = Priority(7.5);
    pub const HIGHEST: Priority = Priority(10.0);

    /// Build a priority from a raw value, rejecting anything outside `0..=10`.
    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && (0.0..=10.0).contains(&value) {
            Ok(Priority(value))
        } else {
            Err(format!("priority must be within 0..=10 (got {value})"))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Total order over priorities (values are always finite).
    pub fn cmp_value(&self, other: &Priority) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            v if v == Priority::LOWEST.0 => "lowest",
            v if v == Priority::LOW.0 => "low",
            v if v == Priority::NORMAL.0 => "normal",
            v if v == Priority::HIGH.0 => "high",
            v if v == Priority::HIGHEST.0 => "highest",
            v => return write!(f, "{v}"),
        };
        f.write_str(name)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lowest" => Ok(Priority::LOWEST),
            "low" => Ok(Priority::LOW),
            "normal" | "medium" => Ok(Priority::NORMAL),
            "high" => Ok(Priority::HIGH),
            "highest" => Ok(Priority::HIGHEST),
            other => other
                .parse::<f64>()
                .map_err(|_| {
                    format!(
                        "invalid priority: {other} (expected lowest, low, normal, high, highest or a number)"
                    )
                })
                .and_then(Priority::new),
        }
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Name(String),
            Value(f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Name(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Value(v) => Priority::new(v).map_err(serde::de::Error::custom),
        }
    }
}
