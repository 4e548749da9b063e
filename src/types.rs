//! Common types used throughout govsync
//!
//! This module contains shared type definitions, type aliases,
//! and the small enums that describe a dataset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// Generic key-value map with string keys and JSON values
pub type ValueMap = HashMap<String, JsonValue>;

// ============================================================================
// Phase
// ============================================================================

/// Ordering/grouping tag used to run a subset of datasets.
///
/// Phases are only a filter; no ordering or dependency is enforced between them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Phase1,
    Phase1b,
    Phase2,
    Phase3,
}

impl Phase {
    /// All phases in order
    pub const ALL: [Phase; 4] = [Phase::Phase1, Phase::Phase1b, Phase::Phase2, Phase::Phase3];

    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Phase1 => "phase1",
            Phase::Phase1b => "phase1b",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "phase1" => Ok(Phase::Phase1),
            "1b" | "phase1b" => Ok(Phase::Phase1b),
            "2" | "phase2" => Ok(Phase::Phase2),
            "3" | "phase3" => Ok(Phase::Phase3),
            other => Err(format!(
                "unknown phase '{other}' (expected one of 1, 1b, 2, 3)"
            )),
        }
    }
}

// ============================================================================
// Cadence
// ============================================================================

/// Nominal refresh frequency of a dataset (informational)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Cadence {
    /// Canonical lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
            Cadence::Quarterly => "quarterly",
            Cadence::Annual => "annual",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Backoff strategy for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Fixed delay between retries
    Constant,
    /// Linearly increasing delay
    Linear,
    /// Exponentially increasing delay
    #[default]
    Exponential,
}
