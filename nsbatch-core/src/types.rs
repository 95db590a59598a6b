//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Namespace identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct NamespaceId(u32);

impl NamespaceId {
    /// Create from raw number
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Get raw value
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NamespaceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Contiguous, end-exclusive block of namespace IDs
///
/// A range is the unit of parallel work: one worker processes every ID in
/// it, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct IdRange {
    start: u32,
    end: u32,
}

impl IdRange {
    /// Create a new range `[start, end)`
    ///
    /// # Errors
    /// Returns error if `start > end`
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_range(format!(
                "start {start} is after end {end}"
            )));
        }

        Ok(Self { start, end })
    }

    /// First ID in the range
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// One past the last ID in the range
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Number of IDs covered
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the range covers no IDs
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if an ID falls inside the range
    #[must_use]
    pub const fn contains(&self, id: NamespaceId) -> bool {
        id.as_raw() >= self.start && id.as_raw() < self.end
    }

    /// Check if two ranges share at least one ID
    #[must_use]
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
    }

    /// Iterate over the IDs in increasing order
    pub fn ids(&self) -> impl Iterator<Item = NamespaceId> + use<> {
        (self.start..self.end).map(NamespaceId::from_raw)
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Parses `LO..HI`
impl FromStr for IdRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (lo, hi) = s
            .split_once("..")
            .ok_or_else(|| Error::invalid_range(format!("expected LO..HI, got '{s}'")))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| Error::invalid_range(format!("bad bound '{part}' in '{s}': {e}")))
        };

        Self::new(parse(lo)?, parse(hi)?)
    }
}

impl TryFrom<(u32, u32)> for IdRange {
    type Error = Error;

    fn try_from((start, end): (u32, u32)) -> Result<Self> {
        Self::new(start, end)
    }
}

impl From<IdRange> for (u32, u32) {
    fn from(range: IdRange) -> Self {
        (range.start, range.end)
    }
}

/// What a batch run does to the namespaces of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Create namespaces and their interfaces
    Create,
    /// Delete namespaces and their interfaces
    Delete,
    /// Report which namespaces exist, change nothing
    Status,
}

impl Mode {
    /// Check if this mode changes kernel state
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(self, Self::Create | Self::Delete)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
            Self::Status => write!(f, "status"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            "status" => Ok(Self::Status),
            other => Err(Error::invalid_config(format!("unknown mode '{other}'"))),
        }
    }
}
