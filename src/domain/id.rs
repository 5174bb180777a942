//! Identifier types for tasks
//!
//! ID Format:
//! - Position IDs: dotted, 1-based, dense (`1`, `2.1`, `2.1.3`). They describe
//!   where a task sits in the current tree and change whenever siblings are
//!   inserted or removed.
//! - Stable IDs: 7 lowercase base-36 characters (`000004k`). Assigned lazily,
//!   never recomputed and never reused within a document.
//!
//! Stable IDs are issued by [`StableIdGenerator`], which only ever counts up
//! from the highest value it has seen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of characters in a stable ID
pub const STABLE_ID_LEN: usize = 7;

/// Largest value representable by a stable ID (`zzzzzzz`)
pub const MAX_STABLE_VALUE: u64 = 78_364_164_095;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid position format: {0}")]
    InvalidPosition(String),

    #[error("Invalid stable ID format: expected 7 characters [a-z0-9], got '{0}'")]
    InvalidStableId(String),

    #[error("Stable ID space exhausted (all {} identifiers used)", MAX_STABLE_VALUE)]
    Exhausted,
}

/// Position of a task in the tree, e.g. `2.1`
///
/// Segments are 1-based; the last segment is the slot among siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PositionId {
    segments: Vec<u32>,
}

impl PositionId {
    /// Position of the `n`th (1-based) root task
    pub fn root(n: u32) -> Self {
        Self { segments: vec![n] }
    }

    /// Position of the `n`th (1-based) child under this position
    pub fn child(&self, n: u32) -> Self {
        let mut segments = self.segments.clone();
        segments.push(n);
        Self { segments }
    }

    /// Returns the parent position, or None for root tasks
    pub fn parent(&self) -> Option<PositionId> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Iterates over ancestors, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = PositionId> {
        std::iter::successors(self.parent(), |p| p.parent())
    }

    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Number of levels (root tasks have depth 1)
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// The 1-based slot among siblings
    pub fn slot(&self) -> u32 {
        self.segments.last().copied().unwrap_or(1)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl PartialOrd for PositionId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Segment-wise numeric ordering: `2 < 2.1 < 10`
impl Ord for PositionId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl FromStr for PositionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdError::InvalidPosition(s.to_string()));
        }

        let segments: Result<Vec<u32>, _> = s
            .split('.')
            .map(|part| {
                let well_formed = !part.is_empty()
                    && part.bytes().all(|b| b.is_ascii_digit())
                    && !part.starts_with('0');
                if !well_formed {
                    return Err(IdError::InvalidPosition(s.to_string()));
                }
                part.parse::<u32>()
                    .map_err(|_| IdError::InvalidPosition(s.to_string()))
            })
            .collect();

        Ok(Self {
            segments: segments?,
        })
    }
}

impl TryFrom<String> for PositionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PositionId> for String {
    fn from(id: PositionId) -> Self {
        id.to_string()
    }
}

/// Persistent task identity used by dependency edges
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StableId(String);

impl StableId {
    /// Encodes a numeric value as a zero-padded 7-character ID
    pub fn from_value(mut value: u64) -> Result<Self, IdError> {
        if value > MAX_STABLE_VALUE {
            return Err(IdError::Exhausted);
        }

        let mut buf = [b'0'; STABLE_ID_LEN];
        for slot in buf.iter_mut().rev() {
            *slot = BASE36_DIGITS[(value % 36) as usize];
            value /= 36;
        }

        // Only ASCII digits and letters were written
        Ok(Self(buf.iter().map(|&b| b as char).collect()))
    }

    /// Numeric value under base-36 ordering
    pub fn value(&self) -> u64 {
        self.0.bytes().fold(0u64, |acc, b| {
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                _ => b - b'a' + 10,
            };
            acc * 36 + u64::from(digit)
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the string has the stable ID shape (`^[a-z0-9]{7}$`)
    pub fn is_valid(s: &str) -> bool {
        s.len() == STABLE_ID_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StableId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !Self::is_valid(s) {
            return Err(IdError::InvalidStableId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for StableId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StableId> for String {
    fn from(id: StableId) -> Self {
        id.0
    }
}

/// Issues stable IDs strictly greater than every ID it has seen
///
/// Seed it with every ID already in the document plus the document's
/// high-water mark; IDs of removed tasks are then never handed out again.
#[derive(Debug, Clone, Default)]
pub struct StableIdGenerator {
    high_water: u64,
}

impl StableIdGenerator {
    /// Creates a generator seeded from already-known IDs
    pub fn new<'a>(known: impl IntoIterator<Item = &'a StableId>) -> Self {
        let high_water = known.into_iter().map(StableId::value).max().unwrap_or(0);
        Self { high_water }
    }

    /// Generates the next ID
    pub fn generate(&mut self) -> Result<StableId, IdError> {
        let next = self.high_water.checked_add(1).ok_or(IdError::Exhausted)?;
        let id = StableId::from_value(next)?;
        self.high_water = next;
        Ok(id)
    }

    /// The highest ID seen or issued so far
    pub fn high_water(&self) -> Option<StableId> {
        if self.high_water == 0 {
            return None;
        }
        StableId::from_value(self.high_water).ok()
    }
}
