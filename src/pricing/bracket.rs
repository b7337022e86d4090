//! Age brackets ("faixas etárias") and their label format
//!
//! Labels are either a closed inclusive range "<min>-<max>" or an open-ended
//! top bracket "<min>+".

use serde::Serialize;
use std::fmt;

use crate::error::PricingError;

/// Numeric range described by a bracket label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AgeRange {
    /// Inclusive on both ends
    Closed { min: u32, max: u32 },
    /// min and above
    Open { min: u32 },
}

impl AgeRange {
    /// Parse a stored bracket label
    ///
    /// Whitespace around the numbers is tolerated ("29 - 33", " 59+ ").
    /// Anything else is a data-integrity error.
    pub fn parse(label: &str) -> Result<Self, PricingError> {
        let malformed = |reason| PricingError::MalformedLabel {
            label: label.to_string(),
            reason,
        };

        let trimmed = label.trim();
        if trimmed.is_empty() {
            return Err(malformed("empty label"));
        }

        if let Some(min) = trimmed.strip_suffix('+') {
            let min = parse_bound(min).ok_or_else(|| malformed("open bracket lower bound is not a number"))?;
            return Ok(AgeRange::Open { min });
        }

        let (min, max) = trimmed
            .split_once('-')
            .ok_or_else(|| malformed("expected \"<min>-<max>\" or \"<min>+\""))?;
        let min = parse_bound(min).ok_or_else(|| malformed("lower bound is not a number"))?;
        let max = parse_bound(max).ok_or_else(|| malformed("upper bound is not a number"))?;

        if min > max {
            return Err(malformed("lower bound exceeds upper bound"));
        }

        Ok(AgeRange::Closed { min, max })
    }

    pub fn contains(&self, age: u32) -> bool {
        match *self {
            AgeRange::Closed { min, max } => age >= min && age <= max,
            AgeRange::Open { min } => age >= min,
        }
    }

    pub fn lower_bound(&self) -> u32 {
        match *self {
            AgeRange::Closed { min, .. } | AgeRange::Open { min } => min,
        }
    }

    /// None for the open-ended bracket
    pub fn upper_bound(&self) -> Option<u32> {
        match *self {
            AgeRange::Closed { max, .. } => Some(max),
            AgeRange::Open { .. } => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, AgeRange::Open { .. })
    }

    /// True if any age falls in both ranges
    pub fn overlaps(&self, other: &AgeRange) -> bool {
        let self_max = self.upper_bound().unwrap_or(u32::MAX);
        let other_max = other.upper_bound().unwrap_or(u32::MAX);
        self.lower_bound() <= other_max && other.lower_bound() <= self_max
    }
}

impl fmt::Display for AgeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeRange::Closed { min, max } => write!(f, "{}-{}", min, max),
            AgeRange::Open { min } => write!(f, "{}+", min),
        }
    }
}

fn parse_bound(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// One priced bracket of a pricing table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingBracket {
    /// Owning table
    pub table_id: u64,

    /// Label exactly as stored (e.g. "29-33")
    pub label: String,

    /// Monthly premium for this bracket
    pub value: f64,

    /// Range parsed from the label
    #[serde(skip)]
    range: AgeRange,
}

impl PricingBracket {
    /// Build a bracket, parsing its label and checking the value
    pub fn new(table_id: u64, label: impl Into<String>, value: f64) -> Result<Self, PricingError> {
        let label = label.into();
        let range = AgeRange::parse(&label)?;

        if !value.is_finite() || value < 0.0 {
            return Err(PricingError::InvalidValue { table_id, label, value });
        }

        Ok(Self {
            table_id,
            label,
            value,
            range,
        })
    }

    pub fn range(&self) -> AgeRange {
        self.range
    }

    pub fn covers(&self, age: u32) -> bool {
        self.range.contains(age)
    }
}
