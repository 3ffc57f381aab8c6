//! Freshness classification
//!
//! A one-character code derived from an "active" flag and a "last seen"
//! timestamp relative to now.

use std::fmt;

use chrono::{DateTime, Utc};

/// Freshness band of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Seen within the fresh band
    Fresh,
    /// Seen within the aging band
    Aging,
    /// Seen before the aging band
    Stale,
    /// Inactive, or no usable timestamp
    Inactive,
    /// Active and timestamped but outside every band
    Error,
}

impl Freshness {
    /// Classify an age against the bands
    pub fn classify(
        active: bool,
        last_seen: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        fresh_seconds: i64,
        aging_seconds: i64,
    ) -> Self {
        let Some(last_seen) = last_seen.filter(|_| active) else {
            return Freshness::Inactive;
        };

        let age = (now - last_seen).num_seconds();
        if age <= fresh_seconds {
            Freshness::Fresh
        } else if age <= aging_seconds {
            Freshness::Aging
        } else if age > aging_seconds {
            Freshness::Stale
        } else {
            Freshness::Error
        }
    }

    /// One-character code
    pub fn code(&self) -> char {
        match self {
            Freshness::Fresh => 'F',
            Freshness::Aging => 'A',
            Freshness::Stale => 'S',
            Freshness::Inactive => 'I',
            Freshness::Error => 'E',
        }
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
