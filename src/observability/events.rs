//! Observable events in the harvest engine
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Configuration loaded
    ConfigLoaded,

    // Matching
    /// One expression evaluated against one record
    MatchEvaluated,
    /// Expression applied across a record set
    MatchApplied,
    /// Record-level evaluation failure degraded to "no match"
    MatchDegraded,

    // Indexes
    /// Index snapshot built
    IndexCreated,
    /// Index snapshot rebuilt
    IndexRebuilt,
    /// Index dropped
    IndexDropped,

    // Set transformations
    /// Records ingested
    RecordsAdded,
    /// Duplicate records collapsed
    DuplicatesRemoved,
    /// Unmatched records removed
    UnmatchedRemoved,
    /// Sequence field expanded into records
    RecordsUnwound,

    // Collection
    /// Two record sets joined
    RecordSetJoined,
    /// Record set renamed
    RecordSetRenamed,
    /// All record sets dropped
    RecordSetsPurged,

    // Dispatch
    /// Named operation applied
    OperationDispatched,
    /// Named operation failed
    OperationFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::MatchEvaluated => "MATCH_EVALUATED",
            Event::MatchApplied => "MATCH_APPLIED",
            Event::MatchDegraded => "MATCH_DEGRADED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexRebuilt => "INDEX_REBUILT",
            Event::IndexDropped => "INDEX_DROPPED",

            Event::RecordsAdded => "RECORDS_ADDED",
            Event::DuplicatesRemoved => "DUPLICATES_REMOVED",
            Event::UnmatchedRemoved => "UNMATCHED_REMOVED",
            Event::RecordsUnwound => "RECORDS_UNWOUND",

            Event::RecordSetJoined => "RECORDSET_JOINED",
            Event::RecordSetRenamed => "RECORDSET_RENAMED",
            Event::RecordSetsPurged => "RECORDSETS_PURGED",

            Event::OperationDispatched => "OPERATION_DISPATCHED",
            Event::OperationFailed => "OPERATION_FAILED",
        }
    }

    /// Returns true if this event reports a failure or degradation
    pub fn is_warning(&self) -> bool {
        matches!(self, Event::MatchDegraded | Event::OperationFailed)
    }

    /// Returns true if this event is emitted once per record
    pub fn is_per_record(&self) -> bool {
        matches!(self, Event::MatchEvaluated)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::ConfigLoaded,
            Event::MatchEvaluated,
            Event::MatchApplied,
            Event::MatchDegraded,
            Event::IndexCreated,
            Event::IndexRebuilt,
            Event::IndexDropped,
            Event::RecordsAdded,
            Event::DuplicatesRemoved,
            Event::UnmatchedRemoved,
            Event::RecordsUnwound,
            Event::RecordSetJoined,
            Event::RecordSetRenamed,
            Event::RecordSetsPurged,
            Event::OperationDispatched,
            Event::OperationFailed,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_warning_events() {
        assert!(Event::MatchDegraded.is_warning());
        assert!(Event::OperationFailed.is_warning());
        assert!(!Event::IndexCreated.is_warning());
    }
}
