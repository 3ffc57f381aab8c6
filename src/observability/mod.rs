//! Observability for the harvest engine
//!
//! Structured, synchronous JSON logging of engine events.
//!
//! # Usage
//!
//! ```ignore
//! use harvest::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::IndexCreated, &[("index", "by_name"), ("entries", "42")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

fn severity_for(event: Event) -> Severity {
    if event.is_warning() {
        Severity::Warn
    } else if event.is_per_record() {
        Severity::Trace
    } else {
        Severity::Info
    }
}

/// Log an engine event
pub fn log_event(event: Event) {
    Logger::log(severity_for(event), event.as_str(), &[]);
}

/// Log an engine event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity_for(event), event.as_str(), fields);
}
