//! Trace event storage.
//!
//! The analysis consumes a loaded trace through the [`EventStore`]
//! boundary. Stores are immutable for the lifetime of a trace and keep
//! the rows of each kind in ascending timestamp order.

use std::collections::BTreeMap;

use crate::{
    error::{Error, Result},
    events::{EventKind, TraceEvent},
};

pub mod reader;

/// Supplies the raw per-kind event tables of one loaded trace.
pub trait EventStore {
    /// Returns true if at least one event of `kind` was captured.
    fn has_events(&self, kind: EventKind) -> bool;

    /// All rows of `kind` in ascending timestamp order.
    ///
    /// Fails with [`Error::MissingRequirement`] if `kind` was never
    /// captured.
    fn events(&self, kind: EventKind) -> Result<&[TraceEvent]>;
}

/// In-memory event store.
#[derive(Debug, Default)]
pub struct TraceLog {
    tables: BTreeMap<EventKind, Vec<TraceEvent>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Builds a log from rows in any order.
    pub fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        let mut log = Self::new();

        for event in events {
            log.push(event);
        }

        for table in log.tables.values_mut() {
            table.sort_by_key(|event| event.ts);
        }

        log
    }

    /// Appends a row to its kind's table. Callers pushing directly must
    /// do so in ascending timestamp order.
    pub fn push(&mut self, event: TraceEvent) {
        self.tables.entry(event.kind()).or_default().push(event);
    }

    /// Total number of rows across all kinds.
    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for TraceLog {
    fn has_events(&self, kind: EventKind) -> bool {
        self.tables.get(&kind).is_some_and(|table| !table.is_empty())
    }

    fn events(&self, kind: EventKind) -> Result<&[TraceEvent]> {
        match self.tables.get(&kind) {
            Some(table) if !table.is_empty() => Ok(table),
            _ => Err(Error::MissingRequirement(format!("{} events", kind))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EventStore, TraceLog};
    use crate::error::Error;
    use crate::events::{EventData, EventKind, LoopFields, Marker, TraceEvent};

    fn loop_row(ts: u64) -> TraceEvent {
        TraceEvent {
            ts,
            pid: 100,
            comm: "task0".into(),
            cpu: 0,
            data: EventData::Loop(LoopFields {
                event: Marker::Start,
                phase: 0,
                phase_loop: 0,
                thread_loop: 0,
            }),
        }
    }

    #[test]
    fn test_rows_are_sorted_per_kind() {
        let log = TraceLog::from_events([loop_row(30), loop_row(10), loop_row(20)]);

        let ts: Vec<u64> = log
            .events(EventKind::Loop)
            .unwrap()
            .iter()
            .map(|event| event.ts)
            .collect();

        assert_eq!(ts, vec![10, 20, 30]);
    }

    #[test]
    fn test_missing_kind() {
        let log = TraceLog::from_events([loop_row(10)]);

        assert!(log.has_events(EventKind::Loop));
        assert!(!log.has_events(EventKind::Stats));
        assert!(matches!(
            log.events(EventKind::Stats),
            Err(Error::MissingRequirement(_))
        ));
    }
}
