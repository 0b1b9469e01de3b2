//! Userspace trace event definitions.
//!
//! The workload generator emits five kinds of trace events. `EventKind`
//! is the static registry that task discovery scans; the record types
//! mirror the fields the producer writes for each kind.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// The event kinds the workload generator is able to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Markers from the main control thread, including the clock reference.
    Main,
    /// Per-task lifecycle start/end markers.
    Task,
    /// Per-iteration loop markers with phase and loop counters.
    Loop,
    /// Custom events fired by the workload.
    Event,
    /// Per-activation scheduling statistics.
    Stats,
}

impl EventKind {
    /// Every kind, in registry order.
    pub const ALL: [EventKind; 5] = [
        EventKind::Main,
        EventKind::Task,
        EventKind::Loop,
        EventKind::Event,
        EventKind::Stats,
    ];

    /// The kind's name on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Main => "rtapp_main",
            EventKind::Task => "rtapp_task",
            EventKind::Loop => "rtapp_loop",
            EventKind::Event => "rtapp_event",
            EventKind::Stats => "rtapp_stats",
        }
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A start or end boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Start,
    End,
}

/// Markers emitted by the main control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainMarker {
    Start,
    End,
    ClockRef,
}

/// One row of the trace event table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Trace-clock timestamp, the indexing key.
    pub ts: u64,
    pub pid: u32,
    pub comm: String,
    pub cpu: u32,
    #[serde(flatten)]
    pub data: EventData,
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventData {
    Main(MainFields),
    Task(TaskFields),
    Loop(LoopFields),
    Event(EventFields),
    Stats(StatsFields),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainFields {
    pub event: MainMarker,
    /// Workload-clock payload, present only on `clock_ref`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFields {
    pub event: Marker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopFields {
    pub event: Marker,
    /// Phase ordinal, monotonically increasing per task from 0.
    pub phase: u32,
    /// Loop counter, reset at the start of each phase.
    pub phase_loop: u32,
    /// Loop counter over the whole task, never reset.
    pub thread_loop: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub desc: String,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFields {
    /// Measured activation period.
    pub period: u64,
    /// Measured run time.
    pub run: u64,
    /// Deadline minus completion time; negative on a deadline miss.
    pub slack: i64,
    /// Configured run time.
    pub c_run: u64,
    /// Configured period.
    pub c_period: u64,
    /// Wake-up latency.
    pub wu_lat: u64,
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            EventData::Main(_) => EventKind::Main,
            EventData::Task(_) => EventKind::Task,
            EventData::Loop(_) => EventKind::Loop,
            EventData::Event(_) => EventKind::Event,
            EventData::Stats(_) => EventKind::Stats,
        }
    }
}

impl TraceEvent {
    /// The kind of table this row belongs to.
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    /// The identity of the task that emitted this row.
    pub fn task_id(&self) -> TaskId {
        TaskId::new(self.pid, self.comm.clone())
    }

    /// Returns true if this row was emitted by `task`.
    pub fn matches(&self, task: &TaskId) -> bool {
        self.pid == task.pid && self.comm == task.comm
    }

    pub fn main_fields(&self) -> Option<&MainFields> {
        match &self.data {
            EventData::Main(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn task_fields(&self) -> Option<&TaskFields> {
        match &self.data {
            EventData::Task(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn loop_fields(&self) -> Option<&LoopFields> {
        match &self.data {
            EventData::Loop(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn stats_fields(&self) -> Option<&StatsFields> {
        match &self.data {
            EventData::Stats(fields) => Some(fields),
            _ => None,
        }
    }
}
