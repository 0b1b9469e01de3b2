//! Per-trace analysis facade.
//!
//! [`RtaAnalysis`] reconstructs the logical structure of a workload run
//! from the flat event tables of a loaded trace: which tasks ran, the
//! phase intervals each went through, and per-activation performance
//! metrics. Every derived result is a pure function of the immutable
//! store, memoized per (operation, arguments) for the lifetime of the
//! analysis.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    events::{EventKind, MainMarker, Marker, TraceEvent},
    task::{TaskId, TaskRef},
    trace::EventStore,
    utils::Memo,
};

pub mod phases;
pub mod stats;

pub use self::phases::{Phase, PhaseMarker, PhaseWindow, PhaseWindows};
pub use self::stats::{PerfRecord, PerfSummary};

/// Correspondence point between the trace clock and the workload clock,
/// captured once near the start of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefTime {
    pub kernel: u64,
    pub user: u64,
}

/// Read-only analysis over one loaded trace.
///
/// All queries are pure functions of the store contents; results are
/// cached per argument tuple and shared via `Arc`. The facade is
/// single-threaded by construction, which is what licenses the lock-free
/// caches: one analysis, one thread, one writer per cache entry.
pub struct RtaAnalysis<'t, S> {
    store: &'t S,
    tasks: Memo<(), Vec<TaskId>>,
    tables: Memo<(EventKind, Option<TaskId>), Vec<TraceEvent>>,
    markers: Memo<(Marker, Option<TaskId>), Vec<PhaseMarker>>,
    phase_intervals: Memo<TaskId, Vec<Phase>>,
    windows: Memo<Option<TaskId>, (u64, u64)>,
    reftime: Memo<(), RefTime>,
    stats_records: Memo<Option<TaskId>, Vec<PerfRecord>>,
}

impl<'t, S: EventStore> RtaAnalysis<'t, S> {
    pub fn new(store: &'t S) -> Self {
        Self {
            store,
            tasks: Memo::new(),
            tables: Memo::new(),
            markers: Memo::new(),
            phase_intervals: Memo::new(),
            windows: Memo::new(),
            reftime: Memo::new(),
            stats_records: Memo::new(),
        }
    }

    /// Sorted identities of every workload task present in the trace.
    ///
    /// Scans every kind the generator emits and unions the `(pid, comm)`
    /// pairs found; kinds that never occur are skipped. Fails with
    /// [`Error::MissingRequirement`] only when none of them is present.
    pub fn rtapp_tasks(&self) -> Result<Arc<Vec<TaskId>>> {
        self.tasks.get_or_try_insert_with(&(), || {
            let mut found = BTreeSet::new();
            let mut present = false;

            for kind in EventKind::ALL {
                if !self.store.has_events(kind) {
                    continue;
                }

                present = true;
                found.extend(self.store.events(kind)?.iter().map(TraceEvent::task_id));
            }

            if !present {
                let kinds = EventKind::ALL.map(|kind| kind.name()).join(", ");
                return Err(Error::MissingRequirement(format!(
                    "any workload event kind ({})",
                    kinds
                )));
            }

            Ok(found.into_iter().collect())
        })
    }

    /// Resolves a task designator against the discovered task set.
    pub fn resolve(&self, task: impl Into<TaskRef>) -> Result<TaskId> {
        let task = task.into();
        let known = self.rtapp_tasks()?;

        let mut hits = known.iter().filter(|candidate| task.designates(candidate));

        match (hits.next(), hits.next()) {
            (Some(id), None) => Ok(id.clone()),
            (Some(_), Some(_)) => Err(Error::InvalidTask(format!(
                "{} designates more than one workload task",
                task
            ))),
            (None, _) => Err(Error::InvalidTask(format!(
                "{} does not designate any workload task",
                task
            ))),
        }
    }

    fn resolve_opt(&self, task: Option<TaskRef>) -> Result<Option<TaskId>> {
        task.map(|t| self.resolve(t)).transpose()
    }

    /// Rows of `kind`, optionally restricted to one resolved task.
    ///
    /// Filtering is a pure projection: row order stays the store's
    /// ascending timestamp order.
    fn table(&self, kind: EventKind, task: Option<TaskId>) -> Result<Arc<Vec<TraceEvent>>> {
        let key = (kind, task);

        self.tables.get_or_try_insert_with(&key, || {
            let rows = self.store.events(kind)?;

            Ok(match &key.1 {
                Some(id) => rows.iter().filter(|row| row.matches(id)).cloned().collect(),
                None => rows.to_vec(),
            })
        })
    }

    /// Events generated by the workload's main control thread.
    pub fn main_events(&self) -> Result<Arc<Vec<TraceEvent>>> {
        self.table(EventKind::Main, None)
    }

    /// Per-task lifecycle events, optionally filtered.
    pub fn task_events(&self, task: Option<TaskRef>) -> Result<Arc<Vec<TraceEvent>>> {
        let task = self.resolve_opt(task)?;
        self.table(EventKind::Task, task)
    }

    /// Per-iteration loop events, optionally filtered.
    pub fn loop_events(&self, task: Option<TaskRef>) -> Result<Arc<Vec<TraceEvent>>> {
        let task = self.resolve_opt(task)?;
        self.table(EventKind::Loop, task)
    }

    /// Custom events fired by the workload, optionally filtered.
    pub fn generic_events(&self, task: Option<TaskRef>) -> Result<Arc<Vec<TraceEvent>>> {
        let task = self.resolve_opt(task)?;
        self.table(EventKind::Event, task)
    }

    /// The clock correspondence point emitted once by the main thread.
    ///
    /// More than one `clock_ref` marker is a producer protocol violation
    /// and is always surfaced, never resolved by picking one.
    pub fn reftime(&self) -> Result<RefTime> {
        self.reftime
            .get_or_try_insert_with(&(), || {
                let rows = self.main_events()?;

                let mut refs = rows.iter().filter_map(|row| {
                    let fields = row.main_fields()?;
                    (fields.event == MainMarker::ClockRef).then_some((row.ts, fields.data))
                });

                let Some((kernel, data)) = refs.next() else {
                    return Err(Error::MissingRequirement(
                        "clock_ref marker in rtapp_main events".into(),
                    ));
                };

                let rest = refs.count();
                if rest > 0 {
                    return Err(Error::AmbiguousReference(rest + 1));
                }

                let user = data.ok_or_else(|| {
                    Error::MissingRequirement("clock_ref workload clock payload".into())
                })?;

                Ok(RefTime { kernel, user })
            })
            .map(|reftime| *reftime)
    }

    /// Trace-clock bounds of the whole run, from the main thread's first
    /// start and first end markers.
    pub fn window(&self) -> Result<(u64, u64)> {
        self.windows
            .get_or_try_insert_with(&None, || {
                let rows = self.main_events()?;

                let at = |marker| {
                    rows.iter()
                        .find(|row| row.main_fields().is_some_and(|f| f.event == marker))
                        .map(|row| row.ts)
                        .ok_or_else(|| {
                            Error::MissingRequirement(format!(
                                "{:?} marker in rtapp_main events",
                                marker
                            ))
                        })
                };

                Ok((at(MainMarker::Start)?, at(MainMarker::End)?))
            })
            .map(|window| *window)
    }

    /// Trace-clock bounds of one task's execution, from its lifecycle
    /// markers.
    pub fn task_window(&self, task: impl Into<TaskRef>) -> Result<(u64, u64)> {
        let id = self.resolve(task)?;

        self.windows
            .get_or_try_insert_with(&Some(id.clone()), || {
                let rows = self.table(EventKind::Task, Some(id.clone()))?;

                let at = |marker| {
                    rows.iter()
                        .find(|row| row.task_fields().is_some_and(|f| f.event == marker))
                        .map(|row| row.ts)
                        .ok_or_else(|| {
                            Error::MissingRequirement(format!(
                                "{:?} marker in rtapp_task events for {}",
                                marker, id
                            ))
                        })
                };

                Ok((at(Marker::Start)?, at(Marker::End)?))
            })
            .map(|window| *window)
    }

    /// Authoritative phase boundary markers, one per `(task, phase)`.
    ///
    /// See [`phases::boundary_markers`] for the selection rules.
    pub fn phase_markers(
        &self,
        task: Option<TaskRef>,
        marker: Marker,
    ) -> Result<Arc<Vec<PhaseMarker>>> {
        let task = self.resolve_opt(task)?;
        let key = (marker, task);

        self.markers.get_or_try_insert_with(&key, || {
            let rows = self.table(EventKind::Loop, key.1.clone())?;
            Ok(phases::boundary_markers(&rows, marker))
        })
    }

    /// Reconstructed phase intervals of one task, sorted by start time.
    ///
    /// Phase numbers need not be contiguous: a phase whose every loop
    /// record falls outside the capture window leaves no interval.
    pub fn phases(&self, task: impl Into<TaskRef>) -> Result<Arc<Vec<Phase>>> {
        let id = self.resolve(task)?;

        self.phase_intervals.get_or_try_insert_with(&id, || {
            let rows = self.table(EventKind::Loop, Some(id.clone()))?;
            let intervals = phases::reconstruct_phases(&rows);

            log::debug!("task {}: {} phases reconstructed", id, intervals.len());

            Ok(intervals)
        })
    }

    /// Lazy enumeration of a task's phase windows with sequential ids.
    pub fn phase_windows(&self, task: impl Into<TaskRef>) -> Result<PhaseWindows> {
        Ok(PhaseWindows::new(self.phases(task)?))
    }

    /// Trace-clock start of the phase at `index`.
    ///
    /// Negative indices count from the end, -1 being the last phase.
    /// Resolved against the raw start-marker table, which can disagree
    /// with the trimmed intervals at the capture boundaries.
    pub fn phase_start(&self, task: impl Into<TaskRef>, index: i64) -> Result<u64> {
        Ok(self.indexed_marker(task.into(), Marker::Start, index)?.ts)
    }

    /// Trace-clock end of the phase at `index`, resolved against the raw
    /// end-marker table.
    pub fn phase_end(&self, task: impl Into<TaskRef>, index: i64) -> Result<u64> {
        Ok(self.indexed_marker(task.into(), Marker::End, index)?.ts)
    }

    fn indexed_marker(&self, task: TaskRef, marker: Marker, index: i64) -> Result<PhaseMarker> {
        let markers = self.phase_markers(Some(task), marker)?;
        let i = phases::resolve_index(index, markers.len())?;

        Ok(markers[i].clone())
    }

    /// Start/end window of the phase at `index`, with `id` being the
    /// task's own phase ordinal.
    pub fn task_phase_window(&self, task: impl Into<TaskRef>, index: i64) -> Result<PhaseWindow> {
        let task = task.into();
        let start = self.indexed_marker(task.clone(), Marker::Start, index)?;
        let end = self.indexed_marker(task, Marker::End, index)?;

        Ok(PhaseWindow {
            id: start.phase,
            start: start.ts,
            end: end.ts,
        })
    }

    /// The phase window covering `ts`.
    ///
    /// The covering phase is the one with the greatest start not after
    /// `ts`. Timestamps outside the reconstructed span fail with
    /// [`Error::OutOfRange`] on both sides.
    pub fn phase_at(&self, task: impl Into<TaskRef>, ts: u64) -> Result<PhaseWindow> {
        let intervals = self.phases(task)?;
        phases::window_at(&intervals, ts)
    }

    /// Per-activation counters with the derived performance index,
    /// optionally filtered.
    pub fn stats(&self, task: Option<TaskRef>) -> Result<Arc<Vec<PerfRecord>>> {
        let task = self.resolve_opt(task)?;

        self.stats_records.get_or_try_insert_with(&task, || {
            let rows = self.table(EventKind::Stats, task.clone())?;
            Ok(stats::perf_records(&rows))
        })
    }

    /// Mean and deviation of one task's performance index series.
    pub fn perf_summary(&self, task: impl Into<TaskRef>) -> Result<PerfSummary> {
        let id = self.resolve(task)?;
        let records = self.stats(Some(TaskRef::Id(id.clone())))?;

        let summary = stats::perf_summary(&records).ok_or_else(|| {
            Error::MissingRequirement(format!("stats events for task {}", id))
        })?;

        log::info!(
            "perf index of task {}: avg={:.2} std={:.2}",
            id,
            summary.mean,
            summary.std
        );

        Ok(summary)
    }
}
