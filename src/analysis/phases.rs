//! Loop-to-phase reconstruction and phase lookup.
//!
//! The workload generator logs a start and an end marker for every loop
//! iteration, tagged with the phase ordinal, an in-phase loop counter and
//! a whole-task loop counter. Captures routinely open or close mid-loop,
//! so reconstruction trusts the counters rather than arrival order and
//! trims partially observed cycles at the capture boundaries. Reported
//! durations therefore cover only fully observed cycles.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    events::{Marker, TraceEvent},
    task::TaskId,
};

/// One selected phase boundary marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseMarker {
    pub ts: u64,
    pub task: TaskId,
    pub phase: u32,
}

/// One reconstructed phase interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Phase {
    /// Timestamp of the first fully observed row of the phase.
    pub start: u64,
    /// The task's own phase ordinal.
    pub phase: u32,
    pub duration: u64,
}

impl Phase {
    pub fn end(&self) -> u64 {
        self.start + self.duration
    }
}

/// A phase interval with explicit bounds.
///
/// `id` is a sequential zero-based index when windows are enumerated,
/// and the task's own phase ordinal when addressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseWindow {
    pub id: u32,
    pub start: u64,
    pub end: u64,
}

/// Selects the authoritative boundary marker of each `(task, phase)`
/// group from a loop-event table.
///
/// A phase begins where its first loop iteration starts, so start
/// markers count only at `phase_loop == 0`. A phase ends at the last
/// iteration observed: end markers are ranked by `(phase_loop,
/// thread_loop)` and only the top one per group survives, which keeps
/// the result correct when the final loop records of a capture are
/// incomplete. Markers come out sorted by timestamp.
pub fn boundary_markers(rows: &[TraceEvent], marker: Marker) -> Vec<PhaseMarker> {
    let mut selected: HashMap<(TaskId, u32), (u64, (u32, u32))> = HashMap::new();

    for row in rows {
        let Some(fields) = row.loop_fields() else {
            continue;
        };

        if fields.event != marker {
            continue;
        }

        let key = (row.task_id(), fields.phase);
        let rank = (fields.phase_loop, fields.thread_loop);

        match marker {
            // Rows arrive in time order, so the entry API keeps the
            // earliest first-iteration marker of each group.
            Marker::Start => {
                if fields.phase_loop == 0 {
                    selected.entry(key).or_insert((row.ts, rank));
                }
            }
            Marker::End => {
                let best = selected.entry(key).or_insert((row.ts, rank));
                if rank > best.1 {
                    *best = (row.ts, rank);
                }
            }
        }
    }

    let mut markers: Vec<PhaseMarker> = selected
        .into_iter()
        .map(|((task, phase), (ts, _))| PhaseMarker { ts, task, phase })
        .collect();

    markers.sort_by(|a, b| (a.ts, &a.task, a.phase).cmp(&(b.ts, &b.task, b.phase)));
    markers
}

/// Collapses one task's loop-event rows into clean phase intervals.
///
/// Rows are split into maximal contiguous runs sharing the same phase
/// value. A run opening on an end marker carries the tail of a cycle
/// that began before the capture window; a run closing on a start
/// marker begins one that never completes inside it. Both rows are
/// dropped before the interval is taken from the remaining bounds, and
/// a run left empty contributes nothing.
pub fn reconstruct_phases(rows: &[TraceEvent]) -> Vec<Phase> {
    let loops = rows
        .iter()
        .filter_map(|row| row.loop_fields().map(|fields| (row.ts, fields)));

    let runs = loops.chunk_by(|&(_, fields)| fields.phase);
    let mut intervals = Vec::new();

    for (phase, run) in &runs {
        let mut run: VecDeque<_> = run.collect();

        if matches!(run.front(), Some((_, fields)) if fields.event == Marker::End) {
            run.pop_front();
        }

        if matches!(run.back(), Some((_, fields)) if fields.event == Marker::Start) {
            run.pop_back();
        }

        if let (Some(&(start, _)), Some(&(end, _))) = (run.front(), run.back()) {
            intervals.push(Phase {
                start,
                phase,
                duration: end - start,
            });
        }
    }

    intervals.sort_by_key(|interval| interval.start);
    intervals
}

/// Translates a possibly negative index against a total of `len` items.
///
/// Negative indices count from the end, -1 being the last item.
pub(crate) fn resolve_index(index: i64, len: usize) -> Result<usize> {
    let n = len as i64;
    let resolved = if index < 0 { index + n } else { index };

    if (0..n).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(Error::OutOfRange(format!(
            "phase index {} with {} phases available",
            index, len
        )))
    }
}

/// Finds the window covering `ts` among intervals sorted by start.
///
/// The covering phase is the one with the greatest start not after `ts`.
/// Timestamps outside the reconstructed span fail on both sides; a gap
/// left by a truncated phase still resolves to the preceding window.
pub fn window_at(intervals: &[Phase], ts: u64) -> Result<PhaseWindow> {
    let (Some(first), Some(last)) = (intervals.first(), intervals.last()) else {
        return Err(Error::OutOfRange("no phases reconstructed".into()));
    };

    if ts < first.start {
        return Err(Error::OutOfRange(format!(
            "timestamp {} is before the first phase start {}",
            ts, first.start
        )));
    }

    if ts > last.end() {
        return Err(Error::OutOfRange(format!(
            "timestamp {} is after the last phase end {}",
            ts,
            last.end()
        )));
    }

    let i = intervals.partition_point(|interval| interval.start <= ts);
    let covering = &intervals[i - 1];

    Ok(PhaseWindow {
        id: covering.phase,
        start: covering.start,
        end: covering.end(),
    })
}

/// Lazy, restartable enumeration of a task's phase windows.
///
/// Ids are sequential and zero-based, in start-time order.
pub struct PhaseWindows {
    intervals: Arc<Vec<Phase>>,
    next: usize,
}

impl PhaseWindows {
    pub(crate) fn new(intervals: Arc<Vec<Phase>>) -> Self {
        Self { intervals, next: 0 }
    }
}

impl Iterator for PhaseWindows {
    type Item = PhaseWindow;

    fn next(&mut self) -> Option<PhaseWindow> {
        let interval = self.intervals.get(self.next)?;
        let id = self.next as u32;
        self.next += 1;

        Some(PhaseWindow {
            id,
            start: interval.start,
            end: interval.end(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.intervals.len() - self.next;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        boundary_markers, reconstruct_phases, resolve_index, window_at, Phase, PhaseMarker,
        PhaseWindow,
    };
    use crate::error::Error;
    use crate::events::{EventData, LoopFields, Marker, TraceEvent};
    use crate::task::TaskId;

    fn row(ts: u64, event: Marker, phase: u32, phase_loop: u32, thread_loop: u32) -> TraceEvent {
        TraceEvent {
            ts,
            pid: 100,
            comm: "task0".into(),
            cpu: 0,
            data: EventData::Loop(LoopFields {
                event,
                phase,
                phase_loop,
                thread_loop,
            }),
        }
    }

    #[test]
    fn test_trims_truncated_boundaries() {
        // Tail of a cycle that started before the capture, one full
        // cycle, then the head of one that never completes.
        let rows = [
            row(5, Marker::End, 0, 0, 0),
            row(10, Marker::Start, 0, 1, 1),
            row(20, Marker::End, 0, 1, 1),
            row(25, Marker::Start, 0, 2, 2),
        ];

        let phases = reconstruct_phases(&rows);

        assert_eq!(
            phases,
            vec![Phase {
                start: 10,
                phase: 0,
                duration: 10
            }]
        );
    }

    #[test]
    fn test_exact_bounds_without_truncation() {
        let rows = [
            row(10, Marker::Start, 0, 0, 0),
            row(20, Marker::End, 0, 0, 0),
            row(20, Marker::Start, 0, 1, 1),
            row(30, Marker::End, 0, 1, 1),
        ];

        let phases = reconstruct_phases(&rows);

        assert_eq!(
            phases,
            vec![Phase {
                start: 10,
                phase: 0,
                duration: 20
            }]
        );
    }

    #[test]
    fn test_fully_truncated_phase_is_dropped() {
        let rows = [
            row(10, Marker::Start, 0, 0, 0),
            row(20, Marker::End, 0, 0, 0),
            row(30, Marker::Start, 1, 0, 1),
        ];

        let phases = reconstruct_phases(&rows);

        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].phase, 0);
    }

    #[test]
    fn test_end_markers_ranked_by_counters() {
        // A buffered flush can reorder records: the end marker with the
        // highest counters is authoritative regardless of arrival order.
        let rows = [
            row(10, Marker::Start, 0, 0, 0),
            row(40, Marker::End, 0, 3, 3),
            row(50, Marker::End, 0, 2, 2),
        ];

        let markers = boundary_markers(&rows, Marker::End);

        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].ts, 40);
    }

    #[test]
    fn test_start_markers_need_first_iteration() {
        // The capture opened mid-phase: phase 0 has no first-iteration
        // start marker, so only phase 1 contributes one.
        let rows = [
            row(10, Marker::Start, 0, 2, 2),
            row(15, Marker::End, 0, 2, 2),
            row(20, Marker::Start, 1, 0, 3),
        ];

        let markers = boundary_markers(&rows, Marker::Start);

        assert_eq!(
            markers,
            vec![PhaseMarker {
                ts: 20,
                task: TaskId::new(100, "task0"),
                phase: 1
            }]
        );
    }

    #[test]
    fn test_window_at_bounds() {
        let intervals = [
            Phase {
                start: 0,
                phase: 0,
                duration: 10,
            },
            Phase {
                start: 10,
                phase: 1,
                duration: 15,
            },
        ];

        assert_eq!(
            window_at(&intervals, 5).unwrap(),
            PhaseWindow {
                id: 0,
                start: 0,
                end: 10
            }
        );
        assert_eq!(
            window_at(&intervals, 10).unwrap(),
            PhaseWindow {
                id: 1,
                start: 10,
                end: 25
            }
        );
        assert!(matches!(
            window_at(&intervals, 30),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn test_window_at_is_symmetric_below_range() {
        let intervals = [Phase {
            start: 5,
            phase: 0,
            duration: 10,
        }];

        assert!(matches!(
            window_at(&intervals, 2),
            Err(Error::OutOfRange(_))
        ));
        assert!(matches!(window_at(&[], 2), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve_index(0, 3).unwrap(), 0);
        assert_eq!(resolve_index(2, 3).unwrap(), 2);
        assert_eq!(resolve_index(-1, 3).unwrap(), 2);
        assert_eq!(resolve_index(-3, 3).unwrap(), 0);
        assert!(resolve_index(3, 3).is_err());
        assert!(resolve_index(-4, 3).is_err());
    }
}
