//! Per-activation performance statistics.

use serde::Serialize;

use crate::events::TraceEvent;

/// One activation's counters with the derived performance index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfRecord {
    pub ts: u64,
    pub pid: u32,
    pub comm: String,
    pub cpu: u32,
    pub period: u64,
    pub run: u64,
    pub slack: i64,
    pub c_run: u64,
    pub c_period: u64,
    pub wu_lat: u64,
    pub perf_index: f64,
}

/// Aggregate of a task's performance index series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerfSummary {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

/// Derives the performance index for every stats row.
///
/// The index is the measured slack over the configured slack budget:
///
/// ```text
///              slack
/// perf = ---------------------
///         c_period - c_run
/// ```
///
/// An index in `[0, 1]` means the activation completed within its
/// deadline; negative values measure how late it was. The budget is a
/// producer configuration invariant, so a zero denominator propagates
/// as a non-finite index instead of being masked here. No row is
/// filtered or clamped.
pub fn perf_records(rows: &[TraceEvent]) -> Vec<PerfRecord> {
    rows.iter()
        .filter_map(|row| {
            let fields = row.stats_fields()?;

            Some(PerfRecord {
                ts: row.ts,
                pid: row.pid,
                comm: row.comm.clone(),
                cpu: row.cpu,
                period: fields.period,
                run: fields.run,
                slack: fields.slack,
                c_run: fields.c_run,
                c_period: fields.c_period,
                wu_lat: fields.wu_lat,
                perf_index: fields.slack as f64
                    / (fields.c_period as f64 - fields.c_run as f64),
            })
        })
        .collect()
}

/// Mean and sample deviation of the records' performance index, or
/// `None` when there are no records.
pub fn perf_summary(records: &[PerfRecord]) -> Option<PerfSummary> {
    if records.is_empty() {
        return None;
    }

    let n = records.len() as f64;
    let mean = records.iter().map(|r| r.perf_index).sum::<f64>() / n;
    let var = records
        .iter()
        .map(|r| (r.perf_index - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);

    Some(PerfSummary {
        mean,
        std: var.sqrt(),
        count: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::{perf_records, perf_summary};
    use crate::events::{EventData, StatsFields, TraceEvent};

    fn row(ts: u64, slack: i64, c_run: u64, c_period: u64) -> TraceEvent {
        TraceEvent {
            ts,
            pid: 100,
            comm: "task0".into(),
            cpu: 0,
            data: EventData::Stats(StatsFields {
                period: c_period,
                run: c_run,
                slack,
                c_run,
                c_period,
                wu_lat: 3,
            }),
        }
    }

    #[test]
    fn test_perf_index_formula() {
        let records = perf_records(&[row(10, 5, 10, 20)]);

        assert_eq!(records[0].perf_index, 0.5);
    }

    #[test]
    fn test_negative_slack_is_reported() {
        let records = perf_records(&[row(10, -5, 10, 20)]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].perf_index, -0.5);
    }

    #[test]
    fn test_zero_budget_propagates_non_finite() {
        let records = perf_records(&[row(10, 5, 10, 10)]);

        assert!(!records[0].perf_index.is_finite());
    }

    #[test]
    fn test_summary() {
        let records = perf_records(&[row(10, 5, 10, 20), row(30, 15, 10, 20)]);
        let summary = perf_summary(&records).unwrap();

        assert_eq!(summary.count, 2);
        assert!((summary.mean - 1.0).abs() < 1e-9);
        assert!(summary.std > 0.0);

        assert!(perf_summary(&[]).is_none());
    }
}
