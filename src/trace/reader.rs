//! Recorded trace loading.
//!
//! Traces are recorded as one JSON record per line, optionally wrapped
//! in a JSON array with `[` and `]` on their own lines. The reader
//! tolerates indentation and trailing commas around each record.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result};

use crate::{events::TraceEvent, trace::TraceLog};

/// Reads a trace dump from any buffered source.
pub fn read<R: BufRead>(input: R) -> Result<TraceLog> {
    let mut rows = Vec::new();

    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        // Array wrapping and blank lines are layout, not records.
        if trimmed.is_empty() || trimmed == "[" || trimmed == "]" {
            continue;
        }

        let record = trimmed.trim_end_matches(',');
        let event: TraceEvent = serde_json::from_str(record)
            .with_context(|| format!("malformed trace record on line {}", n + 1))?;

        rows.push(event);
    }

    log::debug!("loaded {} trace rows", rows.len());

    Ok(TraceLog::from_events(rows))
}

/// Loads a recorded trace file into an in-memory store.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TraceLog> {
    let file = File::open(path.as_ref())
        .with_context(|| format!("cannot open trace file {}", path.as_ref().display()))?;

    read(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::read;
    use crate::events::{EventData, EventKind, MainMarker, Marker};
    use crate::trace::EventStore;

    const FIXTURE: &str = r#"[
  {"ts":10,"pid":100,"comm":"task0","cpu":1,"kind":"loop","event":"start","phase":0,"phase_loop":0,"thread_loop":0},
  {"ts":20,"pid":100,"comm":"task0","cpu":1,"kind":"loop","event":"end","phase":0,"phase_loop":0,"thread_loop":0},
  {"ts":1000,"pid":1,"comm":"rt-app","cpu":0,"kind":"main","event":"clock_ref","data":42},
  {"ts":2000,"pid":100,"comm":"task0","cpu":1,"kind":"stats","period":100,"run":50,"slack":-5,"c_run":50,"c_period":100,"wu_lat":3}
]"#;

    #[test]
    fn test_read_fixture() {
        let log = read(Cursor::new(FIXTURE)).unwrap();

        assert_eq!(log.len(), 4);

        let loops = log.events(EventKind::Loop).unwrap();
        assert_eq!(loops.len(), 2);
        let fields = loops[0].loop_fields().unwrap();
        assert_eq!(fields.event, Marker::Start);
        assert_eq!(fields.phase, 0);

        let main = log.events(EventKind::Main).unwrap();
        match &main[0].data {
            EventData::Main(fields) => {
                assert_eq!(fields.event, MainMarker::ClockRef);
                assert_eq!(fields.data, Some(42));
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        let stats = log.events(EventKind::Stats).unwrap();
        assert_eq!(stats[0].stats_fields().unwrap().slack, -5);
    }

    #[test]
    fn test_malformed_record() {
        let input = "{\"ts\":10,\"pid\":100}";

        assert!(read(Cursor::new(input)).is_err());
    }
}
