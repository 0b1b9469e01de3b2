//! Post-hoc structural analysis of rt-app workload traces.
//!
//! A periodic real-time workload run emits userspace trace events
//! describing its synthetic tasks: per-loop start/end markers tagged
//! with phase and loop counters, per-activation scheduling statistics,
//! and a single clock reference tying the trace clock to the workload's
//! own clock. This crate reconstructs the run's logical structure from
//! those flat tables:
//!
//! - task discovery across every event kind the generator emits,
//! - collapsing noisy, possibly truncated loop markers into clean phase
//!   intervals,
//! - point and indexed queries against those intervals,
//! - per-activation performance indices from the raw counters.
//!
//! The trace itself is supplied through the [`trace::EventStore`]
//! boundary; [`trace::TraceLog`] is the in-memory reference
//! implementation and [`trace::reader`] loads the recorded JSON format.
//! All analysis entry points live on [`RtaAnalysis`], which memoizes
//! every derived result for the lifetime of the loaded trace.

pub mod error;
pub mod events;
pub mod task;
pub mod utils;

pub mod trace;

pub mod analysis;

pub use crate::analysis::{PhaseWindow, RefTime, RtaAnalysis};
pub use crate::error::{Error, Result};
pub use crate::task::{TaskId, TaskRef};
