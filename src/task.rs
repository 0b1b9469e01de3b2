//! Workload task identities.

use std::fmt::Display;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    combinator::{map, map_res},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifies one workload-generated task.
///
/// Identities are never reused within a trace. Ordering is by
/// `(pid, comm)` so task sets sort deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub pid: u32,
    pub comm: String,
}

impl TaskId {
    pub fn new(pid: u32, comm: impl Into<String>) -> Self {
        Self {
            pid,
            comm: comm.into(),
        }
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match self.pid.cmp(&other.pid) {
            std::cmp::Ordering::Equal => self.comm.cmp(&other.comm),
            ord => ord,
        }
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}:{}", self.pid, self.comm))
    }
}

/// A task designator, as accepted by every task-filtered query.
///
/// Tasks may be referred to by bare pid, bare name, or full identity.
/// The `From` conversions keep the shape of the input: a string is
/// always a name. `FromStr` additionally understands the textual forms
/// `"123"` (pid) and `"123:name"` (full identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskRef {
    Pid(u32),
    Comm(String),
    Id(TaskId),
}

impl TaskRef {
    /// Returns true if `task` is among the tasks this designator refers to.
    pub fn designates(&self, task: &TaskId) -> bool {
        match self {
            TaskRef::Pid(pid) => task.pid == *pid,
            TaskRef::Comm(comm) => &task.comm == comm,
            TaskRef::Id(id) => task == id,
        }
    }
}

impl From<u32> for TaskRef {
    fn from(pid: u32) -> Self {
        TaskRef::Pid(pid)
    }
}

impl From<&str> for TaskRef {
    fn from(comm: &str) -> Self {
        TaskRef::Comm(comm.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(comm: String) -> Self {
        TaskRef::Comm(comm)
    }
}

impl From<TaskId> for TaskRef {
    fn from(id: TaskId) -> Self {
        TaskRef::Id(id)
    }
}

impl From<&TaskId> for TaskRef {
    fn from(id: &TaskId) -> Self {
        TaskRef::Id(id.clone())
    }
}

impl Display for TaskRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskRef::Pid(pid) => write!(f, "pid {}", pid),
            TaskRef::Comm(comm) => write!(f, "task \"{}\"", comm),
            TaskRef::Id(id) => write!(f, "task {}", id),
        }
    }
}

fn parse_pid(input: &str) -> IResult<&str, u32> {
    map_res(take_while1(|c: char| c.is_ascii_digit()), str::parse)(input)
}

fn parse_full_id(input: &str) -> IResult<&str, TaskRef> {
    let (i, pid) = parse_pid(input)?;
    let (i, _) = tag(":")(i)?;
    let (i, comm) = take_while1(|c: char| c != '\0')(i)?;

    Ok((i, TaskRef::Id(TaskId::new(pid, comm))))
}

fn parse_task_ref(input: &str) -> IResult<&str, TaskRef> {
    alt((parse_full_id, map(parse_pid, TaskRef::Pid)))(input)
}

impl FromStr for TaskRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidTask("empty task reference".into()));
        }

        match parse_task_ref(s) {
            Ok(("", parsed)) => Ok(parsed),
            _ => Ok(TaskRef::Comm(s.to_string())),
        }
    }
}
