//! Snapshot log: one CSV row per snapshot, appended, never rewritten.
//!
//! Row layout: `remaining,paused,phase,n,running,timestamp`, for example
//! `24m13s250ms,0s,focus,3,true,2024-03-10T09:41:07+01:00`.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, SecondsFormat, TimeDelta};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::debug;

use crate::{
    config::data_dir,
    duration::{self, to_delta},
    engine::TimerState,
    phase::{PhaseDurations, PhaseType},
};

const FIELD_COUNT: usize = 6;

/// Upper bound for a restored phase counter. Even 1 s phases can't reach it in
/// a day, and it keeps `n + 1` far from overflow.
pub const MAX_PHASE_COUNTER: u32 = 1_000_000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no snapshot log at {path}")]
    NotFound { path: PathBuf },
    #[error("snapshot log {path} is empty")]
    Empty { path: PathBuf },
    #[error("malformed snapshot on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("snapshot log I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("last snapshot is from {recorded}, not today ({today})")]
    NotSameDay { recorded: NaiveDate, today: NaiveDate },
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub remaining: TimeDelta,
    pub paused: TimeDelta,
    pub phase: PhaseType,
    pub n: u32,
    pub running: bool,
    pub timestamp: DateTime<FixedOffset>,
}

impl Snapshot {
    pub fn capture(state: &TimerState, now: DateTime<Local>) -> Self {
        Self {
            remaining: state.remaining,
            paused: state.paused,
            phase: state.phase,
            n: state.n,
            running: state.running,
            timestamp: now.fixed_offset(),
        }
    }

    pub fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            duration::format(self.remaining),
            duration::format(self.paused),
            self.phase.as_token(),
            self.n,
            self.running,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, false)
        )
    }

    /// Parse one row. The error is a human-readable reason.
    pub fn parse_row(row: &str) -> Result<Self, String> {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            ));
        }

        let remaining =
            duration::parse(fields[0]).map_err(|e| format!("remaining time: {e}"))?;
        let paused = duration::parse(fields[1]).map_err(|e| format!("paused time: {e}"))?;
        if paused < TimeDelta::zero() {
            return Err(format!("paused time {:?} is negative", fields[1]));
        }
        let phase = fields[2].parse::<PhaseType>().map_err(|e| e.to_string())?;
        let n = fields[3]
            .parse::<u32>()
            .map_err(|e| format!("phase counter {:?}: {e}", fields[3]))?;
        if !(1..=MAX_PHASE_COUNTER).contains(&n) {
            return Err(format!(
                "phase counter {n} is outside 1..={MAX_PHASE_COUNTER}"
            ));
        }
        let running = fields[4]
            .parse::<bool>()
            .map_err(|e| format!("running flag {:?}: {e}", fields[4]))?;
        let timestamp = DateTime::parse_from_rfc3339(fields[5])
            .map_err(|e| format!("timestamp {:?}: {e}", fields[5]))?;

        Ok(Self {
            remaining,
            paused,
            phase,
            n,
            running,
            timestamp,
        })
    }
}

/// Rebuild timer state from `last` if it was taken on `today` (local date).
///
/// Phase durations come from the current config, not from the snapshot; the
/// remaining time is clamped to fit them.
pub fn restore(
    last: &Snapshot,
    durations: &PhaseDurations,
    today: NaiveDate,
) -> Result<TimerState, RestoreError> {
    let recorded = last.timestamp.with_timezone(&Local).date_naive();
    if recorded != today {
        return Err(RestoreError::NotSameDay { recorded, today });
    }

    let full = to_delta(durations.get(last.phase));
    Ok(TimerState {
        remaining: last.remaining.min(full).max(TimeDelta::milliseconds(1)),
        paused: last.paused,
        phase: last.phase,
        running: last.running,
        n: last.n,
    })
}

// ============================================================================
// Stores
// ============================================================================

/// Append-only sink and source of snapshots.
pub trait SnapshotStore: Send {
    fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// The most recent snapshot.
    fn read_last(&self) -> Result<Snapshot, StoreError>;
}

/// Snapshot log kept in a CSV file.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        data_dir().join("snapshots.csv")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for CsvStore {
    fn append(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", snapshot.to_row())?;
        file.flush()?;
        debug!(path = %self.path.display(), n = snapshot.n, "snapshot appended");
        Ok(())
    }

    fn read_last(&self) -> Result<Snapshot, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let (index, row) = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .last()
            .ok_or_else(|| StoreError::Empty {
                path: self.path.clone(),
            })?;

        Snapshot::parse_row(row).map_err(|reason| StoreError::Malformed {
            line: index + 1,
            reason,
        })
    }
}
