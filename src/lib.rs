//! tickadoro: a terminal Pomodoro timer with same-day resume.

pub mod alarm;
pub mod app;
pub mod config;
pub mod duration;
pub mod engine;
pub mod persist;
pub mod phase;
pub mod ui;
pub mod writer;

pub use config::{Config, ConfigError, ValidationIssue};
pub use engine::{PhaseEngine, Signal, TimerState};
pub use persist::{CsvStore, RestoreError, Snapshot, SnapshotStore, StoreError};
pub use phase::{PhaseDurations, PhaseType};
