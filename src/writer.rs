//! Background snapshot writer.
//!
//! Appends are queued and never waited on, so a slow disk cannot stall the
//! tick loop. Failures come back on the `failures` channel for the caller to
//! show. The shutdown snapshot is the one write that is waited for, with a
//! timeout.

use std::{
    io,
    sync::mpsc::{self, RecvTimeoutError},
    thread::{self, JoinHandle},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::persist::{Snapshot, SnapshotStore, StoreError};

#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("final snapshot failed: {0}")]
    Write(#[source] StoreError),
    #[error("final snapshot did not finish within {0:?}")]
    Timeout(Duration),
    #[error("snapshot writer stopped before the final snapshot")]
    WorkerGone,
}

enum Job {
    Append(Snapshot),
    Final(Snapshot, mpsc::Sender<Result<(), StoreError>>),
}

pub struct SnapshotWriter {
    jobs: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl SnapshotWriter {
    pub fn spawn(
        store: Box<dyn SnapshotStore>,
        failures: mpsc::Sender<StoreError>,
    ) -> io::Result<Self> {
        let (jobs, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("snapshot-writer".into())
            .spawn(move || {
                for job in rx {
                    match job {
                        Job::Append(snapshot) => {
                            if let Err(e) = store.append(&snapshot) {
                                error!("snapshot write failed: {e}");
                                let _ = failures.send(e);
                            }
                        }
                        Job::Final(snapshot, reply) => {
                            let _ = reply.send(store.append(&snapshot));
                            break;
                        }
                    }
                }
                debug!("snapshot writer stopped");
            })?;

        Ok(Self { jobs, handle })
    }

    /// Queue a snapshot and return immediately.
    pub fn append(&self, snapshot: Snapshot) {
        if self.jobs.send(Job::Append(snapshot)).is_err() {
            warn!("snapshot writer is gone, dropping snapshot");
        }
    }

    /// Write `last` after everything already queued and wait up to `timeout`
    /// for it to land. On timeout the worker is left behind.
    pub fn shutdown(self, last: Snapshot, timeout: Duration) -> Result<(), ShutdownError> {
        let (reply, done) = mpsc::channel();
        if self.jobs.send(Job::Final(last, reply)).is_err() {
            join_worker(self.handle);
            return Err(ShutdownError::WorkerGone);
        }

        match done.recv_timeout(timeout) {
            Ok(result) => {
                join_worker(self.handle);
                result.map_err(ShutdownError::Write)
            }
            Err(RecvTimeoutError::Timeout) => Err(ShutdownError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => {
                join_worker(self.handle);
                Err(ShutdownError::WorkerGone)
            }
        }
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if let Err(payload) = handle.join() {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        error!("snapshot writer panicked: {reason}");
    }
}
