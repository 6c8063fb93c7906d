//! RED Worker - single owner of the aggregated state
//!
//! Every mutation and read goes through one thread draining a bounded
//! queue, so callers never take a lock:
//!
//! ```text
//! Caller 1 ──┐
//! Caller 2 ──┤──► bounded queue ──► Worker ──► MetricState
//! Caller 3 ──┘                        │
//!        ◄────── per-request reply ───┘
//! ```
//!
//! Requests apply strictly in queue order and one at a time. A full queue
//! blocks the sender until the worker catches up.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, info};

use super::field::Operand;
use super::snapshot::{duration_to_nanos, Snapshot};
use crate::config::AggregatorConfig;

/// Messages for the worker. Each carries its own reply channel so a reply
/// can only reach the caller that asked.
#[derive(Debug)]
pub(crate) enum Request {
    /// Zero the counters and restart the clock.
    /// Acked only when the caller asked to wait.
    Reset { ack_tx: Option<Sender<()>> },
    Add {
        operand: Operand,
        value: i64,
        reply_tx: Sender<Snapshot>,
    },
    Overwrite {
        operand: Operand,
        value: i64,
        reply_tx: Sender<Snapshot>,
    },
    ReadAll { reply_tx: Sender<Snapshot> },
    /// Like ReadAll, with duration computed as time since start.
    /// Doesn't touch the stored duration.
    ReadNow { reply_tx: Sender<Snapshot> },
}

impl Request {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Request::Reset { .. } => "reset",
            Request::Add { .. } => "add",
            Request::Overwrite { .. } => "overwrite",
            Request::ReadAll { .. } => "read_all",
            Request::ReadNow { .. } => "now",
        }
    }
}

/// The canonical triad. Only the worker holds one.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MetricState {
    requests: i64,
    errors: i64,
    duration_nanos: i64,
    start_time: Instant,
}

impl MetricState {
    fn new() -> Self {
        MetricState {
            requests: 0,
            errors: 0,
            duration_nanos: 0,
            start_time: Instant::now(),
        }
    }

    fn reset(&mut self) {
        *self = MetricState::new();
    }

    fn counter_mut(&mut self, operand: Operand) -> &mut i64 {
        match operand {
            Operand::Requests => &mut self.requests,
            Operand::Errors => &mut self.errors,
        }
    }

    /// Two's-complement: counters wrap rather than fail on overflow
    fn add(&mut self, operand: Operand, value: i64) {
        let counter = self.counter_mut(operand);
        *counter = counter.wrapping_add(value);
    }

    fn overwrite(&mut self, operand: Operand, value: i64) {
        *self.counter_mut(operand) = value;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            requests: self.requests,
            errors: self.errors,
            duration_nanos: self.duration_nanos,
            start_time: self.start_time,
        }
    }

    fn snapshot_now(&self) -> Snapshot {
        Snapshot {
            duration_nanos: duration_to_nanos(self.start_time.elapsed()),
            ..self.snapshot()
        }
    }
}

/// Worker that owns the state and processes requests in order
pub(crate) struct Worker {
    state: MetricState,
    rx: Receiver<Request>,
    verbose: bool,
}

impl Worker {
    fn new(rx: Receiver<Request>, verbose: bool) -> Self {
        Worker {
            state: MetricState::new(),
            rx,
            verbose,
        }
    }

    /// Run until every sender is dropped
    fn run(mut self) {
        while let Ok(request) = self.rx.recv() {
            self.handle(request);
        }
        debug!("red worker: all handles dropped, exiting");
    }

    fn handle(&mut self, request: Request) {
        if self.verbose {
            debug!(request = ?request, "red worker got request");
        }

        // A send only fails when the caller is gone; the request has
        // already been applied either way.
        match request {
            Request::Reset { ack_tx } => {
                self.state.reset();
                if let Some(tx) = ack_tx {
                    let _ = tx.send(());
                }
            }
            Request::Add {
                operand,
                value,
                reply_tx,
            } => {
                self.state.add(operand, value);
                let _ = reply_tx.send(self.state.snapshot());
            }
            Request::Overwrite {
                operand,
                value,
                reply_tx,
            } => {
                self.state.overwrite(operand, value);
                let _ = reply_tx.send(self.state.snapshot());
            }
            Request::ReadAll { reply_tx } => {
                let _ = reply_tx.send(self.state.snapshot());
            }
            Request::ReadNow { reply_tx } => {
                let _ = reply_tx.send(self.state.snapshot_now());
            }
        }

        if self.verbose {
            debug!(state = ?self.state, "red worker after request");
        }
    }
}

/// Spawn a worker thread and return the sending side of its queue
pub(crate) fn spawn_worker(
    config: &AggregatorConfig,
) -> io::Result<(Sender<Request>, JoinHandle<()>)> {
    let capacity = config.queue_capacity.max(1);
    let (tx, rx) = channel::bounded(capacity);
    let worker = Worker::new(rx, config.verbose);

    let join = thread::Builder::new()
        .name("red-worker".to_string())
        .spawn(move || worker.run())?;

    info!(queue_capacity = capacity, "red worker started");
    Ok((tx, join))
}
