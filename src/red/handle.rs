//! Caller-facing side of the aggregator.
//!
//! [`Aggregator`] owns the queue into one worker. [`Red`] is the handle
//! callers keep: each operation is a blocking round trip with the worker,
//! and the handle remembers the last triad it was sent back.

use std::fmt;
use std::io;

use crossbeam::channel::{self, Sender};

use super::error::{fatal, ProgrammerError, RedError, NOT_STARTED};
use super::field::{Field, Operand};
use super::snapshot::Snapshot;
use super::worker::{spawn_worker, Request};
use crate::config::AggregatorConfig;

/// One aggregator instance: a worker thread plus the queue into it.
///
/// Cloning shares the same worker. The worker exits once the aggregator and
/// every handle created from it are dropped.
#[derive(Clone)]
pub struct Aggregator {
    tx: Sender<Request>,
}

impl Aggregator {
    pub fn spawn(config: AggregatorConfig) -> io::Result<Self> {
        let (tx, _join) = spawn_worker(&config)?;
        Ok(Aggregator { tx })
    }

    /// Reset the aggregator and return a fresh handle.
    ///
    /// The reset is queued without waiting for the worker, so requests that
    /// other callers queued before it are wiped, and requests they queue
    /// concurrently may land on either side of it.
    pub fn start(&self) -> Red {
        send_or_die(&self.tx, Request::Reset { ack_tx: None });
        Red::attached(self.tx.clone())
    }

    /// Like [`start`](Self::start), but returns only after the worker has
    /// applied the reset.
    pub fn start_acknowledged(&self) -> Red {
        let (ack_tx, ack_rx) = channel::bounded(1);
        send_or_die(&self.tx, Request::Reset { ack_tx: Some(ack_tx) });
        if ack_rx.recv().is_err() {
            fatal(ProgrammerError::ReplyDropped { op: "reset" });
        }
        Red::attached(self.tx.clone())
    }

    /// A handle on the running aggregator, without resetting it. Its local
    /// copy stays zero until the first round trip.
    pub fn handle(&self) -> Red {
        Red::attached(self.tx.clone())
    }
}

/// Handle for recording and reading a RED triad.
///
/// `Red::default()` is an unstarted handle: mutating calls fail with
/// [`RedError::NilHandle`], while `now()` and formatting still work so
/// logging call sites never have to check.
#[derive(Debug, Clone)]
pub struct Red {
    link: Option<Sender<Request>>,
    local: Snapshot,
}

impl Default for Red {
    fn default() -> Self {
        Red {
            link: None,
            local: Snapshot::zero(),
        }
    }
}

impl Red {
    fn attached(tx: Sender<Request>) -> Self {
        Red {
            link: Some(tx),
            local: Snapshot::zero(),
        }
    }

    pub fn is_started(&self) -> bool {
        self.link.is_some()
    }

    pub fn requests(&self) -> i64 {
        self.local.requests
    }

    pub fn errors(&self) -> i64 {
        self.local.errors
    }

    /// The copy this handle last received
    pub fn snapshot(&self) -> Snapshot {
        self.local
    }

    /// Add `value` to a counter and refresh the local copy.
    pub fn add(&mut self, field: Field, value: i64) -> Result<(), RedError> {
        let link = self.link.as_ref().ok_or(RedError::NilHandle)?;
        let operand = Operand::for_call("add", field, value)?;
        let reply = round_trip(link, |reply_tx| Request::Add {
            operand,
            value,
            reply_tx,
        });
        self.absorb(reply);
        Ok(())
    }

    /// Set a counter to `value` and refresh the local copy.
    pub fn overwrite(&mut self, field: Field, value: i64) -> Result<(), RedError> {
        let link = self.link.as_ref().ok_or(RedError::NilHandle)?;
        let operand = Operand::for_call("overwrite", field, value)?;
        let reply = round_trip(link, |reply_tx| Request::Overwrite {
            operand,
            value,
            reply_tx,
        });
        self.absorb(reply);
        Ok(())
    }

    pub fn read_all(&mut self) -> Result<(), RedError> {
        let link = self.link.as_ref().ok_or(RedError::NilHandle)?;
        let reply = round_trip(link, |reply_tx| Request::ReadAll { reply_tx });
        self.absorb(reply);
        Ok(())
    }

    /// Current counters with duration measured since the last reset.
    ///
    /// Typically closes a period, as in `info!("{}", red.now())`. On an
    /// unstarted handle this returns a zero snapshot instead of failing.
    pub fn now(&mut self) -> Snapshot {
        let Some(link) = self.link.as_ref() else {
            return Snapshot::zero();
        };
        let reply = round_trip(link, |reply_tx| Request::ReadNow { reply_tx });
        self.absorb(reply);
        reply
    }

    /// JSON form of the local copy, duration in nanoseconds.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        if !self.is_started() {
            return serde_json::to_vec(NOT_STARTED);
        }
        self.local.to_json()
    }

    fn absorb(&mut self, reply: Snapshot) {
        self.local.requests = reply.requests;
        self.local.errors = reply.errors;
        self.local.duration_nanos = reply.duration_nanos;
    }
}

impl fmt::Display for Red {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_started() {
            return f.write_str(NOT_STARTED);
        }
        self.local.fmt(f)
    }
}

fn send_or_die(tx: &Sender<Request>, request: Request) {
    let op = request.kind();
    if tx.send(request).is_err() {
        fatal(ProgrammerError::WorkerGone { op });
    }
}

/// Queue a request and block for its reply
fn round_trip(
    tx: &Sender<Request>,
    build: impl FnOnce(Sender<Snapshot>) -> Request,
) -> Snapshot {
    let (reply_tx, reply_rx) = channel::bounded(1);
    let request = build(reply_tx);
    let op = request.kind();
    send_or_die(tx, request);
    match reply_rx.recv() {
        Ok(snapshot) => snapshot,
        Err(_) => fatal(ProgrammerError::ReplyDropped { op }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn aggregator() -> Aggregator {
        Aggregator::spawn(AggregatorConfig::default()).unwrap()
    }

    #[test]
    fn test_start_then_read_all_is_zero() {
        let mut red = aggregator().start();
        red.read_all().unwrap();
        assert!(red.snapshot().is_zero());
        assert_eq!(red.to_string(), "0, 0, 0.000000s");
    }

    #[test]
    fn test_add_updates_local_copy() {
        let mut red = aggregator().start();
        red.add(Field::Requests, 1).unwrap();
        red.add(Field::Errors, 11).unwrap();
        assert_eq!(red.requests(), 1);
        assert_eq!(red.errors(), 11);
    }

    #[test]
    fn test_overwrite() {
        let mut red = aggregator().start();
        red.add(Field::Requests, 5).unwrap();
        red.overwrite(Field::Requests, 2).unwrap();
        red.add(Field::Requests, 1).unwrap();
        assert_eq!(red.requests(), 3);
    }

    #[test]
    fn test_add_wraps_instead_of_aborting() {
        let mut red = aggregator().start_acknowledged();
        red.add(Field::Requests, i64::MAX).unwrap();
        red.add(Field::Requests, 1).unwrap();
        assert_eq!(red.requests(), i64::MIN);

        // the worker is still alive and serving
        red.add(Field::Errors, 2).unwrap();
        red.read_all().unwrap();
        assert_eq!((red.requests(), red.errors()), (i64::MIN, 2));
    }

    #[test]
    fn test_usage_errors_do_not_reach_worker() {
        let mut red = aggregator().start();
        red.add(Field::Requests, 4).unwrap();

        let err = red.add(Field::Duration, 1).unwrap_err();
        assert!(matches!(err, RedError::Usage { op: "add", .. }));
        let err = red.overwrite(Field::None, 1).unwrap_err();
        assert!(matches!(err, RedError::Usage { op: "overwrite", .. }));

        red.read_all().unwrap();
        assert_eq!(red.requests(), 4);
        assert_eq!(red.errors(), 0);
    }

    #[test]
    fn test_unstarted_handle() {
        let mut red = Red::default();
        assert!(!red.is_started());
        assert_eq!(red.add(Field::Errors, 1), Err(RedError::NilHandle));
        assert_eq!(red.overwrite(Field::Errors, 1), Err(RedError::NilHandle));
        assert_eq!(red.read_all(), Err(RedError::NilHandle));
        assert_eq!(red.to_string(), NOT_STARTED);
        assert!(red.now().is_zero());
        assert_eq!(red.now().to_string(), "0, 0, 0.000000s");
        assert_eq!(
            String::from_utf8(red.to_json().unwrap()).unwrap(),
            format!("{:?}", NOT_STARTED)
        );
    }

    #[test]
    fn test_now_measures_without_storing() {
        let mut red = aggregator().start();
        std::thread::sleep(Duration::from_millis(5));

        let first = red.now();
        let second = red.now();
        assert!(first.duration() >= Duration::from_millis(5));
        assert!(second.duration_nanos >= first.duration_nanos);

        red.read_all().unwrap();
        assert_eq!(red.snapshot().duration_nanos, 0);
    }

    #[test]
    fn test_now_refreshes_display() {
        let mut red = aggregator().start();
        red.add(Field::Requests, 2).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        red.now();
        assert!(red.snapshot().duration_nanos > 0);
        assert!(red.to_string().starts_with("2, 0, 0.0"));
    }

    #[test]
    fn test_start_acknowledged_resets() {
        let agg = aggregator();
        let mut first = agg.start();
        first.add(Field::Requests, 7).unwrap();

        let mut second = agg.start_acknowledged();
        second.read_all().unwrap();
        assert_eq!(second.requests(), 0);

        // The older handle shares the worker and sees the reset too
        first.read_all().unwrap();
        assert_eq!(first.requests(), 0);
    }

    #[test]
    fn test_handle_attaches_without_reset() {
        let agg = aggregator();
        let mut red = agg.start();
        red.add(Field::Errors, 3).unwrap();

        let mut other = agg.handle();
        assert_eq!(other.errors(), 0);
        other.read_all().unwrap();
        assert_eq!(other.errors(), 3);
    }

    #[test]
    fn test_handle_json() {
        let mut red = aggregator().start();
        red.add(Field::Requests, 3).unwrap();
        red.add(Field::Errors, 1).unwrap();
        let json = String::from_utf8(red.to_json().unwrap()).unwrap();
        assert_eq!(json, r#"{"requests":3,"errors":1,"duration":0}"#);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = aggregator().start();
        let mut b = aggregator().start();
        a.add(Field::Requests, 10).unwrap();
        b.read_all().unwrap();
        assert_eq!(b.requests(), 0);
    }
}
