//! RED polling - the engine behind `redstat`
//!
//! Samples a remote process's RED line and reports it:
//!
//! - no interval, a zero interval, or a count of zero: one absolute report
//!   (duration is the remote's time since reset)
//! - interval: waits, samples again and reports the delta, tagged with the
//!   interval rather than a measured duration; `count` deltas, or forever
//!   when no count is given
//!
//! Reports are written as `red = <text>` or `red = <json>` lines.

mod source;

pub use source::{HttpSource, NetworkError, RedSource};

use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use tracing::{debug, error};

use crate::red::{ParseError, Snapshot};

/// Which samples to take
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollPlan {
    pub interval: Option<Duration>,
    pub count: Option<u64>,
}

impl PollPlan {
    pub fn once() -> Self {
        PollPlan::default()
    }

    pub fn every(interval: Duration) -> Self {
        PollPlan {
            interval: Some(interval),
            count: None,
        }
    }

    pub fn times(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug)]
pub enum PollError {
    Network(NetworkError),
    Parse(ParseError),
    /// Writing a report failed
    Io(io::Error),
}

impl PollError {
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, PollError::Network(e) if e.is_connection_refused())
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::Network(e) => write!(f, "{}", e),
            PollError::Parse(e) => write!(f, "{}", e),
            PollError::Io(e) => write!(f, "failed to write report: {}", e),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Network(e) => Some(e),
            PollError::Parse(e) => Some(e),
            PollError::Io(e) => Some(e),
        }
    }
}

impl From<NetworkError> for PollError {
    fn from(e: NetworkError) -> Self {
        PollError::Network(e)
    }
}

impl From<ParseError> for PollError {
    fn from(e: ParseError) -> Self {
        PollError::Parse(e)
    }
}

impl From<io::Error> for PollError {
    fn from(e: io::Error) -> Self {
        PollError::Io(e)
    }
}

/// What to do with an error that ends a poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and exit with status 1
    #[default]
    Exit,
    /// Panic, so test harnesses can observe the failure
    Panic,
}

impl FailurePolicy {
    pub fn fail(self, err: &PollError) -> ! {
        match self {
            FailurePolicy::Exit => {
                error!("redstat: fatal error, halting: {}", err);
                std::process::exit(1)
            }
            FailurePolicy::Panic => panic!("redstat: fatal error, halting: {}", err),
        }
    }
}

/// Drives a [`RedSource`] according to a [`PollPlan`]
pub struct Poller<S, W> {
    source: S,
    out: W,
    format: ReportFormat,
}

impl<S: RedSource, W: Write> Poller<S, W> {
    pub fn new(source: S, out: W, format: ReportFormat) -> Self {
        Poller {
            source,
            out,
            format,
        }
    }

    /// Run the plan, returning the last snapshot reported. The first error
    /// ends the run.
    pub async fn run(&mut self, plan: PollPlan) -> Result<Snapshot, PollError> {
        let interval = match plan.interval {
            Some(interval) if !interval.is_zero() && plan.count != Some(0) => interval,
            _ => {
                let absolute = self.sample().await?;
                self.report(&absolute)?;
                return Ok(absolute);
            }
        };

        let mut previous = self.sample().await?;
        debug!("sample 0 was {}", previous);

        let mut last = previous.subtract(&previous).with_duration(interval);
        let mut taken: u64 = 0;
        while plan.count.map_or(true, |count| taken < count) {
            tokio::time::sleep(interval).await;
            let current = self.sample().await?;
            taken += 1;
            debug!("sample {} was {}", taken, current);

            last = current.subtract(&previous).with_duration(interval);
            self.report(&last)?;
            previous = current;
        }
        Ok(last)
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn sample(&mut self) -> Result<Snapshot, PollError> {
        let line = self.source.fetch().await?;
        Ok(line.parse()?)
    }

    fn report(&mut self, snapshot: &Snapshot) -> Result<(), PollError> {
        match self.format {
            ReportFormat::Text => writeln!(self.out, "red = {}", snapshot)?,
            ReportFormat::Json => {
                let json = serde_json::to_string(snapshot).map_err(io::Error::other)?;
                writeln!(self.out, "red = {}", json)?;
            }
        }
        self.out.flush()?;
        Ok(())
    }
}
