//! RED (Requests, Errors, Duration) aggregation
//!
//! Many threads record into one triad without taking a lock: a single
//! worker thread owns the state and applies requests from a bounded queue
//! one at a time.
//!
//! ```
//! use red_agg::{Aggregator, AggregatorConfig, Field};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let aggregator = Aggregator::spawn(AggregatorConfig::default())?;
//! let mut red = aggregator.start_acknowledged();
//!
//! red.add(Field::Requests, 1)?;
//! red.add(Field::Errors, 1)?;
//! assert_eq!((red.requests(), red.errors()), (1, 1));
//! tracing::info!("{}", red.now()); // "1, 1, 0.000042s"
//! # Ok(())
//! # }
//! ```

mod error;
mod field;
mod handle;
mod snapshot;
mod worker;

pub use error::{ParseError, RedError, NOT_STARTED};
pub use field::Field;
pub use handle::{Aggregator, Red};
pub use snapshot::Snapshot;
