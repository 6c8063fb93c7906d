pub mod config;
pub mod exposition;
pub mod observability;
pub mod poller;
pub mod red;

pub use config::{AggregatorConfig, ExpositionConfig, LogFormat};
pub use red::{Aggregator, Field, ParseError, Red, RedError, Snapshot};
