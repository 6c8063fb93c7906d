//! Runtime configuration
//!
//! Settings are loaded from environment variables, each falling back to a
//! default when unset or unparsable.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RED_QUEUE_CAPACITY | 100 | Worker queue capacity before callers block |
//! | RED_VERBOSE | false | Trace every request the worker handles |
//! | RED_LISTEN_ADDR | 127.0.0.1:7723 | Exposition endpoint address |
//! | RED_SIMULATE_LOAD | false | Generate synthetic traffic in `red-server` |
//! | RED_LOG_FORMAT | text | `text` or `json` log output |

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

const DEFAULT_QUEUE_CAPACITY: usize = 100;
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7723";

/// Configuration for one aggregator instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Requests the worker queue holds before senders block.
    /// Should exceed the number of concurrent callers.
    pub queue_capacity: usize,
    /// Log each request and the resulting state at debug level
    pub verbose: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            verbose: false,
        }
    }
}

impl AggregatorConfig {
    pub fn from_env() -> Self {
        AggregatorConfig {
            queue_capacity: std::env::var("RED_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            verbose: env_flag("RED_VERBOSE"),
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }
}

/// Configuration for the HTTP exposition endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpositionConfig {
    pub listen_addr: SocketAddr,
    pub simulate_load: bool,
}

impl Default for ExpositionConfig {
    fn default() -> Self {
        ExpositionConfig {
            listen_addr: default_listen_addr(),
            simulate_load: false,
        }
    }
}

impl ExpositionConfig {
    pub fn from_env() -> Self {
        ExpositionConfig {
            listen_addr: std::env::var("RED_LISTEN_ADDR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_listen_addr),
            simulate_load: env_flag("RED_SIMULATE_LOAD"),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("RED_LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    DEFAULT_LISTEN_ADDR
        .parse()
        .expect("hardcoded address must parse")
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
