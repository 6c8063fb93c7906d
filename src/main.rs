//! red-server: runs one aggregator and serves it over HTTP for `redstat`.
//!
//! With `RED_SIMULATE_LOAD=1` a background thread records synthetic
//! traffic, which is handy for trying `redstat` against something live.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::info;

use red_agg::observability::init_tracing;
use red_agg::{exposition, Aggregator, AggregatorConfig, ExpositionConfig, Field, LogFormat, Red};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AggregatorConfig::from_env();
    init_tracing(config.verbose, LogFormat::from_env());

    let exposition_config = ExpositionConfig::from_env();
    let aggregator = Aggregator::spawn(config)?;
    let red = aggregator.start_acknowledged();

    if exposition_config.simulate_load {
        let load = aggregator.handle();
        thread::Builder::new()
            .name("red-load".to_string())
            .spawn(move || simulate_load(load))?;
        info!("Simulating load");
    }

    let listener = exposition::bind(&exposition_config).await?;
    exposition::serve(listener, red).await?;
    Ok(())
}

/// Roughly 20 requests a second, about 5% of them errors
fn simulate_load(mut red: Red) {
    let mut rng = rand::thread_rng();
    loop {
        thread::sleep(Duration::from_millis(rng.gen_range(10..90)));
        if red.add(Field::Requests, 1).is_err() {
            return;
        }
        if rng.gen_bool(0.05) && red.add(Field::Errors, 1).is_err() {
            return;
        }
    }
}
