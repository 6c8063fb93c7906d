//! redstat - a 'stat' command for RED: requests, errors and duration
//!
//! ```bash
//! redstat http://localhost:7723/metrics          # one absolute report
//! redstat http://localhost:7723/metrics 10 6     # six 10-second deltas
//! redstat --json http://localhost:7723/metrics 1 # 1-second deltas, forever
//! ```

use std::io;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use red_agg::observability::init_tracing;
use red_agg::poller::{FailurePolicy, HttpSource, PollError, PollPlan, Poller, ReportFormat};
use red_agg::LogFormat;

#[derive(Parser)]
#[command(author, version, about = "Report RED (requests, errors, duration) from a URL", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Report in json format
    #[arg(long)]
    json: bool,

    /// Panic instead of exiting on errors
    #[arg(long, hide = true)]
    crash: bool,

    /// URL serving a "<requests>, <errors>, <seconds>" line
    #[arg(value_parser = parse_url)]
    url: Url,

    /// Seconds between samples (at least 1); reports deltas when given
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    delay: Option<u64>,

    /// Number of deltas to report; unlimited when absent
    count: Option<u64>,
}

fn parse_url(s: &str) -> Result<Url, String> {
    Url::parse(s).map_err(|e| format!("url value must be a legal URL: {}", e))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, LogFormat::from_env());

    let policy = if cli.crash {
        FailurePolicy::Panic
    } else {
        FailurePolicy::Exit
    };
    let format = if cli.json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    let plan = PollPlan {
        interval: cli.delay.map(Duration::from_secs),
        count: cli.count,
    };

    let source = match HttpSource::new(cli.url) {
        Ok(source) => source,
        Err(e) => policy.fail(&PollError::from(e)),
    };

    let mut poller = Poller::new(source, io::stdout(), format);
    if let Err(e) = poller.run(plan).await {
        policy.fail(&e);
    }
}
