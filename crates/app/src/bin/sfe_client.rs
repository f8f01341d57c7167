//! Requester: ranks one line of input and asks the coding service for a code
//! per symbol, then prints the report.

use anyhow::Context;
use sfe_app::config::ClientConfig;
use sfe_app::input_gen::{generate_sample_line, read_input_line};
use sfe_core::{Dispatcher, Ranking};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ClientConfig::from_args(&args).map_err(anyhow::Error::msg)?;

    sfe_app::init_logging(config.log_level);
    if config.print_config {
        config.print();
    }

    let line = match config.sample_len {
        Some(len) => generate_sample_line(config.seed, len),
        None => read_input_line(std::io::stdin().lock()).context("reading input line")?,
    };

    let ranking = Ranking::from_text(&line);
    tracing::debug!(
        chars = line.chars().count(),
        symbols = ranking.len(),
        "input ranked"
    );

    let dispatcher = Dispatcher::new(config.dispatch_config());
    let (report, metrics) = dispatcher
        .run(&ranking)
        .await
        .with_context(|| format!("encoding via {}", config.endpoint()))?;

    print!("{report}");

    if config.print_metrics {
        metrics.print_summary();
    }

    Ok(())
}
