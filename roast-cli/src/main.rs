/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

use clap::Parser;
mod modes;

use modes::queue::run_queue;
use modes::series::run_series;
use roast_cli::cli_args::{Mode, Opt};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // try_init also installs the log bridge so the library crates' records show up.
    tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish()
        .try_init()?;

    let opt = Opt::parse();

    match opt.mode {
        Mode::Series(series) => run_series(series)?,
        Mode::Queue(queue) => run_queue(queue).await?,
    };

    Ok(())
}
