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

use roast_cli::cli_args::Series;
use roast_cli::input::load_series;
use roast_series::{SeriesSummary, TimeSeriesProcessor};
use tracing::{debug, warn};

pub fn run_series(args: Series) -> anyhow::Result<()> {
    let series = load_series(&args.input)?;
    debug!("loaded {} series from {}", series.len(), args.input.display());

    let derived = TimeSeriesProcessor::default().process(&series, args.unit);
    if derived.is_empty() {
        warn!("no valid temperature samples in {}", args.input.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&derived)?);
        return Ok(());
    }

    let symbol = args.unit.symbol();
    for (name, points) in &derived {
        let summary = SeriesSummary::from_points(points);
        println!("{name}:");
        println!(
            "  points     {} ({} without a reading)",
            summary.points,
            summary.missing()
        );
        println!("  duration   {}", fmt_value(summary.duration_min, "min"));
        println!(
            "  peak       {}",
            fmt_value(summary.peak_temperature, &format!("°{symbol}"))
        );
        println!(
            "  peak RoR   {}",
            fmt_value(summary.peak_rate, &format!("°{symbol}/min"))
        );
        println!(
            "  mean RoR   {}",
            fmt_value(summary.mean_rate, &format!("°{symbol}/min"))
        );
    }
    Ok(())
}

fn fmt_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v:.1} {unit}"),
        None => "-".to_string(),
    }
}
