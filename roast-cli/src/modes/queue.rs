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

use anyhow::Context;
use roast_cli::cli_args::{Queue, QueueCommand, Submit};
use roast_client::{ClientConfig, PendingRequest, RequestOptions, RoastClient, SubmitOutcome};
use tracing::{debug, info};

pub async fn run_queue(args: Queue) -> anyhow::Result<()> {
    let config = args.client.apply(ClientConfig::from_env()?)?;
    debug!("using store {}/{}", config.store_dir.display(), config.store_scope);

    // The CLI has no platform connectivity callback; assume online unless told otherwise.
    let online = !matches!(&args.command, QueueCommand::Submit(Submit { offline: true, .. }));
    let client = RoastClient::create(config, online)?;

    match args.command {
        QueueCommand::List => print_requests(&client.queue().pending().await?, "queued"),
        QueueCommand::Submit(submit) => {
            let mut options = RequestOptions::new(submit.method);
            if let Some(body) = &submit.body {
                let body = serde_json::from_str(body).context("--body must be valid JSON")?;
                options = options.with_body(body);
            }
            match client.queue().submit(&submit.url, options).await? {
                SubmitOutcome::Sent(response) => {
                    println!("{} {}", response.status, response.body);
                }
                SubmitOutcome::Stored { pending } => {
                    println!("stored for later sync ({pending} pending)");
                }
            }
        }
        QueueCommand::Drain => {
            let report = client.queue().drain().await?;
            info!("drain complete");
            println!(
                "attempted {}, succeeded {}, failed {}, requeued {}, dead-lettered {}",
                report.attempted,
                report.succeeded,
                report.failed,
                report.requeued,
                report.dead_lettered
            );
        }
        QueueCommand::DeadLetters { clear } => {
            print_requests(&client.queue().dead_letters().await?, "dead-lettered");
            if clear {
                let removed = client.queue().clear_dead_letters().await?;
                println!("cleared {removed} dead letters");
            }
        }
    }

    client.shutdown();
    Ok(())
}

fn print_requests(requests: &[PendingRequest], label: &str) {
    if requests.is_empty() {
        println!("no {label} requests");
        return;
    }
    for (index, request) in requests.iter().enumerate() {
        let attempts = match request.failed_attempts {
            0 => String::new(),
            n => format!(" (failed {n}x)"),
        };
        println!(
            "{index:>3}  {} {}  @{}{attempts}",
            request.options.method, request.url, request.timestamp
        );
        if let Some(body) = &request.options.body {
            println!("     {body}");
        }
    }
}
