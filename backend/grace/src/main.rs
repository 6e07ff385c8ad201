use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use grace::{Detector, GraceConfig};
use indicatif::{ProgressBar, ProgressStyle};
use roster::RedisStore;
use tracing_subscriber::{EnvFilter, fmt};

/// Run grace period detection once against Redis.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    #[arg(long, env = "GRACE_THRESHOLD_DAYS")]
    threshold_days: u32,

    /// List who would be flagged without creating anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let store = Arc::new(RedisStore::connect(&args.redis_url).await?);
    let detector = Detector::new(store, GraceConfig::new(args.threshold_days));

    let now = Utc::now();
    let candidates = detector.plan(now).await?;

    println!("Threshold: {} days", args.threshold_days);
    println!("Lapsed Clients: {}\n", candidates.len());

    if args.dry_run {
        for candidate in &candidates {
            println!(
                "{} engaged until {} ({} days ago)",
                candidate.client_id, candidate.engaged_until, candidate.days_lapsed
            );
        }

        return Ok(());
    }

    let pb = ProgressBar::new(candidates.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let report = detector
        .apply(now, &candidates, |candidate| {
            pb.set_message(candidate.client_id.to_string());
            pb.inc(1);
        })
        .await;

    pb.finish_with_message("Done");

    println!("\nCreated: {}", report.created.len());
    println!("Skipped: {}", report.skipped.len());
    println!("Errors: {}", report.errors.len());

    for failure in &report.errors {
        println!("  {}: {}", failure.client_id, failure.message);
    }

    Ok(())
}
