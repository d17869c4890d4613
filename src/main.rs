//! Demonstration driver: builds a `Cache`, runs a short synthetic workload
//! against it, and prints a hit-ratio/metrics snapshot. Not a server — the
//! cache is a library meant to be embedded, and this binary exists only to
//! exercise it end to end the way a smoke test would.

use advcache::{Cache, CacheBuilder, CacheConfig};
use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use tracing::info;

/// Synthetic workload driver for the advcache library.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of distinct keys in the synthetic workload's key space.
    #[arg(long, default_value_t = 10_000)]
    key_space: u64,

    /// Number of get/set operations to run.
    #[arg(long, default_value_t = 200_000)]
    operations: u64,

    /// Total cost budget for the cache.
    #[arg(long, default_value_t = 1 << 16)]
    max_cost: i64,
}

fn configure_logger() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().pretty())
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    configure_logger();

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<()> {
    let config = CacheConfig {
        num_counters: (args.key_space as usize).max(64),
        max_cost: args.max_cost,
        ..CacheConfig::default()
    };

    let cache: Cache<u64> = CacheBuilder::new(config)
        .build()
        .context("failed to build cache")?;

    info!(
        component = "main",
        event = "workload_started",
        key_space = args.key_space,
        operations = args.operations,
        "running synthetic workload"
    );

    let mut rng = rand::thread_rng();
    for _ in 0..args.operations {
        let key = rng.gen_range(0..args.key_space);
        if cache.get(&key).is_none() {
            cache.set(&key, key, 1);
        }
    }
    cache.wait().await;

    let metrics = cache.metrics();
    info!(
        component = "main",
        event = "workload_finished",
        len = cache.len(),
        hit_ratio = metrics.ratio(),
        "workload complete"
    );

    println!("items stored: {}", cache.len());
    println!("hit ratio: {:.4}", metrics.ratio());
    print!("{}", metrics.format_prometheus());

    cache.close().await;
    Ok(())
}
