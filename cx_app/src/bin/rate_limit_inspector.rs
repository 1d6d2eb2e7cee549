//! Rate limit inspector
//!
//! Lists the fixed-window counters stored in Redis, shows which windows are still active,
//! and optionally clears them.

use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use cx_app::tracing_setup;
use cx_ratelimit::DEFAULT_KEY_PREFIX;
use cx_ratelimit::RedisCounterStore;
use cx_ratelimit::SharedCounterStore;
use cx_ratelimit::TimeSource;
use cx_ratelimit::key_builder::parse_key;
use cx_ratelimit::key_builder::search_pattern;
use cx_ratelimit::key_builder::window_for_timestamp;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::Level;
use tracing::info;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(name = "rate_limit_inspector")]
#[command(about = "Inspect URL-pattern rate limit counters in Redis", long_about = None)]
struct Args {
    /// Redis connection URL
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Key prefix the limiters were configured with
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    prefix: String,

    /// Only show this label
    #[arg(long)]
    label: Option<String>,

    /// Window size in seconds used to classify keys as active or expired
    #[arg(long, default_value = "300")]
    window: u64,

    /// Delete every listed key
    #[arg(long)]
    clear: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

struct Row {
    key: String,
    label: String,
    count: u64,
    window: u64,
    active: bool,
    remaining: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_setup::init_stdout(if args.verbose { Level::DEBUG } else { Level::WARN });

    if args.window == 0 {
        anyhow::bail!("--window must be greater than 0");
    }

    let store = RedisCounterStore::connect(&args.redis_url, Duration::from_secs(5)).await.with_context(|| format!("connecting to {}", args.redis_url))?;
    store.ping().await.context("redis ping failed")?;
    info!("Connected to redis");

    let pattern = search_pattern(&args.prefix, args.label.as_deref(), None);
    let keys = store.scan_keys(&pattern).await?;

    let now = TimeSource::System.now_secs();
    let current_window = window_for_timestamp(now, args.window);

    let mut rows = Vec::with_capacity(keys.len());
    for key in &keys {
        let Some(parsed) = parse_key(key) else {
            warn!(key = %key, "Skipping key that does not follow the counter layout");
            continue;
        };
        let count = store.get(key).await?;
        let active = parsed.window == current_window;
        let remaining = active.then(|| (current_window + 1) * args.window - now);
        rows.push(Row { key: key.clone(), label: parsed.label, count, window: parsed.window, active, remaining });
    }

    if rows.is_empty() {
        println!("No rate limit keys match {pattern}");
    } else {
        println!("{:<24} {:>8} {:>12} {:<8} {:>10}", "LABEL", "COUNT", "WINDOW", "STATUS", "REMAINING");
        for row in &rows {
            let status = if row.active { "Active" } else { "Expired" };
            let remaining = row.remaining.map(|s| format!("{s}s")).unwrap_or_else(|| "-".to_string());
            println!("{:<24} {:>8} {:>12} {:<8} {:>10}", row.label, row.count, row.window, status, remaining);
        }
    }

    let now_utc = OffsetDateTime::from_unix_timestamp(now as i64).unwrap_or_else(|_| OffsetDateTime::now_utc());
    println!();
    println!("Total keys:     {}", rows.len());
    println!("Current window: {current_window}");
    println!("Window size:    {}s", args.window);
    println!("Current time:   {}", now_utc.format(&Rfc3339)?);

    if args.clear && !rows.is_empty() {
        let keys: Vec<String> = rows.into_iter().map(|row| row.key).collect();
        let removed = store.delete_keys(&keys).await?;
        println!("Deleted {removed} keys");
    }

    Ok(())
}
