use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use pool_ohlcv_client::gecko::{
    ClientConfig, DEFAULT_PAGE_LIMIT, GECKO_TERMINAL_BASE_URL, GeckoTerminalClient,
};
use pool_ohlcv_client::history::DEFAULT_HISTORY_CHUNKS;
use pool_ohlcv_client::pools::PoolSummary;
use pool_ohlcv_client::source::PageQuery;
use pool_ohlcv_core::series::CandleSeries;
use pool_ohlcv_core::target::{RequestTarget, Timeframe, network_id};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "pool-ohlcv",
    about = "Fetch OHLCV candles for on-chain liquidity pools from GeckoTerminal"
)]
struct Cli {
    /// API base URL
    #[arg(long, default_value = GECKO_TERMINAL_BASE_URL)]
    base_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a single page of candles
    Page {
        /// Network name or id (eth, ethereum, base, solana, ...)
        #[arg(short, long)]
        network: String,

        /// Pool contract address
        #[arg(short, long)]
        pool: String,

        /// Candle timeframe: minute, hour, day
        #[arg(short, long, default_value = "hour")]
        timeframe: Timeframe,

        /// Number of candles (max 1000)
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,

        /// Only candles before this unix timestamp
        #[arg(long)]
        before: Option<i64>,

        /// Timeframe units per candle (e.g. 4 with hour for 4h candles)
        #[arg(long)]
        aggregate: Option<u32>,

        /// Output format: csv, json
        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Fetch several pages and merge them into one series
    History {
        #[arg(short, long)]
        network: String,

        #[arg(short, long)]
        pool: String,

        #[arg(short, long, default_value = "hour")]
        timeframe: Timeframe,

        /// Number of 1000-candle pages to request
        #[arg(long, default_value_t = DEFAULT_HISTORY_CHUNKS)]
        chunks: u32,

        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// Walk back through history until the requested number of days is covered
    Backfill {
        #[arg(short, long)]
        network: String,

        #[arg(short, long, required_unless_present = "token", conflicts_with = "token")]
        pool: Option<String>,

        /// Backfill the token's top pool instead, starting no earlier than its creation
        #[arg(long)]
        token: Option<String>,

        #[arg(short, long, default_value = "hour")]
        timeframe: Timeframe,

        /// Days of history to cover, counting back from now
        #[arg(long, default_value_t = 90)]
        days: u32,

        /// Upper bound on API calls
        #[arg(long, default_value_t = 20)]
        max_calls: u32,

        #[arg(long, default_value = "csv")]
        format: String,
    },

    /// List the pools trading a token
    Pools {
        #[arg(short, long)]
        network: String,

        /// Token contract address
        #[arg(long)]
        token: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },
}

fn write_series(out: &mut impl Write, series: &CandleSeries, format: &str) -> Result<()> {
    match format {
        "csv" => {
            writeln!(out, "timestamp,open,high,low,close,volume")?;
            for c in series {
                writeln!(
                    out,
                    "{},{},{},{},{},{}",
                    c.timestamp.to_rfc3339(),
                    c.open,
                    c.high,
                    c.low,
                    c.close,
                    c.volume
                )?;
            }
        }
        "json" => {
            serde_json::to_writer_pretty(&mut *out, series.candles())?;
            writeln!(out)?;
        }
        other => anyhow::bail!("unknown format: {other}. Expected: csv, json"),
    }
    Ok(())
}

fn write_pools(out: &mut impl Write, pools: &[PoolSummary], format: &str) -> Result<()> {
    match format {
        "text" => {}
        "json" => {
            serde_json::to_writer_pretty(&mut *out, pools)?;
            writeln!(out)?;
            return Ok(());
        }
        other => anyhow::bail!("unknown format: {other}. Expected: text, json"),
    }

    for pool in pools {
        let price = pool
            .base_token_price_usd
            .map(|p| p.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        let created = pool
            .created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        writeln!(
            out,
            "{}  {}  price_usd={price}  created={created}",
            pool.address,
            pool.name.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

fn emit(series: Option<CandleSeries>, target: &RequestTarget, format: &str) -> Result<()> {
    let series = series.with_context(|| format!("no candles returned for {target}"))?;
    info!("{target}: {} candle(s)", series.len());
    write_series(&mut std::io::stdout().lock(), &series, format)
}

fn before_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).with_context(|| format!("invalid unix timestamp: {secs}"))
}

fn backfill_since(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .with_context(|| format!("--days {days} reaches before the earliest supported date"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = GeckoTerminalClient::with_config(ClientConfig {
        base_url: cli.base_url.clone(),
        ..ClientConfig::default()
    })
    .context("failed to build HTTP client")?;

    match &cli.command {
        Commands::Page {
            network,
            pool,
            timeframe,
            limit,
            before,
            aggregate,
            format,
        } => {
            let target = RequestTarget::new(network_id(network), pool.clone(), *timeframe);
            let query = PageQuery {
                limit: *limit,
                before: before.map(before_timestamp).transpose()?,
                aggregate: *aggregate,
            };
            emit(client.fetch_page_with(&target, &query).await, &target, format)?;
        }
        Commands::History {
            network,
            pool,
            timeframe,
            chunks,
            format,
        } => {
            let target = RequestTarget::new(network_id(network), pool.clone(), *timeframe);
            emit(client.fetch_history(&target, *chunks).await, &target, format)?;
        }
        Commands::Backfill {
            network,
            pool,
            token,
            timeframe,
            days,
            max_calls,
            format,
        } => {
            let network = network_id(network);
            let since = backfill_since(Utc::now(), *days)?;

            match (pool, token) {
                (Some(pool), _) => {
                    let target = RequestTarget::new(network, pool.clone(), *timeframe);
                    info!("{target}: backfilling since {since} (at most {max_calls} call(s))");
                    emit(
                        client.backfill(&target, since, *max_calls).await,
                        &target,
                        format,
                    )?;
                }
                (None, Some(token)) => {
                    let (pool, series) = client
                        .backfill_top_pool(&network, token, *timeframe, since, *max_calls)
                        .await
                        .with_context(|| {
                            format!("no candles returned for the top pool of {token} on {network}")
                        })?;
                    info!(
                        "{}: {} candle(s) from pool {}",
                        series.target(),
                        series.len(),
                        pool.name.as_deref().unwrap_or("-")
                    );
                    write_series(&mut std::io::stdout().lock(), &series, format)?;
                }
                (None, None) => anyhow::bail!("either --pool or --token is required"),
            }
        }
        Commands::Pools {
            network,
            token,
            format,
        } => {
            let network = network_id(network);
            let pools = client
                .token_pools(&network, token)
                .await
                .with_context(|| format!("no pools found for token {token} on {network}"))?;
            write_pools(&mut std::io::stdout().lock(), &pools, format)?;
        }
    }

    Ok(())
}
