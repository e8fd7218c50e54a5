//! cachine: serve one image variant from the command line.
//!
//! Loads the orchestrator configuration, runs a single request and writes the
//! payload to stdout (or `--output`). A one-line JSON summary goes to stderr.

use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use cachine::{CachineError, Config, ImageProperties, Predicates, RequestEvent};

/// Cachine CLI
#[derive(Parser)]
#[command(name = "cachine")]
#[command(version = cachine::PKG_VERSION)]
#[command(long_version = long_version())]
#[command(about = "Read-through, write-through cache for image variants")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "CACHINE_CONFIG")]
    config: Option<PathBuf>,

    /// Key of the original resource (e.g. /photos/cat.jpg)
    key: String,

    /// Variant size as WIDTHxHEIGHT (0 leaves a dimension unconstrained)
    #[arg(short, long, value_parser = parse_size)]
    size: ImageProperties,

    /// Modification time of a copy already held (RFC 3339); suppresses the
    /// payload when it is still current
    #[arg(long, value_parser = parse_since)]
    since: Option<SystemTime>,

    /// Write the payload here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn long_version() -> &'static str {
    Box::leak(cachine::version_string().into_boxed_str())
}

fn parse_size(raw: &str) -> Result<ImageProperties, String> {
    raw.parse().map_err(|e: CachineError| e.to_string())
}

fn parse_since(raw: &str) -> Result<SystemTime, String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(SystemTime::from)
        .map_err(|e| format!("invalid RFC 3339 timestamp {raw:?}: {e}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    let orchestrator = config.build().await?;
    debug!(
        version = cachine::version_string(),
        origin = orchestrator.origin().name(),
        cache = orchestrator.cache().name(),
        "configured"
    );

    let mut out: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(tokio::fs::File::create(path).await?),
        None => Box::new(tokio::io::stdout()),
    };

    let predicates = match args.since {
        Some(since) => Predicates::new().min_mod_time(since),
        None => Predicates::new(),
    };

    let mut events = orchestrator.request(args.key.as_str(), args.size, predicates);
    let mut hit = false;
    let mut mod_time = None;
    let mut bytes = 0u64;
    while let Some(event) = events.next().await {
        match event? {
            RequestEvent::Hit(valid) => hit = valid,
            RequestEvent::Meta(meta) => mod_time = Some(meta.mod_time),
            RequestEvent::Data(chunk) => {
                bytes += chunk.len() as u64;
                out.write_all(&chunk).await?;
            }
            RequestEvent::End => break,
        }
    }
    out.flush().await?;

    let summary = serde_json::json!({
        "key": args.key,
        "size": args.size.to_string(),
        "hit": hit,
        "mod_time": mod_time.map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339()),
        "bytes": bytes,
    });
    eprintln!("{summary}");

    Ok(())
}
