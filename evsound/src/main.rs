//! evsound-play - play or cache one event sound
//!
//! Opens a context from the bootstrap config, submits a single request and
//! waits for its outcome. Ctrl+C or `--cancel-after-ms` cancels it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use evsound::{Context, Outcome, PropertyBag};
use evsound_common::config::{ConfigResolver, DriverKind};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for evsound-play
#[derive(Parser, Debug)]
#[command(name = "evsound-play")]
#[command(about = "Play or cache an event sound")]
#[command(version)]
struct Args {
    /// Config file (overrides EVSOUND_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Driver to open (null, simulated)
    #[arg(short, long)]
    driver: Option<DriverKind>,

    /// Request id
    #[arg(long, default_value = "0")]
    id: u32,

    /// Sound event id (e.g. message-new-incoming)
    #[arg(short, long)]
    event_id: Option<String>,

    /// Sound file to play instead of a themed event
    #[arg(short, long)]
    file: Option<String>,

    /// Extra event property, KEY=VALUE (repeatable)
    #[arg(short, long = "prop", value_name = "KEY=VALUE")]
    props: Vec<String>,

    /// Cancel the request after this many milliseconds
    #[arg(long)]
    cancel_after_ms: Option<u64>,

    /// Cache the sound instead of playing it
    #[arg(long)]
    cache: bool,

    /// Print context events as JSON lines
    #[arg(long)]
    events: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new()
        .with_cli_path(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if let Some(kind) = args.driver {
        config.driver.kind = kind;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("evsound={0},evsound_play={0}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("evsound-play {}", evsound::build_info());
    info!("Driver: {}", config.driver.kind);

    let event = build_event_props(&args)?;

    let app = if config.application.contains_key("name") {
        PropertyBag::new()
    } else {
        PropertyBag::builder().application_name("evsound-play").build()?
    };
    let ctx = Context::from_config(&config, app).context("Failed to create sound context")?;

    if args.events {
        let mut rx = ctx.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                }
            }
        });
    }

    let result = if args.cache {
        cache(&ctx, &event)
    } else {
        play(&ctx, args.id, &event, args.cancel_after_ms).await
    };

    ctx.destroy().context("Failed to destroy sound context")?;
    result
}

fn build_event_props(args: &Args) -> Result<PropertyBag> {
    let mut builder = PropertyBag::builder();
    if let Some(id) = &args.event_id {
        builder = builder.event_id(id.clone());
    }
    if let Some(file) = &args.file {
        builder = builder.media_filename(file.clone());
    }
    for pair in &args.props {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Property '{}' is not KEY=VALUE", pair))?;
        builder = builder.set(key, value);
    }
    let props = builder.build()?;

    if props.is_empty() {
        bail!("Nothing to play: pass --event-id, --file or --prop");
    }
    Ok(props)
}

fn cache(ctx: &Context, event: &PropertyBag) -> Result<()> {
    match ctx.cache(event) {
        Ok(()) => {
            info!("Cached {:?}", event.event_id());
            Ok(())
        }
        Err(e) if e.is_soft() => {
            warn!("Caching unavailable: {}", e);
            Ok(())
        }
        Err(e) => Err(e).context("Cache request failed"),
    }
}

async fn play(ctx: &Context, id: u32, event: &PropertyBag, cancel_after_ms: Option<u64>) -> Result<()> {
    let mut playback = ctx.play(id, event).context("Failed to start playback")?;

    let cancel_timer = async {
        match cancel_after_ms {
            Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(cancel_timer);

    let outcome = tokio::select! {
        outcome = &mut playback => outcome,
        _ = &mut cancel_timer => {
            info!("Canceling request {} after {:?}ms", id, cancel_after_ms);
            ctx.cancel(id)?;
            playback.await
        }
        _ = shutdown_signal() => {
            ctx.cancel(id)?;
            playback.await
        }
    };

    println!("{}", outcome);
    match outcome {
        Outcome::Failure(code) => {
            error!("Request {} failed: {}", id, code);
            bail!("Playback failed: {} ({})", code, code.code())
        }
        Outcome::Success | Outcome::Canceled => Ok(()),
    }
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, canceling"),
        Err(e) => {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    }
}
