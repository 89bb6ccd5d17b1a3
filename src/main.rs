use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use view_enhancer::page::{PageActuator, PageFrame, PageSensor, ScriptedPage};
use view_enhancer::settings::{
    ConfigurationRequests, InMemorySettings, PreferenceSource, SettingsStore, ViewerSettings,
};
use view_enhancer::{Engine, EngineConfig};

/// Replay a recorded page timeline through the enhancement engine.
#[derive(Debug, Parser)]
#[command(name = "view-enhancer", version)]
struct Args {
    /// Scenario file: `{ "frames": [{ "at_ms": 0, "page": { ... } }] }`.
    scenario: PathBuf,

    /// Settings file. Created with defaults when missing; in-memory defaults when omitted.
    #[arg(long, env = "VIEW_ENHANCER_SETTINGS")]
    settings: Option<PathBuf>,

    /// Engine timing overrides (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to keep observing after the last frame.
    #[arg(long, default_value_t = 1000)]
    linger_ms: u64,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    frames: Vec<TimedFrame>,
}

#[derive(Debug, Deserialize)]
struct TimedFrame {
    at_ms: u64,
    page: PageFrame,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let raw = fs::read_to_string(&args.scenario)
        .with_context(|| format!("failed to read scenario {}", args.scenario.display()))?;
    let mut scenario: Scenario = serde_json::from_str(&raw).context("malformed scenario")?;
    scenario.frames.sort_by_key(|f| f.at_ms);

    let page = Arc::new(ScriptedPage::default());
    if let Some(first) = scenario.frames.first() {
        page.set_frame(first.page.clone());
    }

    let store = args.settings.as_ref().map(SettingsStore::new).map(Arc::new);
    let (preferences, requests): (Arc<dyn PreferenceSource>, Arc<dyn ConfigurationRequests>) =
        match &store {
            Some(store) => {
                if !store.path().exists() {
                    store.install()?;
                }
                let preferences: Arc<dyn PreferenceSource> = store.clone();
                let requests: Arc<dyn ConfigurationRequests> = store.clone();
                (preferences, requests)
            }
            None => {
                let memory = Arc::new(InMemorySettings::new(ViewerSettings::default()));
                let preferences: Arc<dyn PreferenceSource> = memory.clone();
                let requests: Arc<dyn ConfigurationRequests> = memory;
                (preferences, requests)
            }
        };

    let sensor: Arc<dyn PageSensor> = page.clone();
    let actuator: Arc<dyn PageActuator> = page.clone();
    let engine = Engine::new(config, sensor, actuator, preferences, requests);

    let launched = match &store {
        Some(store) => engine.launch(&**store),
        None => engine.launch(&|| true),
    };
    let handle = match launched {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!("Engine did not start: {}", e);
            return Ok(());
        }
    };

    tracing::info!("Replaying {} frame(s)", scenario.frames.len());
    let started = tokio::time::Instant::now();
    for timed in scenario.frames {
        tokio::time::sleep_until(started + Duration::from_millis(timed.at_ms)).await;
        let frame = timed.page;
        page.update(|current| {
            if current.url != frame.url {
                tracing::debug!("Navigating to {}", frame.url);
            }
            // Mute state belongs to the player, which only the engine toggles.
            let muted = current.muted;
            *current = frame;
            current.muted = muted;
        });
    }
    tokio::time::sleep(Duration::from_millis(args.linger_ms)).await;

    engine.stop(&handle);

    for action in page.actions() {
        tracing::info!("Page action: {:?}", action);
    }
    Ok(())
}
