//! provisiond: clicker provisioning daemon (host simulation build).
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ClickerRegistry   HistoryStore   SimConnections  LocalBusHub  │
//! │  (DeviceRegistry)  (HistoryPort)  (ConnectionPort)(BusPort)    │
//! │  LedBank<SimPin>   ButtonBank<SimPin>   MonotonicClock         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌──────────────────────────────┐   ┌──────────────────────┐   │
//! │  │ ProvisioningService          │◀──│ IpcAgent (ipc-loop)  │   │
//! │  │ Controller · History · PSK   │──▶│ RPC · credentials    │   │
//! │  └──────────────────────────────┘   └──────────────────────┘   │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use provisiond::adapters::config_file::JsonConfigFile;
use provisiond::adapters::connection::SimConnections;
use provisiond::adapters::history::HistoryStore;
use provisiond::adapters::local_bus::{LocalBusHub, ServiceFn};
use provisiond::adapters::registry::ClickerRegistry;
use provisiond::adapters::time::MonotonicClock;
use provisiond::app::controller::Controller;
use provisiond::app::ports::{ButtonPort, Clock, ConfigError, ConfigPort, HistoryPort};
use provisiond::app::service::ProvisioningService;
use provisiond::config::DaemonConfig;
use provisiond::drivers::button::ButtonBank;
use provisiond::drivers::gpio::SimPin;
use provisiond::drivers::led_bank::LedBank;
use provisiond::events::EventQueue;
use provisiond::ipc::{AgentDeps, IpcAgent};

#[derive(Parser, Debug)]
#[command(name = "provisiond", version, about = "Clicker provisioning daemon")]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not bind the physical buttons
    #[arg(long)]
    no_buttons: bool,

    /// Override remote control (`true`/`false`)
    #[arg(long)]
    remote_control: Option<bool>,

    /// Number of simulated clickers connected at startup
    #[arg(long, default_value_t = 3)]
    sim_clickers: u32,

    /// Exit after this many milliseconds instead of running forever
    #[arg(long)]
    run_for_ms: Option<u64>,
}

fn load_config(args: &Args) -> Result<DaemonConfig> {
    let mut config = match &args.config {
        None => DaemonConfig::default(),
        Some(path) => match JsonConfigFile::new(path).load() {
            Ok(cfg) => cfg,
            Err(ConfigError::NotFound) => {
                warn!("Config {} not found, using defaults", path.display());
                DaemonConfig::default()
            }
            Err(e) => bail!("config {}: {}", path.display(), e),
        },
    };
    if args.no_buttons {
        config.enable_buttons = false;
    }
    if let Some(rc) = args.remote_control {
        config.remote_control = rc;
    }
    Ok(config)
}

/// Credential service stand-in answering `generatePsk`.
fn sim_credential_service() -> ServiceFn {
    let issued = AtomicU64::new(0);
    Box::new(move |_method: &str, _body: &serde_json::Value| {
        let n = issued.fetch_add(1, Ordering::Relaxed) + 1;
        let salt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Ok(Some(json!({
            "id": n,
            "pskIdentity": format!("clicker-{:04}", n),
            "pskSecret": format!("{:016x}{:016x}", salt, n.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        })))
    })
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))?;

    let args = Args::parse();
    info!("provisiond v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let config = load_config(&args)?;

    // ── 3. Shared state ───────────────────────────────────────
    let events = Arc::new(EventQueue::new());
    let registry = Arc::new(ClickerRegistry::new());
    let history: Arc<dyn HistoryPort> = match &config.history_path {
        Some(path) => Arc::new(HistoryStore::open(path)),
        None => Arc::new(HistoryStore::in_memory()),
    };
    let clock = Arc::new(MonotonicClock::new());

    // ── 4. Bus + credential service ───────────────────────────
    let hub = LocalBusHub::new();
    hub.register_service(&config.credential_service, sim_credential_service())
        .context("registering simulated credential service")?;

    // ── 5. Controller + hardware ──────────────────────────────
    let mut controller = Controller::new(config.indication());
    let mut buttons = ButtonBank::new(SimPin::new(true), SimPin::new(true));
    let mut leds = LedBank::new(core::array::from_fn::<_, 8, _>(|_| SimPin::new(false)));
    controller.initialize(config.enable_buttons, &mut buttons);

    // ── 6. IPC agent ──────────────────────────────────────────
    let deps = AgentDeps {
        registry: registry.clone(),
        history: history.clone(),
        selection: controller.view(),
        events: events.clone(),
    };
    let mut agent = IpcAgent::init(&hub, deps, config.ipc()).context("starting IPC agent")?;
    if config.remote_control {
        if let Err(e) = agent.enable_remote_control() {
            warn!("Remote control unavailable: {}", e);
        }
    }

    // ── 7. Simulated clickers ─────────────────────────────────
    let mut connections = SimConnections::new(registry.clone(), events.clone());
    for id in 1..=args.sim_clickers {
        connections.connect(id, &format!("clicker {}", id));
    }

    let mut service =
        ProvisioningService::new(controller, registry, history, events, clock.clone());

    // ── 8. Main loop ──────────────────────────────────────────
    let tick = Duration::from_millis(config.tick_interval_ms);
    let deadline = args
        .run_for_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    info!("Entering main loop ({} ms tick)", config.tick_interval_ms);

    loop {
        if let Some(action) = buttons.poll(clock.now_ms()) {
            service.handle_button(action);
        }
        service.process_events(&agent, &mut connections);
        service.tick(&mut leds, &mut connections);

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        thread::sleep(tick);
    }

    // ── 9. Shutdown ───────────────────────────────────────────
    service.controller_mut().shutdown(&mut buttons, &mut leds);
    agent.destroy();
    info!("provisiond stopped");
    Ok(())
}
