//! wiimote-hid - Entry Point
//!
//! Polls connected Wii Remotes once per tick, logs button edges and device
//! events, and runs the ordered shutdown on Ctrl+C.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wiimote_hid::{
    core::{
        config::Config,
        events::{DeviceEvent, EventSender},
        lifecycle::ShutdownCoordinator,
    },
    hid::{DeviceKind, HidApiTransport, HidDeviceInfo, HidTransport, SimDevice, SimTransport, WiimoteManager},
    input::{Button, InputManager},
};

/// Ticks between simulated A presses/releases
const SIM_TOGGLE_TICKS: u64 = 30;
const SIM_DEVICE_PATH: &str = "sim/wiimote-0";

#[derive(Parser)]
#[command(name = "wiimote-hid", about = "Wii Remote HID poller", version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Drive a simulated remote instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// Override the tick interval in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Poll remotes until Ctrl+C (default)
    Run,
    /// Print supported devices on the bus as JSON
    List,
    /// Print the default configuration file
    DefaultConfig,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(tick_ms) = cli.tick_ms {
        config.input.tick_interval_ms = tick_ms;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::DefaultConfig => {
            print!("{}", Config::default_config_str());
            Ok(())
        }
        Commands::List => list_devices(&config, cli.simulate),
        Commands::Run => run(config, cli.simulate),
    }
}

/// Scripted input for `--simulate`: answers status requests and toggles A
struct Simulator {
    device: SimDevice,
}

impl Simulator {
    fn step(&self, tick: u64) {
        if tick % SIM_TOGGLE_TICKS != 0 {
            return;
        }
        let pressed = (tick / SIM_TOGGLE_TICKS) % 2 == 1;
        self.device.push_report(&[0x30, 0x00, if pressed { 0x08 } else { 0x00 }]);
    }
}

fn make_transport(simulate: bool) -> Result<(Arc<dyn HidTransport>, Option<Simulator>)> {
    if simulate {
        let bus = SimTransport::new();
        let device = bus.add_wiimote(SIM_DEVICE_PATH);
        device.set_auto_status(true, 0x00);
        info!("Using simulated remote at {}", SIM_DEVICE_PATH);
        let transport: Arc<dyn HidTransport> = Arc::new(bus);
        Ok((transport, Some(Simulator { device })))
    } else {
        let transport: Arc<dyn HidTransport> =
            Arc::new(HidApiTransport::new().context("Failed to initialize HID API")?);
        Ok((transport, None))
    }
}

#[derive(Serialize)]
struct ListedDevice {
    #[serde(flatten)]
    info: HidDeviceInfo,
    kind: DeviceKind,
}

fn list_devices(config: &Config, simulate: bool) -> Result<()> {
    let (transport, _sim) = make_transport(simulate)?;
    let (event_tx, _event_rx) = EventSender::channel();
    let manager = WiimoteManager::new(transport, config.hid.clone(), config.writer.clone(), event_tx);

    let listed: Vec<ListedDevice> = manager
        .list_available()
        .into_iter()
        .map(|(info, kind)| ListedDevice { info, kind })
        .collect();
    let json = serde_json::to_string_pretty(&listed).context("Failed to serialize device list")?;
    println!("{}", json);
    Ok(())
}

fn run(config: Config, simulate: bool) -> Result<()> {
    let (transport, simulator) = make_transport(simulate)?;
    let (event_tx, event_rx) = EventSender::channel();
    let manager = WiimoteManager::new(transport, config.hid.clone(), config.writer.clone(), event_tx);
    let mut input = InputManager::new(manager, config.input.clone());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    let result = rt.block_on(poll_until_shutdown(
        &mut input,
        simulator,
        event_rx,
        config.input.tick_interval(),
    ));

    // Blocking: sleeps between steps and joins the writer thread
    let mut manager = input.into_manager();
    let report = ShutdownCoordinator::new(config.shutdown.clone()).run(&mut manager);
    info!(
        "Shutdown: {} device(s), writer {:?}, {} direct write failure(s)",
        report.devices, report.writer, report.direct_failures
    );
    result
}

async fn poll_until_shutdown(
    input: &mut InputManager,
    simulator: Option<Simulator>,
    mut event_rx: UnboundedReceiver<DeviceEvent>,
    tick_interval: Duration,
) -> Result<()> {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Polling every {:?}, press Ctrl+C to quit", tick_interval);

    let mut tick: u64 = 0;
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Shutdown requested");
                return Ok(());
            }
            Some(event) = event_rx.recv() => log_event(&event),
            _ = ticker.tick() => {
                if let Some(simulator) = &simulator {
                    simulator.step(tick);
                }
                tick += 1;

                if let Err(e) = input.tick() {
                    error!("Input loop failed: {}", e);
                    return Err(e).context("Writer thread could not be started");
                }
                log_edges(input);

                if input.get_button_down(Button::A) {
                    if let Err(e) = input.pulse_rumble(Duration::from_millis(200)) {
                        warn!("Rumble pulse failed: {}", e);
                    }
                }
            }
        }
    }
}

fn log_edges(input: &InputManager) {
    for button in Button::ALL {
        if input.get_button_down(button) {
            info!("{} pressed", button);
        }
        if input.get_button_up(button) {
            info!("{} released", button);
        }
    }
}

fn log_event(event: &DeviceEvent) {
    match event {
        DeviceEvent::Connected { path, kind } => info!("{} connected at {}", kind, path),
        DeviceEvent::Disconnected { path } => info!("{} disconnected", path),
        DeviceEvent::ExtensionChanged { path, extension: Some(kind) } => {
            info!("{}: {} attached", path, kind)
        }
        DeviceEvent::ExtensionChanged { path, extension: None } => {
            info!("{}: extension removed", path)
        }
    }
}
