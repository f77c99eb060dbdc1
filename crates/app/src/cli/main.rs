//! sndplug CLI: USB audio hotplug daemon and inspection commands

use anyhow::Context;
use clap::{Parser, Subcommand};
use sndplug_core::domain::{
    parse_node_name, CardMetadata, ConfigManager, DeviceNotification, HotplugCoordinator,
    MidiBinder, NodeRegistry, NotificationSink, SelectionEngine, SndplugConfig,
};
use sndplug_infra::{
    BroadcastSink, ChannelMidiBinder, MidiEvent, NodeWatcher, ProcfsMetadata, UsbEvent, UsbMonitor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sndplug")]
#[command(about = "USB audio and MIDI hotplug coordinator", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.config/sndplug/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch USB and ALSA devices and publish device changes as JSON lines
    Run,
    /// List sound cards and their streams
    Cards,
    /// List ALSA device nodes
    Nodes,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write the default configuration file
    Init {
        /// Destination (defaults to the --config path or ~/.config/sndplug/config.toml)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(ConfigManager::default_config_dir()?),
    };

    match cli.command {
        Command::Run => run(manager.load().await).await,
        Command::Cards => cards(&manager.load().await),
        Command::Nodes => nodes(&manager.load().await),
        Command::Config {
            action: ConfigAction::Init { path },
        } => {
            let manager = path.map(ConfigManager::with_path).unwrap_or(manager);
            if manager.init().await? {
                println!("Wrote {}", manager.config_path().display());
            } else {
                println!("{} already exists", manager.config_path().display());
            }
            Ok(())
        }
    }
}

async fn run(config: SndplugConfig) -> anyhow::Result<()> {
    info!("sndplug starting");

    let registry = Arc::new(NodeRegistry::new());
    let mut watcher = NodeWatcher::new(config.nodes.dir.clone(), Arc::clone(&registry));
    watcher
        .start()
        .with_context(|| format!("watching {}", config.nodes.dir.display()))?;

    let mut metadata = ProcfsMetadata::new(config.metadata.proc_dir.clone());
    if let Err(e) = metadata.scan_cards() {
        warn!(error = %e, "Initial card scan failed");
    }

    let sink = BroadcastSink::new(64);
    tokio::spawn(print_notifications(sink.subscribe()));

    let (midi, midi_rx) = ChannelMidiBinder::new();
    std::thread::spawn(move || {
        for event in midi_rx {
            match event {
                MidiEvent::Added { card, device, usb_id } => {
                    info!(card, device, %usb_id, "MIDI device added")
                }
                MidiEvent::Removed { usb_id } => info!(%usb_id, "MIDI device removed"),
            }
        }
    });

    let engine = SelectionEngine::new(
        Box::new(metadata),
        Arc::clone(&registry),
        Arc::new(sink) as Arc<dyn NotificationSink>,
        config.nodes.wait_timeout(),
    );
    let coordinator = Arc::new(HotplugCoordinator::new(
        engine,
        Arc::clone(&registry),
        Arc::new(midi) as Arc<dyn MidiBinder>,
        config.selection.reselect,
    ));

    let (usb_tx, usb_rx) = mpsc::channel(32);
    let worker = tokio::spawn(handle_usb_events(Arc::clone(&coordinator), usb_rx));
    let monitor = tokio::spawn(async move {
        if let Err(e) = UsbMonitor::new().run(usb_tx).await {
            error!(error = %e, "USB monitor failed");
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            info!("Shutting down");
        }
        _ = worker => error!("USB monitor stopped"),
    }
    monitor.abort();

    debug!("{}", coordinator.dump());
    watcher.stop();
    Ok(())
}

/// Select the default device, then apply USB events one at a time
async fn handle_usb_events(
    coordinator: Arc<HotplugCoordinator>,
    mut rx: mpsc::Receiver<UsbEvent>,
) {
    // Selection blocks on node creation; keep it off the runtime threads
    let startup = Arc::clone(&coordinator);
    if let Err(e) = tokio::task::spawn_blocking(move || startup.select_default_device()).await {
        error!(error = %e, "Default device selection panicked");
    }

    while let Some(event) = rx.recv().await {
        let coordinator = Arc::clone(&coordinator);
        let handled = tokio::task::spawn_blocking(move || match event {
            UsbEvent::Attached { id, interfaces } => {
                coordinator.on_usb_attached(&id, &interfaces);
            }
            UsbEvent::Detached { id } => {
                coordinator.on_usb_detached(&id);
            }
        })
        .await;
        if let Err(e) = handled {
            error!(error = %e, "USB event handler panicked");
        }
    }
}

async fn print_notifications(
    mut rx: broadcast::Receiver<DeviceNotification>,
) {
    loop {
        match rx.recv().await {
            Ok(notification) => match serde_json::to_string(&notification) {
                Ok(line) => println!("{}", line),
                Err(e) => error!(error = %e, "Failed to encode notification"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification printer lagged")
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn cards(config: &SndplugConfig) -> anyhow::Result<()> {
    let mut metadata = ProcfsMetadata::new(config.metadata.proc_dir.clone());
    metadata.scan_cards()?;
    metadata.scan_devices()?;

    for card in metadata.cards() {
        let streams: Vec<String> = metadata
            .streams()
            .iter()
            .filter(|s| s.card == card.card)
            .map(|s| format!("{}:{}", s.kind, s.device))
            .collect();
        println!(
            "{:>2} [{}] {} - {}{} [{}]",
            card.card,
            card.id,
            card.driver,
            card.name,
            if card.is_usb { " (usb)" } else { "" },
            streams.join(", ")
        );
    }
    Ok(())
}

fn nodes(config: &SndplugConfig) -> anyhow::Result<()> {
    let dir = &config.nodes.dir;
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    for name in names {
        match parse_node_name(&name) {
            Ok(Some(node)) => println!("{}", node),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Skipping node"),
        }
    }
    Ok(())
}
