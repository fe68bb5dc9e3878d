//! # flockstep-cli
//!
//! Binary entry point for the flockstep show controller.
//!
//! This crate provides:
//! - CLI argument parsing using `clap`
//! - Fleet, choreography and parameter setup from the show configuration
//! - The stepping thread, the interactive console, the messaging server and
//!   the OSC listener
//! - Signal handling and orderly shutdown

mod console;
mod messaging;
mod osc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use flockstep_core::{
    Calibrator, Choreography, FleetRoster, IntentRouter, ModeRequests, Orchestrator,
    OrchestratorSettings, ParamStore, ShowConfig, ShowLoop, SimVehicle,
};
use flockstep_proto::{OutboundMessage, Point, Vehicle};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Capacity of the outbound message fan-out.
const OUTBOUND_CAPACITY: usize = 64;

/// flockstep - drone show controller
#[derive(Parser, Debug)]
#[command(name = "flockstep", version, about)]
struct Cli {
    /// Path to the show configuration file
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(cli.config).await
}

async fn run(config_path: PathBuf) -> Result<()> {
    let config = ShowConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    for warning in config.validate().context("Invalid configuration")? {
        warn!("{}", warning);
    }

    if config.use_mocap {
        bail!("useMocap is set but no motion-capture bridge is available in this build");
    }

    let show = Choreography::from_file(&config.jocs_path, config.theater_scale)
        .with_context(|| format!("Failed to load choreography {:?}", config.jocs_path))?;
    info!(
        show = show.name(),
        roles = show.role_count(),
        duration = show.duration(),
        "Choreography loaded"
    );

    // Simulated vehicles start on the ground below their role's home point
    let homes = show.homes();
    let store = ParamStore::new(&config.params_dir);
    let links = config.vehicle_links();
    let mut vehicles = Vec::with_capacity(links.len());
    for (i, link) in links.iter().enumerate() {
        let spawn = config
            .jocs_active_ids
            .get(i)
            .and_then(|&role| homes.get(role))
            .map_or_else(|| Point::new(i as f64, -1.0, 0.0), |h| Point::new(h.x, h.y, 0.0));

        let mut vehicle = SimVehicle::new(spawn);
        vehicle
            .connect(link.local_port, link.remote_port)
            .with_context(|| format!("Failed to connect vehicle {}", link.net_id))?;
        store.load_into(&mut vehicle, &config.calibration_key(link.net_id));
        vehicles.push((link.net_id, Box::new(vehicle) as Box<dyn Vehicle>));
    }

    let roster = FleetRoster::new(vehicles, &config.jocs_active_ids, show.role_count())
        .context("Cannot build fleet roster")?;
    let requests = Arc::new(ModeRequests::new());
    let orchestrator = Orchestrator::new(
        roster,
        show,
        Arc::clone(&requests),
        OrchestratorSettings::from(&config),
    )
    .context("Cannot start orchestrator")?;

    let (outbound_tx, _) = broadcast::channel::<OutboundMessage>(OUTBOUND_CAPACITY);
    let (mut show_loop, telemetry_rx) =
        ShowLoop::new(orchestrator, config.tick_period(), config.status_every_ticks);
    if config.enable_messaging {
        let status_tx = outbound_tx.clone();
        show_loop = show_loop.with_status_sink(move |status| {
            // No connected consoles is not an error
            let _ = status_tx.send(OutboundMessage::Status(status));
        });
    }

    let calibration_key = links
        .first()
        .map(|link| config.calibration_key(link.net_id))
        .unwrap_or_else(|| config.calibration_key(0));
    let calibrator = Calibrator::new(
        telemetry_rx,
        Arc::clone(&requests),
        store,
        calibration_key,
        &config.calibration,
    );
    let router = IntentRouter::new(Arc::clone(&requests), &config.data_dir, config.theater_scale)
        .with_calibrator(calibrator);

    let running = Arc::new(AtomicBool::new(true));
    spawn_signal_handlers(&running);

    if config.enable_messaging {
        let listener = TcpListener::bind(&config.messaging_addr)
            .await
            .with_context(|| format!("Failed to bind messaging on {}", config.messaging_addr))?;
        info!(addr = %config.messaging_addr, "Messaging enabled");
        tokio::spawn(messaging::serve(listener, router.clone(), outbound_tx.clone()));
    }

    if config.enable_osc {
        let socket = UdpSocket::bind(("0.0.0.0", config.osc_port))
            .await
            .with_context(|| format!("Failed to bind OSC on port {}", config.osc_port))?;
        info!(port = config.osc_port, "OSC enabled");
        tokio::spawn(osc::listen(socket, router.clone()));
    }

    let stepping = {
        let running = Arc::clone(&running);
        std::thread::Builder::new()
            .name("stepping".to_string())
            .spawn(move || show_loop.run(&running))
            .context("Failed to start stepping thread")?
    };

    // Blocked on stdin for the life of the process; never joined
    console::spawn(router, Arc::clone(&running)).context("Failed to start console")?;

    let joined = tokio::task::spawn_blocking(move || stepping.join())
        .await
        .context("Failed to wait for stepping thread")?;
    let Ok(mut orchestrator) = joined else {
        bail!("Stepping thread panicked");
    };

    info!("Shutting down");
    debug!("No positioning backend to disconnect");
    orchestrator.shutdown();
    println!("Done");
    Ok(())
}

/// Clears `running` on SIGINT, or on SIGTERM on unix.
fn spawn_signal_handlers(running: &Arc<AtomicBool>) {
    let running_sigint = Arc::clone(running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received (SIGINT), stopping...");
            running_sigint.store(false, Ordering::Release);
        }
    });

    #[cfg(unix)]
    {
        let running_sigterm = Arc::clone(running);
        tokio::spawn(async move {
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(signal) => signal,
                    Err(e) => {
                        warn!(error = %e, "Failed to register SIGTERM handler");
                        return;
                    }
                };
            sigterm.recv().await;
            warn!("SIGTERM received, stopping...");
            running_sigterm.store(false, Ordering::Release);
        });
    }
}
