//! open-vx-hub CLI: command-line mouse configuration tool.

use anyhow::Result;
use clap::{Parser, Subcommand};
use open_vx_hub_core::device::{ButtonAction, LiftOffDistance};
use open_vx_hub_core::dispatcher::{DeviceEvent, Dispatcher, DispatcherHandle, Response};
use open_vx_hub_core::settings;
use open_vx_hub_core::transport::{ConnectionState, DeviceFilter, DeviceMonitor};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to wait for a device to attach before giving up.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-operation wait on the command ticket.
const OP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "open-vx-hub", version, about = "Open-source VXE mouse configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected VXE mice.
    ListDevices,
    /// Show firmware and hardware revision.
    Info,
    /// Show the current settings snapshot.
    Settings {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show the battery level.
    Battery,
    /// Stream device events (connection, battery, command results).
    Watch,
    /// Program a DPI stage (50-26000, rounded down to a multiple of 10).
    SetDpi {
        /// Stage index (0-3).
        stage: u8,
        /// DPI value.
        value: u16,
    },
    /// Set polling rate (125, 250, 500, 1000, 2000, 4000, or 8000 Hz).
    SetRate {
        /// Polling rate in Hz.
        value: u16,
    },
    /// Set lift-off distance (1 or 2 mm).
    SetLiftOff {
        /// Distance in millimetres.
        mm: u8,
    },
    /// Remap a button.
    SetButton {
        /// Button index (0-5).
        index: usize,
        /// Action: left, right, middle, back, forward, dpi, none.
        action: String,
    },
    /// Toggle motion sync.
    SetMotionSync {
        /// "on" or "off".
        state: String,
    },
    /// Configure power saving.
    SetPower {
        /// Idle seconds before sleep (30-3600).
        idle_secs: u16,
        /// Low-battery warning threshold percent (1-50).
        threshold: u16,
    },
    /// Commit current settings to onboard flash.
    Save,
}

/// Spin up the dispatcher and transport monitor, wait for a device, run
/// the operation, then tear everything down.
fn with_connected<T>(op: impl FnOnce(&DispatcherHandle) -> Result<T>) -> Result<T> {
    let mut dispatcher = Dispatcher::spawn();
    let events = dispatcher
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
    let handle = dispatcher.handle();
    let monitor = DeviceMonitor::spawn(DeviceFilter::supported(), handle.monitor_sink());

    wait_for_connection(&events)?;
    let result = op(&handle);

    monitor.stop();
    dispatcher.shutdown();
    result
}

fn wait_for_connection(events: &Receiver<DeviceEvent>) -> Result<()> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(DeviceEvent::ConnectionChanged(ConnectionState::Connected)) => {
                debug!("Device connected");
                return Ok(());
            }
            Ok(DeviceEvent::ConnectionChanged(ConnectionState::Error(e))) => {
                anyhow::bail!("transport error: {e}");
            }
            Ok(_) => continue,
            Err(_) => anyhow::bail!(
                "no supported VXE mouse found within {}s",
                CONNECT_TIMEOUT.as_secs()
            ),
        }
    }
}

fn expect_ack(response: Response) -> Result<()> {
    anyhow::ensure!(response == Response::Ack, "unexpected response: {response:?}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListDevices => {
            let devices = open_vx_hub_core::transport::discover_devices()?;
            if devices.is_empty() {
                println!("No VXE mice found.");
                println!("Ensure your mouse or receiver is plugged in.");
            } else {
                for dev in &devices {
                    println!(
                        "{} (VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
                        dev.model.name(),
                        dev.vid,
                        dev.pid,
                        dev.path
                    );
                }
            }
        }
        Commands::Info => {
            let info = with_connected(|handle| {
                let response = settings::request_info(handle).wait_timeout(OP_TIMEOUT)?;
                Ok(settings::info_from(response)?)
            })?;
            println!("Firmware: {}.{}", info.fw_major, info.fw_minor);
            println!("Hardware revision: {}", info.hw_revision);
        }
        Commands::Settings { json } => {
            let snapshot = with_connected(|handle| {
                let response = settings::request_settings(handle).wait_timeout(OP_TIMEOUT)?;
                Ok(settings::settings_from(response)?)
            })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("Active DPI stage: {}", snapshot.active_stage);
                println!("DPI: {}", snapshot.dpi);
                println!("Polling rate: {}", snapshot.polling_rate);
                println!("Lift-off distance: {}", snapshot.lift_off);
                println!(
                    "Motion sync: {}",
                    if snapshot.motion_sync { "on" } else { "off" }
                );
                println!("Battery: {}%", snapshot.battery_percent);
            }
        }
        Commands::Battery => {
            let battery = with_connected(|handle| {
                let response = settings::request_battery(handle).wait_timeout(OP_TIMEOUT)?;
                Ok(settings::battery_from(response)?)
            })?;
            println!(
                "Battery: {}%{}",
                battery.percent,
                if battery.charging { " (charging)" } else { "" }
            );
        }
        Commands::Watch => {
            let mut dispatcher = Dispatcher::spawn();
            let events = dispatcher
                .take_events()
                .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
            let handle = dispatcher.handle();
            let _monitor = DeviceMonitor::spawn(DeviceFilter::supported(), handle.monitor_sink());

            println!("Watching for device events (Ctrl-C to stop)...");
            for event in events {
                match event {
                    DeviceEvent::ConnectionChanged(state) => println!("connection: {state:?}"),
                    DeviceEvent::Battery { percent, charging } => {
                        println!(
                            "battery: {percent}%{}",
                            if charging { " (charging)" } else { "" }
                        );
                    }
                    DeviceEvent::CommandResult { id, kind, result } => {
                        println!("command {id} ({kind:?}): {result:?}");
                    }
                }
            }
        }
        Commands::SetDpi { stage, value } => {
            with_connected(|handle| {
                let ticket = settings::set_dpi_stage(handle, stage, value)?;
                expect_ack(ticket.wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("DPI stage {stage} set to {value} (rounded down to a multiple of 10)");
        }
        Commands::SetRate { value } => {
            with_connected(|handle| {
                let ticket = settings::set_polling_rate_hz(handle, value)?;
                expect_ack(ticket.wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Polling rate set to {value} Hz");
        }
        Commands::SetLiftOff { mm } => {
            let distance = LiftOffDistance::from_mm(mm)
                .ok_or_else(|| anyhow::anyhow!("lift-off distance must be 1 or 2 mm"))?;
            with_connected(|handle| {
                expect_ack(settings::set_lift_off(handle, distance).wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Lift-off distance set to {distance}");
        }
        Commands::SetButton { index, action } => {
            let parsed = ButtonAction::from_name(&action).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown button action '{action}'. Valid actions: left, right, middle, back, forward, dpi, none"
                )
            })?;
            with_connected(|handle| {
                let ticket = settings::set_button(handle, index, parsed)?;
                expect_ack(ticket.wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Set button {index} to '{}'", parsed.label());
        }
        Commands::SetMotionSync { state } => {
            let enabled = match state.as_str() {
                "on" => true,
                "off" => false,
                other => anyhow::bail!("motion sync state must be 'on' or 'off', got '{other}'"),
            };
            with_connected(|handle| {
                expect_ack(settings::set_motion_sync(handle, enabled).wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Motion sync {state}");
        }
        Commands::SetPower {
            idle_secs,
            threshold,
        } => {
            with_connected(|handle| {
                let ticket = settings::set_power_saving(handle, idle_secs, threshold)?;
                expect_ack(ticket.wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Power saving: sleep after {idle_secs}s, warn below {threshold}%");
        }
        Commands::Save => {
            with_connected(|handle| {
                expect_ack(settings::save_profile(handle).wait_timeout(OP_TIMEOUT)?)
            })?;
            println!("Settings saved to onboard profile");
        }
    }

    Ok(())
}
