//! HID transport: device discovery, hotplug monitoring, raw report I/O.
//!
//! The monitor owns a background thread that watches the bus for a
//! matching device, opens it, and forwards raw input reports. It never
//! touches dispatcher state directly: everything is handed off through a
//! `MonitorSink` into the dispatcher's event loop.

use crate::device::{DeviceInfo, MouseModel};
use crate::dispatcher::MonitorSink;
use crate::error::{Error, Result};
use crate::{pids, VXE_VID};
use hidapi::{HidApi, HidDevice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// How often the monitor rescans the bus while no device is attached.
const SCAN_INTERVAL: Duration = Duration::from_millis(1000);

/// Blocking-read slice for the reader loop; short so writers and shutdown
/// are never starved of the device lock.
const READ_TIMEOUT_MS: i32 = 20;

/// Abstraction over raw HID report writes.
///
/// The dispatcher only ever writes through this trait; real devices and
/// test mocks share the interface.
pub trait RawHid: Send {
    /// Write one raw output report.
    fn write(&self, data: &[u8]) -> Result<()>;
}

/// The monitor's view of the bus, surfaced to collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Error(String),
}

/// Match filter: one vendor, a small set of accepted product ids.
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_ids: Vec<u16>,
}

impl DeviceFilter {
    /// Filter accepting every supported receiver variant.
    pub fn supported() -> Self {
        Self {
            vendor_id: VXE_VID,
            product_ids: vec![pids::R1_PRO, pids::R1_PRO_8K],
        }
    }

    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        vid == self.vendor_id && self.product_ids.contains(&pid)
    }
}

/// One-shot enumeration of supported devices, without opening them.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = HidApi::new().map_err(|e| Error::Hid(e.to_string()))?;
    let filter = DeviceFilter::supported();

    let mut devices = Vec::new();
    for info in api.device_list() {
        if !filter.matches(info.vendor_id(), info.product_id()) {
            continue;
        }

        if let Some(model) = MouseModel::from_pid(info.product_id()) {
            info!(
                model = model.name(),
                vid = format_args!("0x{:04X}", info.vendor_id()),
                pid = format_args!("0x{:04X}", info.product_id()),
                path = %info.path().to_string_lossy(),
                "Found VXE device"
            );
            devices.push(DeviceInfo {
                model,
                vid: info.vendor_id(),
                pid: info.product_id(),
                path: info.path().to_string_lossy().into_owned(),
                serial: info.serial_number().map(|s| s.to_string()),
            });
        }
    }

    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// A HID device shared between the reader loop and the dispatcher's
/// write path. Reads hold the lock only for one short `read_timeout`
/// slice, so writes interleave without contention.
struct SharedHid(Arc<Mutex<HidDevice>>);

impl RawHid for SharedHid {
    fn write(&self, data: &[u8]) -> Result<()> {
        let device = lock(&self.0);
        device
            .write(data)
            .map_err(|e| Error::SendFailed(format!("hid write: {e}")))?;
        Ok(())
    }
}

fn lock(device: &Mutex<HidDevice>) -> MutexGuard<'_, HidDevice> {
    device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Watches the bus for a matching device and feeds the dispatcher.
///
/// At most one device is attached at a time; the first match wins. On
/// disconnect the monitor reports the loss and resumes scanning.
pub struct DeviceMonitor {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceMonitor {
    /// Start the background monitor thread.
    pub fn spawn(filter: DeviceFilter, sink: MonitorSink) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::spawn(move || monitor_loop(filter, sink, stop_flag));
        Self {
            stop,
            thread: Some(thread),
        }
    }

    /// Stop the monitor and wait for its thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn monitor_loop(filter: DeviceFilter, sink: MonitorSink, stop: Arc<AtomicBool>) {
    let mut api = match HidApi::new() {
        Ok(api) => api,
        Err(e) => {
            sink.error(format!("hidapi init: {e}"));
            return;
        }
    };

    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = api.refresh_devices() {
            sink.error(format!("device enumeration: {e}"));
            thread::sleep(SCAN_INTERVAL);
            continue;
        }

        let found = api.device_list().find_map(|entry| {
            if !filter.matches(entry.vendor_id(), entry.product_id()) {
                return None;
            }
            let model = MouseModel::from_pid(entry.product_id())?;
            Some((
                DeviceInfo {
                    model,
                    vid: entry.vendor_id(),
                    pid: entry.product_id(),
                    path: entry.path().to_string_lossy().into_owned(),
                    serial: entry.serial_number().map(|s| s.to_string()),
                },
                entry.path().to_owned(),
            ))
        });

        let Some((device_info, path)) = found else {
            thread::sleep(SCAN_INTERVAL);
            continue;
        };

        match api.open_path(&path) {
            Ok(device) => {
                info!(
                    model = device_info.model.name(),
                    path = %device_info.path,
                    "Device attached"
                );
                let shared = Arc::new(Mutex::new(device));
                sink.attached(device_info, Box::new(SharedHid(Arc::clone(&shared))));

                let device_lost = read_loop(&shared, &sink, &stop);
                if device_lost {
                    info!("Device detached");
                    sink.detached();
                }
            }
            Err(e) => {
                warn!(path = %device_info.path, "Failed to open device: {e}");
                sink.error(format!("open {}: {e}", device_info.path));
                thread::sleep(SCAN_INTERVAL);
            }
        }
    }
}

/// Forward input reports until the device disappears or the monitor stops.
///
/// Returns true if the device was lost (as opposed to a requested stop).
fn read_loop(hid: &Arc<Mutex<HidDevice>>, sink: &MonitorSink, stop: &AtomicBool) -> bool {
    let mut buf = [0u8; 64];
    while !stop.load(Ordering::Relaxed) {
        let result = {
            let device = lock(hid);
            device.read_timeout(&mut buf, READ_TIMEOUT_MS)
        };
        match result {
            Ok(0) => {} // poll slice elapsed, nothing to read
            Ok(n) => {
                trace!(report_hex = format_args!("{:02X?}", &buf[..n]), "HID RX");
                sink.report(buf[..n].to_vec());
            }
            Err(e) => {
                warn!("HID read failed, treating device as lost: {e}");
                return true;
            }
        }
    }
    false
}
