//! Safety layer: validates caller-facing parameters before a command is
//! ever enqueued.
//!
//! The codec itself is total and clamps silently so that a malformed
//! command can never produce a malformed frame. This module is the
//! caller-friendly front door: it rejects out-of-range input with a typed
//! error instead of silently adjusting it.
//!
//! # R1 Pro Bounds
//!
//! ## DPI
//! - **Range**: 50 – 26,000 DPI (PAW3395 sensor)
//! - **Step size**: 10 DPI, rounded down
//! - **Stages**: 4 stored presets, indexed 0-3
//!
//! ## Polling Rate
//! - **Standard receiver**: 125 / 250 / 500 / 1000 Hz
//! - **8K receiver**: additionally 2000 / 4000 / 8000 Hz
//! - **Encoding**: fixed table code 0-6, see `PollingRate::code`
//!
//! ## Power saving
//! - **Idle time**: 30 – 3600 seconds before sleep
//! - **Low-battery threshold**: 1 – 50 percent
//!
//! All validation happens BEFORE any HID communication; nothing
//! out-of-range reaches the dispatcher queue through this path.

use crate::device::{
    BUTTON_COUNT, DPI_MAX, DPI_MIN, DPI_STEP, NUM_DPI_STAGES, PollingRate,
};
use crate::error::{Error, Result};

/// Idle-time bounds in seconds for power saving.
pub const IDLE_TIME_MIN: u16 = 30;
pub const IDLE_TIME_MAX: u16 = 3600;

/// Low-battery threshold bounds in percent.
pub const BATTERY_THRESHOLD_MIN: u16 = 1;
pub const BATTERY_THRESHOLD_MAX: u16 = 50;

/// Validate a DPI value is within bounds; returns the step-aligned value.
pub fn validate_dpi(dpi: u16) -> Result<u16> {
    if !(DPI_MIN..=DPI_MAX).contains(&dpi) {
        return Err(Error::OutOfRange {
            field: "dpi",
            value: dpi as u32,
            min: DPI_MIN as u32,
            max: DPI_MAX as u32,
        });
    }
    Ok(dpi - dpi % DPI_STEP)
}

/// Validate a DPI stage index.
pub fn validate_stage(stage: u8) -> Result<()> {
    if stage as usize >= NUM_DPI_STAGES {
        return Err(Error::OutOfRange {
            field: "dpi_stage",
            value: stage as u32,
            min: 0,
            max: (NUM_DPI_STAGES - 1) as u32,
        });
    }
    Ok(())
}

/// Validate a polling rate value against the exact table.
///
/// Strict membership check; callers that want best-effort resolution use
/// `PollingRate::nearest` instead.
pub fn validate_polling_rate(hz: u16) -> Result<PollingRate> {
    PollingRate::from_hz(hz).ok_or(Error::OutOfRange {
        field: "polling_rate",
        value: hz as u32,
        min: 125,
        max: 8000,
    })
}

/// Validate a button index (0-based).
pub fn validate_button_index(index: usize) -> Result<()> {
    if index >= BUTTON_COUNT {
        return Err(Error::OutOfRange {
            field: "button_index",
            value: index as u32,
            min: 0,
            max: (BUTTON_COUNT - 1) as u32,
        });
    }
    Ok(())
}

/// Validate a power-saving idle time in seconds.
pub fn validate_idle_time(secs: u16) -> Result<u16> {
    if !(IDLE_TIME_MIN..=IDLE_TIME_MAX).contains(&secs) {
        return Err(Error::OutOfRange {
            field: "idle_time",
            value: secs as u32,
            min: IDLE_TIME_MIN as u32,
            max: IDLE_TIME_MAX as u32,
        });
    }
    Ok(secs)
}

/// Validate a low-battery threshold percent.
pub fn validate_battery_threshold(percent: u16) -> Result<u16> {
    if !(BATTERY_THRESHOLD_MIN..=BATTERY_THRESHOLD_MAX).contains(&percent) {
        return Err(Error::OutOfRange {
            field: "battery_threshold",
            value: percent as u32,
            min: BATTERY_THRESHOLD_MIN as u32,
            max: BATTERY_THRESHOLD_MAX as u32,
        });
    }
    Ok(percent)
}
