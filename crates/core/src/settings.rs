//! Typed settings API over the dispatcher.
//!
//! One function per device operation: validate the caller's parameters,
//! enqueue the command, hand back the ticket. Response payloads are
//! lifted into typed values (`MouseSettings`, `InfoPayload`,
//! `BatteryPayload`) for collaborators.

use crate::codec::{BatteryPayload, CommandKind, InfoPayload, SettingsPayload};
use crate::device::{ButtonAction, LiftOffDistance, PollingRate};
use crate::dispatcher::{CommandTicket, DispatcherHandle, Response};
use crate::error::{Error, Result};
use crate::safety;

/// Typed view of a get-settings response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MouseSettings {
    pub active_stage: u8,
    pub dpi: u16,
    pub polling_rate: PollingRate,
    pub lift_off: LiftOffDistance,
    pub motion_sync: bool,
    pub battery_percent: u8,
}

impl MouseSettings {
    /// Lift a raw settings payload into typed values.
    pub fn from_payload(payload: &SettingsPayload) -> Result<Self> {
        let polling_rate = PollingRate::from_code(payload.rate_code).ok_or_else(|| {
            Error::Hid(format!(
                "settings payload: unknown polling rate code {}",
                payload.rate_code
            ))
        })?;
        let lift_off = LiftOffDistance::from_mm(payload.lift_off_mm).ok_or_else(|| {
            Error::Hid(format!(
                "settings payload: unknown lift-off distance {} mm",
                payload.lift_off_mm
            ))
        })?;
        Ok(Self {
            active_stage: payload.active_stage,
            dpi: payload.dpi,
            polling_rate,
            lift_off,
            motion_sync: payload.motion_sync,
            battery_percent: payload.battery_percent,
        })
    }
}

/// Query firmware and hardware identity.
pub fn request_info(dispatcher: &DispatcherHandle) -> CommandTicket {
    dispatcher.enqueue(CommandKind::GetInfo, vec![])
}

/// Query the current settings snapshot.
pub fn request_settings(dispatcher: &DispatcherHandle) -> CommandTicket {
    dispatcher.enqueue(CommandKind::GetSettings, vec![])
}

/// Query the battery level.
pub fn request_battery(dispatcher: &DispatcherHandle) -> CommandTicket {
    dispatcher.enqueue(CommandKind::GetBattery, vec![])
}

/// Program one DPI stage. The value is validated and step-aligned before
/// it is enqueued.
pub fn set_dpi_stage(dispatcher: &DispatcherHandle, stage: u8, dpi: u16) -> Result<CommandTicket> {
    safety::validate_stage(stage)?;
    let dpi = safety::validate_dpi(dpi)?;
    Ok(dispatcher.enqueue(CommandKind::SetDpiStage, vec![stage as u16, dpi]))
}

/// Set the polling rate from a typed value.
pub fn set_polling_rate(dispatcher: &DispatcherHandle, rate: PollingRate) -> CommandTicket {
    dispatcher.enqueue(CommandKind::SetPollingRate, vec![rate.as_hz()])
}

/// Set the polling rate from a raw Hz value; rejects off-table rates.
pub fn set_polling_rate_hz(dispatcher: &DispatcherHandle, hz: u16) -> Result<CommandTicket> {
    let rate = safety::validate_polling_rate(hz)?;
    Ok(set_polling_rate(dispatcher, rate))
}

/// Set the sensor lift-off distance.
pub fn set_lift_off(dispatcher: &DispatcherHandle, distance: LiftOffDistance) -> CommandTicket {
    dispatcher.enqueue(CommandKind::SetLiftOff, vec![distance.as_mm() as u16])
}

/// Remap a physical button.
pub fn set_button(
    dispatcher: &DispatcherHandle,
    index: usize,
    action: ButtonAction,
) -> Result<CommandTicket> {
    safety::validate_button_index(index)?;
    Ok(dispatcher.enqueue(
        CommandKind::SetButton,
        vec![index as u16, action.code() as u16],
    ))
}

/// Toggle motion sync.
pub fn set_motion_sync(dispatcher: &DispatcherHandle, enabled: bool) -> CommandTicket {
    dispatcher.enqueue(CommandKind::SetMotionSync, vec![u16::from(enabled)])
}

/// Configure power saving: idle time before sleep and the low-battery
/// warning threshold.
pub fn set_power_saving(
    dispatcher: &DispatcherHandle,
    idle_secs: u16,
    threshold_percent: u16,
) -> Result<CommandTicket> {
    let idle = safety::validate_idle_time(idle_secs)?;
    let threshold = safety::validate_battery_threshold(threshold_percent)?;
    Ok(dispatcher.enqueue(CommandKind::SetPowerSaving, vec![idle, threshold]))
}

/// Commit the current settings to onboard flash.
pub fn save_profile(dispatcher: &DispatcherHandle) -> CommandTicket {
    dispatcher.enqueue(CommandKind::SaveProfile, vec![])
}

/// Extract a firmware info payload from a resolved command.
pub fn info_from(response: Response) -> Result<InfoPayload> {
    match response {
        Response::Info(info) => Ok(info),
        other => Err(Error::Hid(format!("unexpected response: {other:?}"))),
    }
}

/// Extract a typed settings snapshot from a resolved command.
pub fn settings_from(response: Response) -> Result<MouseSettings> {
    match response {
        Response::Settings(payload) => MouseSettings::from_payload(&payload),
        other => Err(Error::Hid(format!("unexpected response: {other:?}"))),
    }
}

/// Extract a battery payload from a resolved command.
pub fn battery_from(response: Response) -> Result<BatteryPayload> {
    match response {
        Response::Battery(battery) => Ok(battery),
        other => Err(Error::Hid(format!("unexpected response: {other:?}"))),
    }
}
