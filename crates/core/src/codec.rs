//! Wire codec for the R1 Pro report protocol.
//!
//! Every command and response travels in a fixed 8-byte report. Byte 0 is
//! the opcode; the remaining bytes are opcode-specific payload:
//!
//! | Opcode | Meaning          | Payload                                        |
//! |--------|------------------|------------------------------------------------|
//! | 0x10   | get-info         | (response) fw major, fw minor, hw revision     |
//! | 0x12   | get-settings     | (response) stage, DPI BE, rate, LOD, sync, batt|
//! | 0x20   | set-DPI          | stage index, DPI big-endian                    |
//! | 0x30   | set-polling-rate | rate code (125→0 … 8000→6)                     |
//! | 0x40   | set-lift-off     | distance in mm                                 |
//! | 0x50   | set-button       | button index, action code                      |
//! | 0x60   | set-motion-sync  | 0/1                                            |
//! | 0x70   | power / battery  | sub 0x01 = set idle LE + threshold, 0x00 = get |
//! | 0x80   | error            | (response) error code                          |
//! | 0xF0   | save-profile     | commit settings to onboard flash               |
//!
//! The transport carries no sequence numbers; correlation of responses to
//! commands is the dispatcher's job.

use crate::device::{DPI_MAX, DPI_MIN, DPI_STEP, PollingRate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Length of every report frame in bytes.
pub const FRAME_LEN: usize = 8;

/// A fixed-size wire frame.
pub type Frame = [u8; FRAME_LEN];

/// Frame opcodes (byte 0).
pub mod opcodes {
    pub const GET_INFO: u8 = 0x10;
    pub const GET_SETTINGS: u8 = 0x12;
    pub const SET_DPI: u8 = 0x20;
    pub const SET_POLLING_RATE: u8 = 0x30;
    pub const SET_LIFT_OFF: u8 = 0x40;
    pub const SET_BUTTON: u8 = 0x50;
    pub const SET_MOTION_SYNC: u8 = 0x60;
    pub const POWER_BATTERY: u8 = 0x70;
    pub const ERROR: u8 = 0x80;
    pub const SAVE_PROFILE: u8 = 0xF0;
}

/// Opaque per-process unique command token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(u64);

impl CommandId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The closed set of commands the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    GetInfo,
    GetSettings,
    SetDpiStage,
    SetPollingRate,
    SetLiftOff,
    SetButton,
    SetMotionSync,
    SetPowerSaving,
    GetBattery,
    SaveProfile,
}

impl CommandKind {
    /// Opcode byte for this command.
    pub fn opcode(&self) -> u8 {
        match self {
            Self::GetInfo => opcodes::GET_INFO,
            Self::GetSettings => opcodes::GET_SETTINGS,
            Self::SetDpiStage => opcodes::SET_DPI,
            Self::SetPollingRate => opcodes::SET_POLLING_RATE,
            Self::SetLiftOff => opcodes::SET_LIFT_OFF,
            Self::SetButton => opcodes::SET_BUTTON,
            Self::SetMotionSync => opcodes::SET_MOTION_SYNC,
            Self::SetPowerSaving | Self::GetBattery => opcodes::POWER_BATTERY,
            Self::SaveProfile => opcodes::SAVE_PROFILE,
        }
    }

    /// Whether the device answers this command with a frame of its own.
    ///
    /// Set-style commands are fire-and-forget on this protocol; queries
    /// always produce a response.
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::GetInfo | Self::GetSettings | Self::GetBattery)
    }
}

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// One typed command, immutable once built.
///
/// Owned by the dispatcher from enqueue until it resolves.
#[derive(Debug, Clone)]
pub struct Command {
    pub id: CommandId,
    pub kind: CommandKind,
    pub params: Vec<u16>,
    pub timeout: Duration,
    pub expects_response: bool,
}

impl Command {
    /// Build a command with the kind's default timeout and response policy.
    pub fn new(kind: CommandKind, params: Vec<u16>) -> Self {
        Self {
            id: CommandId::next(),
            kind,
            params,
            timeout: DEFAULT_TIMEOUT,
            expects_response: kind.expects_response(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_expects_response(mut self, expects: bool) -> Self {
        self.expects_response = expects;
        self
    }
}

/// Encode a command into its wire frame.
///
/// Total function: malformed or missing parameters degrade to a zeroed
/// frame carrying only the opcode byte. That frame is a no-op on the
/// device; the mistake is the caller's and is logged as such.
pub fn encode(command: &Command) -> Frame {
    let mut frame: Frame = [0; FRAME_LEN];
    frame[0] = command.kind.opcode();

    let p = &command.params;
    match command.kind {
        CommandKind::GetInfo | CommandKind::GetSettings | CommandKind::SaveProfile => {}
        CommandKind::GetBattery => {
            // Sub-command 0x00 distinguishes the query from set-power-saving.
            frame[1] = 0x00;
        }
        CommandKind::SetDpiStage => {
            let (Some(&stage), Some(&dpi)) = (p.first(), p.get(1)) else {
                return caller_error_frame(command);
            };
            let dpi = clamp_dpi(dpi);
            frame[1] = stage as u8;
            frame[2] = (dpi >> 8) as u8;
            frame[3] = (dpi & 0xFF) as u8;
        }
        CommandKind::SetPollingRate => {
            let Some(&hz) = p.first() else {
                return caller_error_frame(command);
            };
            frame[1] = PollingRate::nearest(hz).code();
        }
        CommandKind::SetLiftOff => {
            let Some(&mm) = p.first() else {
                return caller_error_frame(command);
            };
            frame[1] = mm as u8;
        }
        CommandKind::SetButton => {
            let (Some(&index), Some(&action)) = (p.first(), p.get(1)) else {
                return caller_error_frame(command);
            };
            frame[1] = index as u8;
            frame[2] = action as u8;
        }
        CommandKind::SetMotionSync => {
            let Some(&enabled) = p.first() else {
                return caller_error_frame(command);
            };
            frame[1] = u8::from(enabled != 0);
        }
        CommandKind::SetPowerSaving => {
            let (Some(&idle_secs), Some(&threshold)) = (p.first(), p.get(1)) else {
                return caller_error_frame(command);
            };
            frame[1] = 0x01;
            // Idle time is little-endian on the wire.
            frame[2] = (idle_secs & 0xFF) as u8;
            frame[3] = (idle_secs >> 8) as u8;
            frame[4] = threshold as u8;
        }
    }

    frame
}

/// Clamp to the sensor's DPI range, then round down to the nearest step.
pub fn clamp_dpi(dpi: u16) -> u16 {
    let dpi = dpi.clamp(DPI_MIN, DPI_MAX);
    dpi - dpi % DPI_STEP
}

fn caller_error_frame(command: &Command) -> Frame {
    warn!(
        id = %command.id,
        kind = ?command.kind,
        params = ?command.params,
        "missing parameters for command, emitting no-op frame"
    );
    let mut frame: Frame = [0; FRAME_LEN];
    frame[0] = command.kind.opcode();
    frame
}

/// Error codes the device reports in an error frame (byte 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorCode {
    InvalidCommand,
    InvalidParameter,
    Unsupported,
    HardwareFault,
    Unknown(u8),
}

impl DeviceErrorCode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::InvalidCommand,
            0x02 => Self::InvalidParameter,
            0x03 => Self::Unsupported,
            0x04 => Self::HardwareFault,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::Unsupported => write!(f, "unsupported operation"),
            Self::HardwareFault => write!(f, "hardware fault"),
            Self::Unknown(code) => write!(f, "unknown error code 0x{code:02X}"),
        }
    }
}

/// Firmware/hardware identity from a get-info response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct InfoPayload {
    pub fw_major: u8,
    pub fw_minor: u8,
    pub hw_revision: u8,
}

/// Raw settings snapshot from a get-settings response.
///
/// Field values are wire encodings; `settings::MouseSettings` gives the
/// typed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsPayload {
    pub active_stage: u8,
    pub dpi: u16,
    pub rate_code: u8,
    pub lift_off_mm: u8,
    pub motion_sync: bool,
    pub battery_percent: u8,
}

/// Battery state, from a solicited reply or an unsolicited update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BatteryPayload {
    pub percent: u8,
    pub charging: bool,
}

/// Classification of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Info(InfoPayload),
    Settings(SettingsPayload),
    Battery(BatteryPayload),
    Error(DeviceErrorCode),
    Unrecognized(u8),
}

impl ResponseKind {
    /// Whether this frame answers a command of the given kind.
    pub fn answers(&self, kind: CommandKind) -> bool {
        matches!(
            (self, kind),
            (Self::Info(_), CommandKind::GetInfo)
                | (Self::Settings(_), CommandKind::GetSettings)
                | (Self::Battery(_), CommandKind::GetBattery)
        )
    }
}

/// Classify an inbound report by its opcode byte.
///
/// Total function: anything that is not a well-formed known frame comes
/// back as `Unrecognized` and is the dispatcher's to drop.
pub fn decode(data: &[u8]) -> ResponseKind {
    if data.len() < FRAME_LEN {
        return ResponseKind::Unrecognized(data.first().copied().unwrap_or(0));
    }

    match data[0] {
        opcodes::GET_INFO => ResponseKind::Info(InfoPayload {
            fw_major: data[1],
            fw_minor: data[2],
            hw_revision: data[3],
        }),
        opcodes::GET_SETTINGS => ResponseKind::Settings(SettingsPayload {
            active_stage: data[1],
            dpi: ((data[2] as u16) << 8) | data[3] as u16,
            rate_code: data[4],
            lift_off_mm: data[5],
            motion_sync: data[6] != 0,
            battery_percent: data[7].min(100),
        }),
        opcodes::POWER_BATTERY => ResponseKind::Battery(BatteryPayload {
            percent: data[1].min(100),
            charging: data[2] != 0,
        }),
        opcodes::ERROR => ResponseKind::Error(DeviceErrorCode::from_code(data[1])),
        other => ResponseKind::Unrecognized(other),
    }
}
