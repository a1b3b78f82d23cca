//! Device model: supported mice, polling rates, button actions.

use crate::{pids, VXE_VID};

/// Supported VXE mouse models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseModel {
    R1Pro,
    R1Pro8K,
}

impl MouseModel {
    /// Look up model from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        match pid {
            pids::R1_PRO => Some(Self::R1Pro),
            pids::R1_PRO_8K => Some(Self::R1Pro8K),
            _ => None,
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::R1Pro => "VXE R1 Pro",
            Self::R1Pro8K => "VXE R1 Pro (8K receiver)",
        }
    }

    /// USB Product ID.
    pub fn pid(&self) -> u16 {
        match self {
            Self::R1Pro => pids::R1_PRO,
            Self::R1Pro8K => pids::R1_PRO_8K,
        }
    }

    /// Highest polling rate the receiver variant supports.
    pub fn max_polling_rate(&self) -> PollingRate {
        match self {
            Self::R1Pro => PollingRate::Hz1000,
            Self::R1Pro8K => PollingRate::Hz8000,
        }
    }
}

/// Information about a discovered VXE device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub model: MouseModel,
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
}

impl DeviceInfo {
    /// Placeholder info for a device known only by model (tests, mocks).
    pub fn for_model(model: MouseModel) -> Self {
        Self {
            model,
            vid: VXE_VID,
            pid: model.pid(),
            path: String::new(),
            serial: None,
        }
    }
}

/// Polling rate options across both receiver variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum PollingRate {
    Hz125 = 125,
    Hz250 = 250,
    Hz500 = 500,
    Hz1000 = 1000,
    Hz2000 = 2000,
    Hz4000 = 4000,
    Hz8000 = 8000,
}

impl PollingRate {
    /// Convert from raw Hz value. Only exact table entries are accepted.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            125 => Some(Self::Hz125),
            250 => Some(Self::Hz250),
            500 => Some(Self::Hz500),
            1000 => Some(Self::Hz1000),
            2000 => Some(Self::Hz2000),
            4000 => Some(Self::Hz4000),
            8000 => Some(Self::Hz8000),
            _ => None,
        }
    }

    /// Resolve an arbitrary Hz value to the nearest table entry.
    ///
    /// Ties round down: 3000 Hz resolves to 2000, not 4000.
    pub fn nearest(hz: u16) -> Self {
        let mut best = Self::Hz125;
        for &rate in Self::ALL {
            let d = rate.as_hz().abs_diff(hz);
            if d < best.as_hz().abs_diff(hz) {
                best = rate;
            }
        }
        best
    }

    /// Get the Hz value.
    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// Wire encoding used by the set-polling-rate frame.
    pub fn code(&self) -> u8 {
        match self {
            Self::Hz125 => 0,
            Self::Hz250 => 1,
            Self::Hz500 => 2,
            Self::Hz1000 => 3,
            Self::Hz2000 => 4,
            Self::Hz4000 => 5,
            Self::Hz8000 => 6,
        }
    }

    /// Convert back from the wire encoding.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Hz125),
            1 => Some(Self::Hz250),
            2 => Some(Self::Hz500),
            3 => Some(Self::Hz1000),
            4 => Some(Self::Hz2000),
            5 => Some(Self::Hz4000),
            6 => Some(Self::Hz8000),
            _ => None,
        }
    }

    /// All supported rates, ascending.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz125,
        PollingRate::Hz250,
        PollingRate::Hz500,
        PollingRate::Hz1000,
        PollingRate::Hz2000,
        PollingRate::Hz4000,
        PollingRate::Hz8000,
    ];
}

impl std::fmt::Display for PollingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}

/// Sensor lift-off distance presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LiftOffDistance {
    Mm1,
    Mm2,
}

impl LiftOffDistance {
    /// Wire encoding: distance in millimetres.
    pub fn as_mm(&self) -> u8 {
        match self {
            Self::Mm1 => 1,
            Self::Mm2 => 2,
        }
    }

    pub fn from_mm(mm: u8) -> Option<Self> {
        match mm {
            1 => Some(Self::Mm1),
            2 => Some(Self::Mm2),
            _ => None,
        }
    }
}

impl std::fmt::Display for LiftOffDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} mm", self.as_mm())
    }
}

/// Button actions assignable to the R1 Pro's physical buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ButtonAction {
    LeftClick,
    RightClick,
    MiddleClick,
    Back,
    Forward,
    DpiLoop,
    Disabled,
}

impl ButtonAction {
    /// All available actions.
    pub const ALL: &'static [ButtonAction] = &[
        ButtonAction::LeftClick,
        ButtonAction::RightClick,
        ButtonAction::MiddleClick,
        ButtonAction::Back,
        ButtonAction::Forward,
        ButtonAction::DpiLoop,
        ButtonAction::Disabled,
    ];

    /// Wire encoding used by the set-button frame.
    pub fn code(&self) -> u8 {
        match self {
            Self::Disabled => 0x00,
            Self::LeftClick => 0x01,
            Self::RightClick => 0x02,
            Self::MiddleClick => 0x03,
            Self::Back => 0x04,
            Self::Forward => 0x05,
            Self::DpiLoop => 0x06,
        }
    }

    /// Convert back from the wire encoding.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Self::Disabled),
            0x01 => Some(Self::LeftClick),
            0x02 => Some(Self::RightClick),
            0x03 => Some(Self::MiddleClick),
            0x04 => Some(Self::Back),
            0x05 => Some(Self::Forward),
            0x06 => Some(Self::DpiLoop),
            _ => None,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LeftClick => "Left Click",
            Self::RightClick => "Right Click",
            Self::MiddleClick => "Middle Click",
            Self::Back => "Back",
            Self::Forward => "Forward",
            Self::DpiLoop => "DPI Loop",
            Self::Disabled => "Disabled",
        }
    }

    /// Parse a button action from a CLI-friendly string.
    ///
    /// Accepts common name variants (case-insensitive):
    /// - "left", "left-click" → LeftClick
    /// - "right", "right-click" → RightClick
    /// - "middle", "middle-click" → MiddleClick
    /// - "back" → Back
    /// - "forward" → Forward
    /// - "dpi", "dpi-loop" → DpiLoop
    /// - "none", "disabled" → Disabled
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "left" | "left-click" | "leftclick" => Some(Self::LeftClick),
            "right" | "right-click" | "rightclick" => Some(Self::RightClick),
            "middle" | "middle-click" | "middleclick" => Some(Self::MiddleClick),
            "back" => Some(Self::Back),
            "forward" => Some(Self::Forward),
            "dpi" | "dpi-loop" | "dpiloop" => Some(Self::DpiLoop),
            "none" | "disabled" | "no-action" => Some(Self::Disabled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ButtonAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Number of programmable buttons on the R1 Pro.
pub const BUTTON_COUNT: usize = 6;

/// Number of stored DPI stages.
pub const NUM_DPI_STAGES: usize = 4;

/// DPI bounds and step for the PAW3395 sensor.
pub const DPI_MIN: u16 = 50;
pub const DPI_MAX: u16 = 26000;
pub const DPI_STEP: u16 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_model_from_known_pid() {
        assert_eq!(MouseModel::from_pid(0xF58A), Some(MouseModel::R1Pro));
        assert_eq!(MouseModel::from_pid(0xF58E), Some(MouseModel::R1Pro8K));
    }

    #[test]
    fn mouse_model_from_unknown_pid() {
        assert_eq!(MouseModel::from_pid(0x1234), None);
    }

    #[test]
    fn max_polling_rate_depends_on_receiver() {
        assert_eq!(MouseModel::R1Pro.max_polling_rate(), PollingRate::Hz1000);
        assert_eq!(MouseModel::R1Pro8K.max_polling_rate(), PollingRate::Hz8000);
    }

    #[test]
    fn polling_rate_roundtrip() {
        for rate in PollingRate::ALL {
            assert_eq!(PollingRate::from_hz(rate.as_hz()), Some(*rate));
            assert_eq!(PollingRate::from_code(rate.code()), Some(*rate));
        }
    }

    #[test]
    fn polling_rate_rejects_invalid() {
        assert_eq!(PollingRate::from_hz(3000), None);
        assert_eq!(PollingRate::from_hz(0), None);
        assert_eq!(PollingRate::from_code(7), None);
    }

    #[test]
    fn nearest_rate_exact_match() {
        assert_eq!(PollingRate::nearest(500), PollingRate::Hz500);
        assert_eq!(PollingRate::nearest(8000), PollingRate::Hz8000);
    }

    #[test]
    fn nearest_rate_rounds_tie_down() {
        // 3000 is equidistant between 2000 and 4000
        assert_eq!(PollingRate::nearest(3000), PollingRate::Hz2000);
    }

    #[test]
    fn nearest_rate_clamps_extremes() {
        assert_eq!(PollingRate::nearest(1), PollingRate::Hz125);
        assert_eq!(PollingRate::nearest(u16::MAX), PollingRate::Hz8000);
    }

    #[test]
    fn lift_off_roundtrip() {
        assert_eq!(LiftOffDistance::from_mm(1), Some(LiftOffDistance::Mm1));
        assert_eq!(LiftOffDistance::from_mm(2), Some(LiftOffDistance::Mm2));
        assert_eq!(LiftOffDistance::from_mm(3), None);
    }

    #[test]
    fn button_action_code_roundtrip() {
        for action in ButtonAction::ALL {
            assert_eq!(ButtonAction::from_code(action.code()), Some(*action));
        }
        assert_eq!(ButtonAction::from_code(0x7F), None);
    }

    #[test]
    fn button_action_from_name_accepts_variants() {
        assert_eq!(
            ButtonAction::from_name("left"),
            Some(ButtonAction::LeftClick)
        );
        assert_eq!(
            ButtonAction::from_name("Left-Click"),
            Some(ButtonAction::LeftClick)
        );
        assert_eq!(
            ButtonAction::from_name("RIGHT"),
            Some(ButtonAction::RightClick)
        );
        assert_eq!(ButtonAction::from_name("back"), Some(ButtonAction::Back));
        assert_eq!(ButtonAction::from_name("dpi"), Some(ButtonAction::DpiLoop));
        assert_eq!(
            ButtonAction::from_name("disabled"),
            Some(ButtonAction::Disabled)
        );
    }

    #[test]
    fn button_action_from_name_rejects_unknown() {
        assert_eq!(ButtonAction::from_name("shoot"), None);
        assert_eq!(ButtonAction::from_name(""), None);
    }
}
