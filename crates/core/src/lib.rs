//! open-vx-hub-core: R1 Pro wire protocol, device discovery, and the
//! command dispatcher.
//!
//! This crate provides the cross-platform core logic for configuring VXE
//! R1 Pro mice over USB HID: an 8-byte command/response codec, a hotplug
//! transport monitor, and a single-owner dispatcher that queues commands,
//! enforces one outstanding transaction, and correlates replies against a
//! stream of unsolicited device reports.

pub mod codec;
pub mod device;
pub mod dispatcher;
pub mod error;
#[cfg(test)]
mod integration_tests;
pub mod safety;
pub mod session;
pub mod settings;
pub mod transport;

/// VXE (Compx) USB Vendor ID.
pub const VXE_VID: u16 = 0x3554;

/// Known R1 Pro product IDs.
pub mod pids {
    /// R1 Pro with the standard 1K receiver.
    pub const R1_PRO: u16 = 0xF58A;
    /// R1 Pro with the high-polling 8K receiver.
    pub const R1_PRO_8K: u16 = 0xF58E;
}
