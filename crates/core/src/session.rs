//! One attached device: write path and open/close lifecycle.
//!
//! A session has no protocol awareness. It forwards frames to the bus
//! while open and fails writes immediately once invalidated, so a stale
//! handle can never touch hardware after a disconnect.

use crate::codec::Frame;
use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use crate::transport::RawHid;
use tracing::{debug, trace};

/// Wraps the currently attached device. Replaced wholesale on reconnect.
pub struct DeviceSession {
    info: DeviceInfo,
    hid: Box<dyn RawHid + Send>,
    open: bool,
}

impl DeviceSession {
    pub fn new(info: DeviceInfo, hid: Box<dyn RawHid + Send>) -> Self {
        debug!(model = info.model.name(), "Session opened");
        Self {
            info,
            hid,
            open: true,
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Write one frame to the device.
    ///
    /// Pure I/O: no queuing, no retries. Fails with `Disconnected` after
    /// invalidation without reaching the bus.
    pub fn write(&self, frame: &Frame) -> Result<()> {
        if !self.open {
            return Err(Error::Disconnected);
        }
        trace!(frame_hex = format_args!("{frame:02X?}"), "HID TX");
        self.hid.write(frame)
    }

    /// Mark the session dead after a disconnect notification.
    pub fn invalidate(&mut self) {
        if self.open {
            debug!(model = self.info.model.name(), "Session invalidated");
        }
        self.open = false;
    }

    pub fn close(&mut self) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MouseModel;
    use crate::transport::mock::MockHid;

    fn session_with_mock() -> (DeviceSession, MockHid) {
        let mock = MockHid::new();
        let session = DeviceSession::new(
            DeviceInfo::for_model(MouseModel::R1Pro),
            Box::new(mock.clone()),
        );
        (session, mock)
    }

    #[test]
    fn write_forwards_frame() {
        let (session, mock) = session_with_mock();
        let frame = [0x12, 0, 0, 0, 0, 0, 0, 0];
        session.write(&frame).unwrap();
        assert_eq!(mock.written(), vec![frame.to_vec()]);
    }

    #[test]
    fn write_after_invalidate_fails_without_bus_access() {
        let (mut session, mock) = session_with_mock();
        session.invalidate();
        let err = session.write(&[0x12, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err, Error::Disconnected);
        assert_eq!(mock.write_count(), 0);
    }

    #[test]
    fn write_failure_surfaces_send_error() {
        let (session, mock) = session_with_mock();
        mock.set_fail_writes(true);
        let err = session.write(&[0x20, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, Error::SendFailed(_)));
    }

    #[test]
    fn close_is_idempotent() {
        let (mut session, _mock) = session_with_mock();
        session.close();
        session.close();
        assert!(!session.is_open());
    }
}
