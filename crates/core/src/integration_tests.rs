//! Integration tests: exercise the full dispatcher flow against a
//! simulated R1 Pro device.
//!
//! The mock device records every frame the dispatcher writes; tests play
//! the device side by injecting response frames through the monitor sink,
//! exactly as the transport reader thread would.

#[cfg(test)]
mod tests {
    use crate::codec::{CommandKind, DeviceErrorCode};
    use crate::device::{DeviceInfo, MouseModel};
    use crate::dispatcher::{Dispatcher, DispatcherHandle, Response};
    use crate::error::Error;
    use crate::settings;
    use crate::transport::mock::MockHid;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(2);

    fn connected() -> (Dispatcher, DispatcherHandle, MockHid) {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();
        let mock = MockHid::new();
        handle.monitor_sink().attached(
            DeviceInfo::for_model(MouseModel::R1Pro8K),
            Box::new(mock.clone()),
        );
        (dispatcher, handle, mock)
    }

    /// Spin until the mock has seen `n` writes.
    fn wait_for_writes(mock: &MockHid, n: usize) {
        let deadline = Instant::now() + WAIT;
        while mock.write_count() < n {
            assert!(Instant::now() < deadline, "expected {n} writes, saw {}", mock.write_count());
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Scenario: set-DPI(dpi=1234, stage=2) produces byte1=2 and
    /// bytes2-3 = big-endian 1230.
    #[test]
    fn set_dpi_scenario_frame_layout() {
        let (_dispatcher, handle, mock) = connected();

        settings::set_dpi_stage(&handle, 2, 1234)
            .unwrap()
            .wait_timeout(WAIT)
            .unwrap();

        let frame = &mock.written()[0];
        assert_eq!(frame[0], 0x20);
        assert_eq!(frame[1], 2);
        assert_eq!(frame[2], 0x04);
        assert_eq!(frame[3], 0xCE);
    }

    /// Scenario: polling rate 3000 is off the table and resolves to the
    /// nearest valid rate (2000, code 4) before encoding.
    #[test]
    fn polling_rate_scenario_resolves_nearest() {
        let (_dispatcher, handle, mock) = connected();

        handle
            .enqueue(CommandKind::SetPollingRate, vec![3000])
            .wait_timeout(WAIT)
            .unwrap();

        assert_eq!(mock.written()[0][..2], [0x30, 4]);
    }

    /// Scenario: an in-flight get-info times out, the callback sees
    /// Timeout, and the queue advances to the next command.
    #[test]
    fn timeout_fails_command_and_advances_queue() {
        let (_dispatcher, handle, mock) = connected();

        let slow = handle.submit(
            crate::codec::Command::new(CommandKind::GetInfo, vec![])
                .with_timeout(Duration::from_millis(40)),
        );
        let next = handle.enqueue(CommandKind::SetMotionSync, vec![1]);

        assert!(matches!(slow.wait_timeout(WAIT), Err(Error::Timeout(_))));
        assert_eq!(next.wait_timeout(WAIT).unwrap(), Response::Ack);
        // Both frames reached the wire, in order.
        wait_for_writes(&mock, 2);
        assert_eq!(mock.written()[0][0], 0x10);
        assert_eq!(mock.written()[1][0], 0x60);
    }

    /// Scenario: device loss with 3 queued + 1 in-flight cancels all 4.
    #[test]
    fn device_loss_cancels_queued_and_in_flight() {
        let (_dispatcher, handle, mock) = connected();

        let tickets = vec![
            handle.enqueue(CommandKind::GetInfo, vec![]),
            handle.enqueue(CommandKind::GetSettings, vec![]),
            handle.enqueue(CommandKind::GetBattery, vec![]),
            handle.enqueue(CommandKind::GetInfo, vec![]),
        ];

        // First command goes in flight; the rest wait behind it.
        wait_for_writes(&mock, 1);
        handle.monitor_sink().detached();

        for ticket in tickets {
            assert_eq!(ticket.wait_timeout(WAIT), Err(Error::Cancelled));
        }
        assert_eq!(mock.write_count(), 1);
    }

    /// Commands enqueued while disconnected are never silently dropped:
    /// they queue until a device attaches.
    #[test]
    fn disconnected_enqueues_resolve_after_reattach() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        let ticket = handle.enqueue(CommandKind::SetMotionSync, vec![1]);

        let mock = MockHid::new();
        handle.monitor_sink().attached(
            DeviceInfo::for_model(MouseModel::R1Pro),
            Box::new(mock.clone()),
        );

        assert_eq!(ticket.wait_timeout(WAIT).unwrap(), Response::Ack);
        assert_eq!(mock.write_count(), 1);
    }

    /// At most one command is in flight: the second query does not reach
    /// the wire until the first one is answered.
    #[test]
    fn single_in_flight_is_enforced() {
        let (_dispatcher, handle, mock) = connected();

        let first = handle.enqueue(CommandKind::GetBattery, vec![]);
        let second = handle.enqueue(CommandKind::GetBattery, vec![]);

        wait_for_writes(&mock, 1);
        // Give the dispatcher a chance to misbehave.
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(mock.write_count(), 1);

        handle
            .monitor_sink()
            .report(vec![0x70, 80, 0, 0, 0, 0, 0, 0]);
        let Response::Battery(battery) = first.wait_timeout(WAIT).unwrap() else {
            panic!("expected battery response");
        };
        assert_eq!(battery.percent, 80);

        wait_for_writes(&mock, 2);
        handle
            .monitor_sink()
            .report(vec![0x70, 79, 0, 0, 0, 0, 0, 0]);
        second.wait_timeout(WAIT).unwrap();
    }

    /// Concurrent enqueues from many threads: every ticket resolves
    /// exactly once and every frame reaches the wire.
    #[test]
    fn concurrent_enqueue_stress() {
        use std::thread;

        let (_dispatcher, handle, mock) = connected();

        let mut workers = vec![];
        for _ in 0..8 {
            let handle = handle.clone();
            workers.push(thread::spawn(move || {
                let mut tickets = vec![];
                for i in 0..25u16 {
                    tickets.push(handle.enqueue(CommandKind::SetMotionSync, vec![i % 2]));
                }
                for ticket in tickets {
                    assert_eq!(ticket.wait_timeout(WAIT).unwrap(), Response::Ack);
                }
            }));
        }
        for worker in workers {
            worker.join().expect("worker panicked");
        }

        assert_eq!(mock.write_count(), 8 * 25);
    }

    /// A device error frame fails the in-flight command with the mapped
    /// code and the queue moves on.
    #[test]
    fn error_frame_fails_in_flight_command() {
        let (_dispatcher, handle, mock) = connected();

        let ticket = handle.enqueue(CommandKind::GetSettings, vec![]);
        wait_for_writes(&mock, 1);
        handle
            .monitor_sink()
            .report(vec![0x80, 0x03, 0, 0, 0, 0, 0, 0]);

        assert_eq!(
            ticket.wait_timeout(WAIT),
            Err(Error::Device(DeviceErrorCode::Unsupported))
        );

        let next = handle.enqueue(CommandKind::SetMotionSync, vec![0]);
        assert_eq!(next.wait_timeout(WAIT).unwrap(), Response::Ack);
    }

    /// A late response after a timeout is dropped, not misdelivered: the
    /// timed-out command already received its single terminal result.
    #[test]
    fn late_response_after_timeout_is_dropped() {
        let (_dispatcher, handle, mock) = connected();

        let slow = handle.submit(
            crate::codec::Command::new(CommandKind::GetInfo, vec![])
                .with_timeout(Duration::from_millis(40)),
        );
        assert!(matches!(slow.wait_timeout(WAIT), Err(Error::Timeout(_))));

        // The answer arrives too late, with nothing in flight.
        handle
            .monitor_sink()
            .report(vec![0x10, 1, 0, 0, 0, 0, 0, 0]);
        std::thread::sleep(Duration::from_millis(50));

        // The next query gets its own answer, unconfused by the stale frame.
        let fresh = handle.enqueue(CommandKind::GetInfo, vec![]);
        wait_for_writes(&mock, 2);
        handle
            .monitor_sink()
            .report(vec![0x10, 3, 7, 0, 0, 0, 0, 0]);
        let info = settings::info_from(fresh.wait_timeout(WAIT).unwrap()).unwrap();
        assert_eq!((info.fw_major, info.fw_minor), (3, 7));
    }

    /// Full settings round trip: query, parse, and reconfigure.
    #[test]
    fn settings_query_and_reconfigure_flow() {
        let (_dispatcher, handle, mock) = connected();

        let query = settings::request_settings(&handle);
        wait_for_writes(&mock, 1);
        handle
            .monitor_sink()
            .report(vec![0x12, 0, 0x03, 0x20, 3, 1, 0, 91]);

        let snapshot = settings::settings_from(query.wait_timeout(WAIT).unwrap()).unwrap();
        assert_eq!(snapshot.dpi, 800);
        assert_eq!(snapshot.battery_percent, 91);
        assert!(!snapshot.motion_sync);

        settings::set_motion_sync(&handle, true)
            .wait_timeout(WAIT)
            .unwrap();
        settings::save_profile(&handle).wait_timeout(WAIT).unwrap();

        wait_for_writes(&mock, 3);
        assert_eq!(mock.written()[1][..2], [0x60, 1]);
        assert_eq!(mock.written()[2][0], 0xF0);
    }

    /// Reattaching after a loss resumes service for new commands.
    #[test]
    fn reattach_resumes_service() {
        let (_dispatcher, handle, mock) = connected();

        handle.monitor_sink().detached();
        let queued = handle.enqueue(CommandKind::SetMotionSync, vec![1]);
        std::thread::sleep(Duration::from_millis(50));
        assert!(queued.try_result().is_none());

        let replacement = MockHid::new();
        handle.monitor_sink().attached(
            DeviceInfo::for_model(MouseModel::R1Pro8K),
            Box::new(replacement.clone()),
        );

        assert_eq!(queued.wait_timeout(WAIT).unwrap(), Response::Ack);
        // The new frame went to the new handle, not the invalidated one.
        assert_eq!(mock.write_count(), 0);
        assert_eq!(replacement.write_count(), 1);
    }
}
