//! Command dispatcher: the protocol state machine.
//!
//! Commands move through `Queued → InFlight → {Completed | TimedOut |
//! Cancelled | SendFailed}` under two invariants:
//!
//! - at most one command is in flight at any instant (the device has a
//!   single report endpoint and one outstanding transaction), and
//! - every enqueued command resolves exactly once.
//!
//! All state lives on one dispatcher thread. Transport callbacks, caller
//! enqueues, and shutdown all arrive as messages on the same channel, and
//! the per-command timeout is the loop's own `recv_timeout` deadline, so
//! a timeout can never race a late response for the same command.
//!
//! The wire protocol has no sequence numbers. Correlation is therefore
//! conservative: exact kind match first, then "the sole in-flight command
//! must be the addressee", otherwise the frame is dropped. Exclusivity is
//! what makes the fallback sound; pipelining is deliberately not offered.
//!
//! Commands enqueued while no device is attached stay queued until one
//! attaches. Losing an attached device cancels everything outstanding at
//! that moment.

use crate::codec::{
    self, BatteryPayload, Command, CommandId, CommandKind, InfoPayload, ResponseKind,
    SettingsPayload,
};
use crate::device::DeviceInfo;
use crate::error::{Error, Result};
use crate::session::DeviceSession;
use crate::transport::{ConnectionState, RawHid};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Successful command outcome delivered to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// A write-only command was delivered; the device sends no reply.
    Ack,
    Info(InfoPayload),
    Settings(SettingsPayload),
    Battery(BatteryPayload),
}

/// Events broadcast to collaborators (UI, profile layer).
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    ConnectionChanged(ConnectionState),
    /// Battery state, solicited or not.
    Battery { percent: u8, charging: bool },
    /// A command resolved; failures carry the error message.
    CommandResult {
        id: CommandId,
        kind: CommandKind,
        result: std::result::Result<(), String>,
    },
}

type CompletionTx = SyncSender<Result<Response>>;

/// Messages into the dispatcher loop.
pub(crate) enum Event {
    Enqueue(Command, CompletionTx),
    Attached(DeviceInfo, Box<dyn RawHid + Send>),
    Detached,
    Report(Vec<u8>),
    MonitorError(String),
    Shutdown,
}

/// One-shot receiver for a command's terminal result.
///
/// Exactly one `Result` is ever delivered per ticket.
pub struct CommandTicket {
    id: CommandId,
    rx: Receiver<Result<Response>>,
}

impl CommandTicket {
    pub fn id(&self) -> CommandId {
        self.id
    }

    /// Block until the command resolves.
    pub fn wait(self) -> Result<Response> {
        self.rx.recv().unwrap_or(Err(Error::Cancelled))
    }

    /// Block until the command resolves or the given duration elapses.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Response> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                Err(Error::Timeout(format!("no completion within {timeout:?}")))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Cancelled),
        }
    }

    /// Non-blocking poll.
    pub fn try_result(&self) -> Option<Result<Response>> {
        self.rx.try_recv().ok()
    }
}

/// Handoff point for transport-thread callbacks into the dispatcher loop.
///
/// The monitor never mutates dispatcher state; it posts here.
#[derive(Clone)]
pub struct MonitorSink {
    tx: Sender<Event>,
}

impl MonitorSink {
    pub fn attached(&self, info: DeviceInfo, hid: Box<dyn RawHid + Send>) {
        let _ = self.tx.send(Event::Attached(info, hid));
    }

    pub fn detached(&self) {
        let _ = self.tx.send(Event::Detached);
    }

    pub fn report(&self, data: Vec<u8>) {
        let _ = self.tx.send(Event::Report(data));
    }

    pub fn error(&self, message: String) {
        let _ = self.tx.send(Event::MonitorError(message));
    }
}

/// Clonable front door for enqueuing commands.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: Sender<Event>,
}

impl DispatcherHandle {
    /// Enqueue a command with the kind's default timeout and response
    /// policy. Returns immediately; the ticket resolves asynchronously.
    pub fn enqueue(&self, kind: CommandKind, params: Vec<u16>) -> CommandTicket {
        self.submit(Command::new(kind, params))
    }

    /// Enqueue a fully-built command (custom timeout / response policy).
    pub fn submit(&self, command: Command) -> CommandTicket {
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let id = command.id;
        if self.tx.send(Event::Enqueue(command, done_tx.clone())).is_err() {
            // Dispatcher already shut down; resolve the ticket here so the
            // exactly-once contract holds.
            let _ = done_tx.send(Err(Error::Cancelled));
        }
        CommandTicket { id, rx: done_rx }
    }

    /// Sink for the transport monitor to post bus events into.
    pub fn monitor_sink(&self) -> MonitorSink {
        MonitorSink {
            tx: self.tx.clone(),
        }
    }
}

/// Owns the dispatcher thread. Dropping it shuts the loop down and
/// cancels all outstanding commands.
pub struct Dispatcher {
    tx: Sender<Event>,
    events: Option<Receiver<DeviceEvent>>,
    thread: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the dispatcher loop on its own thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let thread = thread::spawn(move || Engine::new(rx, event_tx).run());
        Self {
            tx,
            events: Some(event_rx),
            thread: Some(thread),
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            tx: self.tx.clone(),
        }
    }

    /// Take the collaborator event stream. Single consumer; subsequent
    /// calls return None.
    pub fn take_events(&mut self) -> Option<Receiver<DeviceEvent>> {
        self.events.take()
    }

    /// Stop the loop, cancelling every queued and in-flight command.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.tx.send(Event::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The in-flight command's bookkeeping. Removed exactly once, on
/// completion, timeout, or cancellation.
struct PendingEntry {
    command: Command,
    done: CompletionTx,
    deadline: Instant,
}

struct Engine {
    rx: Receiver<Event>,
    events: Sender<DeviceEvent>,
    queue: VecDeque<(Command, CompletionTx)>,
    in_flight: Option<PendingEntry>,
    session: Option<DeviceSession>,
}

impl Engine {
    fn new(rx: Receiver<Event>, events: Sender<DeviceEvent>) -> Self {
        Self {
            rx,
            events,
            queue: VecDeque::new(),
            in_flight: None,
            session: None,
        }
    }

    fn run(mut self) {
        debug!("Dispatcher loop started");
        loop {
            let event = if let Some(deadline) = self.in_flight.as_ref().map(|p| p.deadline) {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.rx.recv_timeout(remaining) {
                    Ok(event) => event,
                    Err(RecvTimeoutError::Timeout) => {
                        self.on_timeout();
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            } else {
                match self.rx.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                }
            };

            match event {
                Event::Enqueue(command, done) => {
                    trace!(id = %command.id, kind = ?command.kind, "Command queued");
                    self.queue.push_back((command, done));
                    self.advance();
                }
                Event::Attached(info, hid) => self.on_attached(info, hid),
                Event::Detached => self.on_device_lost(),
                Event::Report(data) => self.on_report(&data),
                Event::MonitorError(message) => {
                    warn!("Transport error: {message}");
                    self.emit(DeviceEvent::ConnectionChanged(ConnectionState::Error(
                        message,
                    )));
                }
                Event::Shutdown => break,
            }
        }
        self.cancel_all();
        debug!("Dispatcher loop stopped");
    }

    /// Send queued commands until one is in flight or nothing can move.
    ///
    /// Strict FIFO with head-of-line blocking: a command that fails to
    /// write resolves as SendFailed and the next one is tried at once.
    fn advance(&mut self) {
        while self.in_flight.is_none() {
            if !self.session.as_ref().is_some_and(DeviceSession::is_open) {
                break;
            }
            let Some((command, done)) = self.queue.pop_front() else {
                break;
            };

            let frame = codec::encode(&command);
            let write_result = match &self.session {
                Some(session) => session.write(&frame),
                None => Err(Error::Disconnected),
            };

            match write_result {
                Err(e) => {
                    warn!(id = %command.id, kind = ?command.kind, "Write failed: {e}");
                    self.complete(command, done, Err(e));
                }
                Ok(()) if command.expects_response => {
                    debug!(id = %command.id, kind = ?command.kind, "Command in flight");
                    let deadline = Instant::now() + command.timeout;
                    self.in_flight = Some(PendingEntry {
                        command,
                        done,
                        deadline,
                    });
                }
                Ok(()) => {
                    trace!(id = %command.id, kind = ?command.kind, "Write-only command completed");
                    self.complete(command, done, Ok(Response::Ack));
                }
            }
        }
    }

    fn on_timeout(&mut self) {
        if let Some(pending) = self.in_flight.take() {
            warn!(
                id = %pending.command.id,
                kind = ?pending.command.kind,
                "Command timed out"
            );
            let timeout = pending.command.timeout;
            self.complete(
                pending.command,
                pending.done,
                Err(Error::Timeout(format!("no response within {timeout:?}"))),
            );
        }
        self.advance();
    }

    fn on_attached(&mut self, info: DeviceInfo, hid: Box<dyn RawHid + Send>) {
        if self.session.is_some() {
            // Handle replaced wholesale: the old one counts as lost.
            self.on_device_lost();
        }
        info!(model = info.model.name(), "Device attached");
        self.session = Some(DeviceSession::new(info, hid));
        self.emit(DeviceEvent::ConnectionChanged(ConnectionState::Connected));
        self.advance();
    }

    /// Cancel everything outstanding and drop the handle.
    fn on_device_lost(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.invalidate();
        }
        let outstanding: Vec<_> = self
            .in_flight
            .take()
            .map(|p| (p.command, p.done))
            .into_iter()
            .chain(self.queue.drain(..))
            .collect();
        if !outstanding.is_empty() {
            info!(
                count = outstanding.len(),
                "Cancelling outstanding commands after device loss"
            );
        }
        for (command, done) in outstanding {
            self.complete(command, done, Err(Error::Cancelled));
        }
        self.emit(DeviceEvent::ConnectionChanged(ConnectionState::Disconnected));
    }

    fn on_report(&mut self, data: &[u8]) {
        let decoded = codec::decode(data);
        match decoded {
            ResponseKind::Error(code) => {
                if let Some(pending) = self.in_flight.take() {
                    warn!(id = %pending.command.id, %code, "Device rejected command");
                    self.complete(pending.command, pending.done, Err(Error::Device(code)));
                    self.advance();
                } else {
                    debug!(%code, "Error frame with nothing in flight, dropping");
                }
            }
            ResponseKind::Battery(payload) => {
                // Battery frames arrive unsolicited too; they only ever
                // answer an actual get-battery command.
                let solicited = self
                    .in_flight
                    .as_ref()
                    .is_some_and(|p| p.command.kind == CommandKind::GetBattery);
                if solicited {
                    if let Some(pending) = self.in_flight.take() {
                        self.complete(
                            pending.command,
                            pending.done,
                            Ok(Response::Battery(payload)),
                        );
                    }
                    self.advance();
                } else {
                    trace!(percent = payload.percent, "Battery update");
                    self.emit(DeviceEvent::Battery {
                        percent: payload.percent,
                        charging: payload.charging,
                    });
                }
            }
            ResponseKind::Info(payload) => self.complete_typed(decoded, Response::Info(payload)),
            ResponseKind::Settings(payload) => {
                self.complete_typed(decoded, Response::Settings(payload))
            }
            ResponseKind::Unrecognized(opcode) => {
                debug!(
                    opcode = format_args!("0x{opcode:02X}"),
                    "Unrecognized frame, dropping"
                );
            }
        }
    }

    /// Complete the in-flight command with a typed response.
    ///
    /// Exact kind match first; otherwise the sole in-flight command is
    /// assumed to be the addressee. With nothing in flight the frame is
    /// dropped.
    fn complete_typed(&mut self, decoded: ResponseKind, response: Response) {
        let Some(pending) = self.in_flight.take() else {
            debug!(?response, "Response frame with nothing in flight, dropping");
            return;
        };
        if !decoded.answers(pending.command.kind) {
            debug!(
                id = %pending.command.id,
                kind = ?pending.command.kind,
                "Kind mismatch, correlating frame to the sole in-flight command"
            );
        }
        self.complete(pending.command, pending.done, Ok(response));
        self.advance();
    }

    fn cancel_all(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        let outstanding: Vec<_> = self
            .in_flight
            .take()
            .map(|p| (p.command, p.done))
            .into_iter()
            .chain(self.queue.drain(..))
            .collect();
        for (command, done) in outstanding {
            self.complete(command, done, Err(Error::Cancelled));
        }
    }

    /// Deliver the one and only terminal result for a command.
    fn complete(&self, command: Command, done: CompletionTx, result: Result<Response>) {
        let summary = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        let _ = done.send(result);
        self.emit(DeviceEvent::CommandResult {
            id: command.id,
            kind: command.kind,
            result: summary,
        });
    }

    fn emit(&self, event: DeviceEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }
}
