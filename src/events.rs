//! Ordered extension-event bus.
//!
//! Each named extension point owns one insertion-ordered chain of
//! listeners.  Publishing walks the chain in registration order and stops
//! at the first listener that answers [`Dispatch::Handled`].
//!
//! ```text
//! ┌──────────────┐   publish(Event)   ┌─────────────────────────────┐
//! │ Host / line  │──────────────────▶│ chain[kind]: L0 → L1 → L2 … │
//! │  processor   │◀──────────────────│   first Handled wins        │
//! └──────────────┘  Continue|Handled  └─────────────────────────────┘
//! ```
//!
//! Listeners report results by mutating the payload (status, claim,
//! output lines), never through the return value.  Listeners receive the
//! [`Host`] ports but never the bus, so an event cannot be re-published
//! from inside its own handling.  The bus is built once during init and
//! never shrinks.

use log::{debug, trace};

use crate::app::ports::Host;
use crate::command::{ExecRequest, ParseRequest};
use crate::settings::{BlockRequest, ChangeRequest, ReportRequest};

/// Result of one listener, and of a whole publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Not mine (or fan-out event): let the next listener run.
    Continue,
    /// Stop the chain here.
    Handled,
}

impl Dispatch {
    pub const fn is_handled(self) -> bool {
        matches!(self, Self::Handled)
    }
}

/// Identity of an extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    CommandParse = 0,
    CommandExec = 1,
    PeriodicTask = 2,
    SettingsLoad = 3,
    SettingsSave = 4,
    SettingsChange = 5,
    SettingsErase = 6,
    SettingsReport = 7,
    Notify = 8,
}

impl EventKind {
    /// Total number of kinds, used to size the chain table.
    pub const COUNT: usize = 9;
}

/// Simple host notifications with no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    ProbeDeploy,
    ProbeStow,
    TorchOn,
    TorchOff,
}

/// Payload of the periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Host monotonic clock in milliseconds.
    pub now_ms: u32,
}

/// One published event with its statically typed payload.
#[derive(Debug)]
pub enum Event<'a> {
    CommandParse(&'a mut ParseRequest),
    CommandExec(&'a mut ExecRequest),
    PeriodicTask(Tick),
    SettingsLoad(&'a mut BlockRequest),
    SettingsSave(&'a mut BlockRequest),
    SettingsChange(&'a mut ChangeRequest),
    SettingsErase(&'a mut BlockRequest),
    SettingsReport(&'a mut ReportRequest),
    Notify(Notification),
}

impl Event<'_> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CommandParse(_) => EventKind::CommandParse,
            Self::CommandExec(_) => EventKind::CommandExec,
            Self::PeriodicTask(_) => EventKind::PeriodicTask,
            Self::SettingsLoad(_) => EventKind::SettingsLoad,
            Self::SettingsSave(_) => EventKind::SettingsSave,
            Self::SettingsChange(_) => EventKind::SettingsChange,
            Self::SettingsErase(_) => EventKind::SettingsErase,
            Self::SettingsReport(_) => EventKind::SettingsReport,
            Self::Notify(_) => EventKind::Notify,
        }
    }
}

/// A registered listener.
pub type Listener = Box<dyn FnMut(&mut Event<'_>, &mut dyn Host) -> Dispatch>;

/// The event bus: one ordered chain per [`EventKind`].
pub struct EventBus {
    chains: [Vec<Listener>; EventKind::COUNT],
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            chains: Default::default(),
        }
    }

    /// Append `listener` to the chain for `kind`.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) {
        let chain = &mut self.chains[kind as usize];
        chain.push(listener);
        debug!("EventBus: {:?} listener #{} registered", kind, chain.len() - 1);
    }

    /// Run the chain for `event`'s kind in registration order.
    ///
    /// Returns [`Dispatch::Handled`] as soon as one listener does,
    /// otherwise [`Dispatch::Continue`].
    pub fn publish(&mut self, mut event: Event<'_>, host: &mut dyn Host) -> Dispatch {
        let kind = event.kind();
        for (index, listener) in self.chains[kind as usize].iter_mut().enumerate() {
            if listener(&mut event, &mut *host).is_handled() {
                trace!("EventBus: {:?} handled by listener #{}", kind, index);
                return Dispatch::Handled;
            }
        }
        Dispatch::Continue
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.chains[kind as usize].len()
    }

    // ── Typed subscription helpers ────────────────────────────

    pub fn on_command_parse(
        &mut self,
        mut f: impl FnMut(&mut ParseRequest, &mut dyn Host) -> Dispatch + 'static,
    ) {
        self.subscribe(
            EventKind::CommandParse,
            Box::new(move |event: &mut Event<'_>, host: &mut dyn Host| match event {
                Event::CommandParse(req) => f(&mut **req, host),
                _ => Dispatch::Continue,
            }),
        );
    }

    pub fn on_command_exec(
        &mut self,
        mut f: impl FnMut(&mut ExecRequest, &mut dyn Host) -> Dispatch + 'static,
    ) {
        self.subscribe(
            EventKind::CommandExec,
            Box::new(move |event: &mut Event<'_>, host: &mut dyn Host| match event {
                Event::CommandExec(req) => f(&mut **req, host),
                _ => Dispatch::Continue,
            }),
        );
    }

    pub fn on_periodic(&mut self, mut f: impl FnMut(Tick, &mut dyn Host) -> Dispatch + 'static) {
        self.subscribe(
            EventKind::PeriodicTask,
            Box::new(move |event: &mut Event<'_>, host: &mut dyn Host| match event {
                Event::PeriodicTask(tick) => f(*tick, host),
                _ => Dispatch::Continue,
            }),
        );
    }

    pub fn on_notify(
        &mut self,
        mut f: impl FnMut(Notification, &mut dyn Host) -> Dispatch + 'static,
    ) {
        self.subscribe(
            EventKind::Notify,
            Box::new(move |event: &mut Event<'_>, host: &mut dyn Host| match event {
                Event::Notify(n) => f(*n, host),
                _ => Dispatch::Continue,
            }),
        );
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
