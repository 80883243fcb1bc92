//! # NB-IoT modem device
//!
//! This module drives one BC28 modem through a [`CommandExecutor`] and keeps
//! its MQTT session alive. The MQTT protocol runs inside the modem; the
//! driver only sequences AT commands and tracks where the session stands.
//!
//! ## Design
//!
//! A [`Device`] is created once at startup and shared as an `Arc`. It owns
//! the executor, the reset line, a delay source and the [`Config`], and
//! tracks the session in a [`SessionState`]:
//!
//! ```text
//!            initialize_device()       attach_to_network()
//!   (any) ─────────────────────▶ Init ───────────────────▶ Attached ◀──┐
//!                                                           │    │     │
//!                                               connect()   │    │ detach_from_network()
//!                                                           ▼    ▼     │
//!          ┌──────── disconnect() / +QMTSTAT ────── Connected  Deattached
//!          ▼                                           ▲
//!     Disconnected ─────────── connect() ──────────────┘
//! ```
//!
//! Operations run in two contexts: explicit calls from application code, and
//! URC handlers the executor runs when the modem reports a link failure or an
//! inbound message. Both share the executor, which serializes every command
//! exchange, so a URC-triggered rebuild simply queues behind whatever the
//! application is doing.
//!
//! The bound message parser runs on the URC path. It must return promptly;
//! while it runs no further notifications are handled.
//!
//! ## Operations
//!
//! * Bring-up: [`initialize_device`](Device::initialize_device),
//!   [`attach_to_network`](Device::attach_to_network),
//!   [`detach_from_network`](Device::detach_from_network)
//! * Session: [`authenticate`](Device::authenticate),
//!   [`open_session`](Device::open_session),
//!   [`close_session`](Device::close_session), [`connect`](Device::connect),
//!   [`disconnect`](Device::disconnect), [`subscribe`](Device::subscribe),
//!   [`unsubscribe`](Device::unsubscribe), [`publish`](Device::publish)
//! * Lifecycle: [`build_network`](Device::build_network),
//!   [`rebuild_network`](Device::rebuild_network),
//!   [`build_network_with_retry`](Device::build_network_with_retry)

#![deny(unsafe_code)]

use crate::network::at::{CommandExecutor, command_text};
use atat::AtatCmd;
use core::time::Duration;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::String;
use log::{info, warn};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

pub mod bringup;
pub mod command;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod session;
pub mod urc;

pub use config::Config;
pub use error::Error;
pub use urc::{LinkStatusCode, Recovery, Urc};

/// Length of an IMEI.
pub const IMEI_LEN: usize = 15;
/// Capacity of the stored IP address, enough for IPv6 text form.
pub const IP_LEN: usize = 39;

/// Callback receiving the payload of every inbound MQTT message.
pub type MessageParser = Box<dyn Fn(&str) + Send + Sync>;

/// Where the modem and its MQTT session stand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The modem was reset and its link initialized.
    Init,
    /// The modem is attached to the packet domain.
    Attached,
    /// The modem detached from the packet domain.
    Deattached,
    /// The MQTT session is connected.
    Connected,
    /// The MQTT session is down. Initial state.
    #[default]
    Disconnected,
}

impl SessionState {
    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (_, Init)
                | (Init, Attached)
                | (Deattached, Attached)
                | (Attached, Connected)
                | (Disconnected, Connected)
                | (Connected, Disconnected)
                | (Attached | Connected | Disconnected, Deattached)
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionState::Init => defmt::write!(f, "Init"),
            SessionState::Attached => defmt::write!(f, "Attached"),
            SessionState::Deattached => defmt::write!(f, "Deattached"),
            SessionState::Connected => defmt::write!(f, "Connected"),
            SessionState::Disconnected => defmt::write!(f, "Disconnected"),
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The one modem attachment of the process.
pub struct Device<E, P, D> {
    executor: E,
    config: Config,
    state: Mutex<SessionState>,
    imei: Mutex<String<IMEI_LEN>>,
    ip: Mutex<String<IP_LEN>>,
    parser: OnceLock<MessageParser>,
    reset: Mutex<P>,
    delay: Mutex<D>,
}

impl<E, P, D> Device<E, P, D>
where
    E: CommandExecutor<Urc = Urc> + 'static,
    P: OutputPin + Send + 'static,
    D: DelayNs + Send + 'static,
{
    /// Create the device. The session starts out [`SessionState::Disconnected`].
    pub fn new(executor: E, reset: P, delay: D, config: Config) -> Arc<Self> {
        Arc::new(Self {
            executor,
            config,
            state: Mutex::new(SessionState::default()),
            imei: Mutex::new(String::new()),
            ip: Mutex::new(String::new()),
            parser: OnceLock::new(),
            reset: Mutex::new(reset),
            delay: Mutex::new(delay),
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// IMEI reported during attach, empty before.
    pub fn imei(&self) -> String<IMEI_LEN> {
        lock(&self.imei).clone()
    }

    /// IP address assigned on attach, empty before.
    pub fn ip_address(&self) -> String<IP_LEN> {
        lock(&self.ip).clone()
    }

    /// The configuration the device was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The executor commands are issued through.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Bind the handler for inbound message payloads.
    ///
    /// Only one parser can be bound for the lifetime of the device. It runs
    /// on the URC dispatch thread and must not block.
    pub fn bind_parser<F>(&self, parser: F) -> Result<(), Error>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.parser
            .set(Box::new(parser))
            .map_err(|_| Error::ParserAlreadyBound)
    }

    pub(crate) fn parser(&self) -> Option<&MessageParser> {
        self.parser.get()
    }

    /// Move along an edge of the state machine. Returns whether the state
    /// is `next` afterwards.
    pub(crate) fn transition(&self, next: SessionState) -> bool {
        let mut state = lock(&self.state);
        if *state == next {
            return true;
        }
        if !state.can_transition_to(next) {
            warn!("refusing state change {:?} -> {:?}", *state, next);
            return false;
        }
        info!("session state {:?} -> {:?}", *state, next);
        *state = next;
        true
    }

    pub(crate) fn store<const N: usize>(slot: &Mutex<String<N>>, value: &str) {
        let mut slot = lock(slot);
        slot.clear();
        for c in value.chars() {
            if slot.push(c).is_err() {
                warn!("'{}' truncated to {} bytes", value, N);
                break;
            }
        }
    }

    pub(crate) fn imei_slot(&self) -> &Mutex<String<IMEI_LEN>> {
        &self.imei
    }

    pub(crate) fn ip_slot(&self) -> &Mutex<String<IP_LEN>> {
        &self.ip
    }

    pub(crate) fn reset_line(&self) -> MutexGuard<'_, P> {
        lock(&self.reset)
    }

    pub(crate) fn sleep_ms(&self, ms: u32) {
        lock(&self.delay).delay_ms(ms);
    }

    /// Send a command and return its parsed response.
    pub(crate) fn send<Cmd: AtatCmd>(&self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        Ok(self.executor.send(cmd)?)
    }

    /// Send a command and wait for its result URC; `check` picks the result
    /// out of the URC stream and says whether it reports success.
    pub(crate) fn send_acked<Cmd, F>(&self, cmd: &Cmd, timeout: Duration, check: F) -> Result<(), Error>
    where
        Cmd: AtatCmd,
        F: Fn(&Urc) -> Option<bool>,
    {
        if self.executor.send_and_await(cmd, timeout, check)? {
            Ok(())
        } else {
            warn!("'{}' acknowledged with a failure", command_text(cmd));
            Err(Error::Transport)
        }
    }
}

impl<E, P, D> core::fmt::Debug for Device<E, P, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("state", &*lock(&self.state))
            .field("imei", &*lock(&self.imei))
            .field("ip", &*lock(&self.ip))
            .field("parser_bound", &self.parser.get().is_some())
            .finish_non_exhaustive()
    }
}
