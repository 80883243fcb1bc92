//! AT command executor for serial modems, built on [`atat`].
//!
//! A modem shares one serial link between two kinds of traffic: the response
//! to the command currently in flight, and unsolicited result codes (URCs)
//! the modem emits whenever something happens on its side. `atat` keeps the
//! two apart; this module wires its blocking client, ingress and URC channel
//! to the crate's [`Read`](crate::network::Read)/[`Write`](crate::network::Write)
//! link traits and to plain threads.
//!
//! # Architecture
//!
//! ```text
//!   foreground callers          receive thread            URC thread
//!  ┌─────────────────┐        ┌─────────────────┐      ┌──────────────────┐
//!  │ AtClient        │        │ IngressRunner   │      │ UrcDispatcher    │
//!  │  send()     ────┼─write─▶│  feed()/run()   │─────▶│  run()           │
//!  │  (one at a time)│◀─resp──┤  atat digester  │ URCs │  invokes handler │
//!  └─────────────────┘        └─────────────────┘      └──────────────────┘
//! ```
//!
//! - [`AtClient`] is the transmit side. Its client mutex is the single
//!   execution lock: exactly one command, and the acknowledgement URC it
//!   may wait for, is in flight at a time.
//! - [`IngressRunner`] is the receive side. The digester classifies URCs
//!   before anything else, so a notification is never mistaken for the
//!   response or the data prompt of the pending command.
//! - [`UrcDispatcher`] invokes the URC handler on its own thread, so a
//!   handler may issue commands through the same [`AtClient`] without
//!   stalling the receive path that has to deliver their responses.
//!
//! # Example
//!
//! ```rust,no_run
//! use libnbiot::cellular::{command, Urc};
//! use libnbiot::network::at::{AtClient, CommandExecutor};
//! # struct Uart;
//! # impl libnbiot::network::Write for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl libnbiot::network::Read for Uart {
//! #     type Error = libnbiot::network::error::Error;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! let (client, ingress, dispatcher) = AtClient::<_, Urc>::new(Uart);
//! std::thread::spawn(move || ingress.run(Uart));
//! std::thread::spawn(move || dispatcher.run());
//!
//! client.init(256).unwrap();
//! let attach = client.send(&command::QueryAttach).unwrap();
//! println!("attached: {}", attach.attached);
//! ```

use crate::network::error::Error;
use atat::AtatCmd;
use core::time::Duration;

pub mod client;
pub mod ingress;
pub mod urc;

pub use client::AtClient;
pub use ingress::IngressRunner;
pub use urc::{UrcDispatcher, UrcHandler};

/// Default size of the receive buffer a single response may occupy.
pub const DEFAULT_RECV_BUFF_LEN: usize = 256;

/// Capacity of the response slot; the largest receive buffer `init` accepts.
pub const RES_BUF_LEN: usize = 512;

/// Capacity of the ingress buffer that holds partially received lines.
pub const INGRESS_BUF_LEN: usize = 1024;

/// Capacity of the buffer commands are serialized into.
pub const COMMAND_BUF_LEN: usize = 1100;

/// URCs buffered between the receive side and their consumers.
pub const URC_CAPACITY: usize = 16;

/// Concurrent URC consumers: the dispatcher and one acknowledgement wait.
pub const URC_SUBSCRIBERS: usize = 2;

/// How often an acknowledgement wait checks for new URCs.
pub const ACK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Line terminator the modem ends every response and URC with.
pub const LINE_END: &[u8] = b"\r\n";

/// The command execution service a modem driver talks through.
///
/// Implementations guarantee that only one exchange is in flight at a time
/// and that unsolicited result codes never end up inside a response.
pub trait CommandExecutor: Send + Sync {
    /// The decoded URC type delivered to handlers and acknowledgement waits.
    type Urc: Clone + Send + 'static;

    /// Prepare the executor; `buffer_len` bounds the size of one response.
    fn init(&self, buffer_len: usize) -> Result<(), Error>;

    /// Send a command and wait for its final result code.
    fn send<Cmd: AtatCmd>(&self, cmd: &Cmd) -> Result<Cmd::Response, Error>;

    /// Send a command, then wait up to `timeout` for the first URC that
    /// `accept` maps to a value.
    ///
    /// URCs are watched from before the command goes out, so an
    /// acknowledgement arriving right behind the `OK` is not missed. The
    /// execution lock is held for the whole wait.
    fn send_and_await<Cmd, T, F>(&self, cmd: &Cmd, timeout: Duration, accept: F) -> Result<T, Error>
    where
        Cmd: AtatCmd,
        F: FnMut(&Self::Urc) -> Option<T>;

    /// Replace the handler invoked for every URC.
    fn set_urc_handler(&self, handler: UrcHandler<Self::Urc>);
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<T> {
    type Urc = T::Urc;

    fn init(&self, buffer_len: usize) -> Result<(), Error> {
        (**self).init(buffer_len)
    }

    fn send<Cmd: AtatCmd>(&self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        (**self).send(cmd)
    }

    fn send_and_await<Cmd, U, F>(&self, cmd: &Cmd, timeout: Duration, accept: F) -> Result<U, Error>
    where
        Cmd: AtatCmd,
        F: FnMut(&Self::Urc) -> Option<U>,
    {
        (**self).send_and_await(cmd, timeout, accept)
    }

    fn set_urc_handler(&self, handler: UrcHandler<Self::Urc>) {
        (**self).set_urc_handler(handler)
    }
}

/// Deadline of a command type.
pub fn command_timeout<Cmd: AtatCmd>() -> Duration {
    Duration::from_millis(Cmd::MAX_TIMEOUT_MS as u64)
}

/// Serialize a command the way it goes on the wire, terminator stripped.
///
/// Used for logging and by executor doubles that script replies per command.
pub fn command_text<Cmd: AtatCmd>(cmd: &Cmd) -> String {
    let mut buf = vec![0u8; Cmd::MAX_LEN];
    let len = cmd.write(&mut buf);
    let line = buf[..len].strip_suffix(LINE_END).unwrap_or(&buf[..len]);
    String::from_utf8_lossy(line).into_owned()
}
