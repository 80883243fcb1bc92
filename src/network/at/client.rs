//! Transmit side of the AT command executor.

use super::ingress::IngressRunner;
use super::urc::{HandlerSlot, UrcDispatcher, UrcHandler};
use super::{
    ACK_POLL_INTERVAL, COMMAND_BUF_LEN, CommandExecutor, INGRESS_BUF_LEN, RES_BUF_LEN,
    URC_CAPACITY, URC_SUBSCRIBERS, command_text,
};
use crate::network::Write;
use crate::network::error::Error;
use atat::blocking::AtatClient;
use atat::digest::Parser;
use atat::{AtatCmd, AtatUrc, DefaultDigester, Ingress, ResponseSlot, UrcChannel};
use core::time::Duration;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// The URC channel shared by the receive side and its consumers.
pub(crate) type Urcs<U> = UrcChannel<U, URC_CAPACITY, URC_SUBSCRIBERS>;

/// Adapts a link's transmit half to the writer `atat` expects.
pub(crate) struct Link<W>(W);

impl<W: Write> embedded_io::ErrorType for Link<W> {
    type Error = Error;
}

impl<W: Write> embedded_io::Write for Link<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.0.write(buf).map_err(|e| {
            warn!("serial write failed: {:?}", e);
            Error::WriteError
        })
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.0.flush().map_err(|e| {
            warn!("serial flush failed: {:?}", e);
            Error::WriteError
        })
    }
}

/// AT command client over the transmit half of a modem link.
///
/// The client mutex doubles as the execution lock, so concurrent callers
/// (application code and URC-triggered recovery alike) queue up behind the
/// exchange in flight.
pub struct AtClient<W: Write, U: AtatUrc + 'static> {
    client: Mutex<atat::blocking::Client<'static, Link<W>, RES_BUF_LEN>>,
    urcs: &'static Urcs<U>,
    handler: HandlerSlot<U::Response>,
    initialized: AtomicBool,
}

impl<W, U> AtClient<W, U>
where
    W: Write + Send,
    U: AtatUrc + Parser + 'static,
    U::Response: Clone + Send + 'static,
{
    /// Split a link into its client, receive side and URC dispatcher.
    ///
    /// The [`IngressRunner`] has to be fed from the link's receive half and
    /// the [`UrcDispatcher`] run on a thread of its own. The buffers shared
    /// between the three live for the rest of the process, like the modem
    /// attachment itself.
    pub fn new(writer: W) -> (Self, IngressRunner<U>, UrcDispatcher<U>) {
        let res_slot: &'static ResponseSlot<RES_BUF_LEN> = Box::leak(Box::new(ResponseSlot::new()));
        let urcs: &'static Urcs<U> = Box::leak(Box::new(UrcChannel::new()));
        let ingress_buf: &'static mut [u8] = Box::leak(vec![0u8; INGRESS_BUF_LEN].into_boxed_slice());
        let command_buf: &'static mut [u8] = Box::leak(vec![0u8; COMMAND_BUF_LEN].into_boxed_slice());

        let ingress = Ingress::new(DefaultDigester::<U>::default(), ingress_buf, res_slot, urcs);
        let handler: HandlerSlot<U::Response> = Arc::new(Mutex::new(None));
        let client = Self {
            client: Mutex::new(atat::blocking::Client::new(
                Link(writer),
                res_slot,
                command_buf,
                atat::Config::default(),
            )),
            urcs,
            handler: handler.clone(),
            initialized: AtomicBool::new(false),
        };
        (client, IngressRunner::new(ingress), UrcDispatcher::new(urcs, handler))
    }

    fn lock(&self) -> Result<MutexGuard<'_, atat::blocking::Client<'static, Link<W>, RES_BUF_LEN>>, Error> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(Error::NotOpen);
        }
        Ok(self.client.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<W, U> CommandExecutor for AtClient<W, U>
where
    W: Write + Send,
    U: AtatUrc + Parser + 'static,
    U::Response: Clone + Send + 'static,
{
    type Urc = U::Response;

    fn init(&self, buffer_len: usize) -> Result<(), Error> {
        if buffer_len > RES_BUF_LEN {
            warn!("receive buffer of {} bytes exceeds the {} byte response slot", buffer_len, RES_BUF_LEN);
            return Err(Error::BufferFull);
        }
        self.initialized.store(true, Ordering::SeqCst);
        debug!("AT client initialized, receive buffer {} bytes", buffer_len);
        Ok(())
    }

    fn send<Cmd: AtatCmd>(&self, cmd: &Cmd) -> Result<Cmd::Response, Error> {
        let mut client = self.lock()?;
        debug!("AT << {}", command_text(cmd));
        client.send(cmd).map_err(|e| {
            warn!("AT command '{}' failed: {:?}", command_text(cmd), e);
            Error::from(e)
        })
    }

    fn send_and_await<Cmd, T, F>(&self, cmd: &Cmd, timeout: Duration, mut accept: F) -> Result<T, Error>
    where
        Cmd: AtatCmd,
        F: FnMut(&Self::Urc) -> Option<T>,
    {
        let mut client = self.lock()?;
        let mut acks = self.urcs.subscribe().map_err(|_| {
            warn!("no URC subscriber left for an acknowledgement wait");
            Error::BufferFull
        })?;

        debug!("AT << {}", command_text(cmd));
        client.send(cmd).map_err(|e| {
            warn!("AT command '{}' failed: {:?}", command_text(cmd), e);
            Error::from(e)
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            while let Some(urc) = acks.try_next_message_pure() {
                if let Some(ack) = accept(&urc) {
                    return Ok(ack);
                }
            }
            if Instant::now() >= deadline {
                warn!("no acknowledgement for '{}' within {:?}", command_text(cmd), timeout);
                return Err(Error::Timeout);
            }
            std::thread::sleep(ACK_POLL_INTERVAL);
        }
    }

    fn set_urc_handler(&self, handler: UrcHandler<Self::Urc>) {
        *self.handler.lock().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }
}

impl<W: Write, U: AtatUrc + 'static> core::fmt::Debug for AtClient<W, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtClient")
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
