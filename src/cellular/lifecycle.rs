//! Session build and rebuild, and the handlers for the modem's MQTT
//! notifications.

use super::urc::{LinkStatusCode, Recovery};
use super::{Device, Error, SessionState, Urc};
use crate::network::at::{CommandExecutor, UrcHandler};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, info, trace, warn};
use std::sync::{Arc, Weak};

impl<E, P, D> Device<E, P, D>
where
    E: CommandExecutor<Urc = Urc> + 'static,
    P: OutputPin + Send + 'static,
    D: DelayNs + Send + 'static,
{
    /// Bring the MQTT session up: keep-alive, authenticate, open, connect.
    ///
    /// Stops at the first failing step and returns its error.
    pub fn build_network(&self) -> Result<(), Error> {
        self.set_keepalive(self.config().keepalive_secs)?;
        self.authenticate()?;
        self.open_session()?;
        self.connect()?;
        info!("MQTT session established");
        Ok(())
    }

    /// Close whatever socket is open, ignoring the outcome, then build the
    /// session again.
    pub fn rebuild_network(&self) -> Result<(), Error> {
        if let Err(e) = self.close_session() {
            debug!("close before rebuild failed: {:?}", e);
        }
        self.build_network()
    }

    /// Call [`build_network`](Self::build_network) until it succeeds,
    /// closing the socket between attempts. Returns the number of attempts.
    pub fn build_network_with_retry(&self) -> usize {
        let mut attempts = 1;
        while let Err(e) = self.build_network() {
            warn!("build network attempt {} failed: {:?}", attempts, e);
            let _ = self.close_session();
            attempts += 1;
        }
        attempts
    }

    /// Deactivate the PDP context. Not supported by the driver yet, so this
    /// only logs.
    pub fn deactivate_pdp(&self) {
        debug!("PDP context deactivation skipped");
    }

    /// The URC handler registered by [`initialize_device`](Self::initialize_device).
    ///
    /// It holds the device weakly, so a dropped device stops handling URCs.
    pub(crate) fn urc_handler(self: &Arc<Self>) -> UrcHandler<Urc> {
        let device = Arc::downgrade(self);
        Arc::new(move |urc: &Urc| with_device(&device, |d| d.handle_urc(urc)))
    }

    /// React to one notification. Command results are only logged here;
    /// the operation that issued the command consumes them.
    pub fn handle_urc(&self, urc: &Urc) {
        match urc {
            Urc::LinkStatus { code, .. } => self.on_link_status(*code),
            Urc::Message { topic, payload, .. } => self.on_message(topic, payload),
            other => trace!("result URC {:?}", other),
        }
    }

    /// Handle a `+QMTSTAT` status code.
    ///
    /// The session is marked disconnected, then the recovery the status code
    /// calls for runs once. A failed rebuild is logged and dropped.
    pub fn on_link_status(&self, code: u8) {
        info!("MQTT link state changed: code {}", code);

        if self.state() == SessionState::Connected {
            self.transition(SessionState::Disconnected);
        }

        let Some(status) = LinkStatusCode::from_code(code) else {
            debug!("ignoring link status code {}", code);
            return;
        };
        match status.recovery() {
            Recovery::Rebuild => self.recover(status),
            Recovery::DeactivateThenRebuild => {
                self.deactivate_pdp();
                self.recover(status);
            }
            Recovery::None if status == LinkStatusCode::DisconnectByClient => {
                info!("disconnected by client");
            }
            Recovery::None => warn!("network inactive or server unavailable, check network"),
        }
    }

    fn recover(&self, status: LinkStatusCode) {
        match self.rebuild_network() {
            Ok(()) => info!("session rebuilt after {:?}", status),
            Err(e) => warn!("rebuild after {:?} failed: {:?}", status, e),
        }
    }

    /// Handle an inbound message: hand the payload to the bound parser, or
    /// drop it when none is bound.
    pub fn on_message(&self, topic: &str, payload: &str) {
        debug!("message on {} ({} bytes)", topic, payload.len());
        match self.parser() {
            Some(parser) => parser(payload),
            None => trace!("no parser bound, message on {} dropped", topic),
        }
    }
}

fn with_device<T>(device: &Weak<T>, f: impl FnOnce(&T)) {
    if let Some(device) = device.upgrade() {
        f(&device);
    }
}
