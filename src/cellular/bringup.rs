//! Modem reset, configuration and network attach.

use super::command::{self, ATTACH_POLL_ATTEMPTS, POLL_INTERVAL_MS};
use super::{Device, Error, SessionState, Urc};
use crate::network::at::CommandExecutor;
use crate::network::error::Error as LinkError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};
use std::sync::Arc;

/// How long the reset line is held high.
pub const RESET_HOLD_MS: u32 = 300;
/// Settle time after the reset line is released.
pub const RESET_SETTLE_MS: u32 = 300;

impl<E, P, D> Device<E, P, D>
where
    E: CommandExecutor<Urc = Urc> + 'static,
    P: OutputPin + Send + 'static,
    D: DelayNs + Send + 'static,
{
    /// Reset the modem, initialize the executor and register the URC
    /// handler. The session state becomes [`SessionState::Init`].
    pub fn initialize_device(self: &Arc<Self>) -> Result<(), Error> {
        self.reset_modem()?;

        self.executor().init(self.config().recv_buffer_len).map_err(|e| {
            error!("AT client initialization failed: {:?}", e);
            Error::from(e)
        })?;
        self.executor().set_urc_handler(self.urc_handler());

        self.transition(SessionState::Init);
        info!("modem initialized on {}", self.config().serial_device);
        Ok(())
    }

    fn reset_modem(&self) -> Result<(), Error> {
        debug!("resetting modem via {}", self.config().reset_pin);
        self.reset_line().set_high().map_err(|e| {
            error!("reset line: {:?}", e);
            Error::Hardware
        })?;
        self.sleep_ms(RESET_HOLD_MS);

        self.reset_line().set_low().map_err(|e| {
            error!("reset line: {:?}", e);
            Error::Hardware
        })?;
        self.sleep_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Configure the modem and attach it to the network.
    ///
    /// Waits without bound for the modem to answer after its reboot, then
    /// polls the attach status up to [`ATTACH_POLL_ATTEMPTS`] times. On
    /// success the state becomes [`SessionState::Attached`] and the IMEI and
    /// IP address are stored. Any failing configuration step aborts the
    /// sequence with its error.
    pub fn attach_to_network(&self) -> Result<(), Error> {
        let _ = self.send(&command::EchoOff);
        self.send(&command::CarrierAutoRegisterOff)?;
        self.send(&command::AutoConnectOff)?;

        let _ = self.send(&command::Reboot);
        self.wait_until_alive();

        match self.executor().send(&command::QueryImei) {
            Ok(reply) => {
                Self::store(self.imei_slot(), &reply.imei);
                info!("IMEI {}", reply.imei);
            }
            Err(LinkError::InvalidResponse) => warn!("IMEI missing from response"),
            Err(e) => return Err(e.into()),
        }

        self.send(&command::band(self.config().band))?;
        self.send(&command::RadioOn)?;
        self.send(&command::AutoDataReport)?;
        self.send(&command::EdrxOff)?;
        self.send(&command::PsmOff)?;
        self.send(&command::QueryImsi)?;
        self.send(&command::Attach)?;

        self.wait_until_attached()?;
        self.transition(SessionState::Attached);

        match self.query_address() {
            Ok(()) => info!("attached, IP {}", self.ip_address()),
            Err(e) => warn!("attached, IP address unavailable: {:?}", e),
        }
        Ok(())
    }

    fn wait_until_alive(&self) {
        let mut probes = 1;
        while self.send(&command::Probe).is_err() {
            self.sleep_ms(POLL_INTERVAL_MS);
            probes += 1;
        }
        debug!("modem answered after {} probe(s)", probes);
    }

    fn wait_until_attached(&self) -> Result<(), Error> {
        for attempt in 1..=ATTACH_POLL_ATTEMPTS {
            if let Ok(status) = self.send(&command::QueryAttach) {
                if status.attached {
                    debug!("attached after {} poll(s)", attempt);
                    return Ok(());
                }
            }
            self.sleep_ms(POLL_INTERVAL_MS);
        }
        warn!("not attached after {} polls", ATTACH_POLL_ATTEMPTS);
        Err(Error::Timeout)
    }

    fn query_address(&self) -> Result<(), Error> {
        let reply = self.send(&command::QueryAddress)?;
        Self::store(self.ip_slot(), &reply.address);
        Ok(())
    }

    /// Detach from the network. The state becomes
    /// [`SessionState::Deattached`] once the modem confirms.
    pub fn detach_from_network(&self) -> Result<(), Error> {
        self.send(&command::Detach)?;
        self.transition(SessionState::Deattached);
        Ok(())
    }
}
