//! MQTT session operations.
//!
//! Every operation is one command (two for [`publish`](Device::publish)).
//! Open, connect, subscribe and the publish body are acknowledged by a
//! result URC after their `OK`, which is awaited with its own deadline. Only
//! [`connect`](Device::connect) and [`disconnect`](Device::disconnect) change
//! the session state.

use super::command::{self, CONNECT_TIMEOUT, OPEN_TIMEOUT};
use super::{Device, Error, SessionState, Urc};
use crate::network::at::CommandExecutor;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};

impl<E, P, D> Device<E, P, D>
where
    E: CommandExecutor<Urc = Urc> + 'static,
    P: OutputPin + Send + 'static,
    D: DelayNs + Send + 'static,
{
    /// Configure the MQTT keep-alive interval.
    pub fn set_keepalive(&self, seconds: u16) -> Result<(), Error> {
        self.send(&command::keepalive(seconds)?)?;
        Ok(())
    }

    /// Hand the platform credentials to the modem.
    pub fn authenticate(&self) -> Result<(), Error> {
        let config = self.config();
        let cmd = command::authenticate(
            &config.product_key,
            &config.device_name,
            &config.device_secret,
        )?;
        self.send(&cmd)?;
        Ok(())
    }

    /// Open the network socket to the broker.
    pub fn open_session(&self) -> Result<(), Error> {
        let config = self.config();
        let cmd = command::open(&config.product_key, &config.region, config.port)?;
        self.send_acked(&cmd, OPEN_TIMEOUT, |urc| match urc {
            Urc::OpenResult { result, .. } => Some(*result == 0),
            _ => None,
        })?;
        debug!("broker socket open");
        Ok(())
    }

    /// Close the network socket to the broker.
    pub fn close_session(&self) -> Result<(), Error> {
        self.send(&command::Close)?;
        debug!("broker socket closed");
        Ok(())
    }

    /// Connect the MQTT client. The state becomes
    /// [`SessionState::Connected`] once the broker accepts.
    ///
    /// The configured client id is used, or the IMEI when none is set.
    pub fn connect(&self) -> Result<(), Error> {
        let client_id = match &self.config().client_id {
            Some(id) => id.to_string(),
            None => self.imei().to_string(),
        };
        if client_id.is_empty() {
            warn!("connecting without a client id");
        }

        let cmd = command::connect(&client_id)?;
        self.send_acked(&cmd, CONNECT_TIMEOUT, |urc| match urc {
            Urc::ConnectResult { result, ret_code, .. } => {
                Some(*result == 0 && ret_code.unwrap_or(0) == 0)
            }
            _ => None,
        })?;

        self.transition(SessionState::Connected);
        info!("MQTT connected as {}", client_id);
        Ok(())
    }

    /// Disconnect the MQTT client. The state becomes
    /// [`SessionState::Disconnected`].
    pub fn disconnect(&self) -> Result<(), Error> {
        self.send(&command::Disconnect)?;
        self.transition(SessionState::Disconnected);
        Ok(())
    }

    /// Subscribe to `topic` at QoS 0.
    ///
    /// Succeeds only when the broker grants the subscription: the result is
    /// `0` and the granted value is not the refusal code `128`.
    pub fn subscribe(&self, topic: &str) -> Result<(), Error> {
        let cmd = command::subscribe(topic)?;
        self.send_acked(&cmd, self.config().timeout(), Urc::subscription_granted)?;
        info!("subscribed to {}", topic);
        Ok(())
    }

    /// Unsubscribe from `topic`.
    pub fn unsubscribe(&self, topic: &str) -> Result<(), Error> {
        self.send(&command::unsubscribe(topic)?)?;
        info!("unsubscribed from {}", topic);
        Ok(())
    }

    /// Publish `message` on `topic` at QoS 0.
    ///
    /// The topic is announced first and answered with the `>` data prompt;
    /// only then is the body sent. A failed announce sends nothing more.
    pub fn publish(&self, topic: &str, message: &[u8]) -> Result<(), Error> {
        let announce = command::publish(topic)?;
        let body = command::publish_body(message)?;

        self.send(&announce)?;
        self.send_acked(&body, self.config().timeout(), |urc| match urc {
            Urc::PublishResult { result, .. } => Some(*result == 0),
            _ => None,
        })?;
        debug!("published {} byte(s) to {}", message.len(), topic);
        Ok(())
    }
}
