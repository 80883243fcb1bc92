//! Device and session configuration.
//!
//! Every field has the stock value used on the reference board, so a
//! configuration document only needs to name what differs:
//!
//! ```rust
//! use libnbiot::cellular::Config;
//!
//! let config = Config::from_json(r#"{"band":5,"keepalive_secs":120}"#).unwrap();
//! assert_eq!(config.band, 5);
//! assert_eq!(config.baud_rate, 9600);
//! ```

use super::error::Error;
use core::time::Duration;
use heapless::String;
use log::warn;
use serde::Deserialize;

/// Configuration surface of one modem attachment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device the modem is wired to.
    pub serial_device: String<16>,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Receive buffer size handed to the executor; at most [`RES_BUF_LEN`](crate::network::at::RES_BUF_LEN).
    pub recv_buffer_len: usize,
    /// GPIO driving the modem's reset line.
    pub reset_pin: String<8>,
    /// ADC pin on the same board. Not used by the driver.
    pub adc_pin: String<8>,
    /// NB-IoT frequency band.
    pub band: u8,
    /// IoT platform product key.
    pub product_key: String<32>,
    /// IoT platform device name.
    pub device_name: String<32>,
    /// IoT platform device secret.
    pub device_secret: String<64>,
    /// Broker region, part of the broker host name.
    pub region: String<32>,
    /// Broker TCP port.
    pub port: u16,
    /// MQTT client identifier. The IMEI is used when absent.
    pub client_id: Option<String<64>>,
    /// MQTT keep-alive interval in seconds.
    pub keepalive_secs: u16,
    /// Deadline of the subscribe and publish acknowledgements, in milliseconds.
    pub timeout_ms: u32,
}

impl Config {
    /// Parse a JSON configuration document. Missing fields take their
    /// default value.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        match serde_json_core::from_str::<Config>(json) {
            Ok((config, _)) => Ok(config),
            Err(e) => {
                warn!("invalid configuration: {:?}", e);
                Err(Error::InvalidConfig)
            }
        }
    }

    /// The acknowledgement deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms as u64)
    }
}

fn text<const N: usize>(value: &str) -> String<N> {
    String::try_from(value).unwrap_or_default()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_device: text("uart3"),
            baud_rate: 9600,
            recv_buffer_len: 256,
            reset_pin: text("PA5"),
            adc_pin: text("PC0"),
            band: 8,
            product_key: text("a1p8Pngb3oY"),
            device_name: text("BC28"),
            device_secret: text("miYe6iSBGKbYq71nhkd0cddVT2PSlPGs"),
            region: text("cn-shanghai"),
            port: 1883,
            client_id: None,
            keepalive_secs: 300,
            timeout_ms: 5000,
        }
    }
}
