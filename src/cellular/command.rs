//! AT command vocabulary of the BC28 modem.
//!
//! Every command is an `atat` command type. String arguments live in bounded
//! [`heapless::String`]s; the constructors fail with
//! [`Error::CommandTooLong`] rather than truncating a topic or credential.
//! Query responses are parsed by hand since the BC28 prints them without
//! the quoting `serde_at` expects.

use super::error::Error;
use atat::atat_derive::{AtatCmd, AtatResp};
use core::time::Duration;
use heapless::String;

/// Capacity of a topic.
pub const TOPIC_LEN: usize = 128;
/// Capacity of a credential or client id.
pub const CREDENTIAL_LEN: usize = 64;
/// Capacity of the broker host name.
pub const HOST_LEN: usize = 128;
/// Largest publish body, Ctrl-Z excluded.
pub const MESSAGE_LEN: usize = 1024;

/// The only MQTT client index the driver uses.
pub const CLIENT: u8 = 0;
/// Packet identifier of subscribe and unsubscribe requests.
pub const TOPIC_MSG_ID: u16 = 1;

/// Terminates a publish body.
pub const CTRL_Z: u8 = 0x1A;

/// Deadline of the socket open acknowledgement, which includes DNS and TCP
/// connect.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(75);
/// Deadline of the MQTT connect acknowledgement.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Attach status polls before giving up.
pub const ATTACH_POLL_ATTEMPTS: usize = 60;
/// Pause between probes and attach status polls.
pub const POLL_INTERVAL_MS: u32 = 1000;

/// A command answered by a bare `OK` (or the data prompt).
#[derive(Debug, Clone, PartialEq, AtatResp)]
pub struct NoResponse;

/// Liveness probe.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("", NoResponse, timeout_ms = 5000)]
pub struct Probe;

/// Disable command echo.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("E0", NoResponse, timeout_ms = 5000)]
pub struct EchoOff;

/// Disable automatic carrier registration.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QREGSWT=2", NoResponse, timeout_ms = 5000)]
pub struct CarrierAutoRegisterOff;

/// Disable automatic network connection after boot.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+NCONFIG=AUTOCONNECT,FALSE", NoResponse, timeout_ms = 5000)]
pub struct AutoConnectOff;

/// Reboot the modem.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+NRB", NoResponse, timeout_ms = 10000)]
pub struct Reboot;

/// Select the frequency band.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+NBAND", NoResponse, timeout_ms = 5000)]
pub struct SetBand {
    /// Band number.
    #[at_arg(position = 0)]
    pub band: u8,
}

/// Full functionality radio mode.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+CFUN=1", NoResponse, timeout_ms = 5000)]
pub struct RadioOn;

/// Report received socket data automatically.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+NSONMI=2", NoResponse, timeout_ms = 5000)]
pub struct AutoDataReport;

/// Disable extended discontinuous reception.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+CEDRXS=0,5", NoResponse, timeout_ms = 5000)]
pub struct EdrxOff;

/// Disable power saving mode.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+CPSMS=0", NoResponse, timeout_ms = 5000)]
pub struct PsmOff;

/// Attach to the packet domain.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+CGATT=1", NoResponse, timeout_ms = 5000)]
pub struct Attach;

/// Detach from the packet domain.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+CGATT=0", NoResponse, timeout_ms = 5000)]
pub struct Detach;

/// Configure the MQTT keep-alive interval.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTCFG", NoResponse, timeout_ms = 5000)]
pub struct SetKeepAlive {
    /// Always `keepalive`.
    #[at_arg(position = 0)]
    pub kind: String<16>,
    /// MQTT client index.
    #[at_arg(position = 1)]
    pub client: u8,
    /// Interval in seconds.
    #[at_arg(position = 2)]
    pub seconds: u16,
}

/// Configure the platform credentials.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTCFG", NoResponse, timeout_ms = 5000)]
pub struct Authenticate {
    /// Always `aliauth`.
    #[at_arg(position = 0)]
    pub kind: String<16>,
    /// MQTT client index.
    #[at_arg(position = 1)]
    pub client: u8,
    /// Platform product key.
    #[at_arg(position = 2)]
    pub product_key: String<CREDENTIAL_LEN>,
    /// Platform device name.
    #[at_arg(position = 3)]
    pub device_name: String<CREDENTIAL_LEN>,
    /// Platform device secret.
    #[at_arg(position = 4)]
    pub device_secret: String<CREDENTIAL_LEN>,
}

/// Open the network socket to the broker. Acknowledged by `+QMTOPEN`.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTOPEN", NoResponse, timeout_ms = 5000)]
pub struct Open {
    /// MQTT client index.
    #[at_arg(position = 0)]
    pub client: u8,
    /// Broker host name.
    #[at_arg(position = 1)]
    pub host: String<HOST_LEN>,
    /// Broker port.
    #[at_arg(position = 2)]
    pub port: u16,
}

/// Close the network socket.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTCLOSE=0", NoResponse, timeout_ms = 5000)]
pub struct Close;

/// Connect the MQTT client. Acknowledged by `+QMTCONN`.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTCONN", NoResponse, timeout_ms = 5000)]
pub struct Connect {
    /// MQTT client index.
    #[at_arg(position = 0)]
    pub client: u8,
    /// MQTT client identifier.
    #[at_arg(position = 1)]
    pub client_id: String<CREDENTIAL_LEN>,
}

/// Disconnect the MQTT client.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTDISC=0", NoResponse, timeout_ms = 5000)]
pub struct Disconnect;

/// Subscribe to a topic. Acknowledged by `+QMTSUB`.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTSUB", NoResponse, timeout_ms = 5000)]
pub struct Subscribe {
    /// MQTT client index.
    #[at_arg(position = 0)]
    pub client: u8,
    /// Packet identifier.
    #[at_arg(position = 1)]
    pub msg_id: u16,
    /// Topic filter.
    #[at_arg(position = 2)]
    pub topic: String<TOPIC_LEN>,
    /// Requested QoS.
    #[at_arg(position = 3)]
    pub qos: u8,
}

/// Unsubscribe from a topic.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTUNS", NoResponse, timeout_ms = 5000)]
pub struct Unsubscribe {
    /// MQTT client index.
    #[at_arg(position = 0)]
    pub client: u8,
    /// Packet identifier.
    #[at_arg(position = 1)]
    pub msg_id: u16,
    /// Topic filter.
    #[at_arg(position = 2)]
    pub topic: String<TOPIC_LEN>,
}

/// Announce a publish. Answered by the `>` data prompt.
#[derive(Debug, Clone, AtatCmd)]
#[at_cmd("+QMTPUB", NoResponse, timeout_ms = 5000)]
pub struct PublishAnnounce {
    /// MQTT client index.
    #[at_arg(position = 0)]
    pub client: u8,
    /// Packet identifier, `0` for QoS 0.
    #[at_arg(position = 1)]
    pub msg_id: u16,
    /// QoS level.
    #[at_arg(position = 2)]
    pub qos: u8,
    /// Retain flag.
    #[at_arg(position = 3)]
    pub retain: u8,
    /// Topic to publish on.
    #[at_arg(position = 4)]
    pub topic: String<TOPIC_LEN>,
}

/// The publish body sent after the data prompt: the message followed by
/// Ctrl-Z, without `AT` or line terminator. Acknowledged by `+QMTPUB`.
#[derive(Debug, Clone)]
pub struct PublishBody<'a> {
    message: &'a [u8],
}

impl atat::AtatCmd for PublishBody<'_> {
    type Response = NoResponse;
    const MAX_LEN: usize = MESSAGE_LEN + 1;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        let len = self.message.len().min(buf.len().saturating_sub(1));
        buf[..len].copy_from_slice(&self.message[..len]);
        buf[len] = CTRL_Z;
        len + 1
    }

    fn parse(&self, resp: Result<&[u8], atat::InternalError>) -> Result<NoResponse, atat::Error> {
        resp?;
        Ok(NoResponse)
    }
}

/// IMEI reported by [`QueryImei`].
#[derive(Debug, Clone, PartialEq)]
pub struct Imei {
    /// The 15 digit IMEI.
    pub imei: String<15>,
}

/// IMSI reported by [`QueryImsi`].
#[derive(Debug, Clone, PartialEq)]
pub struct Imsi {
    /// The IMSI digits.
    pub imsi: String<15>,
}

/// Attach status reported by [`QueryAttach`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachStatus {
    /// Whether the modem is attached to the packet domain.
    pub attached: bool,
}

/// PDP address reported by [`QueryAddress`].
#[derive(Debug, Clone, PartialEq)]
pub struct PdpAddress {
    /// Context identifier.
    pub cid: u8,
    /// Address in text form.
    pub address: String<39>,
}

impl atat::AtatResp for Imei {}
impl atat::AtatResp for Imsi {}
impl atat::AtatResp for AttachStatus {}
impl atat::AtatResp for PdpAddress {}

/// Query the IMEI.
#[derive(Debug, Clone)]
pub struct QueryImei;

/// Query the IMSI; also confirms a SIM is present.
#[derive(Debug, Clone)]
pub struct QueryImsi;

/// Query the packet domain attach status.
#[derive(Debug, Clone)]
pub struct QueryAttach;

/// Query the PDP address.
#[derive(Debug, Clone)]
pub struct QueryAddress;

fn write_line(buf: &mut [u8], line: &[u8]) -> usize {
    let len = line.len() + 2;
    buf[..line.len()].copy_from_slice(line);
    buf[line.len()..len].copy_from_slice(b"\r\n");
    len
}

fn value_after<'a>(resp: &'a [u8], prefix: &str) -> Result<&'a str, atat::Error> {
    let text = core::str::from_utf8(resp).map_err(|_| atat::Error::Parse)?;
    let start = text.find(prefix).ok_or(atat::Error::Parse)? + prefix.len();
    Ok(text[start..].lines().next().unwrap_or_default().trim())
}

fn text<const N: usize>(value: &str) -> Result<String<N>, atat::Error> {
    String::try_from(value).map_err(|_| atat::Error::Parse)
}

impl atat::AtatCmd for QueryImei {
    type Response = Imei;
    const MAX_LEN: usize = 11;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_line(buf, b"AT+CGSN=1")
    }

    fn parse(&self, resp: Result<&[u8], atat::InternalError>) -> Result<Imei, atat::Error> {
        let imei = value_after(resp?, "+CGSN:")?;
        if imei.is_empty() {
            return Err(atat::Error::Parse);
        }
        Ok(Imei { imei: text(imei)? })
    }
}

impl atat::AtatCmd for QueryImsi {
    type Response = Imsi;
    const MAX_LEN: usize = 9;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_line(buf, b"AT+CIMI")
    }

    fn parse(&self, resp: Result<&[u8], atat::InternalError>) -> Result<Imsi, atat::Error> {
        let resp = core::str::from_utf8(resp?).map_err(|_| atat::Error::Parse)?;
        let imsi = resp.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();
        Ok(Imsi { imsi: text(imsi)? })
    }
}

impl atat::AtatCmd for QueryAttach {
    type Response = AttachStatus;
    const MAX_LEN: usize = 11;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_line(buf, b"AT+CGATT?")
    }

    fn parse(&self, resp: Result<&[u8], atat::InternalError>) -> Result<AttachStatus, atat::Error> {
        match value_after(resp?, "+CGATT:")? {
            "1" => Ok(AttachStatus { attached: true }),
            "0" => Ok(AttachStatus { attached: false }),
            _ => Err(atat::Error::Parse),
        }
    }
}

impl atat::AtatCmd for QueryAddress {
    type Response = PdpAddress;
    const MAX_LEN: usize = 12;
    const MAX_TIMEOUT_MS: u32 = 5000;

    fn write(&self, buf: &mut [u8]) -> usize {
        write_line(buf, b"AT+CGPADDR")
    }

    fn parse(&self, resp: Result<&[u8], atat::InternalError>) -> Result<PdpAddress, atat::Error> {
        let value = value_after(resp?, "+CGPADDR:")?;
        let (cid, address) = value.split_once(',').ok_or(atat::Error::Parse)?;
        let address = address.trim().trim_matches('"');
        if address.is_empty() {
            return Err(atat::Error::Parse);
        }
        Ok(PdpAddress {
            cid: cid.trim().parse().map_err(|_| atat::Error::Parse)?,
            address: text(address)?,
        })
    }
}

fn bounded<const N: usize>(value: &str) -> Result<String<N>, Error> {
    String::try_from(value).map_err(|_| Error::CommandTooLong)
}

/// Select the frequency band.
pub fn band(band: u8) -> SetBand {
    SetBand { band }
}

/// Configure the MQTT keep-alive interval.
pub fn keepalive(seconds: u16) -> Result<SetKeepAlive, Error> {
    Ok(SetKeepAlive {
        kind: bounded("keepalive")?,
        client: CLIENT,
        seconds,
    })
}

/// Configure the platform credentials.
pub fn authenticate(product_key: &str, device_name: &str, device_secret: &str) -> Result<Authenticate, Error> {
    Ok(Authenticate {
        kind: bounded("aliauth")?,
        client: CLIENT,
        product_key: bounded(product_key)?,
        device_name: bounded(device_name)?,
        device_secret: bounded(device_secret)?,
    })
}

/// Open the network socket to the regional broker.
pub fn open(product_key: &str, region: &str, port: u16) -> Result<Open, Error> {
    let mut host = String::<HOST_LEN>::new();
    for part in [product_key, ".iot-as-mqtt.", region, ".aliyuncs.com"] {
        host.push_str(part).map_err(|_| Error::CommandTooLong)?;
    }
    Ok(Open {
        client: CLIENT,
        host,
        port,
    })
}

/// Connect the MQTT client.
pub fn connect(client_id: &str) -> Result<Connect, Error> {
    Ok(Connect {
        client: CLIENT,
        client_id: bounded(client_id)?,
    })
}

/// Subscribe to a topic at QoS 0.
pub fn subscribe(topic: &str) -> Result<Subscribe, Error> {
    Ok(Subscribe {
        client: CLIENT,
        msg_id: TOPIC_MSG_ID,
        topic: bounded(topic)?,
        qos: 0,
    })
}

/// Unsubscribe from a topic.
pub fn unsubscribe(topic: &str) -> Result<Unsubscribe, Error> {
    Ok(Unsubscribe {
        client: CLIENT,
        msg_id: TOPIC_MSG_ID,
        topic: bounded(topic)?,
    })
}

/// Announce a QoS 0 publish on a topic.
pub fn publish(topic: &str) -> Result<PublishAnnounce, Error> {
    Ok(PublishAnnounce {
        client: CLIENT,
        msg_id: 0,
        qos: 0,
        retain: 0,
        topic: bounded(topic)?,
    })
}

/// The publish body for `message`.
pub fn publish_body(message: &[u8]) -> Result<PublishBody<'_>, Error> {
    if message.len() > MESSAGE_LEN {
        return Err(Error::CommandTooLong);
    }
    Ok(PublishBody { message })
}
