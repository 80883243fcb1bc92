//! The modem's MQTT notifications.
//!
//! Besides the two asynchronous events (link status and inbound message),
//! the BC28 reports the outcome of every MQTT command with a result line
//! that arrives after the command's `OK`. All of them are URCs to the
//! digester; the session waits for the result lines, the handler gets
//! everything.

use atat::digest::{ParseError, Parser};

/// Prefix of the MQTT link state notification.
pub const LINK_STATUS_PREFIX: &str = "+QMTSTAT:";
/// Prefix of the inbound message notification.
pub const MESSAGE_PREFIX: &str = "+QMTRECV:";
/// Prefix of the socket open result.
pub const OPEN_PREFIX: &str = "+QMTOPEN:";
/// Prefix of the socket close result.
pub const CLOSE_PREFIX: &str = "+QMTCLOSE:";
/// Prefix of the connect result.
pub const CONNECT_PREFIX: &str = "+QMTCONN:";
/// Prefix of the disconnect result.
pub const DISCONNECT_PREFIX: &str = "+QMTDISC:";
/// Prefix of the subscribe result.
pub const SUBSCRIBE_PREFIX: &str = "+QMTSUB:";
/// Prefix of the unsubscribe result.
pub const UNSUBSCRIBE_PREFIX: &str = "+QMTUNS:";
/// Prefix of the publish result.
pub const PUBLISH_PREFIX: &str = "+QMTPUB:";

/// Every prefix the digester treats as a URC.
pub const URC_PREFIXES: [&str; 9] = [
    LINK_STATUS_PREFIX,
    MESSAGE_PREFIX,
    OPEN_PREFIX,
    CLOSE_PREFIX,
    CONNECT_PREFIX,
    DISCONNECT_PREFIX,
    SUBSCRIBE_PREFIX,
    UNSUBSCRIBE_PREFIX,
    PUBLISH_PREFIX,
];

/// Granted value of a subscription the broker refused.
pub const SUBSCRIPTION_REFUSED: u16 = 128;

/// A decoded notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Urc {
    /// `+QMTSTAT: <client>,<code>`
    LinkStatus {
        /// MQTT client index.
        client: u8,
        /// Raw status code.
        code: u8,
    },
    /// `+QMTRECV: <client>,<msg_id>,"<topic>",<payload>`
    Message {
        /// MQTT client index.
        client: u8,
        /// Packet identifier.
        msg_id: u16,
        /// Topic the message was published on.
        topic: String,
        /// Message payload, verbatim.
        payload: String,
    },
    /// `+QMTOPEN: <client>,<result>`
    OpenResult {
        /// MQTT client index.
        client: u8,
        /// `0` on success, `-1` and up on failure.
        result: i8,
    },
    /// `+QMTCLOSE: <client>,<result>`
    CloseResult {
        /// MQTT client index.
        client: u8,
        /// `0` on success.
        result: i8,
    },
    /// `+QMTCONN: <client>,<result>[,<ret_code>]`
    ConnectResult {
        /// MQTT client index.
        client: u8,
        /// `0` when the packet was sent and acknowledged.
        result: u8,
        /// CONNACK return code, `0` when accepted.
        ret_code: Option<u8>,
    },
    /// `+QMTDISC: <client>,<result>`
    DisconnectResult {
        /// MQTT client index.
        client: u8,
        /// `0` on success.
        result: i8,
    },
    /// `+QMTSUB: <client>,<msg_id>,<result>[,<value>]`
    SubscribeResult {
        /// MQTT client index.
        client: u8,
        /// Packet identifier.
        msg_id: u16,
        /// `0` when the packet was sent and acknowledged.
        result: u8,
        /// Granted QoS, [`SUBSCRIPTION_REFUSED`] when the broker refused.
        value: Option<u16>,
    },
    /// `+QMTUNS: <client>,<msg_id>,<result>`
    UnsubscribeResult {
        /// MQTT client index.
        client: u8,
        /// Packet identifier.
        msg_id: u16,
        /// `0` when the packet was sent and acknowledged.
        result: u8,
    },
    /// `+QMTPUB: <client>,<msg_id>,<result>[,<value>]`
    PublishResult {
        /// MQTT client index.
        client: u8,
        /// Packet identifier.
        msg_id: u16,
        /// `0` when the packet was sent and acknowledged.
        result: u8,
    },
}

impl Urc {
    /// Decode a notification line. Returns `None` for anything that is not
    /// a well-formed MQTT notification.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (prefix, rest) = URC_PREFIXES
            .iter()
            .find_map(|prefix| line.strip_prefix(prefix).map(|rest| (*prefix, rest.trim())))?;
        match prefix {
            LINK_STATUS_PREFIX => parse_link_status(rest),
            MESSAGE_PREFIX => parse_message(rest),
            _ => parse_result(prefix, rest),
        }
    }

    /// Whether this is a subscribe result granting the subscription.
    pub fn subscription_granted(&self) -> Option<bool> {
        match self {
            Urc::SubscribeResult { result, value, .. } => {
                Some(*result == 0 && *value != Some(SUBSCRIPTION_REFUSED))
            }
            _ => None,
        }
    }
}

fn fields(rest: &str) -> impl Iterator<Item = &str> {
    rest.split(',').map(str::trim)
}

fn parse_result(prefix: &str, rest: &str) -> Option<Urc> {
    let mut fields = fields(rest);
    let client = fields.next()?.parse().ok()?;
    let urc = match prefix {
        OPEN_PREFIX => Urc::OpenResult {
            client,
            result: fields.next()?.parse().ok()?,
        },
        CLOSE_PREFIX => Urc::CloseResult {
            client,
            result: fields.next()?.parse().ok()?,
        },
        DISCONNECT_PREFIX => Urc::DisconnectResult {
            client,
            result: fields.next()?.parse().ok()?,
        },
        CONNECT_PREFIX => Urc::ConnectResult {
            client,
            result: fields.next()?.parse().ok()?,
            ret_code: optional(fields.next())?,
        },
        SUBSCRIBE_PREFIX => Urc::SubscribeResult {
            client,
            msg_id: fields.next()?.parse().ok()?,
            result: fields.next()?.parse().ok()?,
            value: optional(fields.next())?,
        },
        UNSUBSCRIBE_PREFIX => Urc::UnsubscribeResult {
            client,
            msg_id: fields.next()?.parse().ok()?,
            result: fields.next()?.parse().ok()?,
        },
        PUBLISH_PREFIX => Urc::PublishResult {
            client,
            msg_id: fields.next()?.parse().ok()?,
            result: fields.next()?.parse().ok()?,
        },
        _ => return None,
    };
    Some(urc)
}

/// `Some(None)` for an absent field, `None` for a malformed one.
fn optional<T: core::str::FromStr>(field: Option<&str>) -> Option<Option<T>> {
    match field {
        None => Some(None),
        Some(field) => field.parse().ok().map(Some),
    }
}

fn parse_link_status(rest: &str) -> Option<Urc> {
    let (client, code) = match rest.rsplit_once(',') {
        Some((head, code)) => {
            let client = head.split(',').next()?.trim().parse().ok()?;
            (client, code)
        }
        None => (0, rest),
    };
    let code = code.trim().parse().ok()?;
    Some(Urc::LinkStatus { client, code })
}

fn parse_message(rest: &str) -> Option<Urc> {
    let (client, rest) = rest.split_once(',')?;
    let (msg_id, rest) = rest.split_once(',')?;
    let client = client.trim().parse().ok()?;
    let msg_id = msg_id.trim().parse().ok()?;

    let (topic, payload) = match rest.strip_prefix('"') {
        Some(quoted) => {
            let (topic, tail) = quoted.split_once('"')?;
            (topic, tail.strip_prefix(',')?)
        }
        None => rest.split_once(',')?,
    };

    Some(Urc::Message {
        client,
        msg_id,
        topic: topic.to_string(),
        payload: unquote(payload).to_string(),
    })
}

fn unquote(payload: &str) -> &str {
    payload
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(payload)
}

/// Finds complete MQTT notification lines at the head of the digester's
/// buffer.
///
/// Message payloads are free-form text (quotes, commas and `>` included), so
/// a notification spans everything up to its `\r\n`.
impl Parser for Urc {
    fn parse(buf: &[u8]) -> Result<(&[u8], usize), ParseError> {
        let candidate = URC_PREFIXES.iter().any(|prefix| {
            let prefix = prefix.as_bytes();
            buf.starts_with(prefix) || prefix.starts_with(buf)
        });
        if !candidate {
            return Err(ParseError::NoMatch);
        }
        match buf.windows(2).position(|w| w == b"\r\n") {
            Some(end) if URC_PREFIXES.iter().any(|p| buf.starts_with(p.as_bytes())) => {
                Ok((&buf[..end], end + 2))
            }
            Some(_) => Err(ParseError::NoMatch),
            None => Err(ParseError::Incomplete),
        }
    }
}

impl atat::AtatUrc for Urc {
    type Response = Urc;

    fn parse(resp: &[u8]) -> Option<Urc> {
        core::str::from_utf8(resp).ok().and_then(Urc::parse_line)
    }
}

/// What the session has to do about a link status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Rebuild the MQTT session.
    Rebuild,
    /// Deactivate the PDP context, then rebuild.
    DeactivateThenRebuild,
    /// Nothing beyond logging.
    None,
}

/// Link status codes reported with `+QMTSTAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatusCode {
    /// Connection closed by the server.
    ClosedByServer = 1,
    /// PINGREQ timed out or failed.
    PingTimeout = 2,
    /// CONNECT timed out or failed.
    ConnectTimeout = 3,
    /// CONNACK timed out or failed.
    ConnackTimeout = 4,
    /// The client disconnected on request.
    DisconnectByClient = 5,
    /// A send failed and the client closed the connection.
    WrongClose = 6,
    /// The network is inactive or the server unavailable.
    NetworkInactive = 7,
}

impl LinkStatusCode {
    /// Map a raw code, `None` for codes the modem does not define.
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::ClosedByServer,
            2 => Self::PingTimeout,
            3 => Self::ConnectTimeout,
            4 => Self::ConnackTimeout,
            5 => Self::DisconnectByClient,
            6 => Self::WrongClose,
            7 => Self::NetworkInactive,
            _ => return None,
        })
    }

    /// The recovery this code calls for.
    pub fn recovery(self) -> Recovery {
        match self {
            Self::ClosedByServer | Self::ConnectTimeout | Self::ConnackTimeout | Self::WrongClose => {
                Recovery::Rebuild
            }
            Self::PingTimeout => Recovery::DeactivateThenRebuild,
            Self::DisconnectByClient | Self::NetworkInactive => Recovery::None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LinkStatusCode {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "LinkStatusCode({=u8})", *self as u8)
    }
}
