//! Error types for modem and session operations

use crate::network::error::Error as LinkError;

/// The error type returned by every device, session and lifecycle operation.
///
/// Callers see one of three failure kinds from the modem itself (a generic
/// command failure, the attach poll running out of attempts, or the receive
/// buffer running out of room) plus a few local failures that never reach
/// the modem.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// A command could not be sent, or no matching response arrived in time.
    Transport,
    /// The network attach poll exhausted its attempts.
    Timeout,
    /// The executor could not hold the response.
    OutOfMemory,
    /// The reset line could not be driven.
    Hardware,
    /// A command argument does not fit its bounded buffer.
    CommandTooLong,
    /// A message parser is already bound to the device.
    ParserAlreadyBound,
    /// A configuration document could not be parsed.
    InvalidConfig,
}

impl From<LinkError> for Error {
    fn from(error: LinkError) -> Self {
        match error {
            LinkError::BufferFull => Error::OutOfMemory,
            _ => Error::Transport,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Transport => defmt::write!(f, "Transport"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::OutOfMemory => defmt::write!(f, "OutOfMemory"),
            Error::Hardware => defmt::write!(f, "Hardware"),
            Error::CommandTooLong => defmt::write!(f, "CommandTooLong"),
            Error::ParserAlreadyBound => defmt::write!(f, "ParserAlreadyBound"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}
