//! Common error types for AT command exchanges

/// A common error type for the AT command transport.
///
/// These are the failures a single command/response exchange can end with.
/// It is designed to be simple and portable for `no_std` environments; the
/// cellular layer folds most of them into a generic transport failure.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The executor was used before it was initialized.
    NotOpen,
    /// An error occurred while writing the command to the link.
    WriteError,
    /// An error occurred while reading from the link.
    ReadError,
    /// No response or acknowledgement arrived before the deadline.
    Timeout,
    /// The link was closed while a command was in flight.
    ConnectionClosed,
    /// The modem answered `ERROR`, `+CME ERROR` or `+CMS ERROR`.
    ErrorResponse,
    /// The response did not fit into the receive buffer.
    BufferFull,
    /// The response arrived but did not have the expected shape.
    InvalidResponse,
}

impl From<atat::Error> for Error {
    fn from(error: atat::Error) -> Self {
        match error {
            atat::Error::Timeout => Error::Timeout,
            atat::Error::Write => Error::WriteError,
            atat::Error::Read => Error::ReadError,
            atat::Error::Parse => Error::InvalidResponse,
            _ => Error::ErrorResponse,
        }
    }
}

impl embedded_io::Error for Error {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Error::Timeout => embedded_io::ErrorKind::TimedOut,
            Error::ConnectionClosed => embedded_io::ErrorKind::NotConnected,
            Error::BufferFull => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::ErrorResponse => defmt::write!(f, "ErrorResponse"),
            Error::BufferFull => defmt::write!(f, "BufferFull"),
            Error::InvalidResponse => defmt::write!(f, "InvalidResponse"),
        }
    }
}
