//! A serial link abstraction for AT command modems
//!
//! This module provides the byte-stream traits a modem link has to implement,
//! the error type shared by every command exchange, and (with the `std`
//! feature) the AT command executor that multiplexes command responses and
//! unsolicited result codes over one link.
//!

#![deny(unsafe_code)]

/// Common error types for AT command exchanges
pub mod error;

/// AT command executor with unsolicited result code dispatch
#[cfg(feature = "std")]
pub mod at;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Read, Write};
}

/// The receiving half of a modem link (UART, USB CDC, TCP bridge...).
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read available bytes from the link.
    ///
    /// Returning `Ok(0)` signals that the link has been closed.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// The transmitting half of a modem link.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the link
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;
}
