//! Receive side of the AT command executor.
//!
//! Bytes from the modem go into the `atat` ingress buffer and are digested
//! in this order:
//!
//! 1. URC: published on the URC channel, even while a command is pending.
//! 2. Final result code or data prompt (`>` at the start of a line): hands
//!    the response to the pending command.
//! 3. Anything else waits in the buffer for more bytes.
//!
//! A line that outgrows the ingress buffer is dropped up to its terminator.
//! The pending command is left alone and keeps waiting for its own response.

use super::{INGRESS_BUF_LEN, RES_BUF_LEN, URC_CAPACITY, URC_SUBSCRIBERS};
use crate::network::Read;
use crate::network::error::Error;
use atat::digest::Parser;
use atat::{AtatIngress, AtatUrc, DefaultDigester, Ingress};
use log::{debug, warn};

/// Read chunk size used by [`IngressRunner::run`].
const READ_CHUNK_LEN: usize = 64;

type ModemIngress<U> =
    Ingress<'static, DefaultDigester<U>, U, RES_BUF_LEN, URC_CAPACITY, URC_SUBSCRIBERS>;

/// Drives the `atat` ingress from the receive half of a modem link.
pub struct IngressRunner<U: AtatUrc + Parser + 'static> {
    ingress: ModemIngress<U>,
    discarding: bool,
    dropped: usize,
}

impl<U: AtatUrc + Parser + 'static> IngressRunner<U> {
    pub(crate) fn new(ingress: ModemIngress<U>) -> Self {
        Self {
            ingress,
            discarding: false,
            dropped: 0,
        }
    }

    /// Read from the link until it closes or fails.
    ///
    /// A read timeout is not fatal; the loop keeps waiting for data.
    pub fn run<R: Read<Error = Error>>(mut self, mut reader: R) -> Result<(), Error> {
        let mut buf = [0u8; READ_CHUNK_LEN];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => {
                    debug!("modem link closed");
                    return Ok(());
                }
                Ok(n) => self.feed(&buf[..n]),
                Err(Error::Timeout) => continue,
                Err(e) => {
                    warn!("serial read failed: {:?}", e);
                    return Err(e);
                }
            }
        }
    }

    /// Process bytes received from the modem.
    pub fn feed(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            if self.discarding {
                bytes = self.skip_line(bytes);
                continue;
            }

            let buf = self.ingress.write_buf();
            if buf.is_empty() {
                warn!("line exceeds the {} byte ingress buffer, dropping it", INGRESS_BUF_LEN);
                self.ingress.clear();
                self.discarding = true;
                self.dropped = INGRESS_BUF_LEN;
                continue;
            }

            let n = buf.len().min(bytes.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            if let Err(e) = self.ingress.try_advance(n) {
                warn!("ingress could not hand data on: {:?}", e);
            }
            bytes = &bytes[n..];
        }
    }

    /// Drop bytes up to and including the next line feed.
    fn skip_line<'a>(&mut self, bytes: &'a [u8]) -> &'a [u8] {
        match bytes.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.discarding = false;
                debug!("dropped {} byte over-long line", self.dropped + end + 1);
                &bytes[end + 1..]
            }
            None => {
                self.dropped += bytes.len();
                &[]
            }
        }
    }

    /// Whether the runner is skipping the rest of an over-long line.
    pub fn is_discarding(&self) -> bool {
        self.discarding
    }
}

impl<U: AtatUrc + Parser + 'static> core::fmt::Debug for IngressRunner<U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IngressRunner")
            .field("discarding", &self.discarding)
            .finish_non_exhaustive()
    }
}
