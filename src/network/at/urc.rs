//! Unsolicited result code dispatch.

use super::ACK_POLL_INTERVAL;
use super::client::Urcs;
use atat::AtatUrc;
use log::{error, trace};
use std::sync::{Arc, Mutex, PoisonError};

/// Callback invoked with every decoded URC.
pub type UrcHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) type HandlerSlot<T> = Arc<Mutex<Option<UrcHandler<T>>>>;

type NextUrc<T> = Box<dyn FnMut() -> Option<T> + Send>;

/// Runs the URC handler outside the receive path.
///
/// Obtained from [`AtClient::new`](super::AtClient::new); it subscribes to
/// the URC channel right away, so notifications arriving before
/// [`run`](Self::run) starts are kept.
pub struct UrcDispatcher<U: AtatUrc> {
    next: Option<NextUrc<U::Response>>,
    handler: HandlerSlot<U::Response>,
}

impl<U> UrcDispatcher<U>
where
    U: AtatUrc + 'static,
    U::Response: Clone + Send + 'static,
{
    pub(crate) fn new(urcs: &'static Urcs<U>, handler: HandlerSlot<U::Response>) -> Self {
        let next = match urcs.subscribe() {
            Ok(mut subscription) => {
                Some(Box::new(move || subscription.try_next_message_pure()) as NextUrc<U::Response>)
            }
            Err(_) => {
                error!("URC channel has no subscriber slot left, URCs will not be dispatched");
                None
            }
        };
        Self { next, handler }
    }

    /// Invoke the handler for URCs in arrival order, forever.
    pub fn run(mut self) {
        loop {
            if self.dispatch_pending() == 0 {
                std::thread::sleep(ACK_POLL_INTERVAL);
            }
        }
    }

    /// Handle every URC already received without blocking; returns how many
    /// were taken off the channel.
    ///
    /// URCs that arrive while no handler is set are dropped.
    pub fn dispatch_pending(&mut self) -> usize {
        let Some(next) = self.next.as_mut() else {
            return 0;
        };
        let mut taken = 0;
        while let Some(urc) = next() {
            taken += 1;
            let handler = self
                .handler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            match handler {
                Some(handler) => handler(&urc),
                None => trace!("URC dropped, no handler set"),
            }
        }
        taken
    }
}

impl<U: AtatUrc> core::fmt::Debug for UrcDispatcher<U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UrcDispatcher")
            .field("subscribed", &self.next.is_some())
            .finish_non_exhaustive()
    }
}
