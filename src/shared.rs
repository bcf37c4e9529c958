//! Process-wide home for the client.
//!
//! The Bluetooth stack delivers scan and connection events from its own
//! task through two independent callbacks.  Both funnel through
//! [`SharedClient::with`], so handlers never interleave inside the core:
//!
//! ```text
//!  GAP callback ───┐
//!                  ├──▶ CriticalSectionMutex<RefCell<Option<CentralClient>>>
//!  GATTC callback ─┤
//!  watchdog timer ─┘
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::warn;

use crate::app::service::CentralClient;

pub struct SharedClient {
    inner: CriticalSectionMutex<RefCell<Option<CentralClient>>>,
}

impl Default for SharedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedClient {
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionMutex::new(RefCell::new(None)),
        }
    }

    /// Install `client`, returning the one it replaced.
    pub fn install(&self, client: CentralClient) -> Option<CentralClient> {
        self.inner.lock(|cell| match cell.try_borrow_mut() {
            Ok(mut slot) => slot.replace(client),
            Err(_) => {
                warn!("client busy; install refused");
                Some(client)
            }
        })
    }

    /// Run `f` against the installed client.
    ///
    /// Returns `None` when nothing is installed, or when called from inside
    /// another `with` (re-entry from a handler).  The event is dropped then.
    pub fn with<R>(&self, f: impl FnOnce(&mut CentralClient) -> R) -> Option<R> {
        self.inner.lock(|cell| {
            let Ok(mut slot) = cell.try_borrow_mut() else {
                warn!("client re-entered; event dropped");
                return None;
            };
            slot.as_mut().map(f)
        })
    }

    pub fn is_installed(&self) -> bool {
        self.inner
            .lock(|cell| cell.try_borrow().is_ok_and(|slot| slot.is_some()))
    }
}
