//! Event router — which slots does a GATT-client event belong to?
//!
//! The stack tags every GATT-client event with the interface it was raised
//! on.  Before registration completes there is no interface to match, so
//! the adapter hands over `None` and the event goes to every slot.

use heapless::Vec;

use crate::config::MAX_SLOTS;
use crate::gatt::GattIf;
use crate::registry::{Registry, SlotIndex};

/// Slots that should see one event, in registry order.
pub type Targets = Vec<SlotIndex, MAX_SLOTS>;

/// Resolve the slots for an event raised on `gattc_if`.
///
/// An interface no slot owns yields an empty set; the caller treats that
/// as a no-op (a stray event after a reset, for instance).
pub fn targets(gattc_if: Option<GattIf>, registry: &Registry) -> Targets {
    registry
        .iter()
        .filter(|slot| match gattc_if {
            None => true,
            Some(gattc_if) => slot.gattc_if() == Some(gattc_if),
        })
        .map(|slot| slot.index())
        .collect()
}
