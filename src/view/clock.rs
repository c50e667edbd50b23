//! Generation clock and change detection
//!
//! Every mutation a live view makes to its window (initial population, a
//! completed seek, an upstream insert/update/remove) increments the view's
//! serial by exactly one and stamps every touched item with the new serial.
//! Consumers decide "does this need re-rendering" purely by comparing
//! serials; payload equality is never consulted, since it is not guaranteed
//! to be cheap or even defined.

use std::fmt;

use super::{LiveView, ViewHandle};

/// A generation number. Strictly increasing per view; compared, never
/// arithmetic'd, by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Serial(u64);

impl Serial {
    pub const ZERO: Self = Self(0);

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The counter a view's backing side owns. One tick per mutation.
#[derive(Debug, Default)]
pub struct GenerationClock {
    current: Serial,
}

impl GenerationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Serial {
        self.current
    }

    /// Advance by exactly one and return the new serial, which stamps every
    /// item touched by the mutation.
    pub fn tick(&mut self) -> Serial {
        self.current = Serial(self.current.0 + 1);
        self.current
    }
}

/// What a consumer learns by re-observing a view it has rendered before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Same handle, same serial: nothing to do.
    Unchanged,
    /// Same handle, newer serial: re-render items whose serial moved.
    Updated,
    /// Different handle: everything cached for the old handle is meaningless.
    Invalidated,
}

/// Tracks the last-observed `(handle, serial)` pair for one rendering
/// surface.
#[derive(Debug, Default)]
pub struct ViewObserver {
    seen: Option<(ViewHandle, Serial)>,
}

impl ViewObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify the view against the previous observation and latch the
    /// current `(handle, serial)`.
    pub fn observe<T>(&mut self, view: &LiveView<T>) -> Observation
    where
        T: Clone,
    {
        let current = (view.handle(), view.serial());
        let observation = match self.seen {
            Some((handle, serial)) if handle == current.0 => {
                debug_assert!(serial <= current.1, "view serial went backwards");
                if serial == current.1 {
                    Observation::Unchanged
                } else {
                    Observation::Updated
                }
            }
            Some(_) => Observation::Invalidated,
            // First observation: nothing was rendered yet, so treat the view
            // as fresh content.
            None => Observation::Invalidated,
        };
        self.seen = Some(current);
        observation
    }

    /// Forget the last observation (e.g. the surface was torn down).
    pub fn reset(&mut self) {
        self.seen = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Item, ViewEvent, WindowSnapshot};

    fn snapshot(serial: u64) -> WindowSnapshot<u8> {
        WindowSnapshot {
            serial: Serial::from_raw(serial),
            total_extent: 0,
            window_offset: 0,
            items: vec![Item {
                id: "i".to_string(),
                serial: Serial::from_raw(serial),
                payload: 0,
            }],
        }
    }

    #[test]
    fn test_tick_increments_by_one() {
        let mut clock = GenerationClock::new();
        assert_eq!(clock.current(), Serial::ZERO);
        assert_eq!(clock.tick(), Serial::from_raw(1));
        assert_eq!(clock.tick(), Serial::from_raw(2));
        assert_eq!(clock.current(), Serial::from_raw(2));
    }

    #[test]
    fn test_observer_classification() {
        let (mut view, peer) = LiveView::<u8>::channel(ViewHandle::from_raw(10));
        let mut observer = ViewObserver::new();

        assert_eq!(observer.observe(&view), Observation::Invalidated);
        assert_eq!(observer.observe(&view), Observation::Unchanged);

        peer.event_tx.send(ViewEvent::Seeked(snapshot(1))).unwrap();
        view.poll_events();
        assert_eq!(observer.observe(&view), Observation::Updated);
        assert_eq!(observer.observe(&view), Observation::Unchanged);
    }

    #[test]
    fn test_handle_change_is_hard_invalidation() {
        let (mut old_view, old_peer) = LiveView::<u8>::channel(ViewHandle::from_raw(1));
        let (new_view, _peer) = LiveView::<u8>::channel(ViewHandle::from_raw(2));
        let mut observer = ViewObserver::new();

        old_peer
            .event_tx
            .send(ViewEvent::Seeked(snapshot(1)))
            .unwrap();
        old_view.poll_events();
        observer.observe(&old_view);

        // New handle with a lower serial still invalidates.
        assert_eq!(observer.observe(&new_view), Observation::Invalidated);
    }
}
