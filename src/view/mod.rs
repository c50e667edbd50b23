//! Live view handles
//!
//! A [`LiveView`] is the consumer-side handle to a backing ordered,
//! possibly-remote collection. It owns one half of a command channel (seek
//! and release signals travel to the backing collaborator) and one half of an
//! event channel (window updates and out-of-band item changes travel back).
//!
//! Ownership is explicit: a view is acquired through a [`crate::store::MailStore`]
//! constructor and released by [`LiveView::release`], which consumes the
//! handle. Double release is unrepresentable, and dropping the event receiver
//! inside `release` is the exactly-once unsubscription from the view's
//! notifications.

pub mod clock;
pub mod window;

use std::fmt;

use tokio::sync::mpsc;

use clock::Serial;
use window::Window;

/// Opaque identity of a live view, stable for the view's lifetime.
///
/// A handle change is a hard invalidation: cached window data for the old
/// handle is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewHandle(u64);

impl ViewHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// One element of a view's materialized window.
///
/// `serial` is the view generation at which the item was last materialized or
/// mutated; it never decreases and never exceeds the owning view's serial.
/// The payload is opaque to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct Item<T> {
    pub id: String,
    pub serial: Serial,
    pub payload: T,
}

/// A request to reposition or re-extend the materialized window.
///
/// `ToTop` exists because the top of the list is a semantically privileged
/// position: coordinate seeks are relative to the current materialized range,
/// which is unstable while items are prepended upstream. Anchoring to the
/// logical top latches the window there as new items arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekRequest {
    ToTop {
        visible: u32,
        after: u32,
    },
    Coordinate {
        offset: u64,
        before: u32,
        visible: u32,
        after: u32,
    },
}

/// Signals sent from the owning consumer to the backing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    Seek(SeekRequest),
    /// Fire-and-forget deallocation signal; at most one per view.
    Release,
}

/// A complete window update: the new generation plus positioning metadata.
#[derive(Debug, Clone)]
pub struct WindowSnapshot<T> {
    pub serial: Serial,
    /// Estimated total size of the windowed dimension.
    pub total_extent: u64,
    /// Position of the materialized window within the total extent.
    pub window_offset: u64,
    pub items: Vec<Item<T>>,
}

/// Notifications delivered by the backing collaborator.
#[derive(Debug, Clone)]
pub enum ViewEvent<T> {
    /// A seek completed (or the view was initially populated); the window
    /// was replaced wholesale.
    Seeked(WindowSnapshot<T>),
    /// An out-of-band mutation of a single item, e.g. a draft's content
    /// changing. `serial` is the view generation of the mutation.
    Change { item: Item<T>, serial: Serial },
}

/// The backing collaborator's half of a view's channels.
pub struct ViewPeer<T> {
    pub cmd_rx: mpsc::UnboundedReceiver<ViewCommand>,
    pub event_tx: mpsc::UnboundedSender<ViewEvent<T>>,
}

/// Consumer-side handle to a live ordered collection with a materialized
/// window, a total extent and a generation counter.
pub struct LiveView<T> {
    handle: ViewHandle,
    cmd_tx: mpsc::UnboundedSender<ViewCommand>,
    event_rx: mpsc::UnboundedReceiver<ViewEvent<T>>,
    window: Window<T>,
}

impl<T> fmt::Debug for LiveView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveView")
            .field("handle", &self.handle)
            .field("serial", &self.window.serial())
            .finish_non_exhaustive()
    }
}

impl<T: Clone> LiveView<T> {
    /// Create the paired endpoints for a new view. The backing collaborator
    /// keeps the [`ViewPeer`]; the consumer binding keeps the [`LiveView`].
    pub fn channel(handle: ViewHandle) -> (Self, ViewPeer<T>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let view = Self {
            handle,
            cmd_tx,
            event_rx,
            window: Window::default(),
        };
        (view, ViewPeer { cmd_rx, event_tx })
    }

    pub fn handle(&self) -> ViewHandle {
        self.handle
    }

    /// Current generation of the view. Strictly increasing across updates.
    pub fn serial(&self) -> Serial {
        self.window.serial()
    }

    pub fn window(&self) -> &Window<T> {
        &self.window
    }

    /// Issue a seek, fire-and-forget. The window updates asynchronously and
    /// completion is observed via the next [`ViewEvent::Seeked`].
    pub fn seek(&self, request: SeekRequest) {
        if self.cmd_tx.send(ViewCommand::Seek(request)).is_err() {
            tracing::warn!(handle = %self.handle, "seek on a view whose backing side is gone");
        }
    }

    /// Drain pending notifications and apply them to the window. Returns true
    /// if anything was applied (the consumer should re-render).
    pub fn poll_events(&mut self) -> bool {
        let mut dirty = false;
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ViewEvent::Seeked(snapshot) => {
                    tracing::trace!(
                        handle = %self.handle,
                        serial = %snapshot.serial,
                        items = snapshot.items.len(),
                        "seeked"
                    );
                    self.window.apply(snapshot);
                }
                ViewEvent::Change { item, serial } => {
                    tracing::trace!(handle = %self.handle, item = %item.id, "change");
                    self.window.apply_change(item, serial);
                }
            }
            dirty = true;
        }
        dirty
    }

    /// Release the view. Consuming `self` makes a second release
    /// unrepresentable; dropping the event receiver unsubscribes from the
    /// view's notifications in the same motion.
    pub fn release(self) {
        tracing::debug!(handle = %self.handle, "releasing live view");
        let _ = self.cmd_tx.send(ViewCommand::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seek_reaches_peer() {
        let (view, mut peer) = LiveView::<u8>::channel(ViewHandle::from_raw(1));
        view.seek(SeekRequest::ToTop {
            visible: 5,
            after: 2,
        });
        assert_eq!(
            peer.cmd_rx.try_recv().unwrap(),
            ViewCommand::Seek(SeekRequest::ToTop {
                visible: 5,
                after: 2
            })
        );
    }

    #[test]
    fn test_release_sends_signal_and_drops_receiver() {
        let (view, mut peer) = LiveView::<u8>::channel(ViewHandle::from_raw(2));
        view.release();
        assert_eq!(peer.cmd_rx.try_recv().unwrap(), ViewCommand::Release);
        // The consumer side is gone: events have nowhere to deliver.
        assert!(
            peer.event_tx
                .send(ViewEvent::Seeked(WindowSnapshot {
                    serial: Serial::from_raw(1),
                    total_extent: 0,
                    window_offset: 0,
                    items: Vec::new(),
                }))
                .is_err()
        );
    }

    #[test]
    fn test_poll_events_applies_snapshot() {
        let (mut view, peer) = LiveView::<u8>::channel(ViewHandle::from_raw(3));
        peer.event_tx
            .send(ViewEvent::Seeked(WindowSnapshot {
                serial: Serial::from_raw(1),
                total_extent: 480,
                window_offset: 96,
                items: vec![Item {
                    id: "x".to_string(),
                    serial: Serial::from_raw(1),
                    payload: 7,
                }],
            }))
            .unwrap();
        assert!(view.poll_events());
        assert_eq!(view.serial(), Serial::from_raw(1));
        assert_eq!(view.window().total_extent(), 480);
        assert_eq!(view.window().window_offset(), 96);
        assert!(!view.poll_events());
    }
}
