//! Windowing protocol: viewport request mapping and seek resolution
//!
//! The viewport converts a scroll offset plus a desired visible range into a
//! [`SeekRequest`] against a live view, in the view's single linear
//! coordinate space (e.g. cumulative row height). Items occupy a quantized
//! unit size; requests are always whole-unit. Offset zero is special: it
//! issues a seek-to-top so the window stays latched to the logical top while
//! new items are prepended upstream.
//!
//! [`resolve_seek`] is the server half of the same protocol: the arithmetic
//! a backing collaborator uses to turn a request into an item range. Keeping
//! both halves here keeps the coordinate math in one place.

use crate::config::ViewingConfig;
use crate::view::clock::Serial;
use crate::view::{Item, LiveView, SeekRequest, WindowSnapshot};

/// The materialized subset of a live view's items, addressed by the view's
/// coordinate space.
#[derive(Debug, Clone)]
pub struct Window<T> {
    serial: Serial,
    total_extent: u64,
    window_offset: u64,
    items: Vec<Item<T>>,
}

impl<T> Default for Window<T> {
    fn default() -> Self {
        Self {
            serial: Serial::ZERO,
            total_extent: 0,
            window_offset: 0,
            items: Vec::new(),
        }
    }
}

impl<T> Window<T> {
    pub fn serial(&self) -> Serial {
        self.serial
    }

    /// Estimated total size of the windowed dimension.
    pub fn total_extent(&self) -> u64 {
        self.total_extent
    }

    /// Position of the materialized window within the total extent.
    pub fn window_offset(&self) -> u64 {
        self.window_offset
    }

    pub fn items(&self) -> &[Item<T>] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item covering `coordinate`, or `None` when the coordinate falls in a
    /// gap the window has not materialized, where the renderer shows a
    /// placeholder row there.
    pub fn item_at(&self, coordinate: u64, unit_size: u32) -> Option<&Item<T>> {
        let unit = u64::from(unit_size.max(1));
        if coordinate < self.window_offset {
            return None;
        }
        let index = ((coordinate - self.window_offset) / unit) as usize;
        self.items.get(index)
    }

    /// Replace the window with a completed-seek snapshot.
    pub(crate) fn apply(&mut self, snapshot: WindowSnapshot<T>) {
        debug_assert!(
            snapshot.serial > self.serial,
            "window serial must be strictly increasing"
        );
        debug_assert!(
            snapshot.items.iter().all(|item| item.serial <= snapshot.serial),
            "item serial exceeds view serial"
        );
        self.serial = snapshot.serial;
        self.total_extent = snapshot.total_extent;
        self.window_offset = snapshot.window_offset;
        self.items = snapshot.items;
    }

    /// Apply an out-of-band single-item mutation. Items outside the
    /// materialized window are ignored; the serial still advances because
    /// the mutation happened on the view.
    pub(crate) fn apply_change(&mut self, item: Item<T>, serial: Serial) {
        debug_assert!(serial > self.serial, "change serial must advance the view");
        debug_assert!(item.serial <= serial, "item serial exceeds view serial");
        self.serial = serial;
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item;
        }
    }
}

/// Maps scroll positions to whole-unit seek requests for one rendering
/// surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    unit_size: u32,
    before: u32,
    after: u32,
}

impl Viewport {
    pub fn new(unit_size: u32, before: u32, after: u32) -> Self {
        Self {
            unit_size: unit_size.max(1),
            before,
            after,
        }
    }

    pub fn from_config(config: &ViewingConfig) -> Self {
        Self::new(
            config.unit_size,
            config.read_ahead_before,
            config.read_ahead_after,
        )
    }

    pub fn unit_size(&self) -> u32 {
        self.unit_size
    }

    /// Convert a scroll offset and visible extent into a seek request.
    ///
    /// Offset zero latches to the top. Any other offset is rounded down to a
    /// unit boundary, and the visible count is widened to keep the original
    /// region covered, so the request is never sub-unit.
    pub fn plan(&self, offset: u64, viewport_extent: u64) -> SeekRequest {
        let unit = u64::from(self.unit_size);
        if offset == 0 {
            let visible = viewport_extent.div_ceil(unit).max(1) as u32;
            SeekRequest::ToTop {
                visible,
                after: self.after,
            }
        } else {
            let quantized = offset - offset % unit;
            let overhang = offset - quantized;
            let visible = (viewport_extent + overhang).div_ceil(unit).max(1) as u32;
            SeekRequest::Coordinate {
                offset: quantized,
                before: self.before,
                visible,
                after: self.after,
            }
        }
    }

    /// Plan and issue the seek, fire-and-forget.
    pub fn seek<T: Clone>(&self, view: &LiveView<T>, offset: u64, viewport_extent: u64) {
        view.seek(self.plan(offset, viewport_extent));
    }
}

/// The item range a seek request resolves to against an ordered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekResolution {
    pub start_index: usize,
    pub count: usize,
    pub window_offset: u64,
    pub total_extent: u64,
}

/// Resolve a seek request into an item range, clamped to the source.
pub fn resolve_seek(request: SeekRequest, item_count: usize, unit_size: u32) -> SeekResolution {
    let unit = u64::from(unit_size.max(1));
    let total_extent = item_count as u64 * unit;
    let (start, end) = match request {
        SeekRequest::ToTop { visible, after } => {
            let wanted = visible as usize + after as usize;
            (0, item_count.min(wanted))
        }
        SeekRequest::Coordinate {
            offset,
            before,
            visible,
            after,
        } => {
            let first_visible = ((offset / unit) as usize).min(item_count);
            let start = first_visible.saturating_sub(before as usize);
            let wanted = visible as usize + after as usize;
            let end = item_count.min(first_visible.saturating_add(wanted));
            (start, end)
        }
    };
    SeekResolution {
        start_index: start,
        count: end.saturating_sub(start),
        window_offset: start as u64 * unit,
        total_extent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_offset_zero_is_seek_to_top() {
        let viewport = Viewport::new(40, 3, 5);
        assert_eq!(
            viewport.plan(0, 400),
            SeekRequest::ToTop {
                visible: 10,
                after: 5
            }
        );
    }

    #[test]
    fn test_plan_quantizes_to_unit_boundary() {
        let viewport = Viewport::new(40, 2, 2);
        // 90 rounds down to 80; the 10-unit overhang widens the visible count.
        assert_eq!(
            viewport.plan(90, 400),
            SeekRequest::Coordinate {
                offset: 80,
                before: 2,
                visible: 11,
                after: 2
            }
        );
    }

    #[test]
    fn test_plan_never_requests_sub_unit_window() {
        let viewport = Viewport::new(40, 0, 0);
        // A 1-coordinate viewport still covers a whole unit.
        assert_eq!(
            viewport.plan(40, 1),
            SeekRequest::Coordinate {
                offset: 40,
                before: 0,
                visible: 1,
                after: 0
            }
        );
    }

    #[test]
    fn test_resolve_to_top_anchors_at_zero() {
        let resolution = resolve_seek(
            SeekRequest::ToTop {
                visible: 4,
                after: 2,
            },
            100,
            40,
        );
        assert_eq!(resolution.start_index, 0);
        assert_eq!(resolution.count, 6);
        assert_eq!(resolution.window_offset, 0);
        assert_eq!(resolution.total_extent, 4000);
    }

    #[test]
    fn test_resolve_coordinate_with_read_ahead() {
        let resolution = resolve_seek(
            SeekRequest::Coordinate {
                offset: 400,
                before: 3,
                visible: 5,
                after: 2,
            },
            100,
            40,
        );
        // First visible item is index 10; read-ahead reaches back to 7.
        assert_eq!(resolution.start_index, 7);
        assert_eq!(resolution.count, 10);
        assert_eq!(resolution.window_offset, 280);
    }

    #[test]
    fn test_resolve_clamps_at_both_ends() {
        let near_start = resolve_seek(
            SeekRequest::Coordinate {
                offset: 40,
                before: 5,
                visible: 3,
                after: 0,
            },
            100,
            40,
        );
        assert_eq!(near_start.start_index, 0);

        let near_end = resolve_seek(
            SeekRequest::Coordinate {
                offset: 3960,
                before: 0,
                visible: 10,
                after: 10,
            },
            100,
            40,
        );
        assert_eq!(near_end.start_index, 99);
        assert_eq!(near_end.count, 1);

        let empty = resolve_seek(
            SeekRequest::ToTop {
                visible: 10,
                after: 0,
            },
            0,
            40,
        );
        assert_eq!(empty.count, 0);
        assert_eq!(empty.total_extent, 0);
    }

    #[test]
    fn test_window_gap_aware_lookup() {
        let mut window: Window<u8> = Window::default();
        window.apply(WindowSnapshot {
            serial: Serial::from_raw(1),
            total_extent: 4000,
            window_offset: 280,
            items: (0..10)
                .map(|i| Item {
                    id: format!("i{i}"),
                    serial: Serial::from_raw(1),
                    payload: i,
                })
                .collect(),
        });
        // Before the window: gap.
        assert!(window.item_at(0, 40).is_none());
        // First materialized item.
        assert_eq!(window.item_at(280, 40).unwrap().id, "i0");
        // Within the third unit.
        assert_eq!(window.item_at(399, 40).unwrap().id, "i2");
        // Past the window: gap.
        assert!(window.item_at(4000, 40).is_none());
    }

    #[test]
    fn test_window_change_updates_item_and_serial() {
        let mut window: Window<u8> = Window::default();
        window.apply(WindowSnapshot {
            serial: Serial::from_raw(1),
            total_extent: 80,
            window_offset: 0,
            items: vec![Item {
                id: "a".to_string(),
                serial: Serial::from_raw(1),
                payload: 1,
            }],
        });
        window.apply_change(
            Item {
                id: "a".to_string(),
                serial: Serial::from_raw(2),
                payload: 9,
            },
            Serial::from_raw(2),
        );
        assert_eq!(window.serial(), Serial::from_raw(2));
        assert_eq!(window.items()[0].payload, 9);

        // A change for an unmaterialized item advances the serial only.
        window.apply_change(
            Item {
                id: "zz".to_string(),
                serial: Serial::from_raw(3),
                payload: 0,
            },
            Serial::from_raw(3),
        );
        assert_eq!(window.serial(), Serial::from_raw(3));
        assert_eq!(window.items().len(), 1);
    }
}
