//! Crate-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Minimum free-text filter length before a search binding is issued.
/// Shorter prefixes have low selectivity and would issue an expensive
/// search query on every keystroke.
pub const DEFAULT_MIN_TEXT_FILTER_LEN: usize = 3;

/// Default quantized unit size (coordinate-space extent of one item).
/// Every seek is rounded to whole units; the viewport never requests a
/// sub-unit window.
pub const DEFAULT_UNIT_SIZE: u32 = 48;

/// Default read-ahead above the visible region, in units.
pub const DEFAULT_READ_AHEAD_BEFORE: u32 = 6;

/// Default read-ahead below the visible region, in units.
pub const DEFAULT_READ_AHEAD_AFTER: u32 = 6;

/// Units materialized by the implicit seek-to-top issued when a view is
/// acquired, before the viewport has reported its real extent.
pub const DEFAULT_INITIAL_VISIBLE: u32 = 20;
