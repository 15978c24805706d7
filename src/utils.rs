// src/utils.rs
// Block-window pagination for the importer

use std::fmt;

/// Half-open block range `[start, end)` fetched in one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    /// Inclusive upper bound handed to the provider.
    pub fn last_block(&self) -> u64 {
        self.end.saturating_sub(1).max(self.start)
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Windows of `max_window` blocks starting at `from_block`, advancing until the cursor passes
/// `to_block`.
///
/// Always yields at least one window, even when `to_block <= from_block`. The last window
/// may extend past `to_block`. `max_window` of zero is treated as one.
pub fn block_windows(from_block: u64, to_block: u64, max_window: u64) -> impl Iterator<Item = Window> {
    let step = max_window.max(1);
    let mut cursor = Some(from_block);
    std::iter::from_fn(move || {
        let start = cursor?;
        let end = start.saturating_add(step);
        cursor = if end > to_block || end == start || end == u64::MAX { None } else { Some(end) };
        Some(Window { start, end })
    })
}
