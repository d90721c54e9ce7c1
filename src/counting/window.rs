use std::fmt;

/// Length of one counting window in milliseconds
pub const WINDOW_MILLIS: u64 = 60_000;

/// Identifier of a one-minute wall-clock window: `floor(unix_ms / 60000)`
///
/// Adjacent windows differ by exactly one. Keys are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey(pub u64);

impl WindowKey {
    #[inline]
    pub fn for_millis(timestamp_ms: u64) -> Self {
        WindowKey(timestamp_ms / WINDOW_MILLIS)
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        WindowKey(self.0.saturating_add(1))
    }

    /// First millisecond covered by this window
    pub fn start_millis(&self) -> u64 {
        self.0.saturating_mul(WINDOW_MILLIS)
    }

    /// Milliseconds from `now_ms` until the window after `for_millis(now_ms)` begins.
    /// Always in `1..=WINDOW_MILLIS`.
    pub fn millis_until_next(now_ms: u64) -> u64 {
        let remaining = WINDOW_MILLIS - (now_ms % WINDOW_MILLIS);
        debug_assert!((1..=WINDOW_MILLIS).contains(&remaining));
        remaining
    }

    /// Number of windows between `earlier` and `self` (0 if `earlier` is not before `self`)
    pub fn steps_since(&self, earlier: WindowKey) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for WindowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
