//! Windowed Unique Counting
//!
//! Tracks the distinct identifiers seen in the current wall-clock minute.
//!
//! ## Architecture
//!
//! ```text
//! track(id) ──► RwLock(read) ──► shard[hash(id) % 16] ──► HashSet
//!
//! advance_window(now) ──► RwLock(write) ──► swap in empty window
//!                                      └──► (old key, final count)
//! ```

pub mod clock;
pub mod counter;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{UniqueCounter, WindowExport};
pub use window::{WindowKey, WINDOW_MILLIS};
