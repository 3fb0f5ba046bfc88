//! Running statistics over collected samples.
//!
//! - [`Counter`] - Cumulative request, failure, byte and latency totals.
//! - [`RotateDiffWindow`] - Rates over a sliding window of counter snapshots.

mod counter;
mod window;

pub use counter::Counter;
pub use window::RotateDiffWindow;
