//! Common helpers shared across credo crates: time, running statistics and
//! simulated latency.

pub mod latency;
pub mod stats;
pub mod time;

pub use latency::simulate_latency;
pub use stats::{rate, running_average};
pub use time::{current_time, current_time_millis};
