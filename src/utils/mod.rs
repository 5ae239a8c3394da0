pub mod cancel;
pub mod http;
pub mod perf;

pub use cancel::until_cancelled;
pub use perf::{Stopwatch, TimingTracker};
