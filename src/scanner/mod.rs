pub mod filter;
pub mod poll_loop;
pub mod seen_set;

pub use filter::qualifies;
pub use poll_loop::{CycleReport, ItemStatus, PollLoop, PollState, PollStats};
pub use seen_set::{SeenKey, SeenSet};
