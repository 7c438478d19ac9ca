pub mod backoff;
pub mod fanout;

pub use backoff::{Backoff, Sleeper, ThreadSleeper};
pub use fanout::{FanOut, FanOutResult};
