pub mod debounce;

pub use debounce::{PushDebounceScheduler, SchedulerConfig};
