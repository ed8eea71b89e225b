pub mod realtime;

pub use realtime::{run_realtime_listener, RealtimeListener};
