pub mod tokio;

pub use self::tokio::{TokioTaskSpawner, TokioTimeService};
