use futures::future::BoxFuture;

/// Fire-and-forget background work (fallback timers, per-event handlers).
/// The runtime behind it is swappable for tests.
pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, future: BoxFuture<'static, ()>);
}
