//! Host-supplied commands attached to a channel.

/// A unit of bot behaviour the host attaches to a [`Channel`](crate::Channel).
///
/// A channel holds at most one command per [`key`](Command::key). Commands
/// are constructed through `Default` when attached, booted right after, and
/// torn down when removed.
pub trait Command: Send + Sync {
    /// Registry key identifying this command type.
    fn key() -> &'static str
    where
        Self: Sized;

    fn boot(&mut self) {}

    fn teardown(&mut self) {}
}
