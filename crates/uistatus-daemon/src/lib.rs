//! Daemon shell around `uistatus-core`: metric sources, the update queue
//! consumer, the status store and the polybar render watcher.

pub mod error;
pub mod sources;
pub mod store;
pub mod watch;
pub mod writer;

pub use error::DaemonError;
