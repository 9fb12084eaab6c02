//! Metric sources. Every source owns a sender into the update queue and
//! stops when the cancellation token fires.

pub mod mpris;
pub mod proc;
pub mod volume;
