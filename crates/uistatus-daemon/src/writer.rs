//! The single consumer of the update queue.
//!
//! All sources funnel into one unbounded channel; this task drains it in
//! arrival order and applies each update to the store. One writer means
//! per-tag ordering needs no locking at all.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use uistatus_core::StatusUpdate;

use crate::store::StatusStore;

/// Drain the queue until every sender is gone. A failed write is logged and
/// skipped; one bad tag must not stall the rest of the pipeline.
pub async fn run_writer(store: StatusStore, mut rx: UnboundedReceiver<StatusUpdate>) {
    while let Some(update) = rx.recv().await {
        match store.write(&update) {
            Ok(()) => debug!(tag = %update.tag, value = %update.render(), "status written"),
            Err(err) => error!(tag = %update.tag, "status write failed: {err}"),
        }
    }
    debug!("update queue closed, writer stopping");
}
