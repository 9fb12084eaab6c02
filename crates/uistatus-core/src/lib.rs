//! Core types and logic for the ui-statuses pipeline.
//!
//! This crate holds everything that can be reasoned about without I/O: the
//! status update unit that flows through the queue, the playback model for
//! media players, the player registry with its election and emission-dedup
//! state machine, and the text formatting rules for the rendered status.
//!
//! The daemon crate wraps these in tokio tasks, the session bus and the
//! status store.

pub mod format;
pub mod player;
pub mod registry;
pub mod update;

pub use format::MprisStyle;
pub use player::{PlaybackStatus, PlayerEntry, PlayerUpdate, TrackMetadata};
pub use registry::PlayerRegistry;
pub use update::StatusUpdate;
