use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("bus call failed: {0}")]
    BusCall(#[from] zbus::fdo::Error),

    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("XDG_RUNTIME_DIR is not set and no --root was given")]
    RuntimeDirUnset,

    #[error("status store root {0} is not a directory")]
    NotADirectory(PathBuf),
}
