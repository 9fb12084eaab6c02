//! Status store: a flat directory of per-metric text files.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use uistatus_core::StatusUpdate;

use crate::error::DaemonError;

/// Handle on the store root. Every write replaces one file wholesale, so
/// readers only ever observe complete values.
#[derive(Debug)]
pub struct StatusStore {
    root: PathBuf,
}

impl StatusStore {
    /// Open the store, creating the root directory (mode 0700, it lives
    /// under the user runtime dir) if it does not exist yet.
    pub fn open(root: PathBuf) -> Result<Self, DaemonError> {
        if root.exists() {
            if !root.is_dir() {
                return Err(DaemonError::NotADirectory(root));
            }
        } else {
            DirBuilder::new().recursive(true).mode(0o700).create(&root)?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Overwrite the tag file with the rendered update. No partial writes
    /// survive an error: `fs::write` truncates first, and these payloads are
    /// a handful of bytes.
    pub fn write(&self, update: &StatusUpdate) -> io::Result<()> {
        std::fs::write(self.root.join(&update.tag), update.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn open_creates_private_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("ui-statuses");
        let store = StatusStore::open(root.clone()).unwrap();
        assert_eq!(store.root(), root);
        let mode = std::fs::metadata(&root).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn open_rejects_a_plain_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("occupied");
        std::fs::write(&root, "x").unwrap();
        assert!(matches!(
            StatusStore::open(root),
            Err(DaemonError::NotADirectory(_))
        ));
    }

    #[test]
    fn write_replaces_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatusStore::open(dir.path().join("ui-statuses")).unwrap();

        store
            .write(&StatusUpdate::text_only("cpupercent", " 25%"))
            .unwrap();
        store
            .write(&StatusUpdate::text_only("cpupercent", "  7%"))
            .unwrap();

        let contents = std::fs::read_to_string(store.root().join("cpupercent")).unwrap();
        assert_eq!(contents, "  7%");
    }
}
