//! Capability-secured storage root (spec §4.E "On-disk layout").

use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use camino::Utf8Path;

use crate::error::NodeError;

/// An opened handle to the object store's root directory.
///
/// All object paths are resolved relative to this handle rather than to an
/// absolute path, so a path derived from an [`crate::oid::Oid`] can never
/// escape the root even if a future bug produced a bad component (spec §4.E
/// "The root is opened once and retained as a directory handle").
pub struct StorageRoot {
    dir: Dir,
}

impl StorageRoot {
    /// Open (creating if necessary) the directory at `path` as the storage
    /// root.
    ///
    /// # Errors
    /// Returns [`NodeError::Io`] if the directory cannot be created or
    /// opened.
    pub fn open(path: &Utf8Path) -> Result<Self, NodeError> {
        std::fs::create_dir_all(path)?;
        let dir = Dir::open_ambient_dir(path, ambient_authority())?;
        Ok(Self { dir })
    }

    /// Borrow the underlying capability-secured directory handle.
    #[must_use]
    pub const fn dir(&self) -> &Dir { &self.dir }

    /// Ensure the first-level shard directory for `relative` (its parent
    /// component) exists.
    ///
    /// # Errors
    /// Returns [`NodeError::Io`] if directory creation fails for a reason
    /// other than the directory already existing.
    pub fn ensure_shard_dir(&self, relative: &Utf8Path) -> Result<(), NodeError> {
        let Some(parent) = relative.parent() else { return Ok(()) };
        if self.dir.exists(parent) {
            return Ok(());
        }
        match self.dir.create_dir(parent) {
            Ok(()) => Ok(()),
            Err(_) if self.dir.exists(parent) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempfile::tempdir;

    use super::*;
    use crate::oid::Oid;

    #[test]
    fn ensure_shard_dir_creates_parent() {
        let tmp = tempdir().unwrap();
        let root_path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let root = StorageRoot::open(&root_path).unwrap();

        let oid = Oid::from_slice(&[0xaa, 0xbb]);
        let relative = oid.relative_path();
        root.ensure_shard_dir(&relative).unwrap();

        assert!(root.dir().exists(relative.parent().unwrap()));
    }

    #[test]
    fn ensure_shard_dir_is_idempotent() {
        let tmp = tempdir().unwrap();
        let root_path = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
        let root = StorageRoot::open(&root_path).unwrap();

        let oid = Oid::from_slice(&[0x11]);
        let relative = oid.relative_path();
        root.ensure_shard_dir(&relative).unwrap();
        root.ensure_shard_dir(&relative).unwrap();
    }
}
