use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// The downloaded archive and the directory it gets extracted into.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
}

impl Workspace {
    pub fn new(archive_path: impl Into<PathBuf>, extract_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_path: archive_path.into(),
            extract_dir: extract_dir.into(),
        }
    }

    /// Removes the archive and the extracted tree. Safe to call repeatedly.
    pub fn cleanup(&self) -> io::Result<()> {
        let archive = remove_file_if_present(&self.archive_path);
        let extracted = remove_dir_if_present(&self.extract_dir);
        archive.and(extracted)?;
        debug!(archive = %self.archive_path.display(), "workspace cleaned");
        Ok(())
    }

    /// Cleans up when dropped, however the operation exits.
    pub fn guard(&self) -> WorkspaceGuard<'_> {
        WorkspaceGuard { workspace: self }
    }
}

pub struct WorkspaceGuard<'a> {
    workspace: &'a Workspace,
}

impl Drop for WorkspaceGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.workspace.cleanup() {
            warn!(error = %err, "workspace cleanup failed");
        }
    }
}

fn remove_file_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn staged(root: &Path) -> Workspace {
        let workspace = Workspace::new(root.join("map_files.7z"), root.join("map_files"));
        fs::write(&workspace.archive_path, b"7z").unwrap();
        fs::create_dir_all(workspace.extract_dir.join("nested")).unwrap();
        fs::write(workspace.extract_dir.join("nested/map.bsp"), b"map").unwrap();
        workspace
    }

    #[test]
    fn cleanup_removes_archive_and_tree() {
        let dir = tempdir().unwrap();
        let workspace = staged(dir.path());

        workspace.cleanup().unwrap();

        assert!(!workspace.archive_path.exists());
        assert!(!workspace.extract_dir.exists());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = tempdir().unwrap();
        let workspace = staged(dir.path());

        workspace.cleanup().unwrap();
        workspace.cleanup().unwrap();
    }

    #[test]
    fn stuck_archive_does_not_keep_extract_dir() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("map_files.7z"), dir.path().join("map_files"));
        fs::create_dir_all(workspace.archive_path.join("inner")).unwrap();
        fs::create_dir_all(&workspace.extract_dir).unwrap();
        fs::write(workspace.extract_dir.join("stale.vtf"), b"texture").unwrap();

        assert!(workspace.cleanup().is_err());
        assert!(!workspace.extract_dir.exists());
    }

    #[test]
    fn guard_cleans_on_drop() {
        let dir = tempdir().unwrap();
        let workspace = staged(dir.path());
        {
            let _guard = workspace.guard();
        }
        assert!(!workspace.archive_path.exists());
        assert!(!workspace.extract_dir.exists());
    }
}
