use crate::catalog::{self, MapCatalog};
use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const MAPS_DIR: &str = "maps";
pub const SOURCES_DIR: &str = "sources";

#[derive(Debug)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub supporting_files: usize,
    pub failures: Vec<FileFailure>,
}

#[derive(Debug, Default)]
pub struct UninstallReport {
    pub removed: Vec<String>,
    pub sources_removed: bool,
    pub failures: Vec<FileFailure>,
}

pub fn maps_dir(game_root: &Path) -> PathBuf {
    game_root.join(MAPS_DIR)
}

pub fn sources_dir(game_root: &Path) -> PathBuf {
    maps_dir(game_root).join(SOURCES_DIR)
}

/// Moves the selected maps into `<game_root>/maps`, then sweeps every
/// non-map file left in `extract_dir` into `maps/sources`. Existing files
/// are replaced. A file that can't be moved is recorded and skipped.
pub fn install_maps(
    game_root: &Path,
    selection: &MapCatalog,
    extract_dir: &Path,
) -> Result<InstallReport> {
    let target_dir = maps_dir(game_root);
    let sources_dir = sources_dir(game_root);
    fs::create_dir_all(&target_dir).context("create maps dir")?;
    fs::create_dir_all(&sources_dir).context("create sources dir")?;

    let mut report = InstallReport::default();

    for (file_name, source) in selection.iter() {
        let dest = target_dir.join(file_name);
        match replace_file(source, &dest) {
            Ok(()) => {
                debug!(map = file_name, dest = %dest.display(), "installed map");
                report.installed.push(file_name.to_string());
            }
            Err(err) => report.failures.push(failure(source, err)),
        }
    }

    // Supporting files are shared by the whole package, so they ship
    // regardless of which maps were picked.
    for source in supporting_files(extract_dir) {
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let dest = sources_dir.join(file_name);
        match replace_file(&source, &dest) {
            Ok(()) => report.supporting_files += 1,
            Err(err) => report.failures.push(failure(&source, err)),
        }
    }

    Ok(report)
}

/// Deletes the selected map files. Drops `maps/sources` once no map files
/// remain next to it.
pub fn uninstall_maps(game_root: &Path, selection: &MapCatalog) -> UninstallReport {
    let target_dir = maps_dir(game_root);
    let sources_dir = sources_dir(game_root);
    let mut report = UninstallReport::default();

    for (file_name, path) in selection.iter() {
        match fs::remove_file(path) {
            Ok(()) => report.removed.push(file_name.to_string()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(map = file_name, "already gone");
            }
            Err(err) => report.failures.push(failure(path, err)),
        }
    }

    if sources_dir.is_dir() && catalog::installed_maps(&target_dir).is_empty() {
        match fs::remove_dir_all(&sources_dir) {
            Ok(()) => report.sources_removed = true,
            Err(err) => report.failures.push(failure(&sources_dir, err)),
        }
    }

    report
}

fn supporting_files(extract_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(extract_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !catalog::is_map_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect()
}

fn failure(path: &Path, err: io::Error) -> FileFailure {
    warn!(path = %path.display(), error = %err, "file operation failed");
    FileFailure {
        path: path.to_path_buf(),
        error: err.to_string(),
    }
}

fn replace_file(source: &Path, dest: &Path) -> io::Result<()> {
    match fs::remove_file(dest) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    move_file(source, dest)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(source: &Path, dest: &Path) -> io::Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    fs::copy(source, dest)?;
    preserve_mtime(source, dest);
    fs::remove_file(source)
}

fn preserve_mtime(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(err) = set_file_mtime(dest, mtime) {
        debug!(path = %dest.display(), error = %err, "could not preserve mtime");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_latest;
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn install_moves_maps_and_all_supporting_files() {
        let package = tempdir().unwrap();
        let game = tempdir().unwrap();
        touch(package.path(), "maps/koth_a_v2.bsp", "new");
        touch(package.path(), "maps/koth_a_v1.bsp", "old");
        touch(package.path(), "maps/ctf_b.bsp", "b");
        touch(package.path(), "extra/koth_a.vmf", "source");
        touch(package.path(), "readme.txt", "hi");

        let catalog = build_latest(package.path());
        let selection = catalog.pick(&[1]);
        assert_eq!(selection.names().collect::<Vec<_>>(), vec!["koth_a.bsp"]);

        let report = install_maps(game.path(), &selection, package.path()).unwrap();

        assert_eq!(report.installed, vec!["koth_a.bsp"]);
        assert_eq!(report.supporting_files, 2);
        assert!(report.failures.is_empty());
        let maps = game.path().join("maps");
        assert_eq!(fs::read_to_string(maps.join("koth_a.bsp")).unwrap(), "new");
        assert!(maps.join("sources/koth_a.vmf").exists());
        assert!(maps.join("sources/readme.txt").exists());
        assert!(!maps.join("ctf_b.bsp").exists());
        assert!(!package.path().join("extra/koth_a.vmf").exists());
        assert!(!package.path().join("readme.txt").exists());
    }

    #[test]
    fn install_replaces_existing_files() {
        let package = tempdir().unwrap();
        let game = tempdir().unwrap();
        touch(game.path(), "maps/pl_c.bsp", "stale");
        touch(game.path(), "maps/sources/pl_c.txt", "stale");
        touch(package.path(), "pl_c.bsp", "fresh");
        touch(package.path(), "pl_c.txt", "fresh");

        let selection = build_latest(package.path());
        let report = install_maps(game.path(), &selection, package.path()).unwrap();

        assert!(report.failures.is_empty());
        let maps = game.path().join("maps");
        assert_eq!(fs::read_to_string(maps.join("pl_c.bsp")).unwrap(), "fresh");
        assert_eq!(
            fs::read_to_string(maps.join("sources/pl_c.txt")).unwrap(),
            "fresh"
        );
    }

    #[test]
    fn missing_source_is_reported_not_fatal() {
        let package = tempdir().unwrap();
        let game = tempdir().unwrap();
        let mut selection = MapCatalog::default();
        selection.insert("ghost.bsp".to_string(), package.path().join("ghost.bsp"));
        selection.insert("real.bsp".to_string(), touch(package.path(), "real.bsp", "r"));

        let report = install_maps(game.path(), &selection, package.path()).unwrap();

        assert_eq!(report.installed, vec!["real.bsp"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, package.path().join("ghost.bsp"));
    }

    #[test]
    fn install_then_uninstall_leaves_no_map() {
        let package = tempdir().unwrap();
        let game = tempdir().unwrap();
        touch(package.path(), "cp_d.bsp", "d");
        touch(package.path(), "cp_d.nav", "nav");

        let selection = build_latest(package.path());
        install_maps(game.path(), &selection, package.path()).unwrap();
        assert!(!package.path().join("cp_d.nav").exists());

        let installed = catalog::installed_maps(&maps_dir(game.path()));
        let report = uninstall_maps(game.path(), &installed);

        assert_eq!(report.removed, vec!["cp_d.bsp"]);
        assert!(report.sources_removed);
        assert!(!game.path().join("maps/cp_d.bsp").exists());
        assert!(!sources_dir(game.path()).exists());
    }

    #[test]
    fn sources_stay_while_maps_remain() {
        let game = tempdir().unwrap();
        touch(game.path(), "maps/a.bsp", "a");
        touch(game.path(), "maps/b.bsp", "b");
        touch(game.path(), "maps/sources/shared.vmt", "s");

        let installed = catalog::installed_maps(&maps_dir(game.path()));
        let report = uninstall_maps(game.path(), &installed.pick(&[0]));

        assert_eq!(report.removed, vec!["a.bsp"]);
        assert!(!report.sources_removed);
        assert!(sources_dir(game.path()).join("shared.vmt").exists());
    }

    #[test]
    fn uninstall_skips_already_removed_files() {
        let game = tempdir().unwrap();
        let mut selection = MapCatalog::default();
        selection.insert("gone.bsp".to_string(), game.path().join("maps/gone.bsp"));

        let report = uninstall_maps(game.path(), &selection);

        assert!(report.removed.is_empty());
        assert!(report.failures.is_empty());
        assert!(!report.sources_removed);
    }

    #[test]
    fn copied_files_keep_their_mtime() {
        let dir = tempdir().unwrap();
        let source = touch(dir.path(), "package/wall.vtf", "texture");
        let old = FileTime::from_unix_time(1_000_000_000, 0);
        set_file_mtime(&source, old).unwrap();
        let dest = dir.path().join("wall.vtf");
        fs::copy(&source, &dest).unwrap();

        preserve_mtime(&source, &dest);
        preserve_mtime(&source, &dir.path().join("missing/wall.vtf"));

        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }
}
