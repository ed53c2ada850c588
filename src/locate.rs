use crate::{
    game::{self, KnownGame},
    steam::{self, Diagnostic, ManifestIssue, COMMON_DIR, STEAMAPPS_DIR},
};
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCandidate {
    pub display_name: String,
    pub path: PathBuf,
}

/// Result of a best-effort scan: whatever was found plus why anything was skipped.
#[derive(Debug, Default)]
pub struct Discovery {
    pub candidates: Vec<InstallCandidate>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Discovery {
    /// Drops candidates that resolve to a path already listed. First one wins.
    pub fn dedupe(&mut self) {
        let mut seen = HashSet::new();
        self.candidates.retain(|candidate| {
            let key = fs::canonicalize(&candidate.path).unwrap_or_else(|_| candidate.path.clone());
            seen.insert(key)
        });
    }
}

/// Where Steam base install paths come from.
pub trait SteamRoots {
    fn install_paths(&self) -> Vec<PathBuf>;

    /// Library roots searched after everything the base paths list. Their
    /// own `libraryfolders.vdf` is not read.
    fn extra_roots(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Registry-backed roots plus any roots configured by hand.
pub struct RegistryRoots {
    extra: Vec<PathBuf>,
}

impl RegistryRoots {
    pub fn new(extra: Vec<PathBuf>) -> Self {
        Self { extra }
    }
}

impl SteamRoots for RegistryRoots {
    fn install_paths(&self) -> Vec<PathBuf> {
        steam::registry_install_paths()
    }

    fn extra_roots(&self) -> Vec<PathBuf> {
        self.extra.clone()
    }
}

/// Turns one Steam library root into zero or more game asset directories.
pub trait InstallLocator {
    fn locate_in(&self, library: &Path, discovery: &mut Discovery);
}

/// Fixed layout lookup for a single game, no manifest parsing.
pub struct SingleGameLocator {
    game: KnownGame,
    install_dir: &'static str,
}

impl SingleGameLocator {
    pub fn team_fortress_2() -> Self {
        Self {
            game: game::TEAM_FORTRESS_2,
            install_dir: game::TEAM_FORTRESS_2_INSTALL_DIR,
        }
    }
}

impl InstallLocator for SingleGameLocator {
    fn locate_in(&self, library: &Path, discovery: &mut Discovery) {
        let path = library
            .join(STEAMAPPS_DIR)
            .join(COMMON_DIR)
            .join(self.install_dir)
            .join(self.game.asset_subdir);
        if path.is_dir() {
            discovery.candidates.push(InstallCandidate {
                display_name: self.game.display_name.to_string(),
                path,
            });
        }
    }
}

/// Scans `appmanifest_<id>.acf` files and keeps ids from the known-games table.
pub struct KnownGamesLocator {
    games: &'static [KnownGame],
}

impl KnownGamesLocator {
    pub fn source_games() -> Self {
        Self {
            games: game::SOURCE_GAMES,
        }
    }

    fn lookup(&self, app_id: u32) -> Option<&'static KnownGame> {
        self.games.iter().find(|game| game.app_id == app_id)
    }

    fn locate_manifest(
        &self,
        library: &Path,
        manifest_path: &Path,
        game: &KnownGame,
    ) -> Result<Option<InstallCandidate>, ManifestIssue> {
        let raw = fs::read_to_string(manifest_path)
            .map_err(|err| ManifestIssue::Unreadable(err.to_string()))?;
        let manifest = steam::parse_app_manifest(&raw)?;
        let game_dir = library
            .join(STEAMAPPS_DIR)
            .join(COMMON_DIR)
            .join(&manifest.install_dir);
        if !game_dir.is_dir() {
            debug!(app_id = game.app_id, path = %game_dir.display(), "game dir missing");
            return Ok(None);
        }
        let path = game_dir.join(game.asset_subdir);
        if !path.is_dir() {
            debug!(app_id = game.app_id, path = %path.display(), "asset dir missing");
            return Ok(None);
        }
        let display_name = manifest
            .name
            .unwrap_or_else(|| game.display_name.to_string());
        Ok(Some(InstallCandidate { display_name, path }))
    }
}

impl InstallLocator for KnownGamesLocator {
    fn locate_in(&self, library: &Path, discovery: &mut Discovery) {
        let steamapps = library.join(STEAMAPPS_DIR);
        let Ok(entries) = fs::read_dir(&steamapps) else {
            return;
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            let manifest_path = steamapps.join(&name);
            let app_id = match steam::manifest_app_id(&name) {
                None => continue,
                Some(Ok(app_id)) => app_id,
                Some(Err(issue)) => {
                    discovery.diagnostics.push(Diagnostic {
                        source: manifest_path,
                        issue,
                    });
                    continue;
                }
            };
            let Some(game) = self.lookup(app_id) else {
                continue;
            };
            match self.locate_manifest(library, &manifest_path, game) {
                Ok(Some(candidate)) => discovery.candidates.push(candidate),
                Ok(None) => {}
                Err(issue) => discovery.diagnostics.push(Diagnostic {
                    source: manifest_path,
                    issue,
                }),
            }
        }
    }
}

/// Base install paths first, then every library folder they list, then the
/// extra roots.
pub fn steam_libraries(roots: &dyn SteamRoots, diagnostics: &mut Vec<Diagnostic>) -> Vec<PathBuf> {
    let base_paths = roots.install_paths();
    let mut library_folders = Vec::new();
    for base in &base_paths {
        let (paths, issues) = steam::read_library_folders(base);
        library_folders.extend(paths);
        diagnostics.extend(issues);
    }

    let mut libraries = base_paths;
    libraries.extend(library_folders);
    libraries.extend(roots.extra_roots());
    libraries
}

pub fn discover(roots: &dyn SteamRoots, locator: &dyn InstallLocator, dedupe: bool) -> Discovery {
    let mut discovery = Discovery::default();
    let libraries = steam_libraries(roots, &mut discovery.diagnostics);
    debug!(count = libraries.len(), "steam libraries");

    for library in &libraries {
        locator.locate_in(library, &mut discovery);
    }
    if dedupe {
        discovery.dedupe();
    }

    for diagnostic in &discovery.diagnostics {
        warn!(%diagnostic, "skipped during install discovery");
    }
    discovery
}
