use crate::config::CatalogMode;
use regex::Regex;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const MAP_EXTENSION: &str = ".bsp";

/// Rank given to `_anomi` builds; beats any ordinary `_v<N>` below it.
const ANOMI_RANK: u64 = 9999;

/// Map file name to the file it comes from, kept sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapCatalog {
    entries: BTreeMap<String, PathBuf>,
}

impl MapCatalog {
    pub fn insert(&mut self, file_name: String, source: PathBuf) {
        self.entries.insert(file_name, source);
    }

    #[cfg(test)]
    pub fn get(&self, file_name: &str) -> Option<&Path> {
        self.entries.get(file_name).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Builds the subset at the given zero-based positions of the sorted
    /// listing. Out-of-range positions are ignored.
    pub fn pick(&self, positions: &[usize]) -> MapCatalog {
        let listing: Vec<(&String, &PathBuf)> = self.entries.iter().collect();
        let mut picked = MapCatalog::default();
        for &position in positions {
            if let Some((name, path)) = listing.get(position) {
                picked.insert((*name).clone(), (*path).clone());
            }
        }
        picked
    }
}

pub fn is_map_file(file_name: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(MAP_EXTENSION)
}

pub fn build(root: &Path, mode: CatalogMode) -> MapCatalog {
    match mode {
        CatalogMode::Flat => build_flat(root),
        CatalogMode::Latest => build_latest(root),
    }
}

/// Every map file under `root`, keyed by its on-disk name. A repeated name
/// keeps the last path seen.
pub fn build_flat(root: &Path) -> MapCatalog {
    let mut catalog = MapCatalog::default();
    for (file_name, path) in walk_map_files(root) {
        catalog.insert(file_name, path);
    }
    catalog
}

struct RankedMap {
    rank: u64,
    original_base: String,
    path: PathBuf,
}

/// One entry per logical map: `_v<N>` and `_anomi` builds collapse to their
/// base name and only the highest ranked file survives, named `<base>.bsp`.
pub fn build_latest(root: &Path) -> MapCatalog {
    let mut best: HashMap<String, RankedMap> = HashMap::new();

    for (file_name, path) in walk_map_files(root) {
        let key = VersionKey::parse(&file_name);
        let original_base = file_name[..key.base_len].to_string();
        let candidate = RankedMap {
            rank: key.rank,
            original_base,
            path,
        };
        match best.get(&key.base) {
            Some(current) if current.rank >= candidate.rank => {
                debug!(
                    kept = %current.path.display(),
                    skipped = %candidate.path.display(),
                    "older map version"
                );
            }
            _ => {
                best.insert(key.base, candidate);
            }
        }
    }

    let mut catalog = MapCatalog::default();
    for ranked in best.into_values() {
        catalog.insert(
            format!("{}{MAP_EXTENSION}", ranked.original_base),
            ranked.path,
        );
    }
    catalog
}

/// Map files sitting directly in an installed `maps/` directory.
pub fn installed_maps(target_dir: &Path) -> MapCatalog {
    let mut catalog = MapCatalog::default();
    let Ok(entries) = fs::read_dir(target_dir) else {
        return catalog;
    };
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if is_map_file(&file_name) {
            catalog.insert(file_name, path);
        }
    }
    catalog
}

fn walk_map_files(root: &Path) -> impl Iterator<Item = (String, PathBuf)> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            is_map_file(&file_name).then(|| (file_name, entry.into_path()))
        })
}

#[derive(Debug, PartialEq, Eq)]
struct VersionKey {
    /// Lowercase base name, the grouping key.
    base: String,
    /// Byte length of the base in the original file name.
    base_len: usize,
    rank: u64,
}

impl VersionKey {
    /// Expects a name that already passed [`is_map_file`].
    fn parse(file_name: &str) -> Self {
        static VERSIONED: OnceLock<Regex> = OnceLock::new();
        static ANOMI: OnceLock<Regex> = OnceLock::new();
        let versioned =
            VERSIONED.get_or_init(|| Regex::new(r"^(.*?)_v([0-9]+)\.bsp$").expect("valid regex"));
        let anomi = ANOMI.get_or_init(|| Regex::new(r"^(.*?)_anomi\.bsp$").expect("valid regex"));

        // ASCII folding keeps byte offsets identical to the original name.
        let lower = file_name.to_ascii_lowercase();

        if let Some(caps) = versioned.captures(&lower) {
            let base = caps[1].to_string();
            let rank = caps[2].parse::<u64>().unwrap_or(u64::MAX);
            return Self {
                base_len: base.len(),
                base,
                rank,
            };
        }
        if let Some(caps) = anomi.captures(&lower) {
            let base = caps[1].to_string();
            return Self {
                base_len: base.len(),
                base,
                rank: ANOMI_RANK,
            };
        }

        let base_len = lower.len() - MAP_EXTENSION.len();
        Self {
            base: lower[..base_len].to_string(),
            base_len,
            rank: 0,
        }
    }
}
