use regex::Regex;
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use thiserror::Error;

pub const STEAMAPPS_DIR: &str = "steamapps";
pub const COMMON_DIR: &str = "common";
const LIBRARY_FOLDERS_FILE: &str = "libraryfolders.vdf";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestIssue {
    #[error("line {line}: \"path\" entry has no quoted value")]
    MissingPathValue { line: usize },
    #[error("line {line}: \"path\" entry is empty")]
    EmptyPath { line: usize },
    #[error("file name does not carry a numeric app id")]
    BadAppId,
    #[error("missing \"installdir\" field")]
    MissingInstallDir,
    #[error("read failed: {0}")]
    Unreadable(String),
}

/// A discovery problem tied to the file it came from. Never fatal.
#[derive(Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub source: PathBuf,
    pub issue: ManifestIssue,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source.display(), self.issue)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppManifest {
    pub install_dir: String,
    pub name: Option<String>,
}

/// Steam install roots reported by the platform.
///
/// On Windows this is the `InstallPath` registry value. Elsewhere the
/// conventional Steam locations under `$HOME` stand in for the registry.
pub fn registry_install_paths() -> Vec<PathBuf> {
    platform_install_paths()
}

#[cfg(windows)]
fn platform_install_paths() -> Vec<PathBuf> {
    use winreg::enums::HKEY_LOCAL_MACHINE;
    use winreg::RegKey;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    for subkey in [r"SOFTWARE\WOW6432Node\Valve\Steam", r"SOFTWARE\Valve\Steam"] {
        let Ok(key) = hklm.open_subkey(subkey) else {
            continue;
        };
        if let Ok(path) = key.get_value::<String, _>("InstallPath") {
            return vec![PathBuf::from(path)];
        }
    }
    Vec::new()
}

#[cfg(not(windows))]
fn platform_install_paths() -> Vec<PathBuf> {
    let Some(home) = std::env::var_os("HOME").map(PathBuf::from) else {
        return Vec::new();
    };
    [".local/share/Steam", ".steam/steam"]
        .iter()
        .map(|suffix| home.join(suffix))
        .filter(|path| path.is_dir())
        .collect()
}

pub fn library_folders_path(steam_root: &Path) -> PathBuf {
    steam_root.join(STEAMAPPS_DIR).join(LIBRARY_FOLDERS_FILE)
}

/// Scrapes every `"path"` line out of `libraryfolders.vdf` text.
///
/// This is plain line scanning, not a VDF parser: the value is the fourth
/// `"`-separated field. Lines that don't have one are reported and skipped.
pub fn parse_library_folders(raw: &str) -> (Vec<PathBuf>, Vec<ManifestIssue>) {
    let mut paths = Vec::new();
    let mut issues = Vec::new();

    for (index, line) in raw.lines().enumerate() {
        if !line.contains("\"path\"") {
            continue;
        }
        let line_no = index + 1;
        let Some(value) = line.split('"').nth(3) else {
            issues.push(ManifestIssue::MissingPathValue { line: line_no });
            continue;
        };
        if value.is_empty() {
            issues.push(ManifestIssue::EmptyPath { line: line_no });
            continue;
        }
        paths.push(PathBuf::from(unescape(value)));
    }

    (paths, issues)
}

pub fn read_library_folders(steam_root: &Path) -> (Vec<PathBuf>, Vec<Diagnostic>) {
    let path = library_folders_path(steam_root);
    if !path.exists() {
        return (Vec::new(), Vec::new());
    }
    match fs::read_to_string(&path) {
        Ok(raw) => {
            let (paths, issues) = parse_library_folders(&raw);
            let diagnostics = issues
                .into_iter()
                .map(|issue| Diagnostic {
                    source: path.clone(),
                    issue,
                })
                .collect();
            (paths, diagnostics)
        }
        Err(err) => (
            Vec::new(),
            vec![Diagnostic {
                source: path,
                issue: ManifestIssue::Unreadable(err.to_string()),
            }],
        ),
    }
}

/// Extracts the app id from an `appmanifest_<id>.acf` file name.
///
/// Returns `None` for names that are not app manifests at all, and
/// `Some(Err(..))` for manifests whose id doesn't parse.
pub fn manifest_app_id(file_name: &str) -> Option<Result<u32, ManifestIssue>> {
    let stem = file_name
        .strip_prefix("appmanifest_")?
        .strip_suffix(".acf")?;
    Some(stem.parse::<u32>().map_err(|_| ManifestIssue::BadAppId))
}

pub fn parse_app_manifest(raw: &str) -> Result<AppManifest, ManifestIssue> {
    static INSTALL_DIR: OnceLock<Regex> = OnceLock::new();
    static NAME: OnceLock<Regex> = OnceLock::new();
    let install_dir_re =
        INSTALL_DIR.get_or_init(|| Regex::new(r#""installdir"\s*"(.*?)""#).expect("valid regex"));
    let name_re = NAME.get_or_init(|| Regex::new(r#""name"\s*"(.*?)""#).expect("valid regex"));

    let install_dir = install_dir_re
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|value| unescape(value.as_str()))
        .ok_or(ManifestIssue::MissingInstallDir)?;
    let name = name_re
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|value| value.as_str().to_string());

    Ok(AppManifest { install_dir, name })
}

fn unescape(value: &str) -> String {
    value.replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const LIBRARY_FOLDERS: &str = r#""libraryfolders"
{
	"0"
	{
		"path"		"C:\\Program Files (x86)\\Steam"
		"label"		""
	}
	"1"
	{
		"path"		"D:\\SteamLibrary"
	}
}
"#;

    #[test]
    fn library_folders_without_paths() {
        let (paths, issues) = parse_library_folders("\"libraryfolders\"\n{\n}\n");
        assert!(paths.is_empty());
        assert!(issues.is_empty());
    }

    #[test]
    fn library_folders_single_path() {
        let (paths, issues) = parse_library_folders("\t\"path\"\t\t\"/mnt/games\"\n");
        assert_eq!(paths, vec![PathBuf::from("/mnt/games")]);
        assert!(issues.is_empty());
    }

    #[test]
    fn library_folders_unescapes_backslashes() {
        let (paths, issues) = parse_library_folders(LIBRARY_FOLDERS);
        assert_eq!(
            paths,
            vec![
                PathBuf::from(r"C:\Program Files (x86)\Steam"),
                PathBuf::from(r"D:\SteamLibrary"),
            ]
        );
        assert!(issues.is_empty());
    }

    #[test]
    fn malformed_path_line_does_not_stop_the_scan() {
        let raw = "\"path\" \"/first\"\n\"path\" broken\n\"path\" \"/third\"\n";
        let (paths, issues) = parse_library_folders(raw);
        assert_eq!(
            paths,
            vec![PathBuf::from("/first"), PathBuf::from("/third")]
        );
        assert_eq!(issues, vec![ManifestIssue::MissingPathValue { line: 2 }]);
    }

    #[test]
    fn read_library_folders_tags_diagnostics_with_file() {
        let dir = tempdir().unwrap();
        let vdf = library_folders_path(dir.path());
        fs::create_dir_all(vdf.parent().unwrap()).unwrap();
        fs::write(&vdf, "\"path\" \"\"\n\"path\" \"/lib\"\n").unwrap();

        let (paths, diagnostics) = read_library_folders(dir.path());

        assert_eq!(paths, vec![PathBuf::from("/lib")]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].source, vdf);
        assert_eq!(diagnostics[0].issue, ManifestIssue::EmptyPath { line: 1 });
    }

    #[test]
    fn missing_library_folders_is_quiet() {
        let dir = tempdir().unwrap();
        let (paths, diagnostics) = read_library_folders(dir.path());
        assert!(paths.is_empty());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn app_ids_from_manifest_names() {
        assert_eq!(manifest_app_id("appmanifest_440.acf"), Some(Ok(440)));
        assert_eq!(
            manifest_app_id("appmanifest_abc.acf"),
            Some(Err(ManifestIssue::BadAppId))
        );
        assert_eq!(manifest_app_id("libraryfolders.vdf"), None);
        assert_eq!(manifest_app_id("appmanifest_440.acf.bak"), None);
    }

    #[test]
    fn app_manifest_fields() {
        let raw = "\"AppState\"\n{\n\t\"appid\"\t\t\"440\"\n\t\"name\"\t\t\"Team Fortress 2\"\n\t\"installdir\"\t\t\"Team Fortress 2\"\n}\n";
        let manifest = parse_app_manifest(raw).unwrap();
        assert_eq!(manifest.install_dir, "Team Fortress 2");
        assert_eq!(manifest.name.as_deref(), Some("Team Fortress 2"));
    }

    #[test]
    fn app_manifest_without_name_or_installdir() {
        let manifest = parse_app_manifest("\"installdir\" \"Half-Life 2\"").unwrap();
        assert_eq!(manifest.install_dir, "Half-Life 2");
        assert_eq!(manifest.name, None);

        assert_eq!(
            parse_app_manifest("\"name\" \"Portal\""),
            Err(ManifestIssue::MissingInstallDir)
        );
    }
}
