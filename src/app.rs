use crate::{
    catalog,
    config::{AppConfig, CatalogMode, LocatorKind},
    fetch::{self, ArchiveSource, RemoteArchive},
    install::{self, FileFailure},
    locate::{self, InstallLocator, KnownGamesLocator, RegistryRoots, SingleGameLocator, SteamRoots},
    select::{MenuChoice, Prompt},
    workspace::Workspace,
};
use anyhow::Result;
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};
use tracing::info;

pub struct App {
    roots: Box<dyn SteamRoots>,
    locator: Box<dyn InstallLocator>,
    source: Box<dyn ArchiveSource>,
    workspace: Workspace,
    catalog_mode: CatalogMode,
    dedupe_installs: bool,
}

impl App {
    pub fn initialize() -> Result<Self> {
        let config = AppConfig::load_or_create()?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: AppConfig) -> Self {
        let locator: Box<dyn InstallLocator> = match config.locator {
            LocatorKind::TeamFortress2 => Box::new(SingleGameLocator::team_fortress_2()),
            LocatorKind::KnownGames => Box::new(KnownGamesLocator::source_games()),
        };
        Self {
            roots: Box::new(RegistryRoots::new(config.extra_library_roots)),
            locator,
            source: Box::new(RemoteArchive::new(config.download_url, config.user_agent)),
            workspace: Workspace::new(config.archive_name, config.extract_dir),
            catalog_mode: config.catalog_mode,
            dedupe_installs: config.dedupe_installs,
        }
    }

    /// Menu loop. Returns when the user exits or input runs out.
    pub fn run<R: BufRead, W: Write>(&self, prompt: &mut Prompt<R, W>) -> Result<()> {
        loop {
            let choice = prompt.main_menu()?;
            if choice == MenuChoice::Exit {
                return Ok(());
            }

            let _cleanup = self.workspace.guard();
            let Some(game_root) = self.choose_game(prompt)? else {
                prompt.pause()?;
                continue;
            };
            info!(game_root = %game_root.display(), ?choice, "starting operation");

            if choice == MenuChoice::Install {
                self.install(prompt, &game_root)?;
            } else {
                self.uninstall(prompt, &game_root)?;
            }
            prompt.pause()?;
        }
    }

    fn choose_game<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
    ) -> Result<Option<PathBuf>> {
        let discovery = locate::discover(
            self.roots.as_ref(),
            self.locator.as_ref(),
            self.dedupe_installs,
        );
        let chosen = prompt.choose_install(&discovery.candidates)?;
        Ok(chosen.map(|candidate| candidate.path.clone()))
    }

    fn install<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        game_root: &Path,
    ) -> Result<()> {
        let out = prompt.output();
        writeln!(out, "\nDownloading map package...")?;
        let fetched = self.source.fetch(&self.workspace, &mut |done, total| {
            let _ = write!(out, "\r{}", fetch::format_progress(done, total));
            let _ = out.flush();
        });
        writeln!(out)?;
        if let Err(err) = fetched {
            prompt.alert(&format!("Error: {err}"))?;
            return Ok(());
        }
        writeln!(prompt.output(), "Map package ready!")?;

        let available = catalog::build(&self.workspace.extract_dir, self.catalog_mode);
        if available.is_empty() {
            prompt.alert("No maps found in the package!")?;
            return Ok(());
        }
        let Some(selection) = prompt.choose_maps(&available, "install")? else {
            return Ok(());
        };

        let report = match install::install_maps(game_root, &selection, &self.workspace.extract_dir) {
            Ok(report) => report,
            Err(err) => {
                prompt.alert(&format!("Error: {err:#}"))?;
                return Ok(());
            }
        };
        for name in &report.installed {
            writeln!(prompt.output(), "Installed: {name}")?;
        }
        alert_failures(prompt, &report.failures)?;
        let out = prompt.output();
        writeln!(out, "\nInstalled {} BSP files", report.installed.len())?;
        writeln!(out, "Moved {} supporting files", report.supporting_files)?;
        Ok(())
    }

    fn uninstall<R: BufRead, W: Write>(
        &self,
        prompt: &mut Prompt<R, W>,
        game_root: &Path,
    ) -> Result<()> {
        let installed = catalog::installed_maps(&install::maps_dir(game_root));
        if installed.is_empty() {
            prompt.alert("No maps found to uninstall!")?;
            return Ok(());
        }
        let Some(selection) = prompt.choose_maps(&installed, "uninstall")? else {
            return Ok(());
        };

        let report = install::uninstall_maps(game_root, &selection);
        for name in &report.removed {
            writeln!(prompt.output(), "Removed: {name}")?;
        }
        alert_failures(prompt, &report.failures)?;
        let out = prompt.output();
        if report.sources_removed {
            writeln!(out, "Removed sources folder")?;
        }
        writeln!(out, "\nRemoved {} map files", report.removed.len())?;
        Ok(())
    }
}

fn alert_failures<R: BufRead, W: Write>(
    prompt: &mut Prompt<R, W>,
    failures: &[FileFailure],
) -> std::io::Result<()> {
    for failure in failures {
        prompt.alert(&format!(
            "Failed: {} ({})",
            failure.path.display(),
            failure.error
        ))?;
    }
    Ok(())
}
