use crate::{catalog::MapCatalog, locate::InstallCandidate};
use crossterm::style::Stylize;
use std::{
    io::{self, BufRead, Write},
    num::IntErrorKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Install,
    Uninstall,
    Exit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Selection {
    All,
    Quit,
    /// Zero-based, in-range positions. Never empty.
    Positions(Vec<usize>),
    Invalid,
}

/// Parses a map selection against a listing of `len` items.
///
/// Accepts `a`/`all`, `q`/`quit`, or comma separated 1-based numbers.
/// Out-of-range numbers, however large, are dropped; a non-number anywhere
/// invalidates the whole answer.
pub fn parse_selection(input: &str, len: usize) -> Selection {
    let answer = input.trim().to_lowercase();
    match answer.as_str() {
        "a" | "all" => return Selection::All,
        "q" | "quit" => return Selection::Quit,
        _ => {}
    }

    let mut positions = Vec::new();
    for token in answer.split(',') {
        let number = match token.trim().parse::<i64>() {
            Ok(number) => number,
            Err(err)
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                continue;
            }
            Err(_) => return Selection::Invalid,
        };
        if number >= 1 && (number as u64) <= len as u64 {
            positions.push((number - 1) as usize);
        }
    }

    if positions.is_empty() {
        Selection::Invalid
    } else {
        Selection::Positions(positions)
    }
}

fn is_quit(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "q" | "quit")
}

/// Line-oriented prompts over any reader/writer pair. End of input counts
/// as quitting whatever prompt is open.
pub struct Prompt<R, W> {
    input: R,
    output: W,
    color: bool,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    /// Plain output; see [`Prompt::with_color`].
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            color: false,
        }
    }

    /// Turns on red alerts. Only worth it when the writer is a terminal.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Writes an error line, red when color is on.
    pub fn alert(&mut self, message: &str) -> io::Result<()> {
        if self.color {
            writeln!(self.output, "{}", message.red())
        } else {
            writeln!(self.output, "{message}")
        }
    }

    pub fn main_menu(&mut self) -> io::Result<MenuChoice> {
        writeln!(self.output, "\nSource Map Manager")?;
        writeln!(self.output, "1. Install maps")?;
        writeln!(self.output, "2. Uninstall maps")?;
        writeln!(self.output, "3. Exit")?;
        loop {
            let Some(answer) = self.ask("Select option (1-3): ")? else {
                return Ok(MenuChoice::Exit);
            };
            match answer.trim() {
                "1" => return Ok(MenuChoice::Install),
                "2" => return Ok(MenuChoice::Uninstall),
                "3" => return Ok(MenuChoice::Exit),
                _ => self.alert("Invalid choice!")?,
            }
        }
    }

    pub fn choose_install<'a>(
        &mut self,
        candidates: &'a [InstallCandidate],
    ) -> io::Result<Option<&'a InstallCandidate>> {
        match candidates {
            [] => {
                self.alert("No Source games found!")?;
                return Ok(None);
            }
            [only] => {
                writeln!(
                    self.output,
                    "Auto-selected {} installation: {}",
                    only.display_name,
                    only.path.display()
                )?;
                return Ok(Some(only));
            }
            _ => {}
        }

        writeln!(self.output, "\nFound Source games:")?;
        for (index, candidate) in candidates.iter().enumerate() {
            writeln!(
                self.output,
                "{}. {} - {}",
                index + 1,
                candidate.display_name,
                candidate.path.display()
            )?;
        }

        let question = format!(
            "\nSelect installation (1-{}), or 'q' to quit: ",
            candidates.len()
        );
        loop {
            let Some(answer) = self.ask(&question)? else {
                return Ok(None);
            };
            if is_quit(&answer) {
                return Ok(None);
            }
            if let Ok(number) = answer.trim().parse::<usize>() {
                if let Some(candidate) = number.checked_sub(1).and_then(|i| candidates.get(i)) {
                    return Ok(Some(candidate));
                }
            }
            self.alert("Invalid selection!")?;
        }
    }

    /// Lists the catalog and asks which maps to act on. `None` means cancelled.
    pub fn choose_maps(
        &mut self,
        catalog: &MapCatalog,
        action: &str,
    ) -> io::Result<Option<MapCatalog>> {
        writeln!(self.output, "\nAvailable maps to {action}:")?;
        for (index, name) in catalog.names().enumerate() {
            writeln!(self.output, "{}. {name}", index + 1)?;
        }
        writeln!(
            self.output,
            "\nEnter map numbers to {action} (comma separated), 'a' for all, or 'q' to cancel"
        )?;

        loop {
            let Some(answer) = self.ask("Selection: ")? else {
                return Ok(None);
            };
            match parse_selection(&answer, catalog.len()) {
                Selection::All => return Ok(Some(catalog.clone())),
                Selection::Quit => return Ok(None),
                Selection::Positions(positions) => return Ok(Some(catalog.pick(&positions))),
                Selection::Invalid => self.alert("Invalid selection!")?,
            }
        }
    }

    pub fn pause(&mut self) -> io::Result<()> {
        self.ask("\nPress Enter to continue...").map(|_| ())
    }
}
