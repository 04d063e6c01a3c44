//! Terminal collaborators: a one-line progress display and an stdin prompter.

use std::io::{self, BufRead, Write};
use std::sync::Mutex;

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;

use crate::app::{ProgressEvent, ProgressSink, Prompter};
use crate::catalog::{EnzymeCatalog, EnzymeRef};
use crate::domain::CancelToken;

pub struct TerminalProgress {
    cancel: CancelToken,
    current: Mutex<Option<String>>,
}

impl TerminalProgress {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            current: Mutex::new(None),
        }
    }

    fn redraw(&self, line: &str) {
        let mut stderr = io::stderr();
        let _ = stderr
            .queue(MoveToColumn(0))
            .and_then(|out| out.queue(Clear(ClearType::CurrentLine)))
            .and_then(|out| write!(out, "{line}").map(|_| out))
            .and_then(|out| out.flush());
    }
}

impl ProgressSink for TerminalProgress {
    fn event(&self, event: ProgressEvent) {
        let message = event
            .message
            .split_once("; ")
            .map(|(_, payload)| payload.to_string())
            .unwrap_or(event.message);
        let index = event
            .file_index
            .map(|index| format!(" #{}", index + 1))
            .unwrap_or_default();
        let line = format!("{}{index} {message}", format!("[{}]", event.phase).bold());
        self.redraw(&line);
        eprintln!();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(event.phase.to_string());
        }
    }

    fn progress(&self, done: u64, total: Option<u64>) {
        let phase = self
            .current
            .lock()
            .ok()
            .and_then(|current| current.clone())
            .unwrap_or_default();
        let line = match total {
            Some(total) if total > 0 => {
                let percent = (done as f64 / total as f64 * 100.0).min(100.0);
                format!("  {phase}: {done}/{total} ({percent:.0}%)")
            }
            _ => format!("  {phase}: {done}"),
        };
        self.redraw(&line);
    }

    fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }
}

/// Asks on stderr, reads answers from stdin.
pub struct StdinPrompter {
    catalog: EnzymeCatalog,
}

impl StdinPrompter {
    pub fn new() -> Self {
        Self {
            catalog: EnzymeCatalog::builtin(),
        }
    }

    fn read_answer(&self) -> Option<String> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).ok()?;
        let answer = line.trim();
        (!answer.is_empty()).then(|| answer.to_string())
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for StdinPrompter {
    fn ask_enzyme(&self, candidate: &str) -> Option<EnzymeRef> {
        let names = self.catalog.canonical_names();
        eprintln!();
        eprintln!("Enzyme '{}' is not recognized. Pick one:", candidate.yellow());
        for (idx, name) in names.iter().enumerate() {
            eprintln!("  {:>2}) {name}", idx + 1);
        }
        eprint!("number or name, empty to skip: ");
        let _ = io::stderr().flush();

        let answer = self.read_answer()?;
        if let Ok(choice) = answer.parse::<usize>() {
            return names
                .get(choice.checked_sub(1)?)
                .map(|name| EnzymeRef::Known(name.to_string()));
        }
        self.catalog
            .lookup(&answer)
            .map(|name| EnzymeRef::Known(name.to_string()))
    }

    fn ask_unknown_modification(&self, name: &str) {
        eprintln!(
            "{} modification '{name}' is not in the catalog; add it to known_modifications to map it",
            "(!)".yellow().bold()
        );
    }
}

/// Declines every question; used with `--non-interactive`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecliningPrompter;

impl Prompter for DecliningPrompter {
    fn ask_enzyme(&self, candidate: &str) -> Option<EnzymeRef> {
        warn!(%candidate, "enzyme not recognized, recorded as unknown");
        None
    }

    fn ask_unknown_modification(&self, name: &str) {
        warn!(%name, "modification not recognized");
    }
}
