//! Render watcher: follow status files and print composed polybar output.
//!
//! Each watched file is read as "icon glyph + text"; the glyph gets wrapped
//! in polybar foreground color markup and the per-file lines are joined into
//! one output line. A new line is printed only when the composition actually
//! changed, so polybar is not redrawn for no-op writes.

use std::io::Write;
use std::path::PathBuf;
use std::sync::mpsc;

use notify::{RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::DaemonError;

struct Module {
    path: PathBuf,
    rendered: String,
}

impl Module {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            rendered: String::new(),
        }
    }

    /// Re-read the backing file. A missing or empty file renders as empty.
    fn update(&mut self, color: &str) {
        let line = std::fs::read_to_string(&self.path).unwrap_or_default();
        self.rendered = colorize(line.lines().next().unwrap_or_default(), color);
    }
}

/// Wrap the first character in polybar foreground markup, leave the rest
/// untouched.
fn colorize(line: &str, color: &str) -> String {
    let mut chars = line.chars();
    match chars.next() {
        None => String::new(),
        Some(icon) => format!("%{{F{color}}}{icon}%{{F-}}{}", chars.as_str()),
    }
}

fn compose(modules: &[Module]) -> String {
    modules
        .iter()
        .map(|module| module.rendered.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Blocking loop; the daemon runs it on a blocking task. `tags` empty means
/// every file currently present in the store, in name order.
pub fn run_watch(root: PathBuf, tags: Vec<String>, color: String) -> Result<(), DaemonError> {
    let paths: Vec<PathBuf> = if tags.is_empty() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();
        paths
    } else {
        tags.iter().map(|tag| root.join(tag)).collect()
    };

    let mut modules: Vec<Module> = paths.into_iter().map(Module::new).collect();
    for module in &mut modules {
        module.update(&color);
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |result| {
        let _ = tx.send(result);
    })?;
    // Watch the directory, not the files: the writer replaces files
    // wholesale and a tag may not exist yet at startup.
    watcher.watch(&root, RecursiveMode::NonRecursive)?;

    let mut stdout = std::io::stdout();
    let mut last_output = compose(&modules);
    writeln!(stdout, "{last_output}")?;
    stdout.flush()?;

    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(err) => {
                warn!("watch error: {err}");
                continue;
            }
        };
        if !(event.kind.is_modify() || event.kind.is_create()) {
            continue;
        }
        let mut touched = false;
        for path in &event.paths {
            if let Some(module) = modules.iter_mut().find(|module| module.path == *path) {
                module.update(&color);
                touched = true;
            }
        }
        if !touched {
            continue;
        }
        let output = compose(&modules);
        if output != last_output {
            debug!(line = %output, "composition changed");
            writeln!(stdout, "{output}")?;
            stdout.flush()?;
            last_output = output;
        }
    }
    Ok(())
}
