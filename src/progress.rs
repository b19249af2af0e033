//! Progress and confirmation for dirsync's terminal UI.

use anyhow::Result;
use colored::Colorize;
use converge::{ApplyResult, ConfirmCallback, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Progress bar over the resources of one apply
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

pub(crate) fn result_symbol(result: &ApplyResult) -> &'static str {
    match result {
        ApplyResult::NoChange => "○",
        ApplyResult::Created { .. } | ApplyResult::Modified | ApplyResult::Removed => "✓",
        ApplyResult::Failed { .. } => "✗",
        ApplyResult::Skipped { .. } => "⊘",
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&self, count: usize) {
        let bar = if self.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(count as u64);
            if let Ok(style) =
                ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        };
        let mut guard = match self.bar.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(bar);
    }

    fn on_resource_start(&self, address: &str, _description: &str) {
        self.with_bar(|bar| bar.set_message(address.to_string()));
    }

    fn on_resource_complete(&self, address: &str, result: &ApplyResult) {
        self.with_bar(|bar| {
            if let ApplyResult::Failed { error, .. } = result {
                bar.suspend(|| println!("  {} {} ({})", "✗".red(), address, error));
            }
            bar.set_message(format!("{} {}", result_symbol(result), address));
            bar.inc(1);
        });
    }

    fn on_batch_complete(&self) {
        self.with_bar(ProgressBar::finish_and_clear);
    }
}

/// Interactive confirmation, skipped with `--yes`
pub struct PromptConfirm {
    pub yes: bool,
}

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
