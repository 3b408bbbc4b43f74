//! Colored terminal rendering for run results.

use orgcal_core::reconcile::{Outcome, RunReport};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Outcome {
    fn render(&self) -> String {
        let symbol = self.to_string();
        match self {
            Outcome::Created => symbol.green().to_string(),
            Outcome::Updated => symbol.yellow().to_string(),
            Outcome::Deleted => symbol.red().to_string(),
            Outcome::Failed => symbol.red().bold().to_string(),
            Outcome::Cached | Outcome::Unchanged => symbol.dimmed().to_string(),
        }
    }
}

fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{word}s")
    }
}

impl Render for RunReport {
    fn render(&self) -> String {
        let mut parts = Vec::new();

        for (outcome, label) in [
            (Outcome::Created, "created"),
            (Outcome::Updated, "updated"),
            (Outcome::Deleted, "deleted"),
        ] {
            let count = self.count(outcome);
            if count > 0 {
                parts.push(format!("{} {} {}", outcome.render(), count, label));
            }
        }

        let unchanged = self.unchanged();
        if unchanged > 0 {
            parts.push(format!("{}", format!("= {unchanged} unchanged").dimmed()));
        }

        let failed = self.count(Outcome::Failed);
        if failed > 0 {
            let label = format!("{} {}", failed, pluralize("failure", failed));
            parts.push(format!("{} {}", Outcome::Failed.render(), label.red()));
        }

        if self.retained > 0 {
            let kept = format!("{} kept from before the sync window", self.retained);
            parts.push(kept.dimmed().to_string());
        }

        if parts.is_empty() {
            return "   No events".dimmed().to_string();
        }

        let mut line = format!("   {}", parts.join(", "));
        if self.dry_run {
            line.push_str(&format!(" {}", "(dry run)".dimmed()));
        }
        line
    }
}

/// Header line for a calendar.
pub fn calendar_header(name: &str) -> String {
    format!("📅 {}", name.bold())
}

pub fn render_error(error: &anyhow::Error) -> String {
    format!("   {}", format!("{error:#}").red())
}
