//! Output formatting and styling module.
//!
//! Provides the console side of a run: colored per-file lines, a spinner
//! while the run is going, and the summary table at the end.

use crate::progress::{ProgressSink, SinkError, Summary};
use crate::record::{FileRecord, RecordStatus, RunResult};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages CLI output with consistent styling.
///
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a spinner for a run whose length is not known up front.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tvsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_spinner();
    /// pb.set_message("show.E01.mp4");
    /// pb.finish_and_clear();
    /// ```
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {pos} files {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// One line for a finished record, plus its notes.
    pub fn record_line(record: &FileRecord) -> String {
        let target = record
            .moved_to
            .clone()
            .or_else(|| record.destination_path())
            .map(|p| p.display().to_string());

        let line = match (record.status, target) {
            (RecordStatus::Skipped, _) => {
                format!("{} {} skipped", "-".dimmed(), record.filename)
            }
            (RecordStatus::Planned, Some(to)) => {
                format!("{} {} → would move to {}", "•".cyan(), record.filename, to)
            }
            (RecordStatus::Relocated, Some(to)) => {
                let mark = if record.is_matched() {
                    "✓".green()
                } else {
                    "⚠".yellow()
                };
                format!("{} {} → {}", mark, record.filename, to)
            }
            (_, _) => format!("{} {} failed", "✗".red(), record.filename),
        };

        let mut out = format!("[{}] {}", record.index, line);
        for note in &record.log {
            out.push_str(&format!("\n      {}", note.dimmed()));
        }
        out
    }

    /// Prints a summary table of the run by record status.
    pub fn summary_table(summary: &Summary, result: RunResult) {
        Self::header("SUMMARY");

        let rows = [
            ("Matched", summary.matched),
            ("Unmatched", summary.unmatched),
            ("Skipped", summary.count(RecordStatus::Skipped)),
            ("Failed", summary.count(RecordStatus::Failed)),
        ];
        let width = 9;

        println!("{:<width$} | {}", "Outcome".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (label, count) in rows {
            let file_word = if count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                label,
                count.to_string().green(),
                file_word,
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            summary.total.to_string().green().bold(),
            if summary.total == 1 { "file" } else { "files" },
            width = width
        );
        println!("Run result: {}", result.as_str().bold());
    }
}

/// Prints records as they arrive, above a running spinner.
///
/// Clones drive the same spinner.
#[derive(Clone)]
pub struct ConsoleSink {
    spinner: ProgressBar,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            spinner: OutputFormatter::create_spinner(),
        }
    }

    /// Removes the spinner. Call once the run is over.
    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleSink {
    fn deliver(&mut self, record: FileRecord) -> Result<(), SinkError> {
        self.spinner.println(OutputFormatter::record_line(&record));
        self.spinner.inc(1);
        self.spinner.set_message(record.filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Classification;
    use std::path::{Path, PathBuf};

    #[test]
    fn test_record_line_mentions_destination_and_notes() {
        colored::control::set_override(false);

        let mut record = FileRecord::new("ep.mp4", Path::new("/in"));
        record.index = 4;
        record.status = RecordStatus::Planned;
        record.classification = Some(Classification::unmatched());
        record.result_folder = Some(PathBuf::from("/err"));
        record.result_filename = Some("ep.mp4".to_string());
        record.note("classification failed");

        let line = OutputFormatter::record_line(&record);
        assert!(line.starts_with("[4] "));
        assert!(line.contains("would move to /err/ep.mp4"));
        assert!(line.contains("classification failed"));
    }

    #[test]
    fn test_record_line_for_failure() {
        colored::control::set_override(false);

        let mut record = FileRecord::new("ep.mp4", Path::new("/in"));
        record.status = RecordStatus::Failed;
        assert!(OutputFormatter::record_line(&record).contains("ep.mp4 failed"));
    }
}
