//! Progress reporting

use crate::executor::BatchStats;
use crate::types::CopyResult;
use console::style;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

/// Progress reporter for copy batches
pub struct ProgressReporter {
    scan_bar: ProgressBar,
    transfer_bar: ProgressBar,
    transfer_started_at: Option<Instant>,
    transferred_bytes: u64,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        Self::with_bars(ProgressBar::new_spinner(), ProgressBar::new(0))
    }

    /// Reporter that draws nothing (JSON output, tests)
    pub fn hidden() -> Self {
        Self::with_bars(ProgressBar::hidden(), ProgressBar::hidden())
    }

    fn with_bars(scan_bar: ProgressBar, transfer_bar: ProgressBar) -> Self {
        if !scan_bar.is_hidden() {
            scan_bar.enable_steady_tick(std::time::Duration::from_millis(120));
        }
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            scan_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }
        if let Ok(style) =
            ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} files | {msg}")
        {
            transfer_bar.set_style(style.progress_chars("=>-"));
        }

        Self {
            scan_bar,
            transfer_bar,
            transfer_started_at: None,
            transferred_bytes: 0,
        }
    }

    /// Mark start of source enumeration.
    pub fn start_scan(&self, root: &Path) {
        self.scan_bar
            .set_message(format!("Scanning {}...", root.display()));
    }

    /// Update enumeration counters.
    pub fn update_scan(&self, files: u64, bytes: u64) {
        self.scan_bar.set_message(format!(
            "Scanning... {} files | {}",
            files,
            HumanBytes(bytes)
        ));
    }

    /// Mark completion of enumeration.
    pub fn finish_scan(&self, files: usize, bytes: u64) {
        self.scan_bar.finish_with_message(format!(
            "Found {} files | {}",
            files,
            HumanBytes(bytes)
        ));
    }

    /// Initialize transfer phase progress.
    pub fn start_transfer(&mut self, total_files: u64) {
        self.transfer_started_at = Some(Instant::now());
        self.transferred_bytes = 0;
        self.transfer_bar.set_length(total_files);
        self.transfer_bar.set_position(0);
        self.transfer_bar
            .set_message("Starting transfer...".to_string());
    }

    /// Update current file indicator.
    pub fn set_current_file(&self, sequence: u64, path: &Path) {
        self.transfer_bar
            .set_message(format!("#{} {}", sequence, path.display()));
    }

    /// Byte progress within the current file.
    pub fn update_file_bytes(&self, sequence: u64, bytes: u64, total: u64) {
        self.transfer_bar.set_message(format!(
            "#{} {} / {}",
            sequence,
            HumanBytes(bytes),
            HumanBytes(total)
        ));
    }

    /// Record one finished file and surface it if it failed.
    pub fn complete_file(&mut self, result: &CopyResult) {
        self.transfer_bar.inc(1);
        if result.success {
            self.transferred_bytes = self.transferred_bytes.saturating_add(result.bytes_copied);
            let throughput = self.current_throughput_bps();
            self.transfer_bar.set_message(format!(
                "{} transferred | {}/s",
                HumanBytes(self.transferred_bytes),
                HumanBytes(throughput)
            ));
        } else if result.is_critical() {
            self.transfer_bar
                .println(format_critical_line(result).to_string());
        } else if !result.is_skipped() {
            self.transfer_bar.println(format!(
                "ERROR {}: {}",
                result.target.display(),
                result.error_message
            ));
        }
    }

    /// Finalize transfer phase.
    pub fn finish_transfer(&self, stats: &BatchStats) {
        let throughput = self.current_throughput_bps();
        let mut message = format!(
            "Done: {} succeeded, {} failed, {} skipped | {} total | {}/s",
            stats.succeeded,
            stats.failed,
            stats.skipped,
            HumanBytes(stats.bytes_copied),
            HumanBytes(throughput)
        );
        if stats.cancelled {
            message.push_str(" | cancelled");
        }
        self.transfer_bar.finish_with_message(message);
    }

    fn current_throughput_bps(&self) -> u64 {
        match self.transfer_started_at {
            Some(started) => {
                let secs = started.elapsed().as_secs_f64();
                if secs > 0.0 {
                    (self.transferred_bytes as f64 / secs) as u64
                } else {
                    0
                }
            }
            None => 0,
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_critical_line(result: &CopyResult) -> console::StyledObject<String> {
    style(format!("#{} {}", result.sequence, result.error_message))
        .red()
        .bold()
}
