//! Progress tracking for volume runs.
//!
//! Workers report through [`ProgressCallback`]; the CLI plugs in a progress
//! bar, library callers can use [`SilentProgress`].

use serde::Serialize;
use std::fmt;
use std::time::Instant;

use crate::report::{PageResult, VolumeReport};

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// No output
    Quiet,
    /// Volume-level output
    #[default]
    Normal,
    /// Per-page issues
    Verbose,
    /// Every page
    VeryVerbose,
}

impl OutputMode {
    /// Create OutputMode from verbosity level
    pub fn from_verbosity(level: u8) -> Self {
        match level {
            0 => OutputMode::Normal,
            1 => OutputMode::Verbose,
            _ => OutputMode::VeryVerbose,
        }
    }

    /// Check if output should be shown at this mode
    pub fn should_show(&self, required: OutputMode) -> bool {
        use OutputMode::*;
        match (self, required) {
            (Quiet, _) => false,
            (Normal, Quiet | Normal) => true,
            (Verbose, Quiet | Normal | Verbose) => true,
            (VeryVerbose, _) => true,
            _ => false,
        }
    }
}

/// Callbacks from a volume run; called from worker threads
pub trait ProgressCallback: Send + Sync {
    fn on_volume_start(&self, _volume: &str, _pages: usize) {}
    fn on_page_complete(&self, _page: &PageResult) {}
    fn on_volume_complete(&self, _summary: &VolumeSummary) {}
}

/// Callback that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressCallback for SilentProgress {}

/// Page counts for one volume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeSummary {
    pub volume: String,
    pub pages: usize,
    pub clean: usize,
    pub issues: usize,
    pub outliers: usize,
}

impl VolumeSummary {
    pub fn from_report(report: &VolumeReport) -> Self {
        Self {
            volume: report.volume().to_string(),
            pages: report.len(),
            clean: report.clean_count(),
            issues: report.issue_count(),
            outliers: report.outlier_count(),
        }
    }

    pub fn percent_clean(&self) -> f64 {
        if self.pages == 0 {
            return 0.0;
        }
        self.clean as f64 / self.pages as f64 * 100.0
    }
}

impl fmt::Display for VolumeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pages, {} clean ({:.1}%), {} issues, {} outliers",
            self.volume,
            self.pages,
            self.clean,
            self.percent_clean(),
            self.issues,
            self.outliers
        )
    }
}

/// Run-wide tally across volumes
#[derive(Debug)]
pub struct ProgressTracker {
    pub volumes_done: usize,
    pub volumes_skipped: usize,
    pub volumes_failed: usize,
    pub pages: usize,
    pub issues: usize,
    start_time: Instant,
    output_mode: OutputMode,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(OutputMode::Normal)
    }
}

impl ProgressTracker {
    pub fn new(output_mode: OutputMode) -> Self {
        Self {
            volumes_done: 0,
            volumes_skipped: 0,
            volumes_failed: 0,
            pages: 0,
            issues: 0,
            start_time: Instant::now(),
            output_mode,
        }
    }

    pub fn record(&mut self, summary: &VolumeSummary) {
        self.volumes_done += 1;
        self.pages += summary.pages;
        self.issues += summary.issues;
        if self.output_mode.should_show(OutputMode::Normal) {
            println!("  {}", summary);
        }
    }

    pub fn skip(&mut self, volume: &str) {
        self.volumes_skipped += 1;
        if self.output_mode.should_show(OutputMode::Verbose) {
            println!("  {}: already processed, skipped", volume);
        }
    }

    pub fn fail(&mut self, volume: &str, error: &dyn fmt::Display) {
        self.volumes_failed += 1;
        if self.output_mode.should_show(OutputMode::Quiet) {
            eprintln!("  {}: {}", volume, error);
        }
    }

    /// Get elapsed time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Print final summary
    pub fn print_summary(&self) {
        if !self.output_mode.should_show(OutputMode::Normal) {
            return;
        }
        println!();
        println!("{}", "=".repeat(60));
        println!("Crop Summary");
        println!("{}", "=".repeat(60));
        println!("  Volumes:  {}", self.volumes_done);
        println!("  Skipped:  {}", self.volumes_skipped);
        println!("  Failed:   {}", self.volumes_failed);
        println!("  Pages:    {}", self.pages);
        println!("  Issues:   {}", self.issues);
        println!("  Elapsed:  {:.2}s", self.elapsed_secs());
        println!("{}", "=".repeat(60));
    }
}
