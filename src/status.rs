//! Volume status summaries
//!
//! Reads what a run left on disk, so it works on volumes processed by an
//! earlier invocation.

use serde::Serialize;
use std::fmt::Write as _;
use std::io;
use std::path::Path;

use crate::report::VolumeReport;
use crate::volume::{list_volumes, VolumeLayout};

/// State of one volume
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeStatus {
    pub volume: String,
    pub processed: bool,
    /// Page images at the volume root
    pub pages: usize,
    pub cropped: usize,
    pub percent_cropped: f64,
    pub issues: usize,
    /// `None` until the volume has been audited
    pub outliers: Option<usize>,
}

impl VolumeStatus {
    /// Inspect one volume directory
    pub fn inspect(layout: &VolumeLayout, extensions: &[String]) -> io::Result<Self> {
        let pages = layout.list_pages(extensions)?.len();
        let processed = layout.is_processed();
        let cropped = layout.crop_count()?;
        let issues = layout.issue_files()?.len();
        let outliers = VolumeReport::load_outliers(&layout.z_score_path())
            .ok()
            .map(|flagged| flagged.len());

        let percent_cropped = if pages == 0 {
            0.0
        } else {
            cropped as f64 / pages as f64 * 100.0
        };

        Ok(Self {
            volume: layout.name().to_string(),
            processed,
            pages,
            cropped,
            percent_cropped,
            issues,
            outliers,
        })
    }
}

/// Status of every volume under `root`, or of `root` itself when it holds pages
pub fn collect(root: &Path, extensions: &[String]) -> io::Result<Vec<VolumeStatus>> {
    let own = VolumeLayout::new(root);
    if !own.list_pages(extensions)?.is_empty() {
        return Ok(vec![VolumeStatus::inspect(&own, extensions)?]);
    }

    list_volumes(root)?
        .into_iter()
        .map(|dir| VolumeStatus::inspect(&VolumeLayout::new(dir), extensions))
        .collect()
}

/// Plain-text table, one line per volume
pub fn render_table(statuses: &[VolumeStatus]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:>6} {:>8} {:>7} {:>8}",
        "VOLUME", "PAGES", "CROPPED", "ISSUES", "OUTLIERS"
    );
    for s in statuses {
        if !s.processed {
            let _ = writeln!(out, "{:<24} {:>6} unprocessed", s.volume, s.pages);
            continue;
        }
        let outliers = s
            .outliers
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>7.1}% {:>7} {:>8}",
            s.volume, s.pages, s.percent_cropped, s.issues, outliers
        );
    }
    out
}
