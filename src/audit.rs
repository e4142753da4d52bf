//! Cross-page outlier audit
//!
//! Pages of one volume share a layout, so their boxes cluster tightly. A
//! box whose coordinate sits far from the volume mean usually means the crop
//! caught a stain or lost a column.
//!
//! # Algorithm
//!
//! 1. For each audited coordinate, z = (v - mean) / s over pages that have a box
//!    (s is the sample standard deviation, n - 1, unless configured as
//!    the population one)
//! 2. Flag pages with any |z| strictly above the threshold
//! 3. Flagged pages: demote to issue, copy the original into `issues/`,
//!    delete the crop

use std::io;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AuditConfig, DEFAULT_DDOF};
use crate::crop::Coordinate;
use crate::report::{PageAudit, ReportError, VolumeReport};
use crate::volume::VolumeLayout;

/// Audit error types
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Result of auditing one volume
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditSummary {
    /// Pages that had a box to audit
    pub audited: usize,
    /// Filenames of flagged pages, report order
    pub flagged: Vec<String>,
}

/// Reason prefix for pages demoted by the audit
const OUTLIER_REASON: &str = "outlier: ";

/// Z-score outlier auditor
#[derive(Debug, Clone)]
pub struct OutlierAuditor {
    z_threshold: f64,
    coordinates: Vec<Coordinate>,
    ddof: u8,
}

impl Default for OutlierAuditor {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

impl OutlierAuditor {
    pub fn new(z_threshold: f64, coordinates: &[Coordinate]) -> Self {
        Self {
            z_threshold,
            coordinates: coordinates.to_vec(),
            ddof: DEFAULT_DDOF,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.z_threshold, &config.coordinates).with_ddof(config.ddof)
    }

    /// Use `n - ddof` as the variance divisor
    #[must_use]
    pub fn with_ddof(mut self, ddof: u8) -> Self {
        self.ddof = ddof;
        self
    }

    pub fn z_threshold(&self) -> f64 {
        self.z_threshold
    }

    /// Score every page and demote the outliers
    pub fn audit(&self, report: &mut VolumeReport) -> AuditSummary {
        let boxed: Vec<usize> = report
            .pages()
            .iter()
            .enumerate()
            .filter(|(_, p)| p.bbox.is_some())
            .map(|(i, _)| i)
            .collect();

        let mut audits = vec![PageAudit::default(); report.len()];
        for &coordinate in &self.coordinates {
            let values: Vec<f64> = boxed
                .iter()
                .filter_map(|&i| report.pages()[i].bbox)
                .map(|b| b.coordinate(coordinate) as f64)
                .collect();
            for (&i, z) in boxed.iter().zip(z_scores_with_ddof(&values, self.ddof)) {
                audits[i].set_z(coordinate, z);
            }
        }

        let mut flagged = Vec::new();
        for (page, audit) in report.pages_mut().iter_mut().zip(audits.iter_mut()) {
            let worst = self
                .coordinates
                .iter()
                .filter_map(|&c| audit.z(c).map(|z| (c, z)))
                .filter(|(_, z)| z.abs() > self.z_threshold)
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));

            if let Some((coordinate, z)) = worst {
                audit.outlier = true;
                // A re-audit keeps the reason from the first one
                let reason = format!("{}{} z={:.2}", OUTLIER_REASON, coordinate.column(), z);
                if !page.issue.as_deref().is_some_and(|i| i.contains(OUTLIER_REASON)) {
                    page.demote(&reason);
                }
                flagged.push(page.filename.clone());
            }
        }

        report.set_audit(audits);
        AuditSummary {
            audited: boxed.len(),
            flagged,
        }
    }

    /// Audit, move flagged pages to `issues/`, write both reports
    pub fn apply(
        &self,
        layout: &VolumeLayout,
        report: &mut VolumeReport,
        crop_suffix: &str,
    ) -> Result<AuditSummary, AuditError> {
        let summary = self.audit(report);

        for filename in &summary.flagged {
            let Some(page) = report.page(filename) else {
                continue;
            };
            if page.source_path.exists() {
                if let Err(e) = layout.copy_to_issues(&page.source_path, filename) {
                    warn!(page = %filename, error = %e, "failed to copy outlier to issues");
                }
            }
            if let Err(e) = layout.remove_crop(filename, crop_suffix) {
                warn!(page = %filename, error = %e, "failed to remove outlier crop");
            }
        }

        report.write_csv(&layout.report_path())?;
        report.write_z_scores(&layout.z_score_path())?;

        info!(
            volume = layout.name(),
            audited = summary.audited,
            outliers = summary.flagged.len(),
            "audit complete"
        );
        Ok(summary)
    }

    /// Reload a volume's report and audit it
    pub fn audit_volume(
        &self,
        layout: &VolumeLayout,
        crop_suffix: &str,
    ) -> Result<(VolumeReport, AuditSummary), AuditError> {
        let mut report = VolumeReport::load(&layout.report_path(), layout.name())?;
        let summary = self.apply(layout, &mut report, crop_suffix)?;
        Ok((report, summary))
    }
}

/// Standard scores with the sample standard deviation.
///
/// Fewer than two values or zero spread give all zeros.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    z_scores_with_ddof(values, DEFAULT_DDOF)
}

/// Standard scores dividing the variance by `n - ddof`
pub fn z_scores_with_ddof(values: &[f64], ddof: u8) -> Vec<f64> {
    let n = values.len();
    if n < 2 || n <= ddof as usize {
        return vec![0.0; n];
    }

    let mean = values.iter().sum::<f64>() / n as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - ddof as usize) as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 || !std_dev.is_finite() {
        return vec![0.0; n];
    }

    values.iter().map(|v| (v - mean) / std_dev).collect()
}
