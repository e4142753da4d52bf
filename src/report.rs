//! Per-volume bounding box report
//!
//! One [`PageResult`] per page, appended in page order and written out once
//! the volume is done. After auditing, each row also carries its z-scores.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crop::{BoundingBox, Coordinate};
use crate::volume::persist_atomically;

/// Report error types
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report not found: {0}")]
    NotFound(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Page routing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    #[default]
    Clean,
    Issue,
}

/// Outcome for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Row id, page order within the volume
    pub id: usize,
    pub source_path: PathBuf,
    pub filename: String,
    /// Final box, `None` when the image could not be decoded
    pub bbox: Option<BoundingBox>,
    pub status: PageStatus,
    /// Why the page is an issue
    pub issue: Option<String>,
}

impl PageResult {
    /// Page cropped without problems
    pub fn clean(id: usize, source_path: impl Into<PathBuf>, bbox: BoundingBox) -> Self {
        let source_path = source_path.into();
        Self {
            id,
            filename: file_name(&source_path),
            source_path,
            bbox: Some(bbox),
            status: PageStatus::Clean,
            issue: None,
        }
    }

    /// Page that needs human review
    pub fn issue(
        id: usize,
        source_path: impl Into<PathBuf>,
        bbox: Option<BoundingBox>,
        reason: impl Into<String>,
    ) -> Self {
        let source_path = source_path.into();
        Self {
            id,
            filename: file_name(&source_path),
            source_path,
            bbox,
            status: PageStatus::Issue,
            issue: Some(reason.into()),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.status == PageStatus::Clean
    }

    /// Clean -> Issue; an existing reason is kept in front
    pub(crate) fn demote(&mut self, reason: &str) {
        self.status = PageStatus::Issue;
        self.issue = Some(match self.issue.take() {
            Some(existing) => format!("{}; {}", existing, reason),
            None => reason.to_string(),
        });
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Audit columns for one page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageAudit {
    pub x1_z: Option<f64>,
    pub y1_z: Option<f64>,
    pub x2_z: Option<f64>,
    pub y2_z: Option<f64>,
    pub outlier: bool,
}

impl PageAudit {
    pub fn z(&self, coordinate: Coordinate) -> Option<f64> {
        match coordinate {
            Coordinate::X1 => self.x1_z,
            Coordinate::Y1 => self.y1_z,
            Coordinate::X2 => self.x2_z,
            Coordinate::Y2 => self.y2_z,
        }
    }

    pub(crate) fn set_z(&mut self, coordinate: Coordinate, z: f64) {
        let slot = match coordinate {
            Coordinate::X1 => &mut self.x1_z,
            Coordinate::Y1 => &mut self.y1_z,
            Coordinate::X2 => &mut self.x2_z,
            Coordinate::Y2 => &mut self.y2_z,
        };
        *slot = Some(z);
    }
}

/// Append-only page report for one volume
#[derive(Debug, Clone, Default)]
pub struct VolumeReport {
    volume: String,
    pages: Vec<PageResult>,
    audit: Option<Vec<PageAudit>>,
}

impl VolumeReport {
    pub fn new(volume: impl Into<String>) -> Self {
        Self {
            volume: volume.into(),
            pages: Vec::new(),
            audit: None,
        }
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn push(&mut self, page: PageResult) {
        self.pages.push(page);
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Look up a page by filename
    pub fn page(&self, filename: &str) -> Option<&PageResult> {
        self.pages.iter().find(|p| p.filename == filename)
    }

    /// Audit columns, present once the auditor has run
    pub fn audit(&self) -> Option<&[PageAudit]> {
        self.audit.as_deref()
    }

    pub fn clean_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_clean()).count()
    }

    pub fn issue_count(&self) -> usize {
        self.pages.len() - self.clean_count()
    }

    pub fn outlier_count(&self) -> usize {
        self.audit
            .as_ref()
            .map(|rows| rows.iter().filter(|a| a.outlier).count())
            .unwrap_or(0)
    }

    pub(crate) fn pages_mut(&mut self) -> &mut [PageResult] {
        &mut self.pages
    }

    pub(crate) fn set_audit(&mut self, audit: Vec<PageAudit>) {
        debug_assert_eq!(audit.len(), self.pages.len());
        self.audit = Some(audit);
    }

    // ============================================================
    // CSV persistence
    // ============================================================

    /// Write the bounding box report, replacing any previous one atomically
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        persist_atomically(path, |file: &mut File| -> Result<()> {
            let mut writer = csv::Writer::from_writer(file);
            for page in &self.pages {
                writer.serialize(ReportRow::from(page))?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Write the report with z-score and outlier columns
    pub fn write_z_scores(&self, path: &Path) -> Result<()> {
        let default_audit = PageAudit::default();
        persist_atomically(path, |file: &mut File| -> Result<()> {
            let mut writer = csv::Writer::from_writer(file);
            for (i, page) in self.pages.iter().enumerate() {
                let audit = self
                    .audit
                    .as_ref()
                    .and_then(|rows| rows.get(i))
                    .unwrap_or(&default_audit);
                writer.serialize(ZScoreRow::new(page, audit))?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    /// Load a report written by [`VolumeReport::write_csv`]
    pub fn load(path: &Path, volume: impl Into<String>) -> Result<Self> {
        if !path.exists() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut report = Self::new(volume);
        for row in reader.deserialize::<ReportRow>() {
            report.push(row?.into());
        }
        Ok(report)
    }

    /// Outlier flags from a z-score report, by filename
    pub fn load_outliers(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let mut flagged = Vec::new();
        for row in reader.deserialize::<ZScoreRow>() {
            let row = row?;
            if row.outlier {
                flagged.push(row.filename);
            }
        }
        Ok(flagged)
    }
}

// ============================================================
// Row schema
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    id: usize,
    path: PathBuf,
    filename: String,
    bbox_x1: Option<i32>,
    bbox_y1: Option<i32>,
    bbox_x2: Option<i32>,
    bbox_y2: Option<i32>,
    status: PageStatus,
    issue: Option<String>,
}

impl From<&PageResult> for ReportRow {
    fn from(page: &PageResult) -> Self {
        Self {
            id: page.id,
            path: page.source_path.clone(),
            filename: page.filename.clone(),
            bbox_x1: page.bbox.map(|b| b.x1),
            bbox_y1: page.bbox.map(|b| b.y1),
            bbox_x2: page.bbox.map(|b| b.x2),
            bbox_y2: page.bbox.map(|b| b.y2),
            status: page.status,
            issue: page.issue.clone(),
        }
    }
}

impl From<ReportRow> for PageResult {
    fn from(row: ReportRow) -> Self {
        let bbox = match (row.bbox_x1, row.bbox_y1, row.bbox_x2, row.bbox_y2) {
            (Some(x1), Some(y1), Some(x2), Some(y2)) => Some(BoundingBox::new(x1, y1, x2, y2)),
            _ => None,
        };
        Self {
            id: row.id,
            source_path: row.path,
            filename: row.filename,
            bbox,
            status: row.status,
            issue: row.issue.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ZScoreRow {
    id: usize,
    path: PathBuf,
    filename: String,
    bbox_x1: Option<i32>,
    bbox_y1: Option<i32>,
    bbox_x2: Option<i32>,
    bbox_y2: Option<i32>,
    status: PageStatus,
    issue: Option<String>,
    bbox_x1_z: Option<f64>,
    bbox_y1_z: Option<f64>,
    bbox_x2_z: Option<f64>,
    bbox_y2_z: Option<f64>,
    outlier: bool,
}

impl ZScoreRow {
    fn new(page: &PageResult, audit: &PageAudit) -> Self {
        let base = ReportRow::from(page);
        Self {
            id: base.id,
            path: base.path,
            filename: base.filename,
            bbox_x1: base.bbox_x1,
            bbox_y1: base.bbox_y1,
            bbox_x2: base.bbox_x2,
            bbox_y2: base.bbox_y2,
            status: base.status,
            issue: base.issue,
            bbox_x1_z: audit.x1_z,
            bbox_y1_z: audit.y1_z,
            bbox_x2_z: audit.x2_z,
            bbox_y2_z: audit.y2_z,
            outlier: audit.outlier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> VolumeReport {
        let mut report = VolumeReport::new("1904");
        report.push(PageResult::clean(
            0,
            "/vol/1904/p001.jpg",
            BoundingBox::new(40, 50, 360, 560),
        ));
        report.push(PageResult::issue(
            1,
            "/vol/1904/p002.jpg",
            None,
            "decode stage: Image decode failed: bad header",
        ));
        report.push(PageResult::issue(
            2,
            "/vol/1904/p003.jpg",
            Some(BoundingBox::new(0, 0, 400, 600)),
            "primary stage: No content found",
        ));
        report
    }

    #[test]
    fn test_page_result_constructors() {
        let page = PageResult::clean(4, "/a/b/page_005.jpg", BoundingBox::new(1, 2, 3, 4));
        assert_eq!(page.filename, "page_005.jpg");
        assert!(page.is_clean());
        assert!(page.issue.is_none());

        let issue = PageResult::issue(5, "/a/b/page_006.jpg", None, "broken");
        assert_eq!(issue.status, PageStatus::Issue);
        assert_eq!(issue.issue.as_deref(), Some("broken"));
    }

    #[test]
    fn test_demote_keeps_existing_reason() {
        let mut page = PageResult::issue(0, "p.jpg", None, "first");
        page.demote("second");
        assert_eq!(page.issue.as_deref(), Some("first; second"));

        let mut clean = PageResult::clean(1, "q.jpg", BoundingBox::default());
        clean.demote("outlier");
        assert_eq!(clean.status, PageStatus::Issue);
        assert_eq!(clean.issue.as_deref(), Some("outlier"));
    }

    #[test]
    fn test_counts() {
        let report = sample_report();
        assert_eq!(report.len(), 3);
        assert_eq!(report.clean_count(), 1);
        assert_eq!(report.issue_count(), 2);
        assert_eq!(report.outlier_count(), 0);
        assert!(report.page("p002.jpg").is_some());
    }

    #[test]
    fn test_csv_reload_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1904_contourreport.csv");

        let report = sample_report();
        report.write_csv(&path).unwrap();

        let loaded = VolumeReport::load(&path, "1904").unwrap();
        assert_eq!(loaded.pages(), report.pages());
    }

    #[test]
    fn test_csv_header_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        sample_report().write_csv(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "id,path,filename,bbox_x1,bbox_y1,bbox_x2,bbox_y2,status,issue"
        );
        // Undecodable page has empty geometry cells
        assert!(content.contains("p002.jpg,,,,,issue,"));
    }

    #[test]
    fn test_z_score_report_outliers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1904_z-scores.csv");

        let mut report = sample_report();
        let mut flagged = PageAudit::default();
        flagged.set_z(Coordinate::X1, 3.2);
        flagged.outlier = true;
        report.set_audit(vec![PageAudit::default(), PageAudit::default(), flagged]);
        report.write_z_scores(&path).unwrap();

        let outliers = VolumeReport::load_outliers(&path).unwrap();
        assert_eq!(outliers, vec!["p003.jpg".to_string()]);
        assert_eq!(report.outlier_count(), 1);

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "id,path,filename,bbox_x1,bbox_y1,bbox_x2,bbox_y2,status,issue,bbox_x1_z,bbox_y1_z,bbox_x2_z,bbox_y2_z,outlier"
        ));
    }

    #[test]
    fn test_load_missing_report() {
        let result = VolumeReport::load(Path::new("/nonexistent/report.csv"), "x");
        assert!(matches!(result, Err(ReportError::NotFound(_))));
    }
}
