//! Page crop pipeline
//!
//! Chains the crop stages for one page and fans a volume's pages out over a
//! worker pool.
//!
//! # Page stages
//!
//! 1. Decode the image
//! 2. Primary box from two-level contours, with whitespace trimming
//! 3. Marginalia offset when the left edge strip is darker than the right
//! 4. Second pass over the left strip for header/footer bounds
//! 5. Optional vertical padding, clamping to the image
//!
//! The first stage that fails stops the page; it is routed to `issues/` with
//! the best box known at that point.

use image::{imageops, RgbImage};
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::CropConfig;
use crate::crop::{
    BoundingBox, BoundingBoxResolver, ChildMarginaliaRemover, ContourClassifier,
    ContourExtractor, CropError, MarginaliaDetector, Retrieval, Round, SecondPassCropper,
};
use crate::progress::{ProgressCallback, VolumeSummary};
use crate::report::{PageResult, ReportError, VolumeReport};
use crate::volume::VolumeLayout;

// ============================================================
// Errors
// ============================================================

/// Page stage, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Primary,
    Marginalia,
    SecondPass,
    Finalize,
    Write,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Primary => "primary",
            Stage::Marginalia => "marginalia",
            Stage::SecondPass => "second-pass",
            Stage::Finalize => "finalize",
            Stage::Write => "write",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A crop stage failure with the box known when it happened
#[derive(Debug, Error)]
#[error("{stage} stage: {source}")]
pub struct PageError {
    pub stage: Stage,
    pub best_effort: Option<BoundingBox>,
    pub source: CropError,
}

impl PageError {
    fn new(stage: Stage, best_effort: Option<BoundingBox>, source: CropError) -> Self {
        Self {
            stage,
            best_effort,
            source,
        }
    }
}

/// Volume-level errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("No page images found in {0}")]
    NoPages(PathBuf),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================
// Cancellation
// ============================================================

/// Shared stop flag; workers check it before starting a page
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================
// Page pipeline
// ============================================================

/// Successful crop of one page
#[derive(Debug, Clone)]
pub struct PageOutcome {
    /// Final box, clamped to the image
    pub bbox: BoundingBox,
    /// Pixels moved right to clear marginalia
    pub marginalia_offset: i32,
    pub crop: RgbImage,
}

/// Options for a volume run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Build the report without writing crops or copying issues
    pub report_only: bool,
}

/// Per-page crop pipeline
#[derive(Debug, Clone)]
pub struct PageCropPipeline {
    config: CropConfig,
    extractor: ContourExtractor,
    resolver: BoundingBoxResolver,
    remover: ChildMarginaliaRemover,
    second_pass: SecondPassCropper,
}

impl Default for PageCropPipeline {
    fn default() -> Self {
        Self::new(CropConfig::default())
    }
}

impl PageCropPipeline {
    pub fn new(config: CropConfig) -> Self {
        let extractor = config.extractor();
        Self {
            resolver: config.resolver(),
            remover: ChildMarginaliaRemover::new(extractor),
            second_pass: SecondPassCropper::new(extractor),
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &CropConfig {
        &self.config
    }

    /// Crop a decoded page
    pub fn crop_image(&self, image: &RgbImage) -> Result<PageOutcome, PageError> {
        let (width, height) = image.dimensions();
        let full = BoundingBox::full(width, height);

        // Primary box
        let contours = self.extractor.extract(image, Retrieval::TwoLevel);
        let records = ContourClassifier::classify((width, height), &contours, Round::Primary);
        let mut bbox = match self.resolver.resolve(image, &records, Round::Primary) {
            Ok(bbox) => bbox.clamp(width, height),
            Err(CropError::GeometryDegenerate { bbox }) => {
                return Err(PageError::new(
                    Stage::Primary,
                    Some(bbox),
                    CropError::GeometryDegenerate { bbox },
                ))
            }
            Err(e) => return Err(PageError::new(Stage::Primary, Some(full), e)),
        };
        if bbox.is_empty() {
            return Err(PageError::new(
                Stage::Primary,
                Some(bbox),
                CropError::GeometryDegenerate { bbox },
            ));
        }
        debug!(%bbox, records = records.len(), "primary box");

        // Marginalia
        let mut crop = slice(image, bbox);
        let mut marginalia_offset = 0;
        if MarginaliaDetector::detect(&crop) {
            marginalia_offset = self
                .remover
                .left_offset(&crop)
                .map_err(|e| PageError::new(Stage::Marginalia, Some(bbox), e))?;
            if marginalia_offset > 0 {
                bbox.x1 = (bbox.x1 + marginalia_offset).min(bbox.x2);
                if bbox.is_empty() {
                    return Err(PageError::new(
                        Stage::Marginalia,
                        Some(bbox),
                        CropError::GeometryDegenerate { bbox },
                    ));
                }
                crop = slice(image, bbox);
            }
            debug!(marginalia_offset, "marginalia detected");
        }

        // Second pass
        let (top, bottom) = self
            .second_pass
            .vertical_trim(&crop)
            .map_err(|e| PageError::new(Stage::SecondPass, Some(bbox), e))?;
        bbox.y1 += top;
        bbox.y2 -= bottom;

        // Padding
        let y_buffer = self.resolver.y_buffer;
        bbox = BoundingBox::new(bbox.x1, bbox.y1 - y_buffer, bbox.x2, bbox.y2 + y_buffer)
            .clamp(width, height);
        if bbox.is_empty() {
            return Err(PageError::new(
                Stage::Finalize,
                Some(bbox),
                CropError::GeometryDegenerate { bbox },
            ));
        }

        Ok(PageOutcome {
            bbox,
            marginalia_offset,
            crop: slice(image, bbox),
        })
    }

    /// Decode and crop one page file
    pub fn crop_file(&self, path: &Path) -> Result<PageOutcome, PageError> {
        let image = image::open(path)
            .map_err(|e| {
                PageError::new(Stage::Decode, None, CropError::ImageDecode(e.to_string()))
            })?
            .to_rgb8();
        self.crop_image(&image)
    }

    /// Crop one page and route it; never fails, failures become issues
    pub fn process_page(
        &self,
        layout: &VolumeLayout,
        id: usize,
        path: &Path,
        options: RunOptions,
    ) -> PageResult {
        let mut result = match self.crop_file(path) {
            Ok(outcome) => {
                let mut page = PageResult::clean(id, path, outcome.bbox);
                if !options.report_only {
                    if let Err(e) =
                        layout.save_crop(&outcome.crop, &page.filename, &self.config.crop_suffix)
                    {
                        let error = PageError::new(
                            Stage::Write,
                            Some(outcome.bbox),
                            CropError::IoError(e),
                        );
                        page.demote(&error.to_string());
                    } else if let Err(e) = layout.remove_issue(&page.filename) {
                        warn!(page = %page.filename, error = %e, "failed to remove stale issue copy");
                    }
                }
                page
            }
            Err(error) => PageResult::issue(id, path, error.best_effort, error.to_string()),
        };

        if !result.is_clean() {
            warn!(
                page = %result.filename,
                issue = result.issue.as_deref().unwrap_or_default(),
                "page routed to issues"
            );
            if !options.report_only {
                if let Err(e) = layout.remove_crop(&result.filename, &self.config.crop_suffix) {
                    warn!(page = %result.filename, error = %e, "failed to remove stale crop");
                }
                if let Err(e) = layout.copy_to_issues(path, &result.filename) {
                    warn!(page = %result.filename, error = %e, "failed to copy page to issues");
                    result.demote(&format!("copy to issues failed: {}", e));
                }
            }
        }

        result
    }

    /// Crop every page of a volume and write its report.
    ///
    /// Pages run in parallel; the report keeps page order. A cancelled run
    /// discards in-flight results and writes no report.
    pub fn run_volume(
        &self,
        layout: &VolumeLayout,
        options: RunOptions,
        progress: &dyn ProgressCallback,
        cancel: &CancelFlag,
    ) -> Result<VolumeReport, PipelineError> {
        let pages = layout.list_pages(&self.config.extensions)?;
        if pages.is_empty() {
            return Err(PipelineError::NoPages(layout.root().to_path_buf()));
        }

        info!(volume = layout.name(), pages = pages.len(), "cropping volume");
        progress.on_volume_start(layout.name(), pages.len());
        if !options.report_only {
            layout.prepare()?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()?;

        let results: Vec<Option<PageResult>> = pool.install(|| {
            pages
                .par_iter()
                .enumerate()
                .map(|(id, path)| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let result = self.process_page(layout, id, path, options);
                    progress.on_page_complete(&result);
                    Some(result)
                })
                .collect()
        });

        if cancel.is_cancelled() {
            warn!(volume = layout.name(), "run cancelled, report not written");
            return Err(PipelineError::Cancelled);
        }

        let mut report = VolumeReport::new(layout.name());
        for result in results.into_iter().flatten() {
            report.push(result);
        }

        report.write_csv(&layout.report_path())?;

        let summary = VolumeSummary::from_report(&report);
        info!(
            volume = layout.name(),
            clean = summary.clean,
            issues = summary.issues,
            "volume cropped"
        );
        progress.on_volume_complete(&summary);
        Ok(report)
    }
}

/// Copy out a box that is already clamped to the image
fn slice(image: &RgbImage, bbox: BoundingBox) -> RgbImage {
    imageops::crop_imm(
        image,
        bbox.x1.max(0) as u32,
        bbox.y1.max(0) as u32,
        bbox.width().max(0) as u32,
        bbox.height().max(0) as u32,
    )
    .to_image()
}
