//! # bookcrop
//!
//! Crops scanned law-book pages to their printed content and audits each
//! volume's boxes for pages where the crop went wrong.
//!
//! ## Features
//!
//! - Contour-based content detection with noise filtering
//! - Whitespace trimming, marginalia removal and header/footer refinement
//! - Parallel per-page processing with atomic output writes
//! - Z-score outlier audit across a volume
//!
//! ## Example
//!
//! ```rust,no_run
//! use bookcrop::{CancelFlag, CropConfig, PageCropPipeline, RunOptions, SilentProgress, VolumeLayout};
//!
//! let pipeline = PageCropPipeline::new(CropConfig::default());
//! let layout = VolumeLayout::new("/scans/1904");
//! let report = pipeline
//!     .run_volume(&layout, RunOptions::default(), &SilentProgress, &CancelFlag::new())
//!     .unwrap();
//! println!("{} of {} pages clean", report.clean_count(), report.len());
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod crop;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod status;
pub mod volume;

// Re-exports for convenience
pub use audit::{z_scores, z_scores_with_ddof, AuditError, AuditSummary, OutlierAuditor};
pub use cli::{exit_codes, AuditArgs, Cli, Commands, CropArgs, StatusArgs};
pub use config::{AuditConfig, CliOverrides, ConfigError, CropConfig, CropConfigBuilder};
pub use crop::{
    BoundingBox, BoundingBoxResolver, ChildMarginaliaRemover, ContourClassifier,
    ContourExtractor, ContourRecord, Coordinate, CropError, MarginaliaDetector, Retrieval, Round,
    SecondPassCropper,
};
pub use pipeline::{
    CancelFlag, PageCropPipeline, PageError, PageOutcome, PipelineError, RunOptions, Stage,
};
pub use progress::{OutputMode, ProgressCallback, ProgressTracker, SilentProgress, VolumeSummary};
pub use report::{PageAudit, PageResult, PageStatus, ReportError, VolumeReport};
pub use status::VolumeStatus;
pub use volume::{list_volumes, VolumeLayout};
