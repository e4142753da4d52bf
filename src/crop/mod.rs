//! Page Region Crop module
//!
//! Finds the printed-content region of a scanned book page from ink contours
//! and refines it in several passes.
//!
//! # Stages
//!
//! 1. [`ContourExtractor`] - binarize, dilate into text blocks, trace contours
//! 2. [`ContourClassifier`] - drop particles, watermarks, edge artifacts and shadows
//! 3. [`BoundingBoxResolver`] - primary box plus whitespace trimming
//! 4. [`MarginaliaDetector`] / [`ChildMarginaliaRemover`] - left marginalia offset
//! 5. [`SecondPassCropper`] - header/footer refinement from the left strip
//!
//! # Example
//!
//! ```rust,no_run
//! use bookcrop::crop::{BoundingBoxResolver, ContourClassifier, ContourExtractor, Retrieval, Round};
//!
//! let page = image::open("page_001.jpg").unwrap().to_rgb8();
//! let contours = ContourExtractor::new(30).extract(&page, Retrieval::TwoLevel);
//! let records = ContourClassifier::classify(page.dimensions(), &contours, Round::Primary);
//! let bbox = BoundingBoxResolver::default()
//!     .resolve(&page, &records, Round::Primary)
//!     .unwrap();
//! println!("content: {}", bbox);
//! ```

mod classify;
mod extract;
mod marginalia;
mod resolve;
mod second_pass;
mod types;

pub use classify::ContourClassifier;
pub use extract::ContourExtractor;
pub use marginalia::{ChildMarginaliaRemover, MarginaliaDetector, StripMeans};
pub use resolve::BoundingBoxResolver;
pub use second_pass::SecondPassCropper;
pub use types::{
    BoundingBox, ContourRecord, Coordinate, CropError, RawContour, Result, Retrieval, Round,
};

use image::RgbImage;

// ============================================================
// Constants
// ============================================================

/// Luma at or below which a pixel counts as ink
pub const INK_THRESHOLD: u8 = 140;

/// Default dilation passes with the 3x3 cross
pub const DEFAULT_DILATION_ITERATIONS: u8 = 30;

/// Default horizontal padding in pixels
pub const DEFAULT_X_BUFFER: i32 = 20;

/// Default bound on whitespace trim passes
pub const DEFAULT_MAX_TRIM_PASSES: usize = 16;

/// Default vertical padding in pixels; the crop keeps the second-pass bounds
pub const DEFAULT_Y_BUFFER: i32 = 0;

/// Mean sample value over a rectangular region, all channels included.
///
/// The region is intersected with the image first; `None` when nothing is left.
pub(crate) fn region_mean(image: &RgbImage, x0: i32, x1: i32, y0: i32, y1: i32) -> Option<f64> {
    let (width, height) = image.dimensions();
    let x0 = x0.clamp(0, width as i32) as u32;
    let x1 = x1.clamp(0, width as i32) as u32;
    let y0 = y0.clamp(0, height as i32) as u32;
    let y1 = y1.clamp(0, height as i32) as u32;

    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = image.get_pixel(x, y).0;
            sum += p[0] as u64 + p[1] as u64 + p[2] as u64;
        }
    }

    let samples = (x1 - x0) as u64 * (y1 - y0) as u64 * 3;
    Some(sum as f64 / samples as f64)
}
