//! Contour classification
//!
//! Turns raw contours into [`ContourRecord`]s, discarding shapes that are
//! scanner noise rather than printed text blocks.

use imageproc::geometry::{contour_area, min_area_rect};

use super::types::{ContourRecord, RawContour, Round};

// ============================================================
// Constants
// ============================================================

/// Near-square ratio band for small particles (exclusive)
const PARTICLE_RATIO_RANGE: (f64, f64) = (0.9, 1.5);

/// Area fraction under which particles, watermarks and band noise are dropped
const SMALL_AREA_FRACTION: f64 = 0.1;

/// Area fraction under which edge-hugging contours are dropped
const EDGE_AREA_FRACTION: f64 = 0.2;

/// Discovery indices where scanner watermarks show up
const WATERMARK_INDICES: usize = 2;

/// Outer width fraction counted as the page edge
const EDGE_WIDTH_FRACTION: f64 = 0.01;

/// Rightmost width fraction where binding shadows appear
const SHADOW_WIDTH_FRACTION: f64 = 0.97;

/// Shadows are tall and thin
const SHADOW_MAX_RATIO: f64 = 0.75;

/// Top/bottom height fraction treated as header/footer noise band
const STRIP_BAND_FRACTION: f64 = 0.025;

/// Heuristic contour classifier
pub struct ContourClassifier;

impl ContourClassifier {
    /// Classify contours found in an image of `dimensions` (width, height)
    pub fn classify(
        dimensions: (u32, u32),
        contours: &[RawContour],
        round: Round,
    ) -> Vec<ContourRecord> {
        let (width, height) = dimensions;

        contours
            .iter()
            .enumerate()
            .filter_map(|(index, contour)| Self::measure(index, contour))
            .filter(|record| Self::keep(record, width, height, round))
            .collect()
    }

    /// Geometry of one contour; `None` for a contour without points
    fn measure(index: usize, contour: &RawContour) -> Option<ContourRecord> {
        if contour.points.is_empty() {
            return None;
        }

        let corners = min_area_rect(&contour.points);
        let min_x = corners.iter().map(|p| p.x).min()?;
        let max_x = corners.iter().map(|p| p.x).max()?;
        let min_y = corners.iter().map(|p| p.y).min()?;
        let max_y = corners.iter().map(|p| p.y).max()?;

        let width = max_x - min_x + 1;
        let height = max_y - min_y + 1;

        Some(ContourRecord {
            index,
            x: min_x,
            y: min_y,
            width,
            height,
            area: contour_area(&contour.points).abs(),
            width_height_ratio: width as f64 / height as f64,
            is_child: contour.parent.is_some(),
            parent_index: contour.parent,
        })
    }

    fn keep(record: &ContourRecord, width: u32, height: u32, round: Round) -> bool {
        match round {
            Round::Primary => !Self::is_primary_noise(record, width, height),
            Round::Strip => !Self::is_band_noise(record, width, height),
        }
    }

    fn is_primary_noise(record: &ContourRecord, width: u32, height: u32) -> bool {
        let (w, h) = (width as f64, height as f64);
        let image_area = w * h;
        let x = record.x as f64;
        let ratio = record.width_height_ratio;
        let small = record.area < image_area * SMALL_AREA_FRACTION;

        let particle = ratio > PARTICLE_RATIO_RANGE.0 && ratio < PARTICLE_RATIO_RANGE.1 && small;
        let watermark = record.index < WATERMARK_INDICES && small;
        let edge_artifact = (x < w * EDGE_WIDTH_FRACTION || x > w * (1.0 - EDGE_WIDTH_FRACTION))
            && record.area < image_area * EDGE_AREA_FRACTION;
        let shadow = x > w * SHADOW_WIDTH_FRACTION && ratio < SHADOW_MAX_RATIO;

        particle || watermark || edge_artifact || shadow
    }

    fn is_band_noise(record: &ContourRecord, width: u32, height: u32) -> bool {
        let (w, h) = (width as f64, height as f64);
        let y = record.y as f64;

        let in_band = y < h * STRIP_BAND_FRACTION || y > h * (1.0 - STRIP_BAND_FRACTION);
        in_band && record.area < w * h * SMALL_AREA_FRACTION
    }
}
