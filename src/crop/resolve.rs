//! Primary bounding box resolution
//!
//! # Algorithm
//!
//! 1. Horizontal bounds from the single largest record (first one on ties)
//! 2. Vertical bounds from the union of all records
//! 3. Primary round only: walk the left/right edges inwards in 5 px steps
//!    while the edge strip is brighter than the centre strip
//! 4. Pad horizontally by `x_buffer`

use image::RgbImage;
use tracing::debug;

use super::region_mean;
use super::types::{BoundingBox, ContourRecord, CropError, Result, Round};
use super::{DEFAULT_MAX_TRIM_PASSES, DEFAULT_X_BUFFER, DEFAULT_Y_BUFFER};

// ============================================================
// Constants
// ============================================================

/// Width of the brightness sampling strips and trim step
const TRIM_STEP: i32 = 5;

/// Narrowest span the trim loop may leave
const MIN_TRIM_SPAN: i32 = TRIM_STEP * 2;

/// Content bounding box resolver
#[derive(Debug, Clone, Copy)]
pub struct BoundingBoxResolver {
    /// Horizontal padding added to both sides
    pub x_buffer: i32,
    /// Vertical padding; applied by the page pipeline after the second pass
    pub y_buffer: i32,
    /// Maximum centre-resampling passes of the trim loop
    pub max_trim_passes: usize,
}

impl Default for BoundingBoxResolver {
    fn default() -> Self {
        Self {
            x_buffer: DEFAULT_X_BUFFER,
            y_buffer: DEFAULT_Y_BUFFER,
            max_trim_passes: DEFAULT_MAX_TRIM_PASSES,
        }
    }
}

impl BoundingBoxResolver {
    /// Create a resolver with the given padding
    pub fn new(x_buffer: i32, y_buffer: i32) -> Self {
        Self {
            x_buffer,
            y_buffer,
            ..Default::default()
        }
    }

    /// Set the trim pass bound
    #[must_use]
    pub fn with_max_trim_passes(mut self, passes: usize) -> Self {
        self.max_trim_passes = passes.max(1);
        self
    }

    /// Resolve the content box, unclamped
    pub fn resolve(
        &self,
        image: &RgbImage,
        records: &[ContourRecord],
        round: Round,
    ) -> Result<BoundingBox> {
        let (mut min_x, mut max_x, min_y, max_y) = Self::raw_extents(records)?;

        if round == Round::Primary {
            (min_x, max_x) = self.trim_whitespace(image, min_x, max_x, min_y, max_y)?;
        }

        Ok(BoundingBox::new(
            min_x - self.x_buffer,
            min_y,
            max_x + self.x_buffer,
            max_y,
        ))
    }

    /// `(min_x, max_x, min_y, max_y)` before trimming and padding
    pub fn raw_extents(records: &[ContourRecord]) -> Result<(i32, i32, i32, i32)> {
        match records {
            [] => Err(CropError::NoContentFound),
            [only] => Ok((only.x, only.right(), only.y, only.bottom())),
            _ => {
                let largest = Self::largest(records).ok_or(CropError::NoContentFound)?;
                let (min_y, max_y) = vertical_union(records).ok_or(CropError::NoContentFound)?;
                Ok((largest.x, largest.right(), min_y, max_y))
            }
        }
    }

    /// First record with the maximum area
    pub fn largest(records: &[ContourRecord]) -> Option<&ContourRecord> {
        records.iter().fold(None, |best, r| match best {
            Some(b) if b.area >= r.area => Some(b),
            _ => Some(r),
        })
    }

    /// Shrink `[min_x, max_x)` past blank margins.
    ///
    /// Repeats until a full pass leaves both edges in place, so the result is
    /// a fixed point of this function.
    pub fn trim_whitespace(
        &self,
        image: &RgbImage,
        mut min_x: i32,
        mut max_x: i32,
        min_y: i32,
        max_y: i32,
    ) -> Result<(i32, i32)> {
        let degenerate = |min_x: i32, max_x: i32| CropError::GeometryDegenerate {
            bbox: BoundingBox::new(min_x, min_y, max_x, max_y)
                .clamp(image.width(), image.height()),
        };

        for pass in 0..self.max_trim_passes {
            let centre = min_x + (max_x - min_x) / 2;
            let centre_x0 = centre - TRIM_STEP / 2;
            let Some(mid) = region_mean(image, centre_x0, centre_x0 + TRIM_STEP, min_y, max_y)
            else {
                return Err(degenerate(min_x, max_x));
            };

            let mut moved = false;

            while let Some(right) = region_mean(image, max_x - TRIM_STEP, max_x, min_y, max_y) {
                if right <= mid {
                    break;
                }
                if max_x - TRIM_STEP - min_x < MIN_TRIM_SPAN {
                    return Err(degenerate(min_x, max_x));
                }
                max_x -= TRIM_STEP;
                moved = true;
            }

            while let Some(left) = region_mean(image, min_x, min_x + TRIM_STEP, min_y, max_y) {
                if left <= mid {
                    break;
                }
                if max_x - (min_x + TRIM_STEP) < MIN_TRIM_SPAN {
                    return Err(degenerate(min_x, max_x));
                }
                min_x += TRIM_STEP;
                moved = true;
            }

            if !moved {
                debug!(pass, min_x, max_x, "whitespace trim converged");
                return Ok((min_x, max_x));
            }
        }

        debug!(min_x, max_x, "whitespace trim hit pass limit");
        Ok((min_x, max_x))
    }
}

/// Topmost y and lowest bottom over all records
pub(crate) fn vertical_union(records: &[ContourRecord]) -> Option<(i32, i32)> {
    let min_y = records.iter().map(|r| r.y).min()?;
    let max_y = records.iter().map(|r| r.bottom()).max()?;
    Some((min_y, max_y))
}
