//! Second vertical pass over the left strip
//!
//! Running heads and folio lines are usually flush left, so the leftmost
//! tenth of the crop isolates them from the body text. The vertical span of
//! what survives there decides how much to shave off the top and bottom.

use image::{imageops, RgbImage};

use super::classify::ContourClassifier;
use super::extract::ContourExtractor;
use super::resolve::vertical_union;
use super::types::{BoundingBox, CropError, Result, Retrieval, Round};

/// Strip width as a fraction of crop width
const LEFT_STRIP_FRACTION: f64 = 0.1;

/// Header/footer refinement from the left strip
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondPassCropper {
    extractor: ContourExtractor,
}

impl SecondPassCropper {
    pub fn new(extractor: ContourExtractor) -> Self {
        Self { extractor }
    }

    /// `(top_diff, bottom_diff)` to add to `y1` and subtract from `y2`
    pub fn vertical_trim(&self, crop: &RgbImage) -> Result<(i32, i32)> {
        let (width, height) = crop.dimensions();
        let strip_width = (width as f64 * LEFT_STRIP_FRACTION) as u32;
        if strip_width == 0 || height == 0 {
            return Err(CropError::GeometryDegenerate {
                bbox: BoundingBox::full(width, height),
            });
        }

        let strip = imageops::crop_imm(crop, 0, 0, strip_width, height).to_image();
        let contours = self.extractor.extract(&strip, Retrieval::External);
        let records = ContourClassifier::classify(strip.dimensions(), &contours, Round::Strip);

        let (min_y, max_y) = vertical_union(&records).ok_or(CropError::NoContentFound)?;
        Ok((min_y, height as i32 - max_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::test_support::page_with_blocks;

    #[test]
    fn test_full_height_text_keeps_bounds() {
        let crop = page_with_blocks(300, 500, &[(0, 0, 300, 500)]);
        let cropper = SecondPassCropper::new(ContourExtractor::new(2));
        assert_eq!(cropper.vertical_trim(&crop).unwrap(), (0, 0));
    }

    #[test]
    fn test_blank_top_and_bottom_are_trimmed() {
        // Body text starts 60 px down and ends 40 px above the bottom
        let crop = page_with_blocks(300, 500, &[(5, 60, 290, 460)]);
        let cropper = SecondPassCropper::new(ContourExtractor::new(2));

        let (top, bottom) = cropper.vertical_trim(&crop).unwrap();
        assert_eq!(top, 58);
        assert_eq!(bottom, 38);
    }

    #[test]
    fn test_span_covers_all_strip_blocks() {
        // Running head plus body, both reaching into the left strip
        let crop = page_with_blocks(300, 500, &[(5, 30, 120, 45), (5, 80, 290, 440)]);
        let cropper = SecondPassCropper::new(ContourExtractor::new(2));

        let (top, bottom) = cropper.vertical_trim(&crop).unwrap();
        assert_eq!(top, 28);
        assert_eq!(bottom, 58);
    }

    #[test]
    fn test_small_band_noise_is_ignored() {
        // Speck in the top 2.5% band, body lower down
        let crop = page_with_blocks(300, 500, &[(10, 2, 14, 6), (5, 100, 290, 400)]);
        let cropper = SecondPassCropper::new(ContourExtractor::new(2));

        let (top, _) = cropper.vertical_trim(&crop).unwrap();
        assert_eq!(top, 98);
    }

    #[test]
    fn test_blank_strip_is_no_content() {
        let crop = page_with_blocks(300, 500, &[(200, 100, 290, 400)]);
        let result = SecondPassCropper::new(ContourExtractor::new(2)).vertical_trim(&crop);
        assert!(matches!(result, Err(CropError::NoContentFound)));
    }

    #[test]
    fn test_too_narrow_crop_is_degenerate() {
        let crop = page_with_blocks(5, 500, &[(0, 0, 5, 500)]);
        let result = SecondPassCropper::default().vertical_trim(&crop);
        assert!(matches!(result, Err(CropError::GeometryDegenerate { .. })));
    }
}
