//! Left-margin marginalia detection and removal
//!
//! After the primary crop, annotations printed in the left margin can still
//! sit inside the box. The detector compares the brightness of the left and
//! right edge strips; the remover measures how far the crop has to move right
//! to clear them.

use image::RgbImage;

use super::classify::ContourClassifier;
use super::extract::ContourExtractor;
use super::region_mean;
use super::resolve::BoundingBoxResolver;
use super::types::{CropError, Result, Retrieval, Round};

/// Edge strip width as a fraction of crop width
const EDGE_STRIP_FRACTION: f64 = 0.05;

/// Relative darkening of the left strip that counts as marginalia
const MARGINALIA_CONTRAST: f64 = 0.03;

/// Mean brightness of the three sampling strips
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripMeans {
    pub left: f64,
    pub centre: f64,
    pub right: f64,
}

impl StripMeans {
    /// Left strip darker than the right by more than 3% of the right mean
    pub fn has_marginalia(&self) -> bool {
        self.right > self.left && (self.right - self.left) > self.right * MARGINALIA_CONTRAST
    }
}

/// Marginalia detector for cropped pages
pub struct MarginaliaDetector;

impl MarginaliaDetector {
    /// Check a crop for left-margin marginalia
    pub fn detect(crop: &RgbImage) -> bool {
        Self::strip_means(crop).is_some_and(|m| m.has_marginalia())
    }

    /// Strip means, `None` when the crop is too narrow to sample
    pub fn strip_means(crop: &RgbImage) -> Option<StripMeans> {
        let (width, height) = crop.dimensions();
        let strip = (width as f64 * EDGE_STRIP_FRACTION) as i32;
        if strip == 0 || height == 0 {
            return None;
        }

        let (w, h) = (width as i32, height as i32);
        let half = (width as f64 * EDGE_STRIP_FRACTION / 2.0) as i32;
        let centre = w / 2;

        Some(StripMeans {
            left: region_mean(crop, 0, strip, 0, h)?,
            centre: region_mean(crop, centre - half, centre + half.max(1), 0, h)?,
            right: region_mean(crop, w - strip, w, 0, h)?,
        })
    }
}

/// Offset finder for marginalia stacked at the main block's left edge
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildMarginaliaRemover {
    extractor: ContourExtractor,
}

impl ChildMarginaliaRemover {
    pub fn new(extractor: ContourExtractor) -> Self {
        Self { extractor }
    }

    /// Mean width of the blocks sharing the main block's x-origin, 0 if none
    pub fn left_offset(&self, crop: &RgbImage) -> Result<i32> {
        let contours = self.extractor.extract(crop, Retrieval::TwoLevel);
        let records = ContourClassifier::classify(crop.dimensions(), &contours, Round::Strip);

        let main = BoundingBoxResolver::largest(&records).ok_or(CropError::NoContentFound)?;
        let fragments: Vec<i32> = records
            .iter()
            .filter(|r| r.x == main.x && r.index != main.index)
            .map(|r| r.width)
            .collect();

        if fragments.is_empty() {
            return Ok(0);
        }

        let total: i64 = fragments.iter().map(|&w| w as i64).sum();
        Ok((total / fragments.len() as i64) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::test_support::page_with_blocks;
    use image::Rgb;

    /// Crop whose left and right 5% strips have the given grey levels
    fn crop_with_edges(left: u8, right: u8) -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 100, Rgb([230, 230, 230]));
        for y in 0..100 {
            for x in 0..10 {
                img.put_pixel(x, y, Rgb([left, left, left]));
            }
            for x in 190..200 {
                img.put_pixel(x, y, Rgb([right, right, right]));
            }
        }
        img
    }

    #[test]
    fn test_symmetric_crop_has_no_marginalia() {
        assert!(!MarginaliaDetector::detect(&crop_with_edges(180, 180)));
        assert!(!MarginaliaDetector::detect(&crop_with_edges(60, 60)));
    }

    #[test]
    fn test_dark_left_strip_is_marginalia() {
        let means = MarginaliaDetector::strip_means(&crop_with_edges(100, 200)).unwrap();
        assert_eq!(means.left, 100.0);
        assert_eq!(means.right, 200.0);
        assert_eq!(means.centre, 230.0);
        assert!(MarginaliaDetector::detect(&crop_with_edges(100, 200)));
    }

    #[test]
    fn test_small_difference_is_not_marginalia() {
        // 5 < 3% of 200
        assert!(!MarginaliaDetector::detect(&crop_with_edges(195, 200)));
    }

    #[test]
    fn test_dark_right_strip_is_not_marginalia() {
        assert!(!MarginaliaDetector::detect(&crop_with_edges(200, 100)));
    }

    #[test]
    fn test_narrow_crop_is_never_marginalia() {
        let crop = RgbImage::from_pixel(15, 100, Rgb([0, 0, 0]));
        assert!(MarginaliaDetector::strip_means(&crop).is_none());
        assert!(!MarginaliaDetector::detect(&crop));
    }

    #[test]
    fn test_offset_from_stacked_fragments() {
        // Main block and a marginal note starting at the same x
        let crop = page_with_blocks(300, 400, &[(40, 40, 280, 250), (40, 300, 100, 330)]);
        let remover = ChildMarginaliaRemover::new(ContourExtractor::new(2));

        let offset = remover.left_offset(&crop).unwrap();
        assert!((60..=70).contains(&offset), "offset was {}", offset);
    }

    #[test]
    fn test_offset_zero_without_fragments() {
        let crop = page_with_blocks(300, 400, &[(40, 40, 280, 250), (120, 300, 200, 330)]);
        let remover = ChildMarginaliaRemover::new(ContourExtractor::new(2));
        assert_eq!(remover.left_offset(&crop).unwrap(), 0);
    }

    #[test]
    fn test_offset_on_blank_crop_is_no_content() {
        let crop = page_with_blocks(300, 400, &[]);
        let result = ChildMarginaliaRemover::default().left_offset(&crop);
        assert!(matches!(result, Err(CropError::NoContentFound)));
    }
}
