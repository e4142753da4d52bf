//! Contour extraction
//!
//! Binarizes a page, grows ink into solid paragraph-sized blocks and traces
//! the block outlines.

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::point::Point;

use super::types::{RawContour, Retrieval};
use super::{DEFAULT_DILATION_ITERATIONS, INK_THRESHOLD};

/// Ink-block contour extractor
#[derive(Debug, Clone, Copy)]
pub struct ContourExtractor {
    dilation_iterations: u8,
}

impl Default for ContourExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DILATION_ITERATIONS)
    }
}

impl ContourExtractor {
    /// Create an extractor dilating `dilation_iterations` times
    pub fn new(dilation_iterations: u8) -> Self {
        Self {
            dilation_iterations,
        }
    }

    pub fn dilation_iterations(&self) -> u8 {
        self.dilation_iterations
    }

    /// Extract contours from an RGB image
    pub fn extract(&self, image: &RgbImage, retrieval: Retrieval) -> Vec<RawContour> {
        let gray = imageops::grayscale(image);
        let binary = Self::binarize(&gray);
        let blocks = self.dilate(&binary);
        Self::trace(&blocks, retrieval)
    }

    /// Inverse binary threshold: ink becomes 255, paper becomes 0
    fn binarize(gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mut binary = GrayImage::new(width, height);

        for (x, y, pixel) in gray.enumerate_pixels() {
            let value = if pixel.0[0] <= INK_THRESHOLD { 255 } else { 0 };
            binary.put_pixel(x, y, Luma([value]));
        }

        binary
    }

    /// n passes of a 3x3 cross equal one L1 dilation of radius n
    fn dilate(&self, binary: &GrayImage) -> GrayImage {
        if self.dilation_iterations == 0 {
            return binary.clone();
        }
        dilate(binary, Norm::L1, self.dilation_iterations)
    }

    fn trace(blocks: &GrayImage, retrieval: Retrieval) -> Vec<RawContour> {
        let contours = find_contours::<i32>(&Self::frame(blocks));

        match retrieval {
            // Outer borders are all top level; a hole points at its border
            Retrieval::TwoLevel => contours
                .into_iter()
                .map(|c| RawContour {
                    parent: match c.border_type {
                        BorderType::Hole => c.parent,
                        BorderType::Outer => None,
                    },
                    points: Self::unframe(c.points),
                })
                .collect(),
            Retrieval::External => contours
                .into_iter()
                .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
                .map(|c| RawContour {
                    points: Self::unframe(c.points),
                    parent: None,
                })
                .collect(),
        }
    }

    /// Surround with a 1 px paper border.
    ///
    /// The tracer mislabels blocks that touch the left edge as holes, and
    /// drops them entirely when they also touch the right edge.
    fn frame(blocks: &GrayImage) -> GrayImage {
        let (width, height) = blocks.dimensions();
        let mut framed = GrayImage::new(width + 2, height + 2);
        imageops::replace(&mut framed, blocks, 1, 1);
        framed
    }

    /// Shift traced points back to unframed coordinates
    fn unframe(points: Vec<Point<i32>>) -> Vec<Point<i32>> {
        points
            .into_iter()
            .map(|p| Point::new(p.x - 1, p.y - 1))
            .collect()
    }
}
