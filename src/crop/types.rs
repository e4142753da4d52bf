//! Common types for the crop engine

use imageproc::point::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================
// Error Types
// ============================================================

/// Crop engine error types
#[derive(Debug, Error)]
pub enum CropError {
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("No content found")]
    NoContentFound,

    #[error("Degenerate geometry, box collapsed to {bbox}")]
    GeometryDegenerate { bbox: BoundingBox },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CropError>;

// ============================================================
// Core Data Structures
// ============================================================

/// Classification rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Round {
    /// Full-page rules: particles, watermarks, edge artifacts, scan shadows
    #[default]
    Primary,
    /// Narrow-strip rules: header/footer band noise
    Strip,
}

/// Contour retrieval mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retrieval {
    /// Outer borders plus the holes directly inside them
    #[default]
    TwoLevel,
    /// Outermost borders only
    External,
}

/// Traced contour with its hierarchy parent
#[derive(Debug, Clone)]
pub struct RawContour {
    /// Border points in tracing order
    pub points: Vec<Point<i32>>,
    /// Index of the enclosing contour, if any
    pub parent: Option<usize>,
}

/// Classified contour
#[derive(Debug, Clone, PartialEq)]
pub struct ContourRecord {
    /// Discovery index within the extraction call
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Polygon area in square pixels
    pub area: f64,
    pub width_height_ratio: f64,
    pub is_child: bool,
    pub parent_index: Option<usize>,
}

impl ContourRecord {
    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

/// Axis-aligned content rectangle, `x2`/`y2` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a new bounding box
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box covering a whole image
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width as i32, height as i32)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Check if the box has no area
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// Clamp to image extents
    #[must_use]
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as i32, height as i32);
        let x1 = self.x1.clamp(0, w);
        let y1 = self.y1.clamp(0, h);
        Self {
            x1,
            y1,
            x2: self.x2.clamp(x1, w),
            y2: self.y2.clamp(y1, h),
        }
    }

    /// Coordinate by audit axis
    pub fn coordinate(&self, coordinate: Coordinate) -> i32 {
        match coordinate {
            Coordinate::X1 => self.x1,
            Coordinate::Y1 => self.y1,
            Coordinate::X2 => self.x2,
            Coordinate::Y2 => self.y2,
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

/// One of the four box coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinate {
    X1,
    Y1,
    X2,
    Y2,
}

impl Coordinate {
    /// Get all coordinates in report column order
    pub fn all() -> [Coordinate; 4] {
        [Coordinate::X1, Coordinate::Y1, Coordinate::X2, Coordinate::Y2]
    }

    /// Report column name
    pub fn column(&self) -> &'static str {
        match self {
            Coordinate::X1 => "bbox_x1",
            Coordinate::Y1 => "bbox_y1",
            Coordinate::X2 => "bbox_x2",
            Coordinate::Y2 => "bbox_y2",
        }
    }
}

impl std::str::FromStr for Coordinate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x1" => Ok(Coordinate::X1),
            "y1" => Ok(Coordinate::Y1),
            "x2" => Ok(Coordinate::X2),
            "y2" => Ok(Coordinate::Y2),
            other => Err(format!("unknown coordinate '{}', expected x1, y1, x2 or y2", other)),
        }
    }
}
