//! Configuration file support
//!
//! Settings come from a TOML file and can be overridden on the command line.
//!
//! # Search order
//!
//! 1. `--config <FILE>`
//! 2. `./bookcrop.toml`
//! 3. `<user config dir>/bookcrop/config.toml`
//! 4. Built-in defaults
//!
//! # Example
//!
//! ```toml
//! dilation_iterations = 30
//! x_buffer = 20
//! y_buffer = 0
//! extensions = ["jpg", "png"]
//!
//! [audit]
//! z_threshold = 2.5
//! coordinates = ["x1", "x2"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crop::{
    BoundingBoxResolver, Coordinate, ContourExtractor, DEFAULT_DILATION_ITERATIONS,
    DEFAULT_MAX_TRIM_PASSES, DEFAULT_X_BUFFER, DEFAULT_Y_BUFFER,
};

/// Local config filename
pub const LOCAL_CONFIG_FILE: &str = "bookcrop.toml";

/// Default |z| above which a page is an outlier
pub const DEFAULT_Z_THRESHOLD: f64 = 2.5;

/// Default delta degrees of freedom for z-scores
pub const DEFAULT_DDOF: u8 = 1;

/// Config error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ============================================================
// Config
// ============================================================

/// Outlier audit settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// |z| strictly above this flags a page
    pub z_threshold: f64,
    /// Box coordinates to audit
    pub coordinates: Vec<Coordinate>,
    /// Delta degrees of freedom of the standard deviation: 1 sample, 0 population
    pub ddof: u8,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            z_threshold: DEFAULT_Z_THRESHOLD,
            coordinates: Coordinate::all().to_vec(),
            ddof: DEFAULT_DDOF,
        }
    }
}

/// Crop run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Dilation passes with the 3x3 cross
    pub dilation_iterations: u8,
    /// Horizontal padding in pixels
    pub x_buffer: i32,
    /// Vertical padding in pixels
    pub y_buffer: i32,
    /// Bound on whitespace trim passes
    pub max_trim_passes: usize,
    /// Worker threads, all cores when unset
    pub threads: Option<usize>,
    /// Page image extensions
    pub extensions: Vec<String>,
    /// Inserted between stem and extension of crop files
    pub crop_suffix: String,
    pub audit: AuditConfig,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            dilation_iterations: DEFAULT_DILATION_ITERATIONS,
            x_buffer: DEFAULT_X_BUFFER,
            y_buffer: DEFAULT_Y_BUFFER,
            max_trim_passes: DEFAULT_MAX_TRIM_PASSES,
            threads: None,
            extensions: vec!["jpg".to_string()],
            crop_suffix: "_crop".to_string(),
            audit: AuditConfig::default(),
        }
    }
}

impl CropConfig {
    /// Load from the first config file in the search order, defaults if none
    pub fn load() -> Result<Self, ConfigError> {
        match Self::search_paths().into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from a specific file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Config files checked by [`CropConfig::load`]
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(user) = Self::user_config_path() {
            paths.push(user);
        }
        paths
    }

    /// `<user config dir>/bookcrop/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bookcrop").join("config.toml"))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.x_buffer < 0 {
            return Err(ConfigError::InvalidValue {
                field: "x_buffer",
                reason: "must not be negative".to_string(),
            });
        }
        if self.y_buffer < 0 {
            return Err(ConfigError::InvalidValue {
                field: "y_buffer",
                reason: "must not be negative".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "extensions",
                reason: "at least one extension is required".to_string(),
            });
        }
        if self.audit.ddof > 1 {
            return Err(ConfigError::InvalidValue {
                field: "audit.ddof",
                reason: format!("must be 0 or 1, got {}", self.audit.ddof),
            });
        }
        if !(self.audit.z_threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "audit.z_threshold",
                reason: "must be positive".to_string(),
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "threads",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Merge CLI overrides on top; CLI wins
    #[must_use]
    pub fn merge_with_cli(mut self, cli: &CliOverrides) -> Self {
        if let Some(v) = cli.dilation_iterations {
            self.dilation_iterations = v;
        }
        if let Some(v) = cli.x_buffer {
            self.x_buffer = v;
        }
        if let Some(v) = cli.y_buffer {
            self.y_buffer = v;
        }
        if cli.threads.is_some() {
            self.threads = cli.threads;
        }
        if let Some(v) = &cli.extensions {
            self.extensions = v.clone();
        }
        if let Some(v) = cli.z_threshold {
            self.audit.z_threshold = v;
        }
        if let Some(v) = &cli.coordinates {
            self.audit.coordinates = v.clone();
        }
        self
    }

    /// Worker count, resolving "all cores"
    pub fn effective_threads(&self) -> usize {
        self.threads.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn extractor(&self) -> ContourExtractor {
        ContourExtractor::new(self.dilation_iterations)
    }

    pub fn resolver(&self) -> BoundingBoxResolver {
        BoundingBoxResolver::new(self.x_buffer, self.y_buffer)
            .with_max_trim_passes(self.max_trim_passes)
    }

    pub fn builder() -> CropConfigBuilder {
        CropConfigBuilder::default()
    }
}

// ============================================================
// CLI overrides
// ============================================================

/// Values given on the command line; `None` keeps the file value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub dilation_iterations: Option<u8>,
    pub x_buffer: Option<i32>,
    pub y_buffer: Option<i32>,
    pub threads: Option<usize>,
    pub extensions: Option<Vec<String>>,
    pub z_threshold: Option<f64>,
    pub coordinates: Option<Vec<Coordinate>>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================
// Builder
// ============================================================

/// Builder for [`CropConfig`]
#[derive(Debug, Default)]
pub struct CropConfigBuilder {
    config: CropConfig,
}

impl CropConfigBuilder {
    #[must_use]
    pub fn dilation_iterations(mut self, iterations: u8) -> Self {
        self.config.dilation_iterations = iterations;
        self
    }

    #[must_use]
    pub fn x_buffer(mut self, px: i32) -> Self {
        self.config.x_buffer = px;
        self
    }

    #[must_use]
    pub fn y_buffer(mut self, px: i32) -> Self {
        self.config.y_buffer = px;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }

    #[must_use]
    pub fn extensions(mut self, extensions: &[&str]) -> Self {
        self.config.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }

    #[must_use]
    pub fn z_threshold(mut self, threshold: f64) -> Self {
        self.config.audit.z_threshold = threshold;
        self
    }

    #[must_use]
    pub fn coordinates(mut self, coordinates: &[Coordinate]) -> Self {
        self.config.audit.coordinates = coordinates.to_vec();
        self
    }

    pub fn build(self) -> CropConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = CropConfig::default();
        assert_eq!(config.dilation_iterations, 30);
        assert_eq!(config.x_buffer, 20);
        assert_eq!(config.y_buffer, 0);
        assert_eq!(config.max_trim_passes, 16);
        assert_eq!(config.threads, None);
        assert_eq!(config.extensions, vec!["jpg"]);
        assert_eq!(config.crop_suffix, "_crop");
        assert_eq!(config.audit.z_threshold, 2.5);
        assert_eq!(config.audit.coordinates.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: CropConfig = toml::from_str(
            r#"
            x_buffer = 12

            [audit]
            coordinates = ["x1", "x2"]
            "#,
        )
        .unwrap();

        assert_eq!(config.x_buffer, 12);
        assert_eq!(config.y_buffer, 0);
        assert_eq!(config.audit.z_threshold, 2.5);
        assert_eq!(
            config.audit.coordinates,
            vec![Coordinate::X1, Coordinate::X2]
        );
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "dilation_iterations = 10\nthreads = 2\n").unwrap();

        let config = CropConfig::load_from_path(&path).unwrap();
        assert_eq!(config.dilation_iterations, 10);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.effective_threads(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = CropConfig::load_from_path(Path::new("/nonexistent/bookcrop.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "x_buffer = \"wide\"").unwrap();

        let result = CropConfig::load_from_path(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = CropConfig::builder().x_buffer(-1).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "x_buffer", .. })
        ));

        let config = CropConfig::builder().z_threshold(0.0).build();
        assert!(config.validate().is_err());

        let config = CropConfig::builder().extensions(&[]).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_audit_ddof_from_toml() {
        let config: CropConfig = toml::from_str("[audit]\nddof = 0\n").unwrap();
        assert_eq!(config.audit.ddof, 0);
        assert!(config.validate().is_ok());

        let config: CropConfig = toml::from_str("[audit]\nddof = 2\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "audit.ddof", .. })
        ));
    }

    #[test]
    fn test_merge_with_cli() {
        let overrides = CliOverrides {
            x_buffer: Some(40),
            z_threshold: Some(3.0),
            coordinates: Some(vec![Coordinate::Y1]),
            ..Default::default()
        };
        let config = CropConfig::builder()
            .dilation_iterations(12)
            .build()
            .merge_with_cli(&overrides);

        assert_eq!(config.dilation_iterations, 12);
        assert_eq!(config.x_buffer, 40);
        assert_eq!(config.audit.z_threshold, 3.0);
        assert_eq!(config.audit.coordinates, vec![Coordinate::Y1]);
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let config = CropConfig::default();
        assert_eq!(config.clone().merge_with_cli(&CliOverrides::new()), config);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = CropConfig::builder().threads(3).y_buffer(8).build();
        let text = config.to_toml().unwrap();
        let parsed: CropConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_builders_for_crop_stages() {
        let config = CropConfig::builder()
            .dilation_iterations(7)
            .x_buffer(3)
            .y_buffer(4)
            .build();
        assert_eq!(config.extractor().dilation_iterations(), 7);
        let resolver = config.resolver();
        assert_eq!((resolver.x_buffer, resolver.y_buffer), (3, 4));
        assert_eq!(resolver.max_trim_passes, 16);
    }
}
