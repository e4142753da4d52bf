//! Command-line interface definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CliOverrides;
use crate::crop::Coordinate;

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INPUT_NOT_FOUND: i32 = 2;
    /// Pages routed to issues under `--strict`
    pub const PAGES_WITH_ISSUES: i32 = 3;
}

/// Crop scanned book pages to their printed content
#[derive(Debug, Parser)]
#[command(name = "bookcrop", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Crop one or more volumes
    Crop(CropArgs),
    /// Audit a cropped volume for outlier boxes
    Audit(AuditArgs),
    /// Show progress of volumes under a directory
    Status(StatusArgs),
    /// Show system and configuration information
    Info,
}

/// Options shared by commands that read the config
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Config file (default: ./bookcrop.toml, then the user config dir)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct CropArgs {
    /// Volume directories, or roots of volumes with --all
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Treat each path as a directory of volumes
    #[arg(long)]
    pub all: bool,

    /// Re-crop volumes that already have output
    #[arg(long)]
    pub force: bool,

    /// Skip the outlier audit
    #[arg(long)]
    pub no_audit: bool,

    /// Write the report only, no crops or issue copies
    #[arg(long)]
    pub report_only: bool,

    /// Exit with code 3 when any page ends up in issues
    #[arg(long)]
    pub strict: bool,

    /// Dilation passes
    #[arg(long, value_name = "N")]
    pub dilation: Option<u8>,

    /// Horizontal padding in pixels
    #[arg(long, value_name = "PX")]
    pub x_buffer: Option<i32>,

    /// Vertical padding in pixels
    #[arg(long, value_name = "PX")]
    pub y_buffer: Option<i32>,

    /// Worker threads (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Page image extensions, comma separated
    #[arg(long, value_delimiter = ',', value_name = "EXT")]
    pub extensions: Option<Vec<String>>,

    #[command(flatten)]
    pub audit: AuditOptions,

    #[command(flatten)]
    pub config: ConfigArgs,
}

impl CropArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            dilation_iterations: self.dilation,
            x_buffer: self.x_buffer,
            y_buffer: self.y_buffer,
            threads: self.threads,
            extensions: self.extensions.clone(),
            ..self.audit.overrides()
        }
    }
}

/// Audit tuning flags
#[derive(Debug, Clone, Args)]
pub struct AuditOptions {
    /// |z| above which a page is an outlier
    #[arg(long, value_name = "Z")]
    pub z_threshold: Option<f64>,

    /// Coordinates to audit, comma separated (x1,y1,x2,y2)
    #[arg(long, value_delimiter = ',', value_name = "COORD")]
    pub coords: Option<Vec<Coordinate>>,
}

impl AuditOptions {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            z_threshold: self.z_threshold,
            coordinates: self.coords.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct AuditArgs {
    /// Volume directory holding a contour report
    pub volume: PathBuf,

    #[command(flatten)]
    pub audit: AuditOptions,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    /// Volume directory or directory of volumes
    pub root: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// List files waiting in issues/
    #[arg(long)]
    pub issues: bool,

    #[command(flatten)]
    pub config: ConfigArgs,
}
