//! bookcrop - content-region cropping for scanned book volumes
//!
//! CLI entry point

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use bookcrop::cli::ConfigArgs;
use bookcrop::{
    exit_codes, list_volumes, status, AuditArgs, CancelFlag, Cli, CliOverrides, Commands,
    CropArgs, CropConfig, OutlierAuditor, OutputMode, PageCropPipeline, PageResult,
    PipelineError, ProgressCallback, ProgressTracker, RunOptions, StatusArgs, VolumeLayout,
    VolumeSummary,
};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let mode = if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::from_verbosity(cli.verbose)
    };

    let result = match &cli.command {
        Commands::Crop(args) => run_crop(args, mode),
        Commands::Audit(args) => run_audit(args, mode),
        Commands::Status(args) => run_status(args),
        Commands::Info => run_info(),
    };

    std::process::exit(match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_codes::GENERAL_ERROR
        }
    });
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bookcrop={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ============ Progress Callback Implementation ============

/// Progress bar for one volume
struct BarProgress {
    bar: ProgressBar,
    mode: OutputMode,
}

impl BarProgress {
    fn new(mode: OutputMode) -> Self {
        let bar = if mode.should_show(OutputMode::Normal) {
            let style = ProgressStyle::with_template(
                "  {msg:<16} [{bar:40}] {pos}/{len} ({eta})",
            )
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            ProgressBar::new(0).with_style(style)
        } else {
            ProgressBar::hidden()
        };
        Self { bar, mode }
    }
}

impl ProgressCallback for BarProgress {
    fn on_volume_start(&self, volume: &str, pages: usize) {
        self.bar.set_length(pages as u64);
        self.bar.set_message(volume.to_string());
    }

    fn on_page_complete(&self, page: &PageResult) {
        self.bar.inc(1);
        let show = if page.is_clean() {
            self.mode.should_show(OutputMode::VeryVerbose)
        } else {
            self.mode.should_show(OutputMode::Verbose)
        };
        if show {
            let detail = match (&page.bbox, &page.issue) {
                (_, Some(issue)) => issue.clone(),
                (Some(bbox), None) => bbox.to_string(),
                (None, None) => String::new(),
            };
            self.bar.println(format!("    {} {}", page.filename, detail));
        }
    }

    fn on_volume_complete(&self, _summary: &VolumeSummary) {
        self.bar.finish_and_clear();
    }
}

// ============ Config ============

fn load_config(args: &ConfigArgs, overrides: &CliOverrides) -> anyhow::Result<CropConfig> {
    let file_config = match &args.config {
        Some(path) => match CropConfig::load_from_path(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Warning: Failed to load config file: {}", e);
                CropConfig::default()
            }
        },
        None => CropConfig::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring config file");
            CropConfig::default()
        }),
    };

    // CLI takes precedence
    let config = file_config.merge_with_cli(overrides);
    config.validate()?;
    Ok(config)
}

// ============ Crop Command ============

fn run_crop(args: &CropArgs, mode: OutputMode) -> anyhow::Result<i32> {
    for path in &args.paths {
        if !path.is_dir() {
            eprintln!("Error: Volume directory does not exist: {}", path.display());
            return Ok(exit_codes::INPUT_NOT_FOUND);
        }
    }

    let config = load_config(&args.config, &args.overrides())?;
    let volumes = collect_volumes(args)?;
    if volumes.is_empty() {
        eprintln!("Error: No volumes found");
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let crop_suffix = config.crop_suffix.clone();
    let auditor = OutlierAuditor::from_config(&config.audit);
    let pipeline = PageCropPipeline::new(config);
    let options = RunOptions {
        report_only: args.report_only,
    };
    // Never set here: Ctrl-C ends the process, and atomic writes leave no
    // partial crop or report. Library callers hold the flag to stop a run.
    let cancel = CancelFlag::new();
    let mut tracker = ProgressTracker::new(mode);

    for dir in volumes {
        let layout = VolumeLayout::new(dir);
        if args.all && layout.is_processed() && !args.force {
            tracker.skip(layout.name());
            continue;
        }

        let progress = BarProgress::new(mode);
        let mut report = match pipeline.run_volume(&layout, options, &progress, &cancel) {
            Ok(report) => report,
            Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled.into()),
            Err(e) => {
                progress.bar.finish_and_clear();
                tracker.fail(layout.name(), &e);
                continue;
            }
        };

        if !args.no_audit && !args.report_only {
            if let Err(e) = auditor.apply(&layout, &mut report, &crop_suffix) {
                tracker.fail(layout.name(), &e);
                continue;
            }
        }

        tracker.record(&VolumeSummary::from_report(&report));
    }

    tracker.print_summary();

    if tracker.volumes_failed > 0 {
        return Ok(exit_codes::GENERAL_ERROR);
    }
    if args.strict && tracker.issues > 0 {
        return Ok(exit_codes::PAGES_WITH_ISSUES);
    }
    Ok(exit_codes::SUCCESS)
}

/// Volume directories named on the command line, expanded under `--all`
fn collect_volumes(args: &CropArgs) -> anyhow::Result<Vec<PathBuf>> {
    let mut volumes = Vec::new();
    for path in &args.paths {
        if args.all {
            let found = list_volumes(path)
                .with_context(|| format!("failed to list volumes in {}", path.display()))?;
            volumes.extend(found);
        } else {
            volumes.push(path.clone());
        }
    }
    Ok(volumes)
}

// ============ Audit Command ============

fn run_audit(args: &AuditArgs, mode: OutputMode) -> anyhow::Result<i32> {
    if !args.volume.is_dir() {
        eprintln!("Error: Volume directory does not exist: {}", args.volume.display());
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let layout = VolumeLayout::new(&args.volume);
    if !layout.report_path().is_file() {
        eprintln!("Error: No contour report in {}", args.volume.display());
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let config = load_config(&args.config, &args.audit.overrides())?;
    let auditor = OutlierAuditor::from_config(&config.audit);
    let (report, summary) = auditor.audit_volume(&layout, &config.crop_suffix)?;

    if mode.should_show(OutputMode::Normal) {
        println!(
            "{}: audited {} pages, {} outliers (|z| > {})",
            layout.name(),
            summary.audited,
            summary.flagged.len(),
            auditor.z_threshold()
        );
        for filename in &summary.flagged {
            let reason = report
                .page(filename)
                .and_then(|p| p.issue.as_deref())
                .unwrap_or_default();
            println!("  {} {}", filename, reason);
        }
    }
    Ok(exit_codes::SUCCESS)
}

// ============ Status Command ============

fn run_status(args: &StatusArgs) -> anyhow::Result<i32> {
    if !args.root.is_dir() {
        eprintln!("Error: Directory does not exist: {}", args.root.display());
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let config = load_config(&args.config, &CliOverrides::new())?;
    let statuses = status::collect(&args.root, &config.extensions)
        .with_context(|| format!("failed to read {}", args.root.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(exit_codes::SUCCESS);
    }

    print!("{}", status::render_table(&statuses));

    if args.issues {
        let root = VolumeLayout::new(&args.root);
        let single_volume = !root.list_pages(&config.extensions)?.is_empty();
        for s in statuses.iter().filter(|s| s.issues > 0) {
            let layout = if single_volume {
                root.clone()
            } else {
                VolumeLayout::new(args.root.join(&s.volume))
            };
            println!();
            println!("{} issues:", s.volume);
            for name in layout.issue_files()? {
                println!("  {}", name);
            }
        }
    }
    Ok(exit_codes::SUCCESS)
}

// ============ Info Command ============

fn run_info() -> anyhow::Result<i32> {
    println!("bookcrop v{}", env!("CARGO_PKG_VERSION"));
    println!();

    // System Information
    println!("System Information:");
    println!("  Platform: {}", std::env::consts::OS);
    println!("  Arch: {}", std::env::consts::ARCH);
    println!("  CPUs: {}", num_cpus::get());

    // Config File Locations
    println!();
    println!("Config File Locations:");
    for path in CropConfig::search_paths() {
        let state = if path.is_file() { "found" } else { "not found" };
        println!("  {} ({})", path.display(), state);
    }

    // Effective Config
    let config = CropConfig::load().unwrap_or_default();
    println!();
    println!("Effective Config:");
    for line in config.to_toml()?.lines() {
        println!("  {}", line);
    }

    Ok(exit_codes::SUCCESS)
}
