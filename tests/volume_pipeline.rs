//! Volume-level integration tests
//!
//! Runs the pipeline and auditor over synthetic volumes on disk.

use bookcrop::{
    CancelFlag, CropConfig, OutlierAuditor, PageCropPipeline, PageStatus, RunOptions,
    SilentProgress, VolumeLayout, VolumeReport,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// White page with one text column `x1..x2`, rows 80..520
fn column_page(x1: u32, x2: u32) -> RgbImage {
    let mut page = RgbImage::from_pixel(400, 600, Rgb([255, 255, 255]));
    for y in 80..520 {
        for x in x1..x2 {
            page.put_pixel(x, y, Rgb([20, 20, 20]));
        }
    }
    page
}

fn pipeline() -> PageCropPipeline {
    PageCropPipeline::new(
        CropConfig::builder()
            .dilation_iterations(4)
            .x_buffer(10)
            .y_buffer(5)
            .threads(2)
            .extensions(&["png"])
            .build(),
    )
}

fn volume_dir(root: &Path) -> VolumeLayout {
    let dir = root.join("1904");
    fs::create_dir_all(&dir).unwrap();
    VolumeLayout::new(dir)
}

#[test]
fn test_undecodable_page_does_not_stop_volume() {
    let root = tempfile::tempdir().unwrap();
    let layout = volume_dir(root.path());
    column_page(60, 340).save(layout.root().join("p001.png")).unwrap();
    fs::write(layout.root().join("p002.png"), b"not an image").unwrap();
    column_page(60, 340).save(layout.root().join("p003.png")).unwrap();

    let report = pipeline()
        .run_volume(&layout, RunOptions::default(), &SilentProgress, &CancelFlag::new())
        .unwrap();

    assert_eq!(report.len(), 3);
    let names: Vec<_> = report.pages().iter().map(|p| p.filename.as_str()).collect();
    assert_eq!(names, vec!["p001.png", "p002.png", "p003.png"]);

    let broken = report.page("p002.png").unwrap();
    assert_eq!(broken.status, PageStatus::Issue);
    assert!(broken.bbox.is_none());
    assert!(broken.issue.as_deref().unwrap().starts_with("decode stage"));

    assert!(report.page("p001.png").unwrap().is_clean());
    assert!(report.page("p003.png").unwrap().is_clean());

    assert!(layout.crop_path("p001.png", "_crop").exists());
    assert!(layout.crop_path("p003.png", "_crop").exists());
    assert!(!layout.crop_path("p002.png", "_crop").exists());
    assert_eq!(layout.issue_files().unwrap(), vec!["p002.png".to_string()]);

    // Empty geometry cells survive a reload
    let reloaded = VolumeReport::load(&layout.report_path(), layout.name()).unwrap();
    assert_eq!(reloaded.pages(), report.pages());
}

#[test]
fn test_crop_box_covers_text_column() {
    let root = tempfile::tempdir().unwrap();
    let layout = volume_dir(root.path());
    column_page(60, 340).save(layout.root().join("p001.png")).unwrap();

    let report = pipeline()
        .run_volume(&layout, RunOptions::default(), &SilentProgress, &CancelFlag::new())
        .unwrap();

    let bbox = report.pages()[0].bbox.unwrap();
    assert!(bbox.x1 <= 60 && bbox.x2 >= 340, "bbox {}", bbox);
    assert!(bbox.y1 <= 80 && bbox.y2 >= 520, "bbox {}", bbox);
    assert!(bbox.x1 >= 0 && bbox.x2 <= 400 && bbox.y1 >= 0 && bbox.y2 <= 600);

    let crop = image::open(layout.crop_path("p001.png", "_crop"))
        .unwrap()
        .to_rgb8();
    assert_eq!(crop.dimensions(), (bbox.width() as u32, bbox.height() as u32));
}

#[test]
fn test_report_only_leaves_no_images() {
    let root = tempfile::tempdir().unwrap();
    let layout = volume_dir(root.path());
    column_page(60, 340).save(layout.root().join("p001.png")).unwrap();

    let options = RunOptions { report_only: true };
    let report = pipeline()
        .run_volume(&layout, options, &SilentProgress, &CancelFlag::new())
        .unwrap();

    assert_eq!(report.len(), 1);
    assert!(layout.report_path().exists());
    assert!(!layout.is_processed());
}

#[test]
fn test_audit_flags_shifted_page() {
    let root = tempfile::tempdir().unwrap();
    let layout = volume_dir(root.path());
    for i in 0..12 {
        let page = if i == 4 {
            column_page(110, 390)
        } else {
            column_page(60, 340)
        };
        page.save(layout.root().join(format!("p{:03}.png", i))).unwrap();
    }

    let pipeline = pipeline();
    let mut report = pipeline
        .run_volume(&layout, RunOptions::default(), &SilentProgress, &CancelFlag::new())
        .unwrap();
    assert_eq!(report.clean_count(), 12);

    let summary = OutlierAuditor::from_config(&pipeline.config().audit)
        .apply(&layout, &mut report, "_crop")
        .unwrap();

    assert_eq!(summary.audited, 12);
    assert_eq!(summary.flagged, vec!["p004.png".to_string()]);
    assert_eq!(report.page("p004.png").unwrap().status, PageStatus::Issue);
    assert!(!layout.crop_path("p004.png", "_crop").exists());
    assert!(layout.crop_path("p003.png", "_crop").exists());
    assert_eq!(layout.issue_files().unwrap(), vec!["p004.png".to_string()]);
    assert!(layout.z_score_path().exists());
}

#[test]
fn test_audit_runs_from_saved_report() {
    let root = tempfile::tempdir().unwrap();
    let layout = volume_dir(root.path());
    for i in 0..3 {
        column_page(60, 340)
            .save(layout.root().join(format!("p{:03}.png", i)))
            .unwrap();
    }

    pipeline()
        .run_volume(&layout, RunOptions::default(), &SilentProgress, &CancelFlag::new())
        .unwrap();

    let (report, summary) = OutlierAuditor::default()
        .audit_volume(&layout, "_crop")
        .unwrap();
    assert_eq!(report.len(), 3);
    assert!(summary.flagged.is_empty());
    assert_eq!(VolumeReport::load_outliers(&layout.z_score_path()).unwrap().len(), 0);
}
