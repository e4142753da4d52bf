//! Volume directory layout
//!
//! A volume is a directory of page images. Processing adds:
//!
//! ```text
//! <volume>/
//!   page_001.jpg ...
//!   cropped/page_001_crop.jpg ...
//!   issues/page_017.jpg ...
//!   <volume>_contourreport.csv
//!   <volume>_z-scores.csv
//! ```
//!
//! Every file written here goes through a temp file in the destination
//! directory and is renamed into place, so a crash never leaves a partial
//! crop or report behind.

use image::{ImageFormat, RgbImage};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Subdirectory for cropped pages
pub const CROPPED_DIR: &str = "cropped";

/// Subdirectory for pages needing review
pub const ISSUES_DIR: &str = "issues";

/// Report filename suffix
pub const REPORT_SUFFIX: &str = "_contourreport.csv";

/// Z-score report filename suffix
pub const Z_SCORE_SUFFIX: &str = "_z-scores.csv";

/// Paths of one volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeLayout {
    root: PathBuf,
    name: String,
}

impl VolumeLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "volume".to_string());
        Self { root, name }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cropped_dir(&self) -> PathBuf {
        self.root.join(CROPPED_DIR)
    }

    pub fn issues_dir(&self) -> PathBuf {
        self.root.join(ISSUES_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(format!("{}{}", self.name, REPORT_SUFFIX))
    }

    pub fn z_score_path(&self) -> PathBuf {
        self.root.join(format!("{}{}", self.name, Z_SCORE_SUFFIX))
    }

    /// `cropped/<stem><suffix>.<ext>`
    pub fn crop_path(&self, filename: &str, suffix: &str) -> PathBuf {
        let path = Path::new(filename);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, suffix),
        };
        self.cropped_dir().join(name)
    }

    pub fn issue_path(&self, filename: &str) -> PathBuf {
        self.issues_dir().join(filename)
    }

    /// A volume counts as processed once its crop directory exists
    pub fn is_processed(&self) -> bool {
        self.cropped_dir().is_dir()
    }

    /// Page images at the volume root, sorted by name
    pub fn list_pages(&self, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
        list_files(&self.root, extensions)
    }

    /// Create `cropped/` and `issues/`
    pub fn prepare(&self) -> io::Result<()> {
        fs::create_dir_all(self.cropped_dir())?;
        fs::create_dir_all(self.issues_dir())?;
        Ok(())
    }

    /// Write a crop, format chosen from the destination extension
    pub fn save_crop(&self, crop: &RgbImage, filename: &str, suffix: &str) -> io::Result<PathBuf> {
        let dest = self.crop_path(filename, suffix);
        save_image(crop, &dest)?;
        Ok(dest)
    }

    /// Copy the original page into `issues/`
    pub fn copy_to_issues(&self, source: &Path, filename: &str) -> io::Result<PathBuf> {
        let dest = self.issue_path(filename);
        persist_atomically(&dest, |file: &mut File| -> io::Result<()> {
            let mut input = File::open(source)?;
            io::copy(&mut input, file)?;
            Ok(())
        })?;
        Ok(dest)
    }

    /// Delete a page's crop; `false` when there was none
    pub fn remove_crop(&self, filename: &str, suffix: &str) -> io::Result<bool> {
        match fs::remove_file(self.crop_path(filename, suffix)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a page's copy in `issues/`; `false` when there was none
    pub fn remove_issue(&self, filename: &str) -> io::Result<bool> {
        match fs::remove_file(self.issue_path(filename)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Files currently in `issues/`, sorted
    pub fn issue_files(&self) -> io::Result<Vec<String>> {
        let dir = self.issues_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Number of crops currently in `cropped/`
    pub fn crop_count(&self) -> io::Result<usize> {
        let dir = self.cropped_dir();
        if !dir.is_dir() {
            return Ok(0);
        }
        Ok(fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count())
    }
}

/// Volume directories directly under `root`, sorted
pub fn list_volumes(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter(|p| {
            !p.file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Files in `dir` (not recursive) whose extension matches, case-insensitive
fn list_files(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| has_extension(p, extensions))
        .collect();
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// Encode an image to `dest` through a temp file
pub fn save_image(image: &RgbImage, dest: &Path) -> io::Result<()> {
    let format = ImageFormat::from_path(dest).map_err(io::Error::other)?;
    persist_atomically(dest, |file: &mut File| -> io::Result<()> {
        let mut writer = BufWriter::new(file);
        image
            .write_to(&mut writer, format)
            .map_err(io::Error::other)?;
        writer.flush()?;
        Ok(())
    })
}

/// Run `write` against a temp file next to `dest`, then rename it over `dest`
pub(crate) fn persist_atomically<F, E>(dest: &Path, write: F) -> Result<(), E>
where
    F: FnOnce(&mut File) -> Result<(), E>,
    E: From<io::Error>,
{
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let suffix = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut tmp = tempfile::Builder::new()
        .prefix(".bookcrop-")
        .suffix(&suffix)
        .tempfile_in(&dir)?;

    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| E::from(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_layout_paths() {
        let layout = VolumeLayout::new("/scans/1904");
        assert_eq!(layout.name(), "1904");
        assert_eq!(layout.cropped_dir(), PathBuf::from("/scans/1904/cropped"));
        assert_eq!(layout.issues_dir(), PathBuf::from("/scans/1904/issues"));
        assert_eq!(
            layout.report_path(),
            PathBuf::from("/scans/1904/1904_contourreport.csv")
        );
        assert_eq!(
            layout.z_score_path(),
            PathBuf::from("/scans/1904/1904_z-scores.csv")
        );
    }

    #[test]
    fn test_crop_path_inserts_suffix() {
        let layout = VolumeLayout::new("/v");
        assert_eq!(
            layout.crop_path("page_001.jpg", "_crop"),
            PathBuf::from("/v/cropped/page_001_crop.jpg")
        );
        assert_eq!(
            layout.crop_path("scan.v2.png", "_crop"),
            PathBuf::from("/v/cropped/scan.v2_crop.png")
        );
    }

    #[test]
    fn test_list_pages_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["p003.jpg", "p001.JPG", "p002.jpg", "notes.txt"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("cropped")).unwrap();
        fs::write(dir.path().join("cropped").join("p001_crop.jpg"), b"x").unwrap();

        let layout = VolumeLayout::new(dir.path());
        let pages = layout.list_pages(&["jpg".to_string()]).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["p001.JPG", "p002.jpg", "p003.jpg"]);
    }

    #[test]
    fn test_list_volumes_skips_files_and_hidden() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("1910")).unwrap();
        fs::create_dir(root.path().join("1904")).unwrap();
        fs::create_dir(root.path().join(".cache")).unwrap();
        fs::write(root.path().join("readme.txt"), b"x").unwrap();

        let volumes = list_volumes(root.path()).unwrap();
        assert_eq!(volumes, vec![root.path().join("1904"), root.path().join("1910")]);
    }

    #[test]
    fn test_save_and_remove_crop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = VolumeLayout::new(dir.path());
        layout.prepare().unwrap();
        assert!(layout.is_processed());

        let crop = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let dest = layout.save_crop(&crop, "p001.png", "_crop").unwrap();
        assert!(dest.exists());
        assert_eq!(image::open(&dest).unwrap().to_rgb8(), crop);
        assert_eq!(layout.crop_count().unwrap(), 1);

        assert!(layout.remove_crop("p001.png", "_crop").unwrap());
        assert!(!layout.remove_crop("p001.png", "_crop").unwrap());
    }

    #[test]
    fn test_copy_to_issues() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("p007.jpg");
        fs::write(&source, b"original bytes").unwrap();

        let layout = VolumeLayout::new(dir.path());
        let dest = layout.copy_to_issues(&source, "p007.jpg").unwrap();
        assert_eq!(fs::read(dest).unwrap(), b"original bytes");
        assert_eq!(layout.issue_files().unwrap(), vec!["p007.jpg".to_string()]);

        assert!(layout.remove_issue("p007.jpg").unwrap());
        assert!(!layout.remove_issue("p007.jpg").unwrap());
        assert!(layout.issue_files().unwrap().is_empty());
    }

    #[test]
    fn test_persist_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        persist_atomically(&dest, |f: &mut File| f.write_all(b"a,b\n")).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(fs::read_to_string(dest).unwrap(), "a,b\n");
    }

    #[test]
    fn test_unknown_extension_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let crop = RgbImage::new(2, 2);
        assert!(save_image(&crop, &dir.path().join("x.unknownext")).is_err());
    }
}
