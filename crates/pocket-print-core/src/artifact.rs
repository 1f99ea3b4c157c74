//! Finished print artifact.

use base64::Engine;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::Result;

/// A decoded print, encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintedImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
    created: DateTime<Local>,
}

impl PrintedImage {
    /// Wraps PNG bytes, stamped with the current local time.
    pub fn new(png: Vec<u8>, width: u32, height: u32) -> Self {
        Self::with_timestamp(png, width, height, Local::now())
    }

    /// Wraps PNG bytes with an explicit creation time.
    pub fn with_timestamp(png: Vec<u8>, width: u32, height: u32, created: DateTime<Local>) -> Self {
        Self {
            png,
            width,
            height,
            created,
        }
    }

    /// Returns the PNG bytes.
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Returns the image width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the image height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// File name in the form `printed-YYYYMMDD-HHMMSS.png`.
    pub fn filename(&self) -> String {
        format!("printed-{}.png", self.created.format("%Y%m%d-%H%M%S"))
    }

    /// PNG bytes encoded as standard base64.
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }

    /// `data:image/png;base64,...` URI for embedding.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.base64())
    }

    /// Writes the PNG into `dir` under [`filename`](Self::filename),
    /// returning the full path.
    ///
    /// Prints finalized within the same second get `-2`, `-3`, ... suffixes
    /// instead of overwriting each other.
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let path = unique_path(dir.as_ref(), &self.filename());
        std::fs::write(&path, &self.png)?;
        Ok(path)
    }
}

/// First path in `dir` named `filename`, or with a numeric suffix before
/// the extension, that does not exist yet.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let path = dir.join(filename);
    if !path.exists() {
        return path;
    }

    let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
    (2u32..)
        .map(|n| match ext {
            "" => dir.join(format!("{}-{}", stem, n)),
            ext => dir.join(format!("{}-{}.{}", stem, n, ext)),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> PrintedImage {
        let created = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        PrintedImage::with_timestamp(vec![0x89, b'P', b'N', b'G'], 160, 8, created)
    }

    #[test]
    fn test_filename() {
        assert_eq!(sample().filename(), "printed-20240309-070502.png");
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(sample().data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_save_to() {
        let dir = std::env::temp_dir().join(format!("pocket-print-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let path = sample().save_to(&dir).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), sample().png());

        let second = sample().save_to(&dir).unwrap();
        let third = sample().save_to(&dir).unwrap();
        assert_eq!(second.file_name().unwrap(), "printed-20240309-070502-2.png");
        assert_eq!(third.file_name().unwrap(), "printed-20240309-070502-3.png");
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
