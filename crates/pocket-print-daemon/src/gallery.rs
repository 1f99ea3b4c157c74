//! On-disk store for finished prints.

use anyhow::{Context, Result};
use pocket_print_core::PrintedImage;
use std::path::{Path, PathBuf};

/// Directory receiving one PNG per print.
pub struct Gallery {
    dir: PathBuf,
    data_uri: bool,
}

impl Gallery {
    /// Opens the gallery, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P, data_uri: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create gallery directory {}", dir.display()))?;
        Ok(Self { dir, data_uri })
    }

    /// Returns the gallery directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the print and returns its path.
    pub fn save(&self, image: &PrintedImage) -> Result<PathBuf> {
        let path = image
            .save_to(&self.dir)
            .with_context(|| format!("Failed to write print to {}", self.dir.display()))?;

        if self.data_uri {
            let sidecar = path.with_extension("txt");
            std::fs::write(&sidecar, image.data_uri())
                .with_context(|| format!("Failed to write {}", sidecar.display()))?;
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pocketprintd-{}-{}", name, std::process::id()))
    }

    fn sample() -> PrintedImage {
        let created = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        PrintedImage::with_timestamp(vec![0x89, b'P', b'N', b'G'], 160, 8, created)
    }

    #[test]
    fn test_collisions_get_suffixes() {
        let dir = temp_dir("collide");
        let gallery = Gallery::open(&dir, false).unwrap();

        let first = gallery.save(&sample()).unwrap();
        let second = gallery.save(&sample()).unwrap();
        let third = gallery.save(&sample()).unwrap();
        assert_eq!(first.file_name().unwrap(), "printed-20240309-070502.png");
        assert_eq!(second.file_name().unwrap(), "printed-20240309-070502-2.png");
        assert_eq!(third.file_name().unwrap(), "printed-20240309-070502-3.png");
        assert!(!first.with_extension("txt").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_data_uri_sidecar() {
        let dir = temp_dir("sidecar");
        let gallery = Gallery::open(&dir, true).unwrap();
        assert_eq!(gallery.dir(), dir.as_path());

        let path = gallery.save(&sample()).unwrap();
        let uri = std::fs::read_to_string(path.with_extension("txt")).unwrap();
        assert_eq!(uri, "data:image/png;base64,iVBORw==");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
