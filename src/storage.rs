use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::PipelineError;

/// Flat on-disk layout: `uploads/{uuid}.dcm`, `converted/{uuid}.png` and
/// `converted/{uuid}_annotated.png`. Per-request uuids keep concurrent
/// requests from colliding without any locking.
#[derive(Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    converted_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            converted_dir: config.converted_dir.clone(),
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.converted_dir)
    }

    pub fn upload_path(&self, id: Uuid) -> PathBuf {
        self.upload_dir.join(format!("{id}.dcm"))
    }

    pub fn converted_name(id: Uuid) -> String {
        format!("{id}.png")
    }

    pub fn annotated_name(id: Uuid) -> String {
        format!("{id}_annotated.png")
    }

    pub fn save_upload(&self, id: Uuid, bytes: &[u8]) -> Result<PathBuf, PipelineError> {
        let path = self.upload_path(id);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Resolves a client-supplied converted-image name. Anything that could
    /// escape the converted directory is refused before touching the
    /// filesystem.
    pub fn resolve_converted(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
        {
            return None;
        }
        Some(self.converted_dir.join(name))
    }

    pub fn save_converted(&self, name: &str, image: &image::GrayImage) -> Result<PathBuf, PipelineError> {
        let path = self.converted_dir.join(name);
        image
            .save(&path)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
        self.check_nonempty(&path)?;
        Ok(path)
    }

    pub fn save_annotated(&self, name: &str, image: &image::RgbImage) -> Result<PathBuf, PipelineError> {
        let path = self.converted_dir.join(name);
        image
            .save(&path)
            .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
        self.check_nonempty(&path)?;
        Ok(path)
    }

    // A zero-byte PNG means the write was silently truncated.
    fn check_nonempty(&self, path: &Path) -> Result<(), PipelineError> {
        let size = fs::metadata(path)?.len();
        if size == 0 {
            return Err(PipelineError::EmptyImage);
        }
        log::info!("saved {} ({} bytes)", path.display(), size);
        Ok(())
    }

    /// Deletes artifacts older than `max_age` from both directories.
    /// Returns how many files were removed.
    pub fn sweep_expired(&self, max_age: Duration) -> std::io::Result<usize> {
        let mut removed = 0;
        for dir in [&self.upload_dir, &self.converted_dir] {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let meta = entry.metadata()?;
                if !meta.is_file() {
                    continue;
                }
                let expired = meta
                    .modified()
                    .ok()
                    .and_then(|m| m.elapsed().ok())
                    .is_some_and(|age| age > max_age);
                if expired && fs::remove_file(entry.path()).is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
