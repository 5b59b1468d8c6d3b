//! On-disk store for merged outputs.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::image::OutputFormat;

/// A merged image written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredOutput {
    pub filename: String,
    pub path: PathBuf,
}

/// Directory of merged outputs, addressed by generated file name.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();

        std::fs::create_dir_all(&dir).map_err(|source| Error::OutputDir {
            path: dir.clone(),
            source,
        })?;

        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write encoded bytes under a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn store(&self, bytes: &[u8], format: OutputFormat) -> Result<StoredOutput> {
        let filename = format!("merged_{}.{}", Uuid::new_v4(), format.extension());
        let path = self.dir.join(&filename);

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.dir.join(format!(".{filename}.tmp"));
        tokio::fs::write(&temp_path, bytes).await?;
        if let Err(err) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err.into());
        }

        tracing::info!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(StoredOutput { filename, path })
    }

    /// Map a requested file name to a path inside the store.
    ///
    /// Returns `None` for names that could escape the directory or refer to
    /// in-progress temporary files.
    #[must_use]
    pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains("..")
            && filename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        valid.then(|| self.dir.join(filename))
    }

    /// Remove every file whose modification time is at least `max_age` ago.
    ///
    /// Hidden entries, which include in-progress writes, are left alone.
    /// Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or a file cannot
    /// be removed.
    pub async fn cleanup(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age < max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                // Raced with another cleanup
                Err(err) if err.kind() == IoErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(removed)
    }
}

/// Periodically remove outputs older than `retention`.
pub fn spawn_cleanup(
    store: OutputStore,
    interval: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.cleanup(retention).await {
                Ok(0) => tracing::debug!("Cleanup found nothing to remove"),
                Ok(removed) => tracing::info!("Cleanup removed {removed} expired outputs"),
                Err(err) => tracing::warn!("Cleanup of {} failed: {err}", store.dir().display()),
            }
        }
    })
}
