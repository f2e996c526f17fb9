//! Per-post scratch space.
//!
//! Each attempt owns `<output>/<postId>` and `<downloads>/<postId>` for its
//! lifetime. `purge` runs on every exit path; the `Drop` impl is a
//! last-chance sweep so nothing survives a panic or an abandoned future.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::WorkerConfig;

/// Paths for one item's work.
#[derive(Debug, Clone)]
pub struct ItemDirs {
    /// Where encoder outputs land
    pub output: PathBuf,
    /// Where the original is downloaded
    pub download: PathBuf,
}

/// Scratch directories for one post attempt.
#[derive(Debug)]
pub struct ScratchSpace {
    output_root: PathBuf,
    download_root: PathBuf,
    purged: bool,
}

impl ScratchSpace {
    pub fn new(config: &WorkerConfig, post_id: &str) -> Self {
        Self {
            output_root: config.output_dir.join(post_id),
            download_root: config.download_dir.join(post_id),
            purged: false,
        }
    }

    /// Purge and recreate the directories for one item.
    pub async fn reset_item(&self, media_id: &str) -> std::io::Result<ItemDirs> {
        let dirs = ItemDirs {
            output: self.output_root.join(media_id),
            download: self.download_root.join(media_id),
        };

        for dir in [&dirs.output, &dirs.download] {
            remove_if_present(dir).await?;
            tokio::fs::create_dir_all(dir).await?;
        }

        Ok(dirs)
    }

    /// Remove everything this attempt wrote. Failures are logged, never
    /// raised.
    pub async fn purge(&mut self) {
        for root in [&self.output_root, &self.download_root] {
            if let Err(e) = remove_if_present(root).await {
                warn!("Failed to purge scratch dir {}: {}", root.display(), e);
            }
        }
        self.purged = true;
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.purged {
            return;
        }
        for root in [&self.output_root, &self.download_root] {
            if root.exists() {
                if let Err(e) = std::fs::remove_dir_all(root) {
                    warn!("Failed to sweep scratch dir {}: {}", root.display(), e);
                }
            }
        }
    }
}

async fn remove_if_present(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base: &Path) -> WorkerConfig {
        WorkerConfig {
            output_dir: base.join("output"),
            download_dir: base.join("downloads"),
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_reset_item_recreates_clean_dirs() {
        let base = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(&test_config(base.path()), "p1");

        let dirs = scratch.reset_item("m1").await.unwrap();
        tokio::fs::write(dirs.output.join("stale.ts"), b"x")
            .await
            .unwrap();

        let dirs = scratch.reset_item("m1").await.unwrap();
        assert!(dirs.output.exists());
        assert!(dirs.download.exists());
        assert!(!dirs.output.join("stale.ts").exists());
    }

    #[tokio::test]
    async fn test_purge_removes_roots() {
        let base = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::new(&test_config(base.path()), "p1");

        let dirs = scratch.reset_item("m1").await.unwrap();
        tokio::fs::write(dirs.download.join("a.mp4"), b"x")
            .await
            .unwrap();

        scratch.purge().await;
        assert!(!base.path().join("output").join("p1").exists());
        assert!(!base.path().join("downloads").join("p1").exists());
    }

    #[tokio::test]
    async fn test_drop_sweeps_leftovers() {
        let base = tempfile::tempdir().unwrap();
        let config = test_config(base.path());

        {
            let scratch = ScratchSpace::new(&config, "p1");
            scratch.reset_item("m1").await.unwrap();
        }

        assert!(!base.path().join("output").join("p1").exists());
        assert!(!base.path().join("downloads").join("p1").exists());
    }

    #[tokio::test]
    async fn test_purge_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let mut scratch = ScratchSpace::new(&test_config(base.path()), "p1");
        scratch.purge().await;
        scratch.purge().await;
    }
}
