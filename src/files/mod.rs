//! Blob store port: post bodies and image payloads, addressed by the
//! filenames the interpretation stage derives. Filenames never reach
//! clients; images are exposed only through their access ids.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppResult;

pub trait FileStore: Send + Sync {
    fn write_post(&self, filename: &str, content: &str) -> AppResult<()>;
    fn read_post(&self, filename: &str) -> AppResult<String>;
    fn save_image(&self, filename: &str, bytes: &[u8]) -> AppResult<()>;
    fn delete_image(&self, filename: &str) -> AppResult<()>;
    fn delete_post(&self, filename: &str) -> AppResult<()>;
    /// Absolute path for serving an image off disk.
    fn image_path(&self, filename: &str) -> PathBuf;
}

/// Directory-backed store: one directory for post bodies, one for images.
pub struct LocalFiles {
    posts_dir: PathBuf,
    images_dir: PathBuf,
}

impl LocalFiles {
    pub fn new(posts_dir: &Path, images_dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(posts_dir)?;
        fs::create_dir_all(images_dir)?;
        tracing::info!(
            "file store at posts={} images={}",
            posts_dir.display(),
            images_dir.display()
        );
        Ok(Self {
            posts_dir: posts_dir.to_path_buf(),
            images_dir: images_dir.to_path_buf(),
        })
    }
}

impl FileStore for LocalFiles {
    fn write_post(&self, filename: &str, content: &str) -> AppResult<()> {
        fs::write(self.posts_dir.join(filename), content)?;
        Ok(())
    }

    fn read_post(&self, filename: &str) -> AppResult<String> {
        Ok(fs::read_to_string(self.posts_dir.join(filename))?)
    }

    fn save_image(&self, filename: &str, bytes: &[u8]) -> AppResult<()> {
        fs::write(self.images_dir.join(filename), bytes)?;
        Ok(())
    }

    fn delete_image(&self, filename: &str) -> AppResult<()> {
        fs::remove_file(self.images_dir.join(filename))?;
        Ok(())
    }

    fn delete_post(&self, filename: &str) -> AppResult<()> {
        fs::remove_file(self.posts_dir.join(filename))?;
        Ok(())
    }

    fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }
}
