use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Upper bound on a single proof photo.
pub const MAX_PHOTO_SIZE: usize = 10 * 1024 * 1024;

/// Manages on-disk storage for dose proof photos.
///
/// Each photo is a flat file at `{storage_dir}/{file_name}`; names are
/// generated server-side and never reused.
pub struct Storage {
    dir: PathBuf,
}

pub struct StoredPhoto {
    pub file_name: String,
    pub size: u64,
    pub sha256: String,
}

impl Storage {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Photo storage directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Write a new photo under a fresh `{unix_millis}-{8 hex}.{ext}` name.
    pub async fn save(&self, data: &[u8], ext: &str) -> Result<StoredPhoto> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let sha256 = hex::encode(hasher.finalize());

        let file_name = generate_name(ext);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.file_path(&file_name))
            .await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(StoredPhoto {
            file_name,
            size: data.len() as u64,
            sha256,
        })
    }

    pub async fn read(&self, file_name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.file_path(file_name)).await?)
    }
}

pub fn generate_name(ext: &str) -> String {
    format!(
        "{}-{:08x}.{}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        ext
    )
}

/// Names we could have generated: no separators, no leading dot.
pub fn is_valid_name(file_name: &str) -> bool {
    !file_name.is_empty()
        && file_name.len() <= 64
        && !file_name.starts_with('.')
        && !file_name.contains("..")
        && file_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// File extension for an accepted image content type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
