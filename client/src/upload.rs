use std::io;
use std::path::{Path, PathBuf};

/// An image read from disk, ready to be checked and sent as a multipart part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl ImageUpload {
    pub async fn read(path: &Path) -> io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(path, bytes))
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "jpg".to_string())
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "bmp" => "image/bmp",
            "webp" => "image/webp",
            _ => "image/jpeg",
        }
    }

    /// `image.<ext>` for a single upload, `image_<n>.<ext>` (1-based) in a batch.
    pub fn file_name(&self, batch_position: Option<usize>) -> String {
        match batch_position {
            Some(index) => format!("image_{}.{}", index + 1, self.extension()),
            None => format!("image.{}", self.extension()),
        }
    }
}
