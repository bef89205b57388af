//! Cheap local check of an image before it is sent anywhere.
//!
//! Missing and undecodable files are always rejected. The pixel heuristics
//! only gate the offline path: when the service is reachable its own anomaly
//! verdict is the one that counts.

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use shared::AnomalyVerdict;

use crate::upload::ImageUpload;

pub const MIN_DIMENSION: u32 = 32;
pub const MIN_MEAN_LUMA: f64 = 20.0;
pub const MIN_LUMA_STDDEV: f64 = 2.0;

const ANALYSIS_SIZE: u32 = 256;

/// An image that could be read and decoded, with the local heuristic verdict.
///
/// `verdict` is advisory: it decides only when the service cannot be asked.
#[derive(Debug, Clone)]
pub struct CheckedImage {
    pub upload: ImageUpload,
    pub verdict: AnomalyVerdict,
}

#[derive(Debug, Clone, Default)]
pub struct LocalPrecheck;

impl LocalPrecheck {
    pub fn new() -> Self {
        Self
    }

    pub async fn check(&self, path: &Path) -> AnomalyVerdict {
        match self.load(path).await {
            Ok(checked) => checked.verdict,
            Err(verdict) => verdict,
        }
    }

    /// Reads and inspects the file. A missing or undecodable file is an
    /// `Err`; anything else comes back with its bytes and verdict so the
    /// remote path does not read the file twice.
    pub async fn load(&self, path: &Path) -> Result<CheckedImage, AnomalyVerdict> {
        let upload = ImageUpload::read(path).await.map_err(|e| {
            log::warn!("Cannot read image {}: {}", path.display(), e);
            AnomalyVerdict::invalid("Image file not found")
        })?;
        let img = decode(upload.bytes())?;
        let verdict = self.judge(&img);
        if !verdict.valid {
            log::info!("Local pre-check flagged {}: {}", path.display(), verdict.reason);
        }
        Ok(CheckedImage { upload, verdict })
    }

    pub fn inspect(&self, bytes: &[u8]) -> AnomalyVerdict {
        match decode(bytes) {
            Ok(img) => self.judge(&img),
            Err(verdict) => verdict,
        }
    }

    fn judge(&self, img: &DynamicImage) -> AnomalyVerdict {
        let (width, height) = img.dimensions();
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return AnomalyVerdict::invalid("Image resolution too low");
        }

        let luma = if width > ANALYSIS_SIZE || height > ANALYSIS_SIZE {
            img.thumbnail(ANALYSIS_SIZE, ANALYSIS_SIZE).to_luma8()
        } else {
            img.to_luma8()
        };
        let count = (luma.width() * luma.height()) as f64;
        let mean = luma.pixels().map(|p| p.0[0] as f64).sum::<f64>() / count;
        let variance = luma
            .pixels()
            .map(|p| (p.0[0] as f64 - mean).powi(2))
            .sum::<f64>()
            / count;

        if mean < MIN_MEAN_LUMA {
            return AnomalyVerdict::invalid("Image too dark");
        }
        if variance.sqrt() < MIN_LUMA_STDDEV {
            return AnomalyVerdict::invalid("Image is blank or uniform");
        }

        AnomalyVerdict::valid("Valid cassava leaf image")
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage, AnomalyVerdict> {
    image::load_from_memory(bytes).map_err(|e| {
        log::debug!("Image decode failed: {}", e);
        AnomalyVerdict::invalid("Unsupported or corrupt image")
    })
}
