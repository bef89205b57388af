use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use shared::ClassLabel;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("cannot identify image file: {0}")]
    Decode(#[from] image::ImageError),
}

/// Stand-in for the trained classifier. Scores are pseudo-random but fixed
/// per image content, so the same upload always gets the same answer.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderModel {
    seed: u64,
}

impl PlaceholderModel {
    #[cfg(test)]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    pub fn decode(&self, image_data: &[u8]) -> Result<DynamicImage, ModelError> {
        Ok(image::load_from_memory(image_data)?)
    }

    /// Normalised class shares in [`ClassLabel::ALL`] order.
    pub fn inference(&self, image_data: &[u8]) -> [f64; 4] {
        let digest = Sha256::digest(image_data);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let mut rng = StdRng::seed_from_u64(self.seed ^ u64::from_le_bytes(prefix));

        // Raised to the fourth power so one class usually stands out.
        let mut scores = [0.0f64; 4];
        for score in scores.iter_mut() {
            *score = rng.random::<f64>().powi(4) + 1e-6;
        }
        let sum: f64 = scores.iter().sum();
        scores.map(|s| s / sum)
    }

    pub fn calculate_result(&self, scores: &[f64; 4]) -> (ClassLabel, f64) {
        let (index, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        let label = ClassLabel::from_index(index).unwrap_or(ClassLabel::Healthy);
        (label, (best * 100.0).clamp(0.0, 100.0))
    }
}
