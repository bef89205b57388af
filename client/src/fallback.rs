//! Local stand-in used when the inference service cannot answer.
//!
//! There is no model here. Results are always tagged
//! [`PredictionSource::Fallback`] so callers can show them as low-trust.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use shared::{ClassLabel, PredictionResult, PredictionSource};

pub trait FallbackStrategy: Send + Sync {
    fn predict(&self, image: &Path) -> PredictionResult;
}

/// Weighted pseudo-random guess, biased towards "healthy".
///
/// The generator is seeded from the configured seed and the SHA-256 of the
/// image path, so a given image always gets the same answer for a given seed.
#[derive(Debug, Clone)]
pub struct SeededFallback {
    seed: u64,
}

impl SeededFallback {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, image: &Path) -> StdRng {
        let digest = Sha256::digest(image.to_string_lossy().as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        StdRng::seed_from_u64(self.seed ^ u64::from_le_bytes(prefix))
    }

    /// Normalised shares in [`ClassLabel::ALL`] order.
    pub fn class_shares(&self, image: &Path) -> [f64; 4] {
        let mut rng = self.rng_for(image);
        let mut weights = [
            rng.random_range(0.0..0.3),
            rng.random_range(0.0..0.3),
            rng.random_range(0.0..0.3),
            rng.random_range(0.6..1.0),
        ];
        let sum: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= sum;
        }
        weights
    }
}

impl FallbackStrategy for SeededFallback {
    fn predict(&self, image: &Path) -> PredictionResult {
        let shares = self.class_shares(image);
        let (index, share) = shares
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::MIN), |best, (i, s)| if s > best.1 { (i, s) } else { best });
        let label = ClassLabel::from_index(index).unwrap_or(ClassLabel::Healthy);
        PredictionResult::clamped(label, share * 100.0, PredictionSource::Fallback)
    }
}

/// Always returns the same answer.
#[derive(Debug, Clone)]
pub struct FixedFallback {
    pub label: ClassLabel,
    pub confidence: f64,
}

impl FixedFallback {
    pub fn new(label: ClassLabel, confidence: f64) -> Self {
        Self { label, confidence }
    }
}

impl FallbackStrategy for FixedFallback {
    fn predict(&self, _image: &Path) -> PredictionResult {
        PredictionResult::clamped(self.label, self.confidence, PredictionSource::Fallback)
    }
}
