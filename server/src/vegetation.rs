//! Green-pixel check standing in for the service's anomaly detector.

use image::DynamicImage;
use shared::AnomalyVerdict;

/// Hue window on the 0..180 scale.
const GREEN_HUE: (u8, u8) = (35, 85);
const MIN_SATURATION: u8 = 40;
const MIN_VALUE: u8 = 40;
pub const MIN_GREEN_SHARE: f64 = 0.1;

/// 8-bit HSV with hue halved to fit in a byte.
fn rgb_to_hsv([r, g, b]: [u8; 3]) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f64, g as f64, b as f64);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let saturation = if max > 0.0 { diff / max * 255.0 } else { 0.0 };
    let mut hue = if diff == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    ((hue / 2.0).round() as u8, saturation.round() as u8, max as u8)
}

fn is_green(pixel: [u8; 3]) -> bool {
    let (h, s, v) = rgb_to_hsv(pixel);
    (GREEN_HUE.0..=GREEN_HUE.1).contains(&h) && s >= MIN_SATURATION && v >= MIN_VALUE
}

pub fn green_share(img: &DynamicImage) -> f64 {
    let rgb = img.to_rgb8();
    let total = (rgb.width() as u64 * rgb.height() as u64).max(1);
    let green = rgb.pixels().filter(|p| is_green(p.0)).count() as u64;
    green as f64 / total as f64
}

pub fn detect_anomaly(img: &DynamicImage) -> AnomalyVerdict {
    let share = green_share(img);
    log::debug!("Green pixel share {:.3}", share);
    if share < MIN_GREEN_SHARE {
        AnomalyVerdict::invalid("Insufficient vegetation detected")
    } else {
        AnomalyVerdict::valid("Valid cassava leaf image")
    }
}
