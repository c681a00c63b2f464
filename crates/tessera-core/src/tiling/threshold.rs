//! Luminance histograms and Otsu threshold selection.

use image::RgbaImage;

/// Number of 8-bit luminance levels.
const LEVELS: usize = 256;

/// Perceptual luminance of an RGB triple, rounded to the nearest level.
///
/// Uses the Rec. 601 weights `0.299 R + 0.587 G + 0.114 B`. Alpha is ignored.
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let l = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    l.round().clamp(0.0, 255.0) as u8
}

/// 256-bin luminance histogram of one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: [u64; LEVELS],
    total: u64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self {
            bins: [0; LEVELS],
            total: 0,
        }
    }
}

impl Histogram {
    /// Build a histogram from raw luminance values.
    pub fn from_luma(values: impl IntoIterator<Item = u8>) -> Self {
        let mut hist = Self::default();
        for v in values {
            hist.bins[v as usize] += 1;
            hist.total += 1;
        }
        hist
    }

    /// Build a histogram over the luminance of every pixel in `image`.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        Self::from_luma(image.pixels().map(|p| luminance(p[0], p[1], p[2])))
    }

    pub fn bins(&self) -> &[u64; LEVELS] {
        &self.bins
    }

    /// Number of samples counted.
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Otsu's threshold: the lowest foreground level of the split that maximizes
/// between-class variance.
///
/// A split at `t` puts `[0, t]` in the background and `(t, 255]` in the
/// foreground, and the returned value is `t + 1`, so binarizing with
/// `luminance >= threshold` sends exactly the foreground to white. Only
/// strictly larger variances replace the running best, so ties resolve to the
/// lowest split. A histogram with fewer than two populated levels has no split
/// and yields 0.
pub fn otsu_threshold(hist: &Histogram) -> u8 {
    let total = hist.total as f64;
    let sum: f64 = hist
        .bins
        .iter()
        .enumerate()
        .map(|(t, &count)| t as f64 * count as f64)
        .sum();

    let mut sum_b = 0.0f64;
    let mut w_b = 0u64;
    let mut var_max = 0.0f64;
    let mut threshold = 0u8;

    for (t, &count) in hist.bins.iter().enumerate() {
        w_b += count;
        if w_b == 0 {
            continue;
        }
        let w_f = hist.total - w_b;
        if w_f == 0 {
            break;
        }

        sum_b += t as f64 * count as f64;
        let w_b_f = w_b as f64;
        let w_f_f = total - w_b_f;
        let m_b = sum_b / w_b_f;
        let m_f = (sum - sum_b) / w_f_f;

        let var_between = w_b_f * w_f_f * (m_b - m_f) * (m_b - m_f);
        if var_between > var_max {
            var_max = var_between;
            // t < 255 here: the foreground is non-empty
            threshold = (t + 1) as u8;
        }
    }

    threshold
}

/// Histogram the tile and pick its Otsu threshold.
pub fn select_threshold(image: &RgbaImage) -> u8 {
    otsu_threshold(&Histogram::from_rgba(image))
}
