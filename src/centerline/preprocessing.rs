use nalgebra::Point3;

use crate::error::{Result, TethermapError};

const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Replaces anchors that jump away from their predecessor.
///
/// A step whose xy length exceeds `threshold` times the mean xy step marks
/// the anchor after it as an outlier; that anchor is moved to the midpoint of
/// its neighbours. The last anchor has no successor and is left in place.
pub fn fix_outliers(anchors: &[Point3<f64>], threshold: f64) -> Vec<Point3<f64>> {
    let mut fixed = anchors.to_vec();
    if fixed.len() < 3 {
        return fixed;
    }

    let xy_step = |a: &Point3<f64>, b: &Point3<f64>| ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
    let mean = fixed.windows(2).map(|w| xy_step(&w[0], &w[1])).sum::<f64>()
        / (fixed.len() - 1) as f64;

    for i in 0..fixed.len() - 1 {
        let step = xy_step(&fixed[i], &fixed[i + 1]);
        if step <= threshold * mean {
            continue;
        }
        if i + 2 >= fixed.len() {
            log::warn!("anchor {} is an outlier but has no successor, kept", i + 1);
            continue;
        }
        log::debug!("anchor {} jumps {:.3} (mean {:.3}), replaced", i + 1, step, mean);
        fixed[i + 1] = nalgebra::center(&fixed[i], &fixed[i + 2]);
    }
    fixed
}

/// Gaussian smoothing of each coordinate along the anchor sequence, with
/// mirrored boundaries and the kernel cut at four standard deviations.
pub fn smooth_anchors(anchors: &[Point3<f64>], sigma: f64) -> Result<Vec<Point3<f64>>> {
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(TethermapError::InvalidArgument(format!(
            "sigma must be positive, got {sigma}"
        )));
    }
    let n = anchors.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    let smoothed = (0..n as isize)
        .map(|i| {
            let acc = (-radius..=radius)
                .zip(&weights)
                .fold(nalgebra::Vector3::zeros(), |acc, (k, w)| {
                    acc + anchors[reflect(i + k, n)].coords * *w
                });
            Point3::from(acc / total)
        })
        .collect();
    Ok(smoothed)
}

/// Maps an out-of-range index back into `0..n` by mirroring about the
/// edges (`d c b a | a b c d | d c b a`).
fn reflect(mut idx: isize, n: usize) -> usize {
    let n = n as isize;
    loop {
        if idx < 0 {
            idx = -idx - 1;
        } else if idx >= n {
            idx = 2 * n - idx - 1;
        } else {
            return idx as usize;
        }
    }
}
