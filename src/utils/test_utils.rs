use nalgebra::{Point3, Vector3};

/// `n` samples spaced one unit apart along `direction`, starting at the origin.
pub fn straight_line(n: usize, direction: Vector3<f64>) -> Vec<Point3<f64>> {
    let d = direction.normalize();
    (0..n).map(|i| Point3::from(d * i as f64)).collect()
}

/// Planar arc of radius `radius` in the xy-plane with unit arc spacing.
pub fn circular_arc(radius: f64, n: usize) -> Vec<Point3<f64>> {
    (0..n)
        .map(|i| {
            let phi = i as f64 / radius;
            Point3::new(radius * phi.cos(), radius * phi.sin(), 0.0)
        })
        .collect()
}

/// Helix `(a cos t, a sin t, b t)` sampled at unit arc-length spacing, so
/// sample `i` sits at `t = i / sqrt(a² + b²)`.
pub fn helix(a: f64, b: f64, n: usize) -> Vec<Point3<f64>> {
    let c = (a * a + b * b).sqrt();
    (0..n)
        .map(|i| {
            let t = i as f64 / c;
            Point3::new(a * t.cos(), a * t.sin(), b * t)
        })
        .collect()
}

/// Planar sine wave `y = 10 sin(x / 10)` with inflections at multiples of
/// `10π`.
pub fn s_curve(n: usize) -> Vec<Point3<f64>> {
    (0..n)
        .map(|i| {
            let x = i as f64;
            Point3::new(x, 10.0 * (x / 10.0).sin(), 0.0)
        })
        .collect()
}

/// Sparse anchors along a gently bending tube, as an annotator would click
/// them: `(x, y, z)` in physical units, ordered from one end to the other.
pub fn tube_anchors(n: usize, spacing: f64) -> Vec<Point3<f64>> {
    (0..n)
        .map(|i| {
            let s = i as f64 * spacing;
            Point3::new(s, 8.0 * (s / 40.0).sin(), 0.25 * s)
        })
        .collect()
}
