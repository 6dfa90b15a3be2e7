use nalgebra::{DMatrix, Point3, Vector3};

use crate::error::{Result, TethermapError};

const MIN_PARAM_STEP: f64 = 1e-12;
const LAMBDA_SPAN: f64 = 1e8;
const BISECTION_STEPS: usize = 80;

/// Clamped parametric B-spline over u in [0, 1] with 3D control points.
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    degree: usize,
    knots: Vec<f64>,
    coefficients: Vec<Vector3<f64>>,
}

impl BSpline {
    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn coefficients(&self) -> &[Vector3<f64>] {
        &self.coefficients
    }

    pub fn evaluate(&self, u: f64) -> Point3<f64> {
        let u = u.clamp(0.0, 1.0);
        let span = find_span(&self.knots, self.degree, self.coefficients.len(), u);
        let basis = basis_functions(&self.knots, self.degree, span, u);
        let first = span - self.degree;
        let p = basis
            .iter()
            .enumerate()
            .fold(Vector3::zeros(), |acc, (r, b)| {
                acc + self.coefficients[first + r] * *b
            });
        Point3::from(p)
    }

    /// Evaluates the spline at `n` uniformly spaced parameters in [0, 1].
    pub fn sample_uniform(&self, n: usize) -> Vec<Point3<f64>> {
        match n {
            0 => Vec::new(),
            1 => vec![self.evaluate(0.0)],
            _ => {
                let step = 1.0 / (n - 1) as f64;
                (0..n).map(|i| self.evaluate(i as f64 * step)).collect()
            }
        }
    }
}

/// Normalized cumulative chord length of `points`, starting at 0 and ending
/// at 1. Repeated consecutive points make the parameterization degenerate.
pub fn chord_length_parameters(points: &[Point3<f64>]) -> Result<Vec<f64>> {
    let mut params = Vec::with_capacity(points.len());
    params.push(0.0);
    let mut total = 0.0;
    for (i, pair) in points.windows(2).enumerate() {
        let step = nalgebra::distance(&pair[0], &pair[1]);
        if step <= MIN_PARAM_STEP {
            return Err(TethermapError::DegenerateCurve(format!(
                "anchors {} and {} coincide",
                i,
                i + 1
            )));
        }
        total += step;
        params.push(total);
    }
    if total <= MIN_PARAM_STEP {
        return Err(TethermapError::DegenerateCurve(
            "anchor path has zero length".to_string(),
        ));
    }
    for p in params.iter_mut() {
        *p /= total;
    }
    Ok(params)
}

/// Fits a smoothing spline of `degree` through `points`, kept in their given
/// order.
///
/// The spline has one control point per anchor. With `smoothing <= 0` it
/// interpolates the anchors. Otherwise a second-difference roughness
/// penalty is weighted so that the summed squared residual over all three
/// coordinates equals `smoothing`; when even the stiffest fit stays below
/// that budget the stiffest fit is returned.
pub fn fit_smoothing_spline(
    points: &[Point3<f64>],
    degree: usize,
    smoothing: f64,
) -> Result<BSpline> {
    let m = points.len();
    if m < degree + 1 {
        return Err(TethermapError::InsufficientPoints {
            required: degree + 1,
            found: m,
        });
    }

    let params = chord_length_parameters(points)?;
    let knots = averaged_knots(&params, degree);
    let collocation = collocation_matrix(&knots, degree, &params);
    let targets = DMatrix::from_fn(m, 3, |i, j| points[i][j]);

    let coefficients = if smoothing <= 0.0 || m < 3 {
        collocation
            .clone()
            .lu()
            .solve(&targets)
            .ok_or_else(|| {
                TethermapError::IllConditioned("interpolation matrix is singular".to_string())
            })?
    } else {
        let greville = greville_abscissae(&knots, degree, m);
        let penalty = second_difference_penalty(&greville)?;
        penalized_fit(&collocation, &penalty, &targets, smoothing)?
    };

    Ok(BSpline {
        degree,
        knots,
        coefficients: (0..m)
            .map(|i| Vector3::new(coefficients[(i, 0)], coefficients[(i, 1)], coefficients[(i, 2)]))
            .collect(),
    })
}

fn penalized_fit(
    b: &DMatrix<f64>,
    d: &DMatrix<f64>,
    y: &DMatrix<f64>,
    smoothing: f64,
) -> Result<DMatrix<f64>> {
    let btb = b.transpose() * b;
    let dtd = d.transpose() * d;
    let bty = b.transpose() * y;

    let scale = btb.trace() / dtd.trace();
    if !scale.is_finite() || scale <= 0.0 {
        return Err(TethermapError::IllConditioned(
            "roughness penalty vanishes".to_string(),
        ));
    }

    let solve = |lambda: f64| -> Result<(DMatrix<f64>, f64)> {
        let system = &btb + &dtd * lambda;
        let coefs = match system.clone().cholesky() {
            Some(chol) => chol.solve(&bty),
            None => system.lu().solve(&bty).ok_or_else(|| {
                TethermapError::IllConditioned(format!(
                    "penalized system is singular at lambda={lambda:e}"
                ))
            })?,
        };
        let residual = (b * &coefs - y).norm_squared();
        Ok((coefs, residual))
    };

    let lambda_hi = scale * LAMBDA_SPAN;
    let (stiff, rss_stiff) = solve(lambda_hi)?;
    if rss_stiff <= smoothing {
        return Ok(stiff);
    }

    // rss grows monotonically with lambda; keep rss(lo) <= smoothing < rss(hi)
    let mut lo = (scale / LAMBDA_SPAN).ln();
    let mut hi = lambda_hi.ln();
    let (mut best, rss_lo) = solve(lo.exp())?;
    if rss_lo > smoothing {
        return Ok(best);
    }
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        let (coefs, rss) = solve(mid.exp())?;
        if rss <= smoothing {
            lo = mid;
            best = coefs;
        } else {
            hi = mid;
        }
    }
    Ok(best)
}

/// Clamped knot vector whose interior knots average `degree` consecutive
/// parameters, which keeps the collocation matrix nonsingular.
fn averaged_knots(params: &[f64], degree: usize) -> Vec<f64> {
    let m = params.len();
    let mut knots = Vec::with_capacity(m + degree + 1);
    knots.extend(std::iter::repeat(0.0).take(degree + 1));
    for j in 1..m - degree {
        let sum: f64 = params[j..j + degree].iter().sum();
        knots.push(sum / degree as f64);
    }
    knots.extend(std::iter::repeat(1.0).take(degree + 1));
    knots
}

fn greville_abscissae(knots: &[f64], degree: usize, n: usize) -> Vec<f64> {
    (0..n)
        .map(|j| knots[j + 1..j + degree + 1].iter().sum::<f64>() / degree as f64)
        .collect()
}

/// Second divided differences of the coefficients over their Greville
/// abscissae. Coefficients of a straight line carry no penalty.
fn second_difference_penalty(greville: &[f64]) -> Result<DMatrix<f64>> {
    let n = greville.len();
    let mut d = DMatrix::zeros(n - 2, n);
    for j in 0..n - 2 {
        let h0 = greville[j + 1] - greville[j];
        let h1 = greville[j + 2] - greville[j + 1];
        if h0 <= MIN_PARAM_STEP || h1 <= MIN_PARAM_STEP {
            return Err(TethermapError::DegenerateCurve(
                "coincident spline abscissae".to_string(),
            ));
        }
        d[(j, j)] = 1.0 / h0;
        d[(j, j + 1)] = -(1.0 / h0 + 1.0 / h1);
        d[(j, j + 2)] = 1.0 / h1;
    }
    Ok(d)
}

fn collocation_matrix(knots: &[f64], degree: usize, params: &[f64]) -> DMatrix<f64> {
    let n = params.len();
    let mut b = DMatrix::zeros(n, n);
    for (i, &u) in params.iter().enumerate() {
        let span = find_span(knots, degree, n, u);
        let basis = basis_functions(knots, degree, span, u);
        for (r, value) in basis.into_iter().enumerate() {
            b[(i, span - degree + r)] = value;
        }
    }
    b
}

/// Index s with knots[s] <= u < knots[s + 1], clamped to the last nonempty
/// span so that u = 1 evaluates the end point.
fn find_span(knots: &[f64], degree: usize, n_coefficients: usize, u: f64) -> usize {
    let last = n_coefficients - 1;
    if u >= knots[last + 1] {
        return last;
    }
    let mut span = degree;
    while span < last && u >= knots[span + 1] {
        span += 1;
    }
    span
}

/// Non-vanishing basis functions on `span` (Cox–de Boor recursion).
fn basis_functions(knots: &[f64], degree: usize, span: usize, u: f64) -> Vec<f64> {
    let mut basis = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    basis[0] = 1.0;
    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = basis[r] / (right[r + 1] + left[j - r]);
            basis[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        basis[j] = saved;
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wavy_points() -> Vec<Point3<f64>> {
        (0..8)
            .map(|i| {
                let t = i as f64;
                Point3::new(t * 5.0, (t * 0.9).sin() * 6.0, t * 1.5)
            })
            .collect()
    }

    #[test]
    fn test_basis_is_partition_of_unity() {
        let params = chord_length_parameters(&wavy_points()).unwrap();
        let knots = averaged_knots(&params, 3);
        for k in 0..=20 {
            let u = k as f64 / 20.0;
            let span = find_span(&knots, 3, params.len(), u);
            let sum: f64 = basis_functions(&knots, 3, span, u).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_smoothing_interpolates_anchors() {
        let points = wavy_points();
        let spline = fit_smoothing_spline(&points, 3, 0.0).unwrap();
        let params = chord_length_parameters(&points).unwrap();
        for (p, u) in points.iter().zip(params) {
            let q = spline.evaluate(u);
            assert_relative_eq!(nalgebra::distance(p, &q), 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_smoothing_budget_is_respected() {
        let points = wavy_points();
        let params = chord_length_parameters(&points).unwrap();
        for budget in [1.0, 10.0, 50.0] {
            let spline = fit_smoothing_spline(&points, 3, budget).unwrap();
            let rss: f64 = points
                .iter()
                .zip(&params)
                .map(|(p, u)| (spline.evaluate(*u) - p).norm_squared())
                .sum();
            assert!(rss <= budget * (1.0 + 1e-6), "rss {rss} over budget {budget}");
        }
    }

    #[test]
    fn test_stiff_fit_reproduces_straight_line() {
        let points: Vec<_> = (0..6)
            .map(|i| Point3::new(2.0 * i as f64, 1.0 + i as f64, -(i as f64)))
            .collect();
        let spline = fit_smoothing_spline(&points, 3, 1e6).unwrap();
        assert_relative_eq!(
            nalgebra::distance(&spline.evaluate(0.0), &points[0]),
            0.0,
            epsilon = 1e-5
        );
        assert_relative_eq!(
            nalgebra::distance(&spline.evaluate(1.0), &points[5]),
            0.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_coincident_anchors_are_degenerate() {
        let mut points = wavy_points();
        points[3] = points[2];
        let err = fit_smoothing_spline(&points, 3, 0.0).unwrap_err();
        assert!(matches!(err, TethermapError::DegenerateCurve(_)));
    }

    #[test]
    fn test_too_few_anchors_for_degree() {
        let points = &wavy_points()[..3];
        let err = fit_smoothing_spline(points, 3, 0.0).unwrap_err();
        assert_eq!(
            err,
            TethermapError::InsufficientPoints {
                required: 4,
                found: 3
            }
        );
    }

    #[test]
    fn test_linear_degree_passes_through_anchors() {
        let points = wavy_points();
        let spline = fit_smoothing_spline(&points, 1, 0.0).unwrap();
        assert_relative_eq!(
            nalgebra::distance(&spline.evaluate(1.0), &points[7]),
            0.0,
            epsilon = 1e-9
        );
        assert_eq!(spline.knots().len(), points.len() + 2);
    }
}
