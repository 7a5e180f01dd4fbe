//! Piecewise-linear interpolation over monotone knots.

/// Linear interpolation between two knots.
pub fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

/// Interpolate `ys` at `x` against strictly descending `xs`.
///
/// Returns `None` outside `[xs.last(), xs.first()]`; there is no extrapolation.
pub fn interp_descending(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len();
    if n == 0 || !x.is_finite() || x > xs[0] || x < xs[n - 1] {
        return None;
    }
    if n == 1 {
        return Some(ys[0]);
    }

    // First index whose knot is <= x. Knots are descending, so everything
    // before it is strictly greater than x.
    let hi = xs.partition_point(|&k| k > x);
    if hi == 0 {
        return Some(ys[0]);
    }
    if xs[hi] == x {
        return Some(ys[hi]);
    }
    Some(linear_interp((xs[hi - 1], ys[hi - 1]), (xs[hi], ys[hi]), x))
}

/// Like [`interp_descending`], but clamps `x` to the knot range first.
pub fn interp_descending_clamped(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let n = xs.len();
    if n == 0 || x.is_nan() {
        return None;
    }
    let x = x.clamp(xs[n - 1], xs[0]);
    interp_descending(xs, ys, x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_descending_knots() {
        let xs = [10.0, 5.0, 0.0];
        let ys = [100.0, 50.0, 20.0];
        assert_eq!(interp_descending(&xs, &ys, 10.0), Some(100.0));
        assert_eq!(interp_descending(&xs, &ys, 5.0), Some(50.0));
        assert_eq!(interp_descending(&xs, &ys, 0.0), Some(20.0));
        let mid = interp_descending(&xs, &ys, 7.5).unwrap();
        assert!((mid - 75.0).abs() < 1e-12);
        let low = interp_descending(&xs, &ys, 2.5).unwrap();
        assert!((low - 35.0).abs() < 1e-12);
    }

    #[test]
    fn no_extrapolation_outside_knots() {
        let xs = [10.0, 0.0];
        let ys = [1.0, 0.0];
        assert_eq!(interp_descending(&xs, &ys, 10.5), None);
        assert_eq!(interp_descending(&xs, &ys, -0.1), None);
    }

    #[test]
    fn clamped_variant_holds_boundary_values() {
        let xs = [10.0, 0.0];
        let ys = [1.0, 0.0];
        assert_eq!(interp_descending_clamped(&xs, &ys, 25.0), Some(1.0));
        assert_eq!(interp_descending_clamped(&xs, &ys, -3.0), Some(0.0));
    }
}
