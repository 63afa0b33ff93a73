use itertools::Itertools;
use nalgebra::Point3;

/// Asserts that two points agree up to an absolute tolerance in every coordinate.
#[macro_export]
macro_rules! assert_points_approx_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let x: &nalgebra::Point3<f64> = &$x;
        let y: &nalgebra::Point3<f64> = &$y;
        let max_absdiff = (x - y).amax();
        if max_absdiff > $tol {
            println!("abstol: {:e}", $tol);
            println!("left: {}", x);
            println!("right: {}", y);
            println!("max abs diff: {:e}", max_absdiff);
        }
        assert!(max_absdiff <= $tol);
    }};
}

/// Asserts that two slices of knots agree up to an absolute tolerance.
#[macro_export]
macro_rules! assert_knots_approx_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let x: &[f64] = &$x;
        let y: &[f64] = &$y;
        assert_eq!(x.len(), y.len(), "knot sequences differ in length: {:?} vs {:?}", x, y);
        for (a, b) in x.iter().zip(y) {
            assert!((a - b).abs() <= $tol, "knots differ: {:?} vs {:?}", x, y);
        }
    }};
}

/// Uniform samples of the interval `[a, b]`, endpoints included.
pub fn uniform_samples(a: f64, b: f64, num_samples: usize) -> Vec<f64> {
    assert!(num_samples >= 2, "need at least the two endpoints");
    let h = (b - a) / (num_samples - 1) as f64;
    (0..num_samples)
        .map(|i| if i + 1 == num_samples { b } else { a + i as f64 * h })
        .collect()
}

/// A tensor grid of parametric points over the given per-direction domains.
///
/// The first direction varies fastest.
pub fn parametric_grid(domains: &[(f64, f64)], samples_per_dim: usize) -> Vec<Vec<f64>> {
    if domains.is_empty() {
        return vec![Vec::new()];
    }
    domains
        .iter()
        .rev()
        .map(|&(a, b)| uniform_samples(a, b, samples_per_dim))
        .multi_cartesian_product()
        .map(|mut xi| {
            xi.reverse();
            xi
        })
        .collect()
}

/// Largest coordinate distance between two point sets of equal length.
pub fn max_point_distance(x: &[Point3<f64>], y: &[Point3<f64>]) -> f64 {
    assert_eq!(x.len(), y.len());
    x.iter()
        .zip(y)
        .map(|(a, b)| (a - b).amax())
        .fold(0.0, f64::max)
}
