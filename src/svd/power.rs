use super::{SvdEngine, SvdResult, make_rng};
use crate::{Channel, ImsvdError, Matrix, Result, Vector, linalg};
use ndarray::{Array1, s};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardNormal;
use rand::Rng;
use tracing::{debug, trace};

/// Singular triplets one at a time: power iteration on `AᵗA`, then deflation.
///
/// The iteration count per triplet comes from the convergence bound
/// `T = floor(ln(4·ln(2·cols/δ) / (ε·δ)) / (2λ))`:
/// - `delta` tightens the failure-probability bound (smaller means more iterations)
/// - `epsilon` is the target accuracy
/// - `lambda` is the assumed spectral gap (smaller means more iterations)
#[derive(Clone, Debug)]
pub struct PowerIteration {
    delta: f64,
    epsilon: f64,
    lambda: f64,
    exhaustive: bool,
    random_state: Option<u64>,
}

impl Default for PowerIteration {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerIteration {
    pub fn new() -> Self {
        Self {
            delta: 0.1,
            epsilon: 0.97,
            lambda: 2.0,
            exhaustive: false,
            random_state: None,
        }
    }

    pub fn delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Extract every numerically non-zero triplet even when fewer are requested.
    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Power steps applied per triplet for a matrix with `cols` columns. Never below one.
    pub fn iteration_count(&self, cols: usize) -> usize {
        let inner = 4.0 * (2.0 * cols as f64 / self.delta).ln() / (self.epsilon * self.delta);
        let bound = (inner.ln() / (2.0 * self.lambda)).floor();
        if bound.is_finite() && bound >= 1.0 { bound as usize } else { 1 }
    }

    /// Extracts up to `limit` triplets (all of the numerical rank when `None`)
    /// drawing start vectors from `rng`.
    pub fn run<R: Rng + ?Sized>(&self, matrix: &Channel, limit: Option<usize>, rng: &mut R) -> Result<SvdResult> {
        if !(self.delta > 0.0 && self.epsilon > 0.0 && self.lambda > 0.0) {
            return Err(ImsvdError::Numerical(format!(
                "power iteration parameters must be positive (delta={}, epsilon={}, lambda={})",
                self.delta, self.epsilon, self.lambda
            )));
        }

        let mut a = linalg::to_float(matrix)?;
        let (m, n) = a.dim();

        let (rank, cutoff) = linalg::rank_with_tolerance(&a.view())?;
        let target = match limit {
            Some(k) if !self.exhaustive => rank.min(k),
            _ => rank,
        };
        let iterations = self.iteration_count(n);
        debug!(rows = m, cols = n, rank, target, iterations, "power iteration");

        let mut u = Matrix::zeros((m, target));
        let mut singular_values = Vector::zeros(target);
        let mut vt = Matrix::zeros((target, n));
        let mut found = 0;

        for i in 0..target {
            let mut x: Vector = Array1::random_using(n, StandardNormal, rng);

            // x <- AᵗA·x, renormalized so large spectra cannot overflow
            for _ in 0..iterations {
                let bx = a.t().dot(&a.dot(&x));
                let norm = linalg::norm(&bx.view());
                if norm < 1e-300 {
                    break;
                }
                x = bx / norm;
            }

            let norm = linalg::norm(&x.view());
            if norm < 1e-300 {
                break;
            }
            let v = x / norm;
            let av = a.dot(&v);
            let sigma = linalg::norm(&av.view());
            if sigma <= cutoff {
                trace!(component = i, "remaining matrix is numerically zero");
                break;
            }
            let ui = av / sigma;

            // Deflation
            a.scaled_add(-sigma, &linalg::outer(&ui.view(), &v.view()));

            u.column_mut(i).assign(&ui);
            singular_values[i] = sigma;
            vt.row_mut(i).assign(&v);
            found += 1;
            trace!(component = i, sigma, "extracted triplet");
        }

        let u = u.slice(s![.., ..found]).to_owned();
        let singular_values = singular_values.slice(s![..found]).to_owned();
        let vt = vt.slice(s![..found, ..]).to_owned();
        let result = SvdResult::from_f64(&u, &singular_values, &vt);
        Ok(match limit {
            Some(k) => result.truncate(k),
            None => result,
        })
    }
}

impl SvdEngine for PowerIteration {
    fn compute(&self, matrix: &Channel) -> Result<SvdResult> {
        let mut rng = make_rng(self.random_state);
        self.run(matrix, None, &mut rng)
    }

    fn compute_truncated(&self, matrix: &Channel, k: usize) -> Result<SvdResult> {
        let mut rng = make_rng(self.random_state);
        self.run(matrix, Some(k), &mut rng)
    }

    fn name(&self) -> &'static str {
        "power"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::reconstruct;
    use crate::svd::ReferenceSvd;
    use ndarray::{Array2, array};

    fn low_rank_channel() -> Channel {
        Array2::from_shape_fn((50, 50), |(i, j)| {
            let (x, y) = (i as f64, j as f64);
            let value = 80.0 + 50.0 * (0.3 * x).sin() * (0.2 * y).sin() + 20.0 * (0.5 * x).cos() * (0.7 * y).cos();
            value.round().clamp(0.0, 255.0) as u8
        })
    }

    #[test]
    fn test_iteration_count_defaults() {
        let power = PowerIteration::new();
        assert_eq!(power.iteration_count(4), 1);
        assert_eq!(power.iteration_count(512), 1);

        let tuned = PowerIteration::new().lambda(0.05);
        assert_eq!(tuned.iteration_count(50), 56);
    }

    #[test]
    fn test_rank_one_matrix_recovered_exactly() {
        let channel = array![
            [10u8, 20, 30, 40],
            [10, 20, 30, 40],
            [10, 20, 30, 40],
            [10, 20, 30, 40]
        ];

        let svd = PowerIteration::new().random_state(42).compute(&channel).unwrap();
        assert_eq!(svd.rank(), 1);
        assert!((svd.s[0] - 109.544_51).abs() < 1e-2);
        assert_eq!(reconstruct(&svd), channel);
    }

    #[test]
    fn test_dominant_value_matches_reference() {
        let channel = low_rank_channel();
        let reference = ReferenceSvd::new().compute(&channel).unwrap();
        let power = PowerIteration::new()
            .lambda(0.05)
            .random_state(5)
            .compute_truncated(&channel, 3)
            .unwrap();

        assert_eq!(power.rank(), 3);
        let relative = ((power.s[0] - reference.s[0]) / reference.s[0]).abs();
        assert!(relative < 0.01, "relative error {}", relative);

        let a = channel.mapv(f64::from);
        let approx = reconstruct(&power).mapv(f64::from);
        let error = linalg::frobenius_norm(&(&a - &approx).view());
        assert!(error < 0.05 * linalg::frobenius_norm(&a.view()));
    }

    #[test]
    fn test_stops_after_requested_triplets() {
        let channel = Array2::from_shape_fn((12, 10), |(i, j)| ((i * 31 + j * 7 + i * j * 3) % 256) as u8);
        let power = PowerIteration::new().random_state(1);

        let bounded = power.compute_truncated(&channel, 2).unwrap();
        assert_eq!(bounded.rank(), 2);

        let exhaustive = power.clone().exhaustive(true).compute_truncated(&channel, 2).unwrap();
        assert_eq!(exhaustive.rank(), 2);

        let full = power.compute(&channel).unwrap();
        assert!(full.rank() > 2);
    }

    #[test]
    fn test_seeded_runs_are_deterministic() {
        let channel = low_rank_channel();
        let power = PowerIteration::new().random_state(99);
        let first = power.compute_truncated(&channel, 2).unwrap();
        let second = power.compute_truncated(&channel, 2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_matrix_yields_no_triplets() {
        let channel = Channel::zeros((3, 5));
        let svd = PowerIteration::new().random_state(0).compute(&channel).unwrap();
        assert_eq!(svd.rank(), 0);
        assert_eq!(svd.u.shape(), &[3, 0]);
        assert_eq!(svd.vh.shape(), &[0, 5]);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let channel = array![[1u8, 2], [3, 4]];
        let result = PowerIteration::new().lambda(0.0).compute(&channel);
        assert!(matches!(result, Err(ImsvdError::Numerical(_))));
    }
}
