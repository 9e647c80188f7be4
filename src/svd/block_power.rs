use super::{SvdEngine, SvdResult, make_rng};
use crate::{Channel, ImsvdError, Matrix, Result, linalg};
use ndarray::{Array2, s};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardNormal;
use rand::Rng;
use tracing::{debug, trace};

/// Convergence threshold on the residual `‖A·V − U·S‖_F`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tolerance {
    /// Fixed threshold regardless of the matrix.
    Absolute(f64),
    /// Fraction of `‖A‖_F`, so the criterion scales with image size and brightness.
    Relative(f64),
}

impl Tolerance {
    pub fn threshold(&self, a: &Matrix) -> f64 {
        match *self {
            Tolerance::Absolute(tol) => tol,
            Tolerance::Relative(ratio) => ratio * linalg::frobenius_norm(&a.view()),
        }
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Absolute(1000.0)
    }
}

/// Result of a converged block power iteration.
#[derive(Clone, Debug)]
pub struct BlockOutcome {
    pub result: SvdResult,
    pub rounds: usize,
    pub residual: f64,
}

/// Simultaneous subspace iteration over all `min(rows, cols)` components.
#[derive(Clone, Debug)]
pub struct BlockPowerIteration {
    tolerance: Tolerance,
    max_rounds: usize,
    random_state: Option<u64>,
}

impl Default for BlockPowerIteration {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockPowerIteration {
    pub fn new() -> Self {
        Self {
            tolerance: Tolerance::default(),
            max_rounds: 1000,
            random_state: None,
        }
    }

    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Iterates from a random start drawn from `rng` until the residual drops
    /// under the tolerance, or fails after `max_rounds`.
    pub fn run<R: Rng + ?Sized>(&self, matrix: &Channel, rng: &mut R) -> Result<BlockOutcome> {
        let a = linalg::to_float(matrix)?;
        let (m, n) = a.dim();
        let k = m.min(n);
        let threshold = self.tolerance.threshold(&a);

        let mut v: Matrix = Array2::random_using((n, m), StandardNormal, rng);
        let mut residual = f64::INFINITY;

        for round in 1..=self.max_rounds {
            let (q, _) = linalg::qr(&a.dot(&v).view());
            let u = q.slice(s![.., ..k]).to_owned();

            let (q, r) = linalg::qr(&a.t().dot(&u).view());
            v = q.slice(s![.., ..k]).to_owned();
            let sigma = r.slice(s![..k, ..k]).to_owned();

            residual = linalg::frobenius_norm(&(a.dot(&v) - u.dot(&sigma)).view());
            trace!(round, residual, threshold, "block power round");

            if residual <= threshold {
                debug!(rows = m, cols = n, rounds = round, residual, "block power iteration converged");
                let result = Self::assemble(&u, &sigma, &v);
                return Ok(BlockOutcome { result, rounds: round, residual });
            }
        }

        Err(ImsvdError::Numerical(format!(
            "block power iteration did not converge after {} rounds (residual {:.3}, threshold {:.3})",
            self.max_rounds, residual, threshold
        )))
    }

    // Negative diagonal entries of R flip with their right vector so the
    // product is unchanged and singular values stay non-negative.
    fn assemble(u: &Matrix, sigma: &Matrix, v: &Matrix) -> SvdResult {
        let mut s = sigma.diag().to_owned();
        let mut vh = v.t().to_owned();
        for (i, value) in s.iter_mut().enumerate() {
            if *value < 0.0 {
                *value = -*value;
                vh.row_mut(i).mapv_inplace(|x| -x);
            }
        }
        SvdResult::from_f64(u, &s, &vh)
    }
}

impl SvdEngine for BlockPowerIteration {
    fn compute(&self, matrix: &Channel) -> Result<SvdResult> {
        let mut rng = make_rng(self.random_state);
        Ok(self.run(matrix, &mut rng)?.result)
    }

    fn name(&self) -> &'static str {
        "block_power"
    }
}
