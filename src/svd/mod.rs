//! Singular value decomposition engines for 8-bit channel matrices.
//!
//! This module provides three interchangeable strategies behind the
//! [`SvdEngine`] trait:
//! - `ReferenceSvd`: exact dense decomposition, singular values sorted descending
//! - `PowerIteration`: one singular triplet at a time with deflation
//! - `BlockPowerIteration`: simultaneous subspace iteration with QR
//!
//! # Examples
//!
//! ## Reference decomposition
//! ```rust
//! use imsvd::{ReferenceSvd, SvdEngine};
//! use ndarray::array;
//!
//! let channel = array![
//!     [10u8, 20, 30, 40],
//!     [10, 20, 30, 40],
//!     [10, 20, 30, 40]
//! ];
//!
//! let svd = ReferenceSvd::new().compute(&channel).unwrap();
//! assert_eq!(svd.rank(), 3);
//! assert!(svd.s[0] > svd.s[1]);
//! ```
//!
//! ## Power iteration, stopping after the first k triplets
//! ```rust
//! use imsvd::{PowerIteration, SvdEngine};
//! use ndarray::array;
//!
//! let channel = array![[1u8, 2, 3], [2, 4, 6], [3, 6, 9]];
//!
//! let power = PowerIteration::new().random_state(7);
//! let svd = power.compute_truncated(&channel, 1).unwrap();
//! assert_eq!(svd.rank(), 1);
//! ```
//!
//! ## Block power iteration
//! ```rust
//! use imsvd::{BlockPowerIteration, SvdEngine, Tolerance};
//! use ndarray::Array2;
//!
//! let channel = Array2::from_shape_fn((8, 6), |(i, j)| (i * 20 + j * 5) as u8);
//!
//! let block = BlockPowerIteration::new()
//!     .tolerance(Tolerance::Relative(1e-3))
//!     .random_state(3);
//! let svd = block.compute(&channel).unwrap();
//! assert_eq!(svd.rank(), 6);
//! ```

mod block_power;
mod power;
mod reference;

pub use block_power::{BlockOutcome, BlockPowerIteration, Tolerance};
pub use power::PowerIteration;
pub use reference::ReferenceSvd;

use crate::config::{EngineConfig, Method};
use crate::{Channel, Factor, FactorVector, Matrix, Result, Vector};
use ndarray::s;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Truncated or full factorization `U · diag(S) · Vh` of one channel.
#[derive(Clone, Debug, PartialEq)]
pub struct SvdResult {
    pub u: Factor,
    pub s: FactorVector,
    pub vh: Factor,
}

impl SvdResult {
    /// Narrows working-precision factors to their stored `f32` form.
    pub fn from_f64(u: &Matrix, s: &Vector, vh: &Matrix) -> Self {
        Self {
            u: u.mapv(|x| x as f32),
            s: s.mapv(|x| x as f32),
            vh: vh.mapv(|x| x as f32),
        }
    }

    /// Number of singular triplets held.
    pub fn rank(&self) -> usize {
        self.s.len()
    }

    pub fn rows(&self) -> usize {
        self.u.nrows()
    }

    pub fn cols(&self) -> usize {
        self.vh.ncols()
    }

    /// Keeps the first `k` triplets in the order the engine produced them.
    pub fn truncate(self, k: usize) -> Self {
        if k >= self.rank() {
            return self;
        }
        Self {
            u: self.u.slice(s![.., ..k]).to_owned(),
            s: self.s.slice(s![..k]).to_owned(),
            vh: self.vh.slice(s![..k, ..]).to_owned(),
        }
    }

    /// Appends zero triplets until exactly `k` are held; the product is unchanged.
    pub fn pad(self, k: usize) -> Self {
        let rank = self.rank();
        if rank >= k {
            return self;
        }
        let mut u = Factor::zeros((self.rows(), k));
        let mut s = FactorVector::zeros(k);
        let mut vh = Factor::zeros((k, self.cols()));
        u.slice_mut(s![.., ..rank]).assign(&self.u);
        s.slice_mut(s![..rank]).assign(&self.s);
        vh.slice_mut(s![..rank, ..]).assign(&self.vh);
        Self { u, s, vh }
    }
}

/// A strategy computing the SVD of an unsigned integer matrix.
pub trait SvdEngine: Send + Sync {
    fn compute(&self, matrix: &Channel) -> Result<SvdResult>;

    /// Computes at most `k` triplets. Strategies that can stop early override this.
    fn compute_truncated(&self, matrix: &Channel, k: usize) -> Result<SvdResult> {
        Ok(self.compute(matrix)?.truncate(k))
    }

    fn name(&self) -> &'static str;
}

/// Seeds a generator from `random_state`, or from entropy when unset.
pub(crate) fn make_rng(random_state: Option<u64>) -> StdRng {
    match random_state {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// The three strategies as one tagged value, so callers can select one at runtime.
#[derive(Clone, Debug)]
pub enum Engine {
    Reference(ReferenceSvd),
    Power(PowerIteration),
    BlockPower(BlockPowerIteration),
}

impl Engine {
    pub fn from_method(method: Method, config: &EngineConfig) -> Self {
        match method {
            Method::Reference => Engine::Reference(ReferenceSvd::new()),
            Method::Power => {
                let mut power = PowerIteration::new()
                    .delta(config.delta)
                    .epsilon(config.epsilon)
                    .lambda(config.lambda)
                    .exhaustive(config.exhaustive);
                if let Some(seed) = config.seed {
                    power = power.random_state(seed);
                }
                Engine::Power(power)
            }
            Method::BlockPower => {
                let mut block = BlockPowerIteration::new()
                    .tolerance(config.tolerance)
                    .max_rounds(config.max_rounds);
                if let Some(seed) = config.seed {
                    block = block.random_state(seed);
                }
                Engine::BlockPower(block)
            }
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Engine::Reference(_) => Method::Reference,
            Engine::Power(_) => Method::Power,
            Engine::BlockPower(_) => Method::BlockPower,
        }
    }
}

impl SvdEngine for Engine {
    fn compute(&self, matrix: &Channel) -> Result<SvdResult> {
        match self {
            Engine::Reference(e) => e.compute(matrix),
            Engine::Power(e) => e.compute(matrix),
            Engine::BlockPower(e) => e.compute(matrix),
        }
    }

    fn compute_truncated(&self, matrix: &Channel, k: usize) -> Result<SvdResult> {
        match self {
            Engine::Reference(e) => e.compute_truncated(matrix, k),
            Engine::Power(e) => e.compute_truncated(matrix, k),
            Engine::BlockPower(e) => e.compute_truncated(matrix, k),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Engine::Reference(e) => e.name(),
            Engine::Power(e) => e.name(),
            Engine::BlockPower(e) => e.name(),
        }
    }
}
