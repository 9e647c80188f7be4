//! Engine selection and the numerical knobs each strategy exposes.

use crate::svd::Tolerance;
use std::fmt;
use std::str::FromStr;

/// Which SVD strategy compresses the channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    Reference,
    Power,
    BlockPower,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Reference, Method::Power, Method::BlockPower];
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Method::Reference => "reference",
            Method::Power => "power",
            Method::BlockPower => "block_power",
        };
        f.write_str(name)
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reference" => Ok(Method::Reference),
            "power" => Ok(Method::Power),
            "block_power" => Ok(Method::BlockPower),
            _ => Err(format!(
                "Invalid method: {}. Must be one of: reference, power, block_power",
                s
            )),
        }
    }
}

/// Parameters shared by the engines built through [`crate::Engine::from_method`].
///
/// - `delta`, `epsilon`, `lambda`: power-iteration bound (failure probability,
///   target accuracy, assumed spectral gap); they set the per-triplet iteration count
/// - `exhaustive`: power iteration extracts the whole numerical rank before truncating
/// - `tolerance`, `max_rounds`: block power-iteration stopping rule and safety cap
/// - `seed`: start-vector seed; `None` draws from entropy
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub delta: f64,
    pub epsilon: f64,
    pub lambda: f64,
    pub exhaustive: bool,
    pub tolerance: Tolerance,
    pub max_rounds: usize,
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delta: 0.1,
            epsilon: 0.97,
            lambda: 2.0,
            exhaustive: false,
            tolerance: Tolerance::default(),
            max_rounds: 1000,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
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

    pub fn exhaustive(mut self, exhaustive: bool) -> Self {
        self.exhaustive = exhaustive;
        self
    }

    pub fn tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
