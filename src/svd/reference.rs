use super::{SvdEngine, SvdResult};
use crate::{Channel, Result, linalg};
use tracing::debug;

/// Exact thin SVD through a dense decomposition routine.
///
/// Singular values come back sorted in descending order, so truncation keeps
/// the best rank-k approximation.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSvd;

impl ReferenceSvd {
    pub fn new() -> Self {
        Self
    }
}

impl SvdEngine for ReferenceSvd {
    fn compute(&self, matrix: &Channel) -> Result<SvdResult> {
        let a = linalg::to_float(matrix)?;
        let (u, s, vt) = linalg::dense_svd(&a.view())?;
        debug!(rows = a.nrows(), cols = a.ncols(), components = s.len(), "reference svd");
        Ok(SvdResult::from_f64(&u, &s, &vt))
    }

    fn name(&self) -> &'static str {
        "reference"
    }
}
