//! The polynomial-decomposition-collaborator contract.
//!
//! An external service (e.g. an orthogonal-polynomial fitter) maps a phase
//! grid plus fitting options to a coefficient vector. Only the calling
//! contract lives here; polynomial generation is not this crate's concern.

use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::{fit, PhaseMap};

/// Options forwarded to a decomposition collaborator.
#[derive(Debug, Clone)]
pub struct DecompositionOptions {
    /// Name of the polynomial set to fit against, e.g. "fringe" or "noll".
    pub basis_name: String,
    /// Whether coefficients should be normalized to RMS units.
    pub normalize: bool,
}

impl Default for DecompositionOptions {
    fn default() -> Self {
        DecompositionOptions {
            basis_name: "fringe".to_string(),
            normalize: false,
        }
    }
}

/// Maps a phase grid plus fitting options to a coefficient vector.
///
/// Implementations must exclude non-finite samples from the fit, the same
/// masking discipline the plane-fit utility applies.
pub trait SurfaceDecomposer {
    fn decompose(
        &self,
        x: &Array1<f64>,
        y: &Array1<f64>,
        phase: &Array2<f64>,
        options: &DecompositionOptions,
    ) -> Result<Vec<f64>>;
}

/// First-order reference decomposer: piston, tip, and tilt coefficients
/// from the least-squares plane fit over finite samples.
#[derive(Debug, Default)]
pub struct PlaneDecomposer;

impl SurfaceDecomposer for PlaneDecomposer {
    fn decompose(
        &self,
        x: &Array1<f64>,
        y: &Array1<f64>,
        phase: &Array2<f64>,
        _options: &DecompositionOptions,
    ) -> Result<Vec<f64>> {
        let (a, b, c) = fit::fit_plane_coefs(x, y, phase)?;
        Ok(vec![c, a, b])
    }
}

impl PhaseMap {
    /// Runs a decomposition collaborator over the current phase grid.
    pub fn decompose(
        &self,
        decomposer: &dyn SurfaceDecomposer,
        options: &DecompositionOptions,
    ) -> Result<Vec<f64>> {
        decomposer.decompose(&self.x, &self.y, &self.phase, options)
    }
}
