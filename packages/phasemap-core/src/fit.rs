//! Least-squares plane fitting over grids with invalid samples.

use anyhow::{anyhow, bail, Result};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

/// Fits `z = a*x + b*y + c` to the finite samples of a grid.
///
/// Positions where `z` is non-finite are excluded from the fit entirely; the
/// returned coefficients describe the best plane through the valid data.
///
/// # Arguments
/// * `x` - Coordinates of the grid columns, length `z.ncols()`.
/// * `y` - Coordinates of the grid rows, length `z.nrows()`.
/// * `z` - The grid to fit; may contain non-finite entries.
///
/// # Returns
/// A `Result` containing the coefficients `(a, b, c)`.
pub fn fit_plane_coefs(x: &Array1<f64>, y: &Array1<f64>, z: &Array2<f64>) -> Result<(f64, f64, f64)> {
    let (rows, cols) = z.dim();
    if x.len() != cols || y.len() != rows {
        bail!(
            "Axis lengths ({}, {}) do not match grid dimensions ({}x{}).",
            x.len(),
            y.len(),
            rows,
            cols
        );
    }

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    let mut zs = Vec::new();
    for ((r, c), &v) in z.indexed_iter() {
        if v.is_finite() {
            xs.push(x[c]);
            ys.push(y[r]);
            zs.push(v);
        }
    }

    let n = zs.len();
    if n < 3 {
        bail!("Plane fit requires at least 3 finite samples, found {}.", n);
    }

    // Design matrix with columns [x, y, 1] restricted to finite positions.
    let a = DMatrix::from_fn(n, 3, |i, j| match j {
        0 => xs[i],
        1 => ys[i],
        _ => 1.0,
    });
    let b = DVector::from_vec(zs);

    let svd = a.svd(true, true);
    let s_max = svd.singular_values.max();
    let tol = s_max * n as f64 * f64::EPSILON;
    if svd.rank(tol) < 3 {
        bail!("Plane fit is rank-deficient: the finite samples are collinear.");
    }

    let coefs = svd
        .solve(&b, tol)
        .map_err(|e| anyhow!("Plane least-squares solve failed: {}", e))?;

    Ok((coefs[0], coefs[1], coefs[2]))
}

/// Evaluates the best-fit plane of a grid over its full coordinate mesh.
///
/// The returned grid has the same shape as `z` and is defined everywhere,
/// including positions that were invalid in the input.
pub fn fit_plane(x: &Array1<f64>, y: &Array1<f64>, z: &Array2<f64>) -> Result<Array2<f64>> {
    let (a, b, c) = fit_plane_coefs(x, y, z)?;
    Ok(Array2::from_shape_fn(z.dim(), |(r, col)| {
        a * x[col] + b * y[r] + c
    }))
}
