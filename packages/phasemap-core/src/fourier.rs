//! Frequency-domain utilities: DFT bin bookkeeping, centered 2D transforms,
//! and the spatial band-reject filter.
//!
//! All centering conventions in this module are shared: `forward_freqs`
//! describes exactly the bin ordering produced by `fftshift_2d(fft2(...))`.
//! The band-reject mask is built from those frequencies, so the coupling is
//! load-bearing rather than cosmetic.

use anyhow::{bail, Result};
use ndarray::{Array1, Array2, Axis};
use num_complex::Complex;
use rustfft::FftPlanner;

/// Calculates the unshifted frequency bins for an FFT.
///
/// # Arguments
/// * `n` - The number of samples.
/// * `d` - The sample spacing in physical units.
///
/// # Returns
/// A `Vec<f64>` containing the frequency bins in cycles per unit length,
/// ordered as the transform produces them (zero frequency first).
pub fn fftfreq(n: usize, d: f64) -> Vec<f64> {
    let val = 1.0 / (n as f64 * d);
    let n_half = n.div_ceil(2);
    let mut results: Vec<f64> = (0..n_half).map(|i| i as f64).collect();
    results.extend((-(n as isize / 2)..0).map(|i| i as f64));
    results.iter_mut().for_each(|x| *x *= val);
    results
}

/// Calculates the ordered spatial-frequency bins of a centered transform.
///
/// Equivalent to shifting `fftfreq` so that zero frequency sits at the
/// center, matching `fftshift_2d(fft2(...))` bin ordering on either axis.
///
/// # Arguments
/// * `sample_spacing` - The physical spacing between adjacent samples.
/// * `n` - The number of samples along the axis.
///
/// # Returns
/// A `Result` containing the centered frequencies as an `Array1<f64>`.
pub fn forward_freqs(sample_spacing: f64, n: usize) -> Result<Array1<f64>> {
    if !sample_spacing.is_finite() || sample_spacing <= 0.0 {
        bail!("Sample spacing must be finite and positive, got {}.", sample_spacing);
    }
    if n == 0 {
        bail!("Cannot compute frequencies for an empty axis.");
    }
    let mut freqs = fftfreq(n, sample_spacing);
    fftshift_1d(&mut freqs);
    Ok(Array1::from_vec(freqs))
}

/// Shifts the zero-frequency component to the center of a 1D array.
pub fn fftshift_1d<T: Copy>(array: &mut [T]) {
    let n = array.len();
    array.rotate_left(n.div_ceil(2));
}

/// Undoes `fftshift_1d`. Identical for even lengths, distinct for odd ones.
pub fn ifftshift_1d<T: Copy>(array: &mut [T]) {
    let n = array.len();
    array.rotate_left(n / 2);
}

fn roll_2d<T: Copy>(array: &Array2<T>, shift_r: usize, shift_c: usize) -> Array2<T> {
    let (rows, cols) = array.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        array[[(r + shift_r) % rows, (c + shift_c) % cols]]
    })
}

/// Shifts the zero-frequency component to the center of a 2D array.
pub fn fftshift_2d<T: Copy>(array: &Array2<T>) -> Array2<T> {
    let (rows, cols) = array.dim();
    roll_2d(array, rows.div_ceil(2), cols.div_ceil(2))
}

/// Undoes `fftshift_2d`, including on odd-sized axes.
pub fn ifftshift_2d<T: Copy>(array: &Array2<T>) -> Array2<T> {
    let (rows, cols) = array.dim();
    roll_2d(array, rows / 2, cols / 2)
}

fn transform_2d(data: &Array2<Complex<f64>>, inverse: bool) -> Array2<Complex<f64>> {
    let (rows, cols) = data.dim();
    let mut planner = FftPlanner::new();
    let (fft_rows, fft_cols) = if inverse {
        (planner.plan_fft_inverse(cols), planner.plan_fft_inverse(rows))
    } else {
        (planner.plan_fft_forward(cols), planner.plan_fft_forward(rows))
    };

    let mut work = data.to_owned();

    // FFT rows.
    work.axis_iter_mut(Axis(0)).for_each(|mut row| {
        fft_rows.process(row.as_slice_mut().unwrap());
    });

    // FFT columns (after transposing for contiguous access).
    let mut transposed = work.t().as_standard_layout().to_owned();
    transposed.axis_iter_mut(Axis(0)).for_each(|mut row| {
        fft_cols.process(row.as_slice_mut().unwrap());
    });

    transposed.t().to_owned()
}

/// Computes the unnormalized forward 2D Fourier transform.
pub fn fft2(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    transform_2d(data, false)
}

/// Computes the inverse 2D Fourier transform, normalized by `1/(rows*cols)`
/// so that `ifft2(fft2(x)) == x`.
pub fn ifft2(data: &Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let scale = 1.0 / (data.len() as f64);
    transform_2d(data, true).mapv(|c| c * scale)
}

/// Applies a band-reject filter defined by two spatial-wavelength cutoffs.
///
/// Content with wavelengths shorter than `wavelength_low` or longer than
/// `wavelength_high` is removed; the retained pass band is the per-axis
/// rectangular annulus between the two cutoffs (not a radial band).
///
/// Non-finite input samples contribute as zero to the transform. This biases
/// filtered values near dropouts in proportion to the dropout fraction; the
/// caller is expected to restore invalid markers afterwards and to treat the
/// residual bias as a property of the method.
///
/// # Arguments
/// * `data` - The input grid; non-finite entries are treated as zero.
/// * `sample_spacing` - Physical spacing between adjacent samples (both axes).
/// * `wavelength_low` - Shortest wavelength to preserve; sets the high
///   frequency cutoff `1/wavelength_low`.
/// * `wavelength_high` - Longest wavelength to preserve; sets the low
///   frequency cutoff `1/wavelength_high`.
///
/// # Returns
/// A `Result` containing the filtered grid, same shape as the input.
pub fn bandreject_filter(
    data: &Array2<f64>,
    sample_spacing: f64,
    wavelength_low: f64,
    wavelength_high: f64,
) -> Result<Array2<f64>> {
    if !wavelength_low.is_finite() || wavelength_low <= 0.0 {
        bail!("Low wavelength cutoff must be finite and positive, got {}.", wavelength_low);
    }
    // An infinite high cutoff is allowed: it disables the low-frequency
    // rejection entirely.
    if wavelength_high.is_nan() || wavelength_high <= 0.0 {
        bail!("High wavelength cutoff must be positive, got {}.", wavelength_high);
    }
    if wavelength_low > wavelength_high {
        bail!(
            "Low wavelength cutoff ({}) exceeds high cutoff ({}); the pass band is empty.",
            wavelength_low,
            wavelength_high
        );
    }

    let (rows, cols) = data.dim();
    let ux = forward_freqs(sample_spacing, cols)?;
    let uy = forward_freqs(sample_spacing, rows)?;

    // Shorter wavelength means higher frequency, so the cutoffs invert.
    let f_high = 1.0 / wavelength_low;
    let f_low = 1.0 / wavelength_high;

    let work = data.mapv(|v| {
        if v.is_finite() {
            Complex::new(v, 0.0)
        } else {
            Complex::new(0.0, 0.0)
        }
    });

    let mut spectrum = fftshift_2d(&fft2(&ifftshift_2d(&work)));

    for ((r, c), bin) in spectrum.indexed_iter_mut() {
        let reject_high = ux[c].abs() > f_high || uy[r].abs() > f_high;
        let reject_low = ux[c].abs() < f_low && uy[r].abs() < f_low;
        if reject_high || reject_low {
            *bin = Complex::new(0.0, 0.0);
        }
    }

    let out = fftshift_2d(&ifft2(&ifftshift_2d(&spectrum)));
    Ok(out.mapv(|c| c.re))
}

/// Window applied to the phase grid before power-spectrum estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumWindow {
    /// No windowing; preserves Parseval's relation exactly.
    Uniform,
    /// Separable Hann window to limit spectral leakage.
    Hann,
}

/// Holds a centered power spectral density and its frequency axes.
#[derive(Debug, Clone)]
pub struct PowerSpectrum {
    pub power: Array2<f64>,
    pub fx: Array1<f64>,
    pub fy: Array1<f64>,
}

fn hann_window_1d(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (len - 1) as f64).cos()))
        .collect()
}

/// Computes the centered power spectral density of a grid.
///
/// Non-finite samples contribute as zero. The normalization is `|X|^2 / N^2`
/// with `N` the total element count, so that with the uniform window the sum
/// of all PSD bins equals the mean squared spatial signal.
///
/// # Arguments
/// * `data` - The input grid.
/// * `sample_spacing` - Physical sample spacing used for the frequency axes.
/// * `window` - Window applied before the transform.
///
/// # Returns
/// A `Result` containing the `PowerSpectrum` with centered axes.
pub fn power_spectrum(
    data: &Array2<f64>,
    sample_spacing: f64,
    window: SpectrumWindow,
) -> Result<PowerSpectrum> {
    let (rows, cols) = data.dim();
    let fx = forward_freqs(sample_spacing, cols)?;
    let fy = forward_freqs(sample_spacing, rows)?;

    let mut work = data.mapv(|v| if v.is_finite() { v } else { 0.0 });
    if window == SpectrumWindow::Hann {
        let wx = hann_window_1d(cols);
        let wy = hann_window_1d(rows);
        for ((r, c), v) in work.indexed_iter_mut() {
            *v *= wy[r] * wx[c];
        }
    }

    let spectrum = fft2(&work.mapv(|v| Complex::new(v, 0.0)));
    let n_elements = (rows * cols) as f64;
    let psd = spectrum.mapv(|c| c.norm_sqr() / n_elements.powi(2));

    Ok(PowerSpectrum {
        power: fftshift_2d(&psd),
        fx,
        fy,
    })
}
