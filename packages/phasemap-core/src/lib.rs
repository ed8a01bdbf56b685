//! # Phase-Map Core Library
//!
//! Core data structures and processing routines for the phase-map analysis
//! toolkit. Raw interferometric measurements (2D height or wavefront-error
//! grids, possibly with invalid samples) are cleaned, aligned, filtered, and
//! summarized into scalar quality metrics.
//!
//! The main components are:
//! - [`PhaseMap`]: the measurement aggregate, with fluent normalization
//!   operations (`crop`, `remove_piston_tiptilt`, `bandreject`, ...).
//! - [`fourier`]: centered-transform utilities and the band-reject filter.
//! - [`fit`]: NaN-aware least-squares plane fitting.
//! - [`stats`]: peak-to-valley, RMS, Ra, and dropout statistics.
//! - [`ingest`] / [`render`] / [`decompose`]: the contracts through which
//!   external ingestion, rendering, and polynomial-decomposition
//!   collaborators are consumed.
//!
//! Invalid (non-finite) samples are expected data, not errors: every
//! reduction masks them, the band-reject filter treats them as zero signal,
//! and `dropout_percentage` quantifies their share.

pub mod decompose;
pub mod fit;
pub mod fourier;
pub mod ingest;
pub mod render;
pub mod stats;
pub mod text;

use anyhow::{bail, Result};
use ndarray::{s, Array1, Array2};

pub use decompose::{DecompositionOptions, PlaneDecomposer, SurfaceDecomposer};
pub use fourier::{PowerSpectrum, SpectrumWindow};
pub use ingest::{MeasurementMeta, RawMeasurement};
pub use render::{PlotOptions, PlotSpec};
pub use stats::SurfaceStatistics;

/// Lateral length unit used for physical coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Um,
    Mm,
}

impl LengthUnit {
    /// Parses a unit name case-insensitively. Unrecognized names are
    /// rejected immediately rather than deferred.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "um" => Ok(LengthUnit::Um),
            "mm" => Ok(LengthUnit::Mm),
            other => bail!("Unrecognized scale '{}'; expected 'um' or 'mm'.", other),
        }
    }

    /// Multiplier taking a length in meters to this unit.
    pub fn scale_factor(self) -> f64 {
        match self {
            LengthUnit::Um => 1e6,
            LengthUnit::Mm => 1e3,
        }
    }
}

/// Lifecycle mode of the coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateBasis {
    /// Synthetic 0..N-1 sample indices; no physical sample spacing exists.
    Pixel,
    /// Externally supplied physical coordinates. The caller guarantees
    /// uniform spacing; it is derived once as `x[1] - x[0]` and not
    /// re-validated per call.
    Physical { sample_spacing: f64 },
}

/// A single interferometric measurement and the operations over it.
///
/// The phase grid is mutated in place by the normalization methods, each of
/// which returns `Result<&mut Self>` so calls chain with `?`:
///
/// ```no_run
/// # use phasemap_core::PhaseMap;
/// # fn demo(mut map: PhaseMap) -> anyhow::Result<()> {
/// map.crop()?.remove_piston_tiptilt()?.bandreject(10.0, 400.0)?;
/// println!("rms {:.3}", map.rms());
/// # Ok(())
/// # }
/// ```
///
/// A failed operation leaves the map unchanged.
#[derive(Debug, Clone)]
pub struct PhaseMap {
    pub(crate) phase: Array2<f64>,
    pub(crate) intensity: Option<Array2<f64>>,
    pub(crate) x: Array1<f64>,
    pub(crate) y: Array1<f64>,
    pub(crate) basis: CoordinateBasis,
    pub(crate) unit: LengthUnit,
    pub(crate) meta: Option<serde_json::Value>,
}

impl PhaseMap {
    /// Creates a map with synthetic pixel-index coordinates.
    pub fn new(phase: Array2<f64>, unit: LengthUnit) -> Result<Self> {
        let (rows, cols) = phase.dim();
        if rows == 0 || cols == 0 {
            bail!("Phase grid must be non-empty, got {}x{}.", rows, cols);
        }
        let x = Array1::from_iter((0..cols).map(|i| i as f64));
        let y = Array1::from_iter((0..rows).map(|i| i as f64));
        Ok(PhaseMap {
            phase,
            intensity: None,
            x,
            y,
            basis: CoordinateBasis::Pixel,
            unit,
            meta: None,
        })
    }

    /// Creates a map with externally supplied physical coordinates.
    ///
    /// Axis lengths must match the grid dimensions, and each axis needs at
    /// least two samples so the sample spacing is defined.
    pub fn with_coordinates(
        phase: Array2<f64>,
        x: Array1<f64>,
        y: Array1<f64>,
        unit: LengthUnit,
    ) -> Result<Self> {
        let (rows, cols) = phase.dim();
        if x.len() != cols || y.len() != rows {
            bail!(
                "Axis lengths ({}, {}) do not match grid dimensions ({}x{}).",
                x.len(),
                y.len(),
                rows,
                cols
            );
        }
        if cols < 2 || rows < 2 {
            bail!("Physical coordinates need at least 2 samples per axis to define spacing.");
        }
        let sample_spacing = x[1] - x[0];
        if !sample_spacing.is_finite() || sample_spacing <= 0.0 {
            bail!("Derived sample spacing must be finite and positive, got {}.", sample_spacing);
        }
        Ok(PhaseMap {
            phase,
            intensity: None,
            x,
            y,
            basis: CoordinateBasis::Physical { sample_spacing },
            unit,
            meta: None,
        })
    }

    /// Attaches an intensity grid. Must match the phase grid's shape at
    /// construction time.
    pub fn with_intensity(mut self, intensity: Array2<f64>) -> Result<Self> {
        if intensity.dim() != self.phase.dim() {
            bail!(
                "Intensity shape {:?} does not match phase shape {:?}.",
                intensity.dim(),
                self.phase.dim()
            );
        }
        self.intensity = Some(intensity);
        Ok(self)
    }

    /// Attaches an opaque metadata bag; it is passed through unchanged.
    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn phase(&self) -> &Array2<f64> {
        &self.phase
    }

    pub fn intensity(&self) -> Option<&Array2<f64>> {
        self.intensity.as_ref()
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn basis(&self) -> CoordinateBasis {
        self.basis
    }

    pub fn unit(&self) -> LengthUnit {
        self.unit
    }

    pub fn meta(&self) -> Option<&serde_json::Value> {
        self.meta.as_ref()
    }

    /// Physical spacing between adjacent samples, when defined.
    pub fn sample_spacing(&self) -> Option<f64> {
        match self.basis {
            CoordinateBasis::Physical { sample_spacing } => Some(sample_spacing),
            CoordinateBasis::Pixel => None,
        }
    }

    /// Peak-to-valley of the finite phase samples.
    pub fn pv(&self) -> f64 {
        stats::pv(&self.phase)
    }

    /// Root-mean-square of the finite phase samples.
    pub fn rms(&self) -> f64 {
        stats::rms(&self.phase)
    }

    /// Mean absolute deviation of the finite phase samples from their mean.
    pub fn ra(&self) -> f64 {
        stats::ra(&self.phase)
    }

    /// Percentage of invalid samples. Recomputed on every call.
    pub fn dropout_percentage(&self) -> f64 {
        stats::dropout_percentage(&self.phase)
    }

    /// All scalar statistics in one record.
    pub fn statistics(&self) -> SurfaceStatistics {
        stats::summarize(&self.phase)
    }

    /// Truncates the grid to the tightest bounding box containing all
    /// finite samples, slicing the coordinate axes identically.
    ///
    /// The intensity grid, when present, keeps its raw shape; only the
    /// phase grid and axes are narrowed.
    ///
    /// Errors if the grid has no finite samples at all (the bounding box
    /// would be empty).
    pub fn crop(&mut self) -> Result<&mut Self> {
        let (rows, cols) = self.phase.dim();
        let mut row_has = vec![false; rows];
        let mut col_has = vec![false; cols];
        for ((r, c), &v) in self.phase.indexed_iter() {
            if v.is_finite() {
                row_has[r] = true;
                col_has[c] = true;
            }
        }

        let r0 = row_has.iter().position(|&b| b);
        let c0 = col_has.iter().position(|&b| b);
        let (r0, c0) = match (r0, c0) {
            (Some(r), Some(c)) => (r, c),
            _ => bail!("Cannot crop: the grid contains no finite samples."),
        };
        // rposition is Some whenever position was.
        let r1 = row_has.iter().rposition(|&b| b).unwrap_or(r0);
        let c1 = col_has.iter().rposition(|&b| b).unwrap_or(c0);

        if r0 == 0 && c0 == 0 && r1 == rows - 1 && c1 == cols - 1 {
            return Ok(self);
        }

        self.phase = self.phase.slice(s![r0..=r1, c0..=c1]).to_owned();
        self.x = self.x.slice(s![c0..=c1]).to_owned();
        self.y = self.y.slice(s![r0..=r1]).to_owned();
        Ok(self)
    }

    /// Removes tip/tilt by subtracting the least-squares plane through the
    /// finite samples. Invalid samples stay invalid.
    pub fn remove_tiptilt(&mut self) -> Result<&mut Self> {
        let plane = fit::fit_plane(&self.x, &self.y, &self.phase)?;
        self.phase -= &plane;
        Ok(self)
    }

    /// Removes piston by subtracting the mean of the finite samples.
    pub fn remove_piston(&mut self) -> Result<&mut Self> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for &v in self.phase.iter().filter(|v| v.is_finite()) {
            sum += v;
            n += 1;
        }
        if n == 0 {
            bail!("Cannot remove piston: the grid contains no finite samples.");
        }
        let mean = sum / n as f64;
        self.phase.mapv_inplace(|v| v - mean);
        Ok(self)
    }

    /// Removes tip/tilt, then piston, so the residual's finite mean
    /// approaches zero.
    pub fn remove_piston_tiptilt(&mut self) -> Result<&mut Self> {
        self.remove_tiptilt()?;
        self.remove_piston()?;
        Ok(self)
    }

    /// Applies the band-reject filter between two spatial wavelengths,
    /// expressed in this map's axis units.
    ///
    /// Invalid samples are treated as zero signal during the transform (a
    /// documented bias proportional to the dropout fraction) and restored
    /// as invalid afterwards, at their original positions.
    ///
    /// Requires physical coordinates; a pixel-basis map has no sample
    /// spacing to define the frequency grid against.
    pub fn bandreject(&mut self, wavelength_low: f64, wavelength_high: f64) -> Result<&mut Self> {
        let spacing = match self.basis {
            CoordinateBasis::Physical { sample_spacing } => sample_spacing,
            CoordinateBasis::Pixel => {
                bail!("Band-reject filtering requires physical coordinates; this map has pixel indices only.")
            }
        };
        let mut filtered =
            fourier::bandreject_filter(&self.phase, spacing, wavelength_low, wavelength_high)?;
        for (out, &orig) in filtered.iter_mut().zip(self.phase.iter()) {
            if !orig.is_finite() {
                *out = f64::NAN;
            }
        }
        self.phase = filtered;
        Ok(self)
    }

    /// Centered power spectral density of the phase grid. Pixel-basis maps
    /// use unit sample spacing for the frequency axes.
    pub fn power_spectrum(&self, window: SpectrumWindow) -> Result<PowerSpectrum> {
        let spacing = self.sample_spacing().unwrap_or(1.0);
        fourier::power_spectrum(&self.phase, spacing, window)
    }
}
