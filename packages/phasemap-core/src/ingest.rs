//! The ingestion-collaborator contract: a pre-parsed measurement structure
//! and its mapping to and from [`PhaseMap`].
//!
//! Instrument file formats are parsed elsewhere; this module only defines
//! the interchange form. Grids travel as row-major nested arrays with an
//! optional nodata sentinel, since JSON cannot represent NaN.

use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{CoordinateBasis, LengthUnit, PhaseMap};

/// Sentinel written for invalid samples when none is configured.
pub const DEFAULT_NODATA: f64 = -9999.0;

/// Metadata accompanying a pre-parsed measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementMeta {
    /// Physical distance between adjacent samples, in meters.
    pub lateral_resolution: f64,
    /// Grid values equal to this sentinel are invalid samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata_value: Option<f64>,
    /// Instrument metadata, passed through unchanged.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// A measurement as produced by an external ingestion collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub phase: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Vec<Vec<f64>>>,
    pub meta: MeasurementMeta,
}

/// Builds a grid from nested rows, mapping the nodata sentinel to NaN.
fn grid_from_rows(rows: &[Vec<f64>], nodata_value: Option<f64>) -> Result<Array2<f64>> {
    if rows.is_empty() || rows[0].is_empty() {
        bail!("Measurement grid is empty.");
    }
    let cols = rows[0].len();
    let mut data = Vec::with_capacity(rows.len() * cols);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != cols {
            bail!(
                "Measurement grid is ragged: row {} has {} samples, expected {}.",
                i,
                row.len(),
                cols
            );
        }
        data.extend(row.iter().map(|&v| match nodata_value {
            Some(ndv) if v == ndv => f64::NAN,
            _ => v,
        }));
    }
    Array2::from_shape_vec((rows.len(), cols), data).context("Failed to assemble measurement grid")
}

/// Serializes a grid back to nested rows, writing NaN as the sentinel.
fn rows_from_grid(grid: &Array2<f64>, nodata_value: f64) -> Vec<Vec<f64>> {
    grid.rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|&v| if v.is_finite() { v } else { nodata_value })
                .collect()
        })
        .collect()
}

impl PhaseMap {
    /// Builds a phase map from a pre-parsed measurement.
    ///
    /// Physical axes are derived as
    /// `index * lateral_resolution * scale_factor(scale)`; the scale name is
    /// matched case-insensitively and an unrecognized name is an error, as
    /// is a non-positive lateral resolution.
    pub fn from_measurement(raw: &RawMeasurement, scale: &str) -> Result<Self> {
        let unit = LengthUnit::parse(scale)?;
        let res = raw.meta.lateral_resolution;
        if !res.is_finite() || res <= 0.0 {
            bail!("Lateral resolution must be finite and positive, got {}.", res);
        }

        let phase = grid_from_rows(&raw.phase, raw.meta.nodata_value)?;
        let (rows, cols) = phase.dim();
        let spacing = res * unit.scale_factor();
        let x = Array1::from_iter((0..cols).map(|i| i as f64 * spacing));
        let y = Array1::from_iter((0..rows).map(|i| i as f64 * spacing));

        let mut map = PhaseMap::with_coordinates(phase, x, y, unit)?;
        if let Some(intensity) = &raw.intensity {
            map = map.with_intensity(grid_from_rows(intensity, raw.meta.nodata_value)?)?;
        }
        map.meta = Some(raw.meta.extra.clone());
        Ok(map)
    }

    /// Exports the current state back to the interchange form.
    ///
    /// Only maps with physical coordinates can be exported, since the
    /// measurement carries a lateral resolution. Invalid samples are written
    /// as the given nodata sentinel.
    pub fn to_measurement(&self, nodata_value: f64) -> Result<RawMeasurement> {
        let spacing = match self.basis {
            CoordinateBasis::Physical { sample_spacing } => sample_spacing,
            CoordinateBasis::Pixel => {
                bail!("Cannot export a pixel-basis map as a physical measurement.")
            }
        };
        Ok(RawMeasurement {
            phase: rows_from_grid(&self.phase, nodata_value),
            intensity: self
                .intensity
                .as_ref()
                .map(|grid| rows_from_grid(grid, nodata_value)),
            meta: MeasurementMeta {
                lateral_resolution: spacing / self.unit.scale_factor(),
                nodata_value: Some(nodata_value),
                extra: self
                    .meta
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            },
        })
    }
}
