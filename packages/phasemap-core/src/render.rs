//! The rendering-collaborator contract. The core never draws; it hands a
//! renderer everything needed to produce a displayable image.

use ndarray::Array2;

use crate::{CoordinateBasis, LengthUnit, PhaseMap};

/// Display options forwarded verbatim to a rendering collaborator.
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub colormap: String,
    /// (min, max) color limits; `None` lets the renderer autoscale.
    pub color_limits: (Option<f64>, Option<f64>),
    pub interpolation: String,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            colormap: "inferno".to_string(),
            color_limits: (None, None),
            interpolation: "lanczos".to_string(),
        }
    }
}

/// Everything a rendering collaborator needs to draw a phase map.
#[derive(Debug)]
pub struct PlotSpec<'a> {
    pub grid: &'a Array2<f64>,
    pub x_extent: [f64; 2],
    pub y_extent: [f64; 2],
    pub x_label: &'static str,
    pub y_label: &'static str,
    pub options: PlotOptions,
}

/// Resolves axis labels from the coordinate basis and unit. Synthetic
/// coordinates always label in pixels, whatever the configured unit.
pub fn axis_labels(basis: CoordinateBasis, unit: LengthUnit) -> (&'static str, &'static str) {
    match (basis, unit) {
        (CoordinateBasis::Physical { .. }, LengthUnit::Um) => ("x [µm]", "y [µm]"),
        (CoordinateBasis::Physical { .. }, LengthUnit::Mm) => ("x [mm]", "y [mm]"),
        (CoordinateBasis::Pixel, _) => ("x [px]", "y [px]"),
    }
}

impl PhaseMap {
    /// Assembles the rendering contract for the current phase grid.
    pub fn plot2d(&self, options: PlotOptions) -> PlotSpec<'_> {
        let (x_label, y_label) = axis_labels(self.basis, self.unit);
        PlotSpec {
            grid: &self.phase,
            x_extent: [self.x[0], self.x[self.x.len() - 1]],
            y_extent: [self.y[0], self.y[self.y.len() - 1]],
            x_label,
            y_label,
            options,
        }
    }
}
