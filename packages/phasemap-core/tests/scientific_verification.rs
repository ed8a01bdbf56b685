use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use phasemap_core::fourier::{fftshift_2d, forward_freqs, ifftshift_2d};
use phasemap_core::render::axis_labels;
use phasemap_core::{
    fit, stats, CoordinateBasis, DecompositionOptions, LengthUnit, PhaseMap, PlaneDecomposer,
    SpectrumWindow,
};

fn physical_map(phase: Array2<f64>, spacing: f64) -> PhaseMap {
    let (rows, cols) = phase.dim();
    let x = Array1::from_iter((0..cols).map(|i| i as f64 * spacing));
    let y = Array1::from_iter((0..rows).map(|i| i as f64 * spacing));
    PhaseMap::with_coordinates(phase, x, y, LengthUnit::Um).unwrap()
}

#[test]
fn test_forward_freqs_centered_even() {
    let freqs = forward_freqs(0.5, 8).unwrap();
    // d_f = 1 / (8 * 0.5) = 0.25, zero frequency at index n/2.
    for (i, &f) in freqs.iter().enumerate() {
        assert_relative_eq!(f, (i as f64 - 4.0) * 0.25, epsilon = 1e-12);
    }
    assert_relative_eq!(freqs[4], 0.0);
}

#[test]
fn test_forward_freqs_centered_odd() {
    let freqs = forward_freqs(1.0, 5).unwrap();
    let expected = [-0.4, -0.2, 0.0, 0.2, 0.4];
    for (f, e) in freqs.iter().zip(expected.iter()) {
        assert_relative_eq!(f, e, epsilon = 1e-12);
    }
}

#[test]
fn test_fftshift_roundtrip_odd_sizes() {
    let data = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as f64);
    let roundtrip = ifftshift_2d(&fftshift_2d(&data));
    assert_eq!(roundtrip, data);
}

#[test]
fn test_plane_fit_recovers_exact_coefficients() {
    let x = Array1::from_iter((0..5).map(|i| i as f64));
    let y = Array1::from_iter((0..6).map(|i| i as f64));
    let z = Array2::from_shape_fn((6, 5), |(r, c)| 2.0 * c as f64 + 3.0 * r as f64 + 1.0);

    let (a, b, c) = fit::fit_plane_coefs(&x, &y, &z).unwrap();
    assert_relative_eq!(a, 2.0, epsilon = 1e-9);
    assert_relative_eq!(b, 3.0, epsilon = 1e-9);
    assert_relative_eq!(c, 1.0, epsilon = 1e-9);
}

#[test]
fn test_plane_fit_ignores_invalid_samples() {
    let x = Array1::from_iter((0..5).map(|i| i as f64));
    let y = Array1::from_iter((0..5).map(|i| i as f64));
    let mut z = Array2::from_shape_fn((5, 5), |(r, c)| 2.0 * c as f64 + 3.0 * r as f64 + 1.0);
    z[[0, 0]] = f64::NAN;
    z[[2, 3]] = f64::NAN;
    z[[4, 4]] = f64::NAN;

    let plane = fit::fit_plane(&x, &y, &z).unwrap();
    // The plane is defined everywhere, including the punched positions.
    assert_relative_eq!(plane[[0, 0]], 1.0, epsilon = 1e-9);
    assert_relative_eq!(plane[[2, 3]], 2.0 * 3.0 + 3.0 * 2.0 + 1.0, epsilon = 1e-9);
}

#[test]
fn test_plane_fit_degenerate_inputs() {
    let x = Array1::from_iter((0..4).map(|i| i as f64));
    let y = Array1::from_iter((0..4).map(|i| i as f64));

    // All invalid.
    let z = Array2::from_elem((4, 4), f64::NAN);
    assert!(fit::fit_plane_coefs(&x, &y, &z).is_err());

    // Two finite samples.
    let mut z = Array2::from_elem((4, 4), f64::NAN);
    z[[0, 0]] = 1.0;
    z[[1, 1]] = 2.0;
    assert!(fit::fit_plane_coefs(&x, &y, &z).is_err());

    // Collinear samples: a single finite row makes y constant.
    let mut z = Array2::from_elem((4, 4), f64::NAN);
    for c in 0..4 {
        z[[1, c]] = c as f64;
    }
    assert!(fit::fit_plane_coefs(&x, &y, &z).is_err());
}

#[test]
fn test_remove_piston_zeroes_mean() {
    let phase = Array2::from_shape_fn((8, 8), |(r, c)| (r + 2 * c) as f64);
    let mut map = PhaseMap::new(phase, LengthUnit::Um).unwrap();
    map.remove_piston().unwrap();

    let mean: f64 = map.phase().iter().sum::<f64>() / map.phase().len() as f64;
    assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
}

#[test]
fn test_remove_piston_tiptilt_flattens_exact_plane() {
    let phase = Array2::from_shape_fn((10, 10), |(r, c)| 2.0 * c as f64 + 3.0 * r as f64 + 1.0);
    let mut map = physical_map(phase, 1.0);
    map.remove_piston_tiptilt().unwrap();

    for &v in map.phase().iter() {
        assert_relative_eq!(v, 0.0, epsilon = 1e-9);
    }
    assert_relative_eq!(map.rms(), 0.0, epsilon = 1e-9);
    assert_relative_eq!(map.pv(), 0.0, epsilon = 1e-9);
}

#[test]
fn test_statistics_known_values() {
    let mut phase = Array2::zeros((2, 2));
    phase[[0, 0]] = 1.0;
    phase[[0, 1]] = 2.0;
    phase[[1, 0]] = 3.0;
    phase[[1, 1]] = f64::NAN;

    assert_relative_eq!(stats::pv(&phase), 2.0);
    assert_relative_eq!(stats::rms(&phase), (14.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_relative_eq!(stats::ra(&phase), 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(stats::dropout_percentage(&phase), 25.0);
}

#[test]
fn test_pv_zero_for_constant_surface() {
    let mut phase = Array2::from_elem((4, 4), 3.5);
    phase[[2, 2]] = f64::NAN;
    assert_relative_eq!(stats::pv(&phase), 0.0);
}

#[test]
fn test_dropout_percentage_extremes() {
    let finite = Array2::from_elem((3, 3), 1.0);
    assert_relative_eq!(stats::dropout_percentage(&finite), 0.0);

    let invalid = Array2::from_elem((3, 3), f64::NAN);
    assert_relative_eq!(stats::dropout_percentage(&invalid), 100.0);
    assert!(stats::pv(&invalid).is_nan());
    assert!(stats::rms(&invalid).is_nan());
}

#[test]
fn test_crop_keeps_finite_interior() {
    let mut phase = Array2::from_elem((5, 5), f64::NAN);
    for r in 1..4 {
        for c in 1..4 {
            phase[[r, c]] = (r * 10 + c) as f64;
        }
    }
    let mut map = physical_map(phase, 2.0);
    map.crop().unwrap();

    assert_eq!(map.phase().dim(), (3, 3));
    for r in 0..3 {
        for c in 0..3 {
            assert_relative_eq!(map.phase()[[r, c]], ((r + 1) * 10 + c + 1) as f64);
        }
    }
    // Axes are sliced together with the grid.
    assert_eq!(map.x().len(), 3);
    assert_eq!(map.y().len(), 3);
    assert_relative_eq!(map.x()[0], 2.0);
    assert_relative_eq!(map.y()[0], 2.0);
    // Dropout is zero after the invalid border is gone.
    assert_relative_eq!(map.dropout_percentage(), 0.0);
}

#[test]
fn test_crop_all_invalid_is_an_error() {
    let phase = Array2::from_elem((4, 4), f64::NAN);
    let mut map = PhaseMap::new(phase, LengthUnit::Um).unwrap();
    assert!(map.crop().is_err());
}

#[test]
fn test_crop_is_noop_on_tight_grid() {
    let phase = Array2::from_shape_fn((4, 6), |(r, c)| (r + c) as f64);
    let mut map = physical_map(phase.clone(), 1.0);
    map.crop().unwrap();
    assert_eq!(map.phase(), &phase);
    assert_eq!(map.x().len(), 6);
}

#[test]
fn test_bandreject_full_passband_is_identity() {
    let mut phase = Array2::from_shape_fn((16, 16), |(r, c)| {
        (2.0 * std::f64::consts::PI * r as f64 / 8.0).sin()
            + (2.0 * std::f64::consts::PI * c as f64 / 4.0).cos()
    });
    phase[[3, 5]] = f64::NAN;
    phase[[12, 1]] = f64::NAN;

    let original = phase.clone();
    let mut map = physical_map(phase, 1.0);
    map.bandreject(1e-9, f64::INFINITY).unwrap();

    for ((r, c), &v) in map.phase().indexed_iter() {
        if original[[r, c]].is_finite() {
            assert_relative_eq!(v, original[[r, c]], epsilon = 1e-8);
        } else {
            assert!(v.is_nan());
        }
    }
}

#[test]
fn test_bandreject_is_idempotent_for_identical_cutoffs() {
    // Identical cutoffs zero the same bins, so a second pass over an
    // all-finite grid changes nothing.
    let phase = Array2::from_shape_fn((32, 32), |(r, c)| {
        (2.0 * std::f64::consts::PI * c as f64 / 8.0).sin()
            + 0.5 * (2.0 * std::f64::consts::PI * r as f64 / 16.0).cos()
    });

    let mut once = physical_map(phase.clone(), 1.0);
    once.bandreject(6.0, 12.0).unwrap();

    let mut twice = physical_map(phase, 1.0);
    twice.bandreject(6.0, 12.0).unwrap().bandreject(6.0, 12.0).unwrap();

    for (&a, &b) in once.phase().iter().zip(twice.phase().iter()) {
        assert_relative_eq!(a, b, epsilon = 1e-9);
    }
}

#[test]
fn test_bandreject_isolates_in_band_content() {
    // Two bin-aligned sinusoids along x: wavelength 8 (inside the 6..12
    // pass band) and wavelength 32 (outside, rejected).
    let phase = Array2::from_shape_fn((64, 64), |(_r, c)| {
        (2.0 * std::f64::consts::PI * c as f64 / 8.0).sin()
            + (2.0 * std::f64::consts::PI * c as f64 / 32.0).sin()
    });
    let mut map = physical_map(phase, 1.0);
    map.bandreject(6.0, 12.0).unwrap();

    for ((_r, c), &v) in map.phase().indexed_iter() {
        let kept = (2.0 * std::f64::consts::PI * c as f64 / 8.0).sin();
        assert_relative_eq!(v, kept, epsilon = 1e-8);
    }
}

#[test]
fn test_bandreject_requires_physical_coordinates() {
    let phase = Array2::from_elem((8, 8), 1.0);
    let mut map = PhaseMap::new(phase, LengthUnit::Um).unwrap();
    assert!(map.bandreject(2.0, 10.0).is_err());
}

#[test]
fn test_bandreject_rejects_bad_cutoffs() {
    let phase = Array2::from_elem((8, 8), 1.0);
    let mut map = physical_map(phase, 1.0);
    // Empty pass band.
    assert!(map.bandreject(12.0, 6.0).is_err());
    // Non-positive wavelength.
    assert!(map.bandreject(-1.0, 6.0).is_err());
}

#[test]
fn test_power_spectrum_parseval_uniform_window() {
    let size = 32;
    let phase = Array2::from_shape_fn((size, size), |(r, c)| {
        (2.0 * std::f64::consts::PI * r as f64 / size as f64).sin()
            + (4.0 * std::f64::consts::PI * c as f64 / size as f64).cos()
    });
    let mean_sqr = phase.mapv(|v| v * v).mean().unwrap();

    let map = PhaseMap::new(phase, LengthUnit::Um).unwrap();
    let spectrum = map.power_spectrum(SpectrumWindow::Uniform).unwrap();

    assert_relative_eq!(spectrum.power.sum(), mean_sqr, epsilon = 1e-10);
}

#[test]
fn test_power_spectrum_hann_window_reduces_energy() {
    let phase = Array2::from_elem((32, 32), 1.0);
    let map = PhaseMap::new(phase, LengthUnit::Um).unwrap();

    let uniform = map.power_spectrum(SpectrumWindow::Uniform).unwrap();
    let hann = map.power_spectrum(SpectrumWindow::Hann).unwrap();
    assert!(hann.power.sum() < uniform.power.sum());
}

#[test]
fn test_from_measurement_scale_factors() {
    let raw = phasemap_core::RawMeasurement {
        phase: vec![vec![0.0; 4]; 3],
        intensity: None,
        meta: phasemap_core::MeasurementMeta {
            lateral_resolution: 0.5,
            nodata_value: None,
            extra: serde_json::json!({}),
        },
    };

    let map = PhaseMap::from_measurement(&raw, "mm").unwrap();
    assert_relative_eq!(map.x()[1] - map.x()[0], 0.5 * 1e3);
    assert_relative_eq!(map.sample_spacing().unwrap(), 500.0);

    // Case-insensitive unit lookup.
    let map = PhaseMap::from_measurement(&raw, "UM").unwrap();
    assert_relative_eq!(map.sample_spacing().unwrap(), 0.5 * 1e6);

    // Unknown unit fails immediately.
    assert!(PhaseMap::from_measurement(&raw, "nm").is_err());
}

#[test]
fn test_measurement_nodata_roundtrip() {
    let raw = phasemap_core::RawMeasurement {
        phase: vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, -9999.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ],
        intensity: None,
        meta: phasemap_core::MeasurementMeta {
            lateral_resolution: 0.5,
            nodata_value: Some(-9999.0),
            extra: serde_json::json!({"instrument": "bench-a"}),
        },
    };

    let map = PhaseMap::from_measurement(&raw, "um").unwrap();
    assert!(map.phase()[[1, 1]].is_nan());
    assert_relative_eq!(map.dropout_percentage(), 100.0 / 9.0, epsilon = 1e-12);

    let exported = map.to_measurement(-9999.0).unwrap();
    assert_relative_eq!(exported.phase[1][1], -9999.0);
    assert_relative_eq!(exported.meta.lateral_resolution, 0.5, epsilon = 1e-12);
    assert_eq!(exported.meta.extra["instrument"], "bench-a");
}

#[test]
fn test_axis_label_table() {
    let physical = CoordinateBasis::Physical { sample_spacing: 1.0 };
    assert_eq!(axis_labels(physical, LengthUnit::Um), ("x [µm]", "y [µm]"));
    assert_eq!(axis_labels(physical, LengthUnit::Mm), ("x [mm]", "y [mm]"));
    assert_eq!(
        axis_labels(CoordinateBasis::Pixel, LengthUnit::Um),
        ("x [px]", "y [px]")
    );
    assert_eq!(
        axis_labels(CoordinateBasis::Pixel, LengthUnit::Mm),
        ("x [px]", "y [px]")
    );
}

#[test]
fn test_plot_spec_extents() {
    let phase = Array2::from_elem((3, 4), 1.0);
    let map = physical_map(phase, 2.0);
    let spec = map.plot2d(Default::default());
    assert_eq!(spec.x_extent, [0.0, 6.0]);
    assert_eq!(spec.y_extent, [0.0, 4.0]);
    assert_eq!(spec.options.colormap, "inferno");
    assert_eq!(spec.options.interpolation, "lanczos");
}

#[test]
fn test_plane_decomposer_coefficients() {
    let phase = Array2::from_shape_fn((6, 6), |(r, c)| 2.0 * c as f64 + 3.0 * r as f64 + 1.0);
    let map = physical_map(phase, 1.0);

    let coefs = map
        .decompose(&PlaneDecomposer, &DecompositionOptions::default())
        .unwrap();
    // [piston, tip, tilt]
    assert_relative_eq!(coefs[0], 1.0, epsilon = 1e-9);
    assert_relative_eq!(coefs[1], 2.0, epsilon = 1e-9);
    assert_relative_eq!(coefs[2], 3.0, epsilon = 1e-9);
}
