//! Small synthetic reference tables shared by unit tests.
//!
//! The tables are deliberately simple: constant absorption coefficients and a
//! Planck table linear in temperature, so tests can predict optical depths
//! and sources in closed form.

use crate::reference::{
    Flavor, MinorGas, RayleighTables, ReferenceTables, SourceTable,
};
use crate::spectral::SpectralDiscretization;
use ndarray::{Array1, Array2, Array3, Array4};

/// Constant major-species absorption coefficient of the fixtures.
pub(crate) const KMAJOR: f64 = 2e-4;
/// Constant minor-species (ozone) absorption coefficient of the fixtures.
pub(crate) const KMINOR: f64 = 5e-5;
/// Constant Rayleigh scattering coefficient of the shortwave fixture.
pub(crate) const KRAYL: f64 = 1e-5;

pub(crate) fn spectral() -> SpectralDiscretization {
    SpectralDiscretization::new(vec![(10.0, 350.0), (350.0, 700.0)], &[2, 2]).unwrap()
}

fn common(source: SourceTable, krayl: Option<RayleighTables>) -> ReferenceTables {
    let spectral = spectral();
    let ngpt = spectral.ngpt();
    let npress = 3;
    let ntemp = 4;
    let neta = 2;

    ReferenceTables {
        spectral,
        // Log-uniform: successive decade steps
        press: Array1::from_vec(vec![1e3, 1e4, 1e5]),
        temp: Array1::from_vec(vec![200.0, 240.0, 280.0, 320.0]),
        press_trop: 9.5e3,
        flavors: vec![Flavor {
            gas_a: "h2o".to_string(),
            gas_b: "co2".to_string(),
            ref_vmr_ratio: Array1::ones(ntemp),
        }],
        gpt_flavor_lower: vec![0; ngpt],
        gpt_flavor_upper: vec![0; ngpt],
        kmajor: Array4::from_elem((ngpt, neta, npress, ntemp), KMAJOR),
        minor_lower: vec![MinorGas {
            gas: "o3".to_string(),
            gpt_limits: (0, ngpt),
            kminor: Array3::from_elem((ngpt, neta, ntemp), KMINOR),
            scales_with_density: false,
            scale_by_complement: false,
            scaling_gas: None,
        }],
        minor_upper: vec![],
        krayl,
        source,
    }
}

/// Longwave (internal-source) tables: Planck irradiance linear in
/// temperature, `totplnk(t, band) = (band + 1) * t`.
pub(crate) fn longwave_tables() -> ReferenceTables {
    let nband = 2;
    let temp_min = 150.0;
    let temp_delta = 50.0;
    let totplnk = Array2::from_shape_fn((4, nband), |(it, ib)| {
        (ib as f64 + 1.0) * (temp_min + temp_delta * it as f64)
    });
    let tables = common(
        SourceTable::Internal {
            totplnk,
            planck_frac: Array1::from_vec(vec![0.4, 0.6, 0.5, 0.5]),
            temp_min,
            temp_delta,
        },
        None,
    );
    tables.validate().unwrap();
    tables
}

/// Shortwave (external-source) tables with Rayleigh scattering.
pub(crate) fn shortwave_tables() -> ReferenceTables {
    let spectral = spectral();
    let ngpt = spectral.ngpt();
    let krayl = RayleighTables {
        lower: Array3::from_elem((ngpt, 2, 4), KRAYL),
        upper: Array3::from_elem((ngpt, 2, 4), KRAYL),
    };
    let tables = common(
        SourceTable::External {
            solar_src: Array1::from_vec(vec![100.0, 200.0, 300.0, 400.0]),
        },
        Some(krayl),
    );
    tables.validate().unwrap();
    tables
}
