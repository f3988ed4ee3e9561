//! Gas-optics engine: atmospheric state to per-g-point optical properties.
//!
//! [`GasOptics`] interpolates the shared [`ReferenceTables`] against
//! per-column pressure, temperature, and [`GasConcentrations`] to produce
//! [`OpticalProps`] and, depending on the table variant, Planck sources
//! (longwave) or top-of-atmosphere solar irradiance (shortwave).
//!
//! Columns are independent and processed in parallel; all table access is
//! read-only.

mod interpolation;

use crate::errors::{RadError, RadResult};
use crate::gases::GasConcentrations;
use crate::optics::{OpticalProps, OpticalValues};
use crate::reference::{ExtrapolationPolicy, ReferenceTables, SourceTable};
use crate::sources::LongwaveSources;
use crate::spectral::SpectralDiscretization;
use crate::FloatValue;
use interpolation::{interp_major, interp_minor, EtaIndex, LayerIndex};
use log::{debug, warn};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Standard gravity in m/s².
const GRAVITY: FloatValue = 9.80665;
/// Molar mass of dry air in kg/mol.
const M_DRY: FloatValue = 0.0289647;
/// Avogadro constant in 1/mol.
const AVOGADRO: FloatValue = 6.02214076e23;
/// Pa → hPa, used in the density scaling of flagged minor gases.
const PA_TO_HPA: FloatValue = 1e-2;

/// Per-column, per-layer physical state of the atmosphere.
///
/// Layers may be ordered top-to-bottom or bottom-to-top; `top_at_1` records
/// which and is threaded through explicitly, never inferred from the
/// pressure ordering.
#[derive(Debug, Clone)]
pub struct AtmosphericState {
    /// Layer pressure, `(ncol, nlay)`, Pa.
    pub p_lay: Array2<FloatValue>,
    /// Layer temperature, `(ncol, nlay)`, K.
    pub t_lay: Array2<FloatValue>,
    /// Interface pressure, `(ncol, nlay + 1)`, Pa.
    pub p_lev: Array2<FloatValue>,
    /// Interface temperature, `(ncol, nlay + 1)`, K; required for longwave
    /// source computation.
    pub t_lev: Option<Array2<FloatValue>>,
    /// Surface skin temperature per column, K; required for longwave source
    /// computation.
    pub t_sfc: Option<Array1<FloatValue>>,
    /// Whether layer index 0 is the top of the atmosphere.
    pub top_at_1: bool,
}

impl AtmosphericState {
    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.p_lay.dim().0
    }

    /// Number of layers.
    pub fn nlay(&self) -> usize {
        self.p_lay.dim().1
    }

    fn validate(&self) -> RadResult<()> {
        let (ncol, nlay) = self.p_lay.dim();
        if ncol == 0 || nlay == 0 {
            return Err(RadError::InconsistentInput(
                "atmospheric state needs at least one column and layer".to_string(),
            ));
        }
        if self.t_lay.dim() != (ncol, nlay) {
            return Err(shape_err("layer temperature", &[ncol, nlay], self.t_lay.dim()));
        }
        if self.p_lev.dim() != (ncol, nlay + 1) {
            return Err(shape_err(
                "interface pressure",
                &[ncol, nlay + 1],
                self.p_lev.dim(),
            ));
        }
        if let Some(t_lev) = &self.t_lev {
            if t_lev.dim() != (ncol, nlay + 1) {
                return Err(shape_err(
                    "interface temperature",
                    &[ncol, nlay + 1],
                    t_lev.dim(),
                ));
            }
        }
        if let Some(t_sfc) = &self.t_sfc {
            if t_sfc.len() != ncol {
                return Err(RadError::ShapeMismatch {
                    quantity: "surface temperature".to_string(),
                    expected: vec![ncol],
                    actual: vec![t_sfc.len()],
                });
            }
        }
        Ok(())
    }
}

fn shape_err(quantity: &str, expected: &[usize], actual: (usize, usize)) -> RadError {
    RadError::ShapeMismatch {
        quantity: quantity.to_string(),
        expected: expected.to_vec(),
        actual: vec![actual.0, actual.1],
    }
}

/// Numeric policy of the gas-optics engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasOpticsParams {
    /// Behaviour for pressures/temperatures outside the reference grid.
    pub extrapolation: ExtrapolationPolicy,
    /// Optional total solar irradiance the per-g-point solar source is
    /// normalized to (shortwave only).
    pub total_solar_irradiance: Option<FloatValue>,
}

/// The gas-optics engine. Cheap to clone; the tables are shared.
#[derive(Debug, Clone)]
pub struct GasOptics {
    tables: Arc<ReferenceTables>,
    params: GasOpticsParams,
}

impl GasOptics {
    /// Wrap validated reference tables.
    pub fn new(tables: Arc<ReferenceTables>, params: GasOpticsParams) -> RadResult<Self> {
        tables.validate()?;
        Ok(Self { tables, params })
    }

    /// The spectral discretization of the underlying tables.
    pub fn spectral(&self) -> &SpectralDiscretization {
        &self.tables.spectral
    }

    /// Whether the tables describe an internal-source (longwave) problem.
    pub fn is_internal_source(&self) -> bool {
        matches!(self.tables.source, SourceTable::Internal { .. })
    }

    /// Compute absorption optical depth and Planck sources for a longwave
    /// problem.
    ///
    /// Requires internal-source tables and interface/surface temperatures in
    /// the state. Fails with [`RadError::MissingGas`] if any gas referenced
    /// by the tables is absent from `gases`.
    pub fn compute_longwave(
        &self,
        state: &AtmosphericState,
        gases: &GasConcentrations,
    ) -> RadResult<(OpticalProps, LongwaveSources)> {
        let SourceTable::Internal {
            totplnk,
            planck_frac,
            temp_min,
            temp_delta,
        } = &self.tables.source
        else {
            return Err(RadError::InconsistentInput(
                "longwave computation requires internal-source (Planck) tables".to_string(),
            ));
        };
        let t_lev = state.t_lev.as_ref().ok_or_else(|| {
            RadError::InconsistentInput(
                "longwave computation requires interface temperatures".to_string(),
            )
        })?;
        let t_sfc = state.t_sfc.as_ref().ok_or_else(|| {
            RadError::InconsistentInput(
                "longwave computation requires surface temperatures".to_string(),
            )
        })?;

        let (tau_abs, _) = self.compute_tau(state, gases, false)?;
        let props = OpticalProps::from_values(
            self.tables.spectral.clone(),
            OpticalValues::OneScalar { tau: tau_abs },
        )?;

        let planck = PlanckTable {
            totplnk: totplnk.view(),
            temp_min: *temp_min,
            temp_delta: *temp_delta,
        };
        let (ncol, nlay, ngpt) = (state.ncol(), state.nlay(), self.tables.spectral.ngpt());
        let spectral = &self.tables.spectral;

        let mut lay_source = Array3::zeros((ncol, nlay, ngpt));
        let mut lev_source = Array3::zeros((ncol, nlay + 1, ngpt));
        let mut sfc_source = Array2::zeros((ncol, ngpt));
        for igpt in 0..ngpt {
            let iband = spectral.band_of_gpt(igpt);
            let frac = planck_frac[igpt];
            for icol in 0..ncol {
                for ilay in 0..nlay {
                    lay_source[(icol, ilay, igpt)] =
                        frac * planck.band_irradiance(state.t_lay[(icol, ilay)], iband);
                }
                for ilev in 0..nlay + 1 {
                    lev_source[(icol, ilev, igpt)] =
                        frac * planck.band_irradiance(t_lev[(icol, ilev)], iband);
                }
                sfc_source[(icol, igpt)] = frac * planck.band_irradiance(t_sfc[icol], iband);
            }
        }

        Ok((
            props,
            LongwaveSources {
                lay_source,
                lev_source,
                sfc_source,
            },
        ))
    }

    /// Compute optical properties and the top-of-atmosphere solar flux for a
    /// shortwave problem.
    ///
    /// With Rayleigh tables present the result is a two-stream object
    /// (`ssa` filled from the scattering fraction, `g = 0` for molecular
    /// scattering); otherwise it is absorption-only.
    pub fn compute_shortwave(
        &self,
        state: &AtmosphericState,
        gases: &GasConcentrations,
    ) -> RadResult<(OpticalProps, Array2<FloatValue>)> {
        let SourceTable::External { solar_src } = &self.tables.source else {
            return Err(RadError::InconsistentInput(
                "shortwave computation requires external-source (solar) tables".to_string(),
            ));
        };

        let with_rayleigh = self.tables.krayl.is_some();
        let (tau_abs, tau_rayl) = self.compute_tau(state, gases, with_rayleigh)?;

        let values = match tau_rayl {
            Some(tau_rayl) => {
                let mut tau = tau_abs;
                let mut ssa = tau_rayl;
                for (tau, ssa) in tau.iter_mut().zip(ssa.iter_mut()) {
                    let total = *tau + *ssa;
                    *ssa = if total > 0.0 { *ssa / total } else { 0.0 };
                    *tau = total;
                }
                OpticalValues::TwoStream {
                    g: Array3::zeros(tau.dim()),
                    tau,
                    ssa,
                }
            }
            None => OpticalValues::OneScalar { tau: tau_abs },
        };
        let props = OpticalProps::from_values(self.tables.spectral.clone(), values)?;

        let norm = match self.params.total_solar_irradiance {
            Some(tsi) => tsi / solar_src.sum(),
            None => 1.0,
        };
        let ncol = state.ncol();
        let toa_flux = Array2::from_shape_fn((ncol, solar_src.len()), |(_, igpt)| {
            solar_src[igpt] * norm
        });

        Ok((props, toa_flux))
    }

    /// Shared absorption (and optional Rayleigh) optical-depth computation.
    ///
    /// Validates shapes and gas coverage eagerly, then interpolates per
    /// column in parallel.
    fn compute_tau(
        &self,
        state: &AtmosphericState,
        gases: &GasConcentrations,
        with_rayleigh: bool,
    ) -> RadResult<(Array3<FloatValue>, Option<Array3<FloatValue>>)> {
        state.validate()?;
        let (ncol, nlay) = (state.ncol(), state.nlay());
        if (gases.ncol(), gases.nlay()) != (ncol, nlay) {
            return Err(RadError::ShapeMismatch {
                quantity: "gas concentrations".to_string(),
                expected: vec![ncol, nlay],
                actual: vec![gases.ncol(), gases.nlay()],
            });
        }

        // Fail on the first missing gas before any interpolation work
        let mut vmr: HashMap<String, Array2<FloatValue>> = HashMap::new();
        for gas in self.tables.required_gases() {
            if !gases.has_gas(&gas) {
                return Err(RadError::MissingGas { gas });
            }
            vmr.insert(gas.clone(), gases.get_vmr(&gas)?);
        }

        let tables = &*self.tables;
        let policy = self.params.extrapolation;
        let ngpt = tables.spectral.ngpt();
        debug!(
            "gas optics: {ncol} columns x {nlay} layers x {ngpt} g-points, rayleigh: {with_rayleigh}"
        );

        let columns: Vec<ColumnTau> = (0..ncol)
            .into_par_iter()
            .map(|icol| {
                compute_column_tau(
                    tables,
                    &vmr,
                    state.p_lay.row(icol),
                    state.t_lay.row(icol),
                    state.p_lev.row(icol),
                    icol,
                    with_rayleigh,
                    policy,
                )
            })
            .collect::<RadResult<_>>()?;

        let clamped: usize = columns.iter().map(|c| c.clamped_layers).sum();
        if clamped > 0 {
            warn!(
                "gas optics: {clamped} of {} layer states fell outside the reference grid and were clamped",
                ncol * nlay
            );
        }

        let mut tau_abs = Array3::zeros((ncol, nlay, ngpt));
        let mut tau_rayl = with_rayleigh.then(|| Array3::zeros((ncol, nlay, ngpt)));
        for (icol, column) in columns.into_iter().enumerate() {
            tau_abs.index_axis_mut(ndarray::Axis(0), icol).assign(&column.tau_abs);
            if let (Some(tau_rayl), Some(col_rayl)) = (&mut tau_rayl, column.tau_rayl) {
                tau_rayl.index_axis_mut(ndarray::Axis(0), icol).assign(&col_rayl);
            }
        }
        Ok((tau_abs, tau_rayl))
    }
}

/// Piecewise-linear Planck irradiance lookup.
///
/// Temperatures outside the tabulated range are clamped to the table edge;
/// the Planck table is expected to span all physically plausible layer and
/// surface temperatures by a wide margin.
struct PlanckTable<'a> {
    totplnk: ArrayView2<'a, FloatValue>,
    temp_min: FloatValue,
    temp_delta: FloatValue,
}

impl PlanckTable<'_> {
    fn band_irradiance(&self, temperature: FloatValue, iband: usize) -> FloatValue {
        let nt = self.totplnk.dim().0;
        let position =
            ((temperature - self.temp_min) / self.temp_delta).clamp(0.0, (nt - 1) as FloatValue);
        let index = (position.floor() as usize).min(nt - 2);
        let weight = position - index as FloatValue;
        (1.0 - weight) * self.totplnk[(index, iband)] + weight * self.totplnk[(index + 1, iband)]
    }
}

struct ColumnTau {
    tau_abs: Array2<FloatValue>,
    tau_rayl: Option<Array2<FloatValue>>,
    clamped_layers: usize,
}

/// Interpolate one column's optical depths.
#[allow(clippy::too_many_arguments)]
fn compute_column_tau(
    tables: &ReferenceTables,
    vmr: &HashMap<String, Array2<FloatValue>>,
    p_lay: ArrayView1<'_, FloatValue>,
    t_lay: ArrayView1<'_, FloatValue>,
    p_lev: ArrayView1<'_, FloatValue>,
    icol: usize,
    with_rayleigh: bool,
    policy: ExtrapolationPolicy,
) -> RadResult<ColumnTau> {
    let nlay = p_lay.len();
    let ngpt = tables.spectral.ngpt();
    let neta = tables.kmajor.dim().1;
    let mut tau_abs = Array2::zeros((nlay, ngpt));
    let mut tau_rayl = with_rayleigh.then(|| Array2::zeros((nlay, ngpt)));
    let mut clamped_layers = 0;

    let gas_vmr = |gas: &str, ilay: usize| -> FloatValue {
        vmr.get(gas)
            .map(|field| field[(icol, ilay)])
            .unwrap_or(0.0)
    };

    for ilay in 0..nlay {
        let layer = LayerIndex::locate(tables, p_lay[ilay], t_lay[ilay], icol, ilay, policy)?;
        if layer.clamped {
            clamped_layers += 1;
        }

        // Dry-air column amount of the layer, molecules/m²
        let dp = (p_lev[ilay + 1] - p_lev[ilay]).abs();
        let col_dry = dp / (GRAVITY * M_DRY) * AVOGADRO;

        // Mixing fraction per flavor, resolved at both temperature corners
        let etas: Vec<EtaIndex> = tables
            .flavors
            .iter()
            .map(|flavor| {
                EtaIndex::compute(
                    flavor,
                    gas_vmr(&flavor.gas_a.to_ascii_lowercase(), ilay),
                    gas_vmr(&flavor.gas_b.to_ascii_lowercase(), ilay),
                    layer.jtemp,
                    neta,
                )
            })
            .collect();

        let gpt_flavor = if layer.lower {
            &tables.gpt_flavor_lower
        } else {
            &tables.gpt_flavor_upper
        };

        // Major species
        for igpt in 0..ngpt {
            let iflav = gpt_flavor[igpt];
            let flavor = &tables.flavors[iflav];
            let k = interp_major(tables.kmajor.view(), igpt, &etas[iflav], &layer);

            let ratio = (1.0 - layer.ftemp) * flavor.ref_vmr_ratio[layer.jtemp]
                + layer.ftemp * flavor.ref_vmr_ratio[layer.jtemp + 1];
            let col_mix = col_dry
                * (gas_vmr(&flavor.gas_a.to_ascii_lowercase(), ilay)
                    + ratio * gas_vmr(&flavor.gas_b.to_ascii_lowercase(), ilay));
            tau_abs[(ilay, igpt)] += k * col_mix;
        }

        // Minor species active in this half of the atmosphere
        let minors = if layer.lower {
            &tables.minor_lower
        } else {
            &tables.minor_upper
        };
        for minor in minors {
            let vmr_minor = gas_vmr(&minor.gas.to_ascii_lowercase(), ilay);
            if vmr_minor <= 0.0 {
                continue;
            }
            let mut scaling = col_dry * vmr_minor;
            if minor.scales_with_density {
                scaling *= PA_TO_HPA * p_lay[ilay] / t_lay[ilay];
            }
            if let Some(scaling_gas) = &minor.scaling_gas {
                let vmr_scaling = gas_vmr(&scaling_gas.to_ascii_lowercase(), ilay);
                scaling *= if minor.scale_by_complement {
                    1.0 - vmr_scaling
                } else {
                    vmr_scaling
                };
            }

            let (start, end) = minor.gpt_limits;
            for igpt in start..end {
                let eta = &etas[gpt_flavor[igpt]];
                let k = interp_minor(minor.kminor.view(), igpt - start, eta, &layer);
                tau_abs[(ilay, igpt)] += k * scaling;
            }
        }

        // Rayleigh scattering
        if let (Some(tau_rayl), Some(krayl)) = (&mut tau_rayl, &tables.krayl) {
            let table = if layer.lower {
                &krayl.lower
            } else {
                &krayl.upper
            };
            for igpt in 0..ngpt {
                let eta = &etas[gpt_flavor[igpt]];
                let k = interp_minor(table.view(), igpt, eta, &layer);
                tau_rayl[(ilay, igpt)] = k * col_dry;
            }
        }
    }

    Ok(ColumnTau {
        tau_abs,
        tau_rayl,
        clamped_layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_tables::{longwave_tables, shortwave_tables, KMAJOR, KMINOR, KRAYL};
    use approx::assert_relative_eq;

    fn uniform_state(ncol: usize, nlay: usize, with_lw: bool) -> AtmosphericState {
        // Interfaces from 300 hPa to 900 hPa in equal steps
        let p_top = 3e4;
        let p_step = 6e4 / nlay as FloatValue;
        let p_lev = Array2::from_shape_fn((ncol, nlay + 1), |(_, ilev)| {
            p_top + p_step * ilev as FloatValue
        });
        let p_lay = Array2::from_shape_fn((ncol, nlay), |(_, ilay)| {
            p_top + p_step * (ilay as FloatValue + 0.5)
        });
        AtmosphericState {
            p_lay,
            t_lay: Array2::from_elem((ncol, nlay), 260.0),
            p_lev,
            t_lev: with_lw.then(|| Array2::from_elem((ncol, nlay + 1), 260.0)),
            t_sfc: with_lw.then(|| Array1::from_elem(ncol, 290.0)),
            top_at_1: true,
        }
    }

    fn uniform_gases(ncol: usize, nlay: usize) -> GasConcentrations {
        let mut gases = GasConcentrations::new(ncol, nlay).unwrap();
        gases.set_vmr_scalar("h2o", 1e-3).unwrap();
        gases.set_vmr_scalar("co2", 4e-4).unwrap();
        gases.set_vmr_scalar("o3", 1e-6).unwrap();
        gases
    }

    fn engine(tables: ReferenceTables) -> GasOptics {
        GasOptics::new(Arc::new(tables), GasOpticsParams::default()).unwrap()
    }

    #[test]
    fn test_missing_gas_fails_before_any_work() {
        let engine = engine(longwave_tables());
        let state = uniform_state(1, 2, true);
        let mut gases = GasConcentrations::new(1, 2).unwrap();
        gases.set_vmr_scalar("h2o", 1e-3).unwrap();
        gases.set_vmr_scalar("o3", 1e-6).unwrap();

        let err = engine.compute_longwave(&state, &gases).unwrap_err();
        match err {
            RadError::MissingGas { gas } => assert_eq!(gas, "co2"),
            other => panic!("expected MissingGas, got {other:?}"),
        }
    }

    #[test]
    fn test_longwave_tau_matches_constant_table_closed_form() {
        let engine = engine(longwave_tables());
        let nlay = 3;
        let state = uniform_state(2, nlay, true);
        let gases = uniform_gases(2, nlay);

        let (props, _) = engine.compute_longwave(&state, &gases).unwrap();
        props.validate().unwrap();
        assert!(!props.has_scattering());

        // With constant tables: tau = kmajor * col_dry * (x_h2o + x_co2)
        //                           + kminor * col_dry * x_o3
        let dp = 6e4 / nlay as FloatValue;
        let col_dry = dp / (GRAVITY * M_DRY) * AVOGADRO;
        let expected = col_dry * (KMAJOR * (1e-3 + 4e-4) + KMINOR * 1e-6);
        for &tau in props.tau().iter() {
            assert_relative_eq!(tau, expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_longwave_sources_follow_planck_table() {
        let engine = engine(longwave_tables());
        let state = uniform_state(1, 2, true);
        let gases = uniform_gases(1, 2);

        let (_, sources) = engine.compute_longwave(&state, &gases).unwrap();

        // Fixture Planck table is linear: totplnk(t, band) = (band + 1) * t,
        // and g-point 0 carries 0.4 of band 0.
        assert_relative_eq!(sources.lay_source[(0, 0, 0)], 0.4 * 260.0, epsilon = 1e-9);
        // g-point 2 carries 0.5 of band 1
        assert_relative_eq!(sources.sfc_source[(0, 2)], 0.5 * 2.0 * 290.0, epsilon = 1e-9);
        assert_eq!(sources.lev_source.dim(), (1, 3, 4));
    }

    #[test]
    fn test_out_of_range_temperature_identifies_layer() {
        let engine = engine(longwave_tables());
        let mut state = uniform_state(1, 2, true);
        state.t_lay[(0, 1)] = 150.0; // below the 200 K grid minimum
        let gases = uniform_gases(1, 2);

        let err = engine.compute_longwave(&state, &gases).unwrap_err();
        match err {
            RadError::OutOfRange {
                quantity, col, lay, ..
            } => {
                assert_eq!(quantity, "temperature");
                assert_eq!((col, lay), (0, 1));
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_clamp_policy_permits_out_of_range() {
        let tables = longwave_tables();
        let mut state = uniform_state(1, 2, true);
        state.t_lay[(0, 1)] = 150.0;
        let gases = uniform_gases(1, 2);

        let engine = GasOptics::new(
            Arc::new(tables),
            GasOpticsParams {
                extrapolation: ExtrapolationPolicy::Clamp,
                ..Default::default()
            },
        )
        .unwrap();
        let (props, _) = engine.compute_longwave(&state, &gases).unwrap();
        props.validate().unwrap();
    }

    #[test]
    fn test_shortwave_builds_two_stream_with_rayleigh() {
        let engine = engine(shortwave_tables());
        let state = uniform_state(1, 2, false);
        let gases = uniform_gases(1, 2);

        let (props, toa_flux) = engine.compute_shortwave(&state, &gases).unwrap();
        props.validate().unwrap();
        assert!(props.has_scattering());

        let dp = 3e4;
        let col_dry = dp / (GRAVITY * M_DRY) * AVOGADRO;
        let tau_abs = col_dry * (KMAJOR * (1e-3 + 4e-4) + KMINOR * 1e-6);
        let tau_ray = col_dry * KRAYL;
        let tau = props.tau()[(0, 0, 0)];
        let ssa = props.ssa().unwrap()[(0, 0, 0)];
        assert_relative_eq!(tau, tau_abs + tau_ray, max_relative = 1e-12);
        assert_relative_eq!(ssa, tau_ray / (tau_abs + tau_ray), max_relative = 1e-12);
        assert_relative_eq!(props.g().unwrap()[(0, 0, 0)], 0.0);

        // Unnormalized solar source passes straight through
        assert_relative_eq!(toa_flux[(0, 3)], 400.0);
    }

    #[test]
    fn test_total_solar_irradiance_normalization() {
        let engine = GasOptics::new(
            Arc::new(shortwave_tables()),
            GasOpticsParams {
                total_solar_irradiance: Some(500.0),
                ..Default::default()
            },
        )
        .unwrap();
        let state = uniform_state(1, 1, false);
        let gases = uniform_gases(1, 1);

        let (_, toa_flux) = engine.compute_shortwave(&state, &gases).unwrap();
        // Fixture solar source sums to 1000; normalization halves it
        assert_relative_eq!(toa_flux.row(0).sum(), 500.0, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_concentration_gas_contributes_nothing() {
        let engine = engine(longwave_tables());
        let state = uniform_state(1, 1, true);

        let mut gases = uniform_gases(1, 1);
        gases.set_vmr_scalar("o3", 0.0).unwrap();
        let (props_no_o3, _) = engine.compute_longwave(&state, &gases).unwrap();

        let gases = uniform_gases(1, 1);
        let (props, _) = engine.compute_longwave(&state, &gases).unwrap();

        assert!(props_no_o3.tau()[(0, 0, 0)] < props.tau()[(0, 0, 0)]);

        let dp = 6e4;
        let col_dry = dp / (GRAVITY * M_DRY) * AVOGADRO;
        assert_relative_eq!(
            props_no_o3.tau()[(0, 0, 0)],
            col_dry * KMAJOR * (1e-3 + 4e-4),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_variant_mismatch_rejected() {
        let engine = engine(longwave_tables());
        let state = uniform_state(1, 1, false);
        let gases = uniform_gases(1, 1);
        assert!(engine.compute_shortwave(&state, &gases).is_err());
    }
}
