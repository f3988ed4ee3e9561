//! Immutable lookup tables for the gas-optics engine.
//!
//! A [`ReferenceTables`] instance is produced once by an external loader from
//! persisted k-distribution data, validated, and then shared read-only by
//! every solve that uses the same spectral configuration (callers typically
//! hold it in an [`std::sync::Arc`]). Nothing in this crate mutates it.
//!
//! The pressure axis is uniform in log-pressure and the temperature axis is
//! uniform in temperature, so bracketing a value is direct arithmetic rather
//! than a search. Values outside the axis range are an error by default; an
//! explicit [`ExtrapolationPolicy::Clamp`] pins them to the edge instead, and
//! every clamp is flagged to the caller.

use crate::errors::{RadError, RadResult};
use crate::spectral::SpectralDiscretization;
use crate::FloatValue;
use ndarray::{Array1, Array2, Array3, Array4};
use serde::{Deserialize, Serialize};

/// What to do when a pressure or temperature falls outside the reference
/// grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationPolicy {
    /// Fail with [`RadError::OutOfRange`] identifying the column and layer.
    #[default]
    Error,
    /// Clamp to the nearest axis edge. Each clamp is reported to the caller
    /// so it can be surfaced in logs; clamping is never silent.
    Clamp,
}

/// Result of bracketing a value on a reference axis.
///
/// The bracketed value is `(1 - weight) * axis[index] + weight * axis[index + 1]`.
#[derive(Debug, Clone, Copy)]
pub struct AxisLocation {
    /// Lower bracketing grid index, in `0..len - 1`.
    pub index: usize,
    /// Fractional position within the bracket, in `[0, 1]`.
    pub weight: FloatValue,
    /// Whether the value was outside the axis and clamped to an edge.
    pub clamped: bool,
}

/// A pair of major absorbing gases whose mixing fraction (eta) forms an
/// interpolation axis for part of the spectrum.
#[derive(Debug, Clone)]
pub struct Flavor {
    /// First key species.
    pub gas_a: String,
    /// Second key species.
    pub gas_b: String,
    /// Reference ratio `vmr_a / vmr_b` per temperature grid index, used to
    /// normalize the mixing fraction.
    pub ref_vmr_ratio: Array1<FloatValue>,
}

/// Absorption data for one minor species in one half of the atmosphere.
#[derive(Debug, Clone)]
pub struct MinorGas {
    /// Gas name (case-insensitive, matched against [`crate::gases::GasConcentrations`]).
    pub gas: String,
    /// Half-open g-point range this gas contributes to.
    pub gpt_limits: (usize, usize),
    /// Absorption coefficients `[gpt within limits, eta, temperature]`.
    pub kminor: Array3<FloatValue>,
    /// Whether the contribution scales with dry-air number density.
    pub scales_with_density: bool,
    /// Whether scaling uses the complement `(1 - vmr)` of the scaling gas.
    pub scale_by_complement: bool,
    /// Optional gas whose mixing ratio modulates the contribution.
    pub scaling_gas: Option<String>,
}

/// Tabulated emission/irradiance source data.
#[derive(Debug, Clone)]
pub enum SourceTable {
    /// Internal (longwave) sources: integrated Planck irradiance by band as a
    /// piecewise-linear function of temperature, distributed to g-points by
    /// stored fractions.
    Internal {
        /// Planck irradiance `[temperature index, band]` in W/m².
        totplnk: Array2<FloatValue>,
        /// Fraction of the band irradiance assigned to each g-point; the
        /// fractions within a band sum to one.
        planck_frac: Array1<FloatValue>,
        /// Temperature of the first `totplnk` row, in K.
        temp_min: FloatValue,
        /// Uniform temperature step of the `totplnk` rows, in K.
        temp_delta: FloatValue,
    },
    /// External (shortwave) source: top-of-atmosphere solar irradiance per
    /// g-point in W/m², a function of spectral point only.
    External {
        solar_src: Array1<FloatValue>,
    },
}

/// Rayleigh scattering coefficients `[g-point, eta, temperature]` for the two
/// atmosphere halves.
#[derive(Debug, Clone)]
pub struct RayleighTables {
    pub lower: Array3<FloatValue>,
    pub upper: Array3<FloatValue>,
}

/// The complete set of lookup tables consumed by the gas-optics engine.
///
/// Fields are public because the structure is populated by an external
/// loader; [`ReferenceTables::validate`] must pass before the tables are
/// used (the gas-optics engine enforces this on construction).
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    /// Spectral discretization all tensors are indexed against.
    pub spectral: SpectralDiscretization,
    /// Pressure axis in Pa, ascending and uniform in log-pressure.
    pub press: Array1<FloatValue>,
    /// Temperature axis in K, ascending and uniform.
    pub temp: Array1<FloatValue>,
    /// Pressure of the tropopause split between the lower- and
    /// upper-atmosphere minor-gas and flavor data, in Pa.
    pub press_trop: FloatValue,
    /// Major-species flavors.
    pub flavors: Vec<Flavor>,
    /// Flavor index per g-point in the lower atmosphere.
    pub gpt_flavor_lower: Vec<usize>,
    /// Flavor index per g-point in the upper atmosphere.
    pub gpt_flavor_upper: Vec<usize>,
    /// Major-species absorption coefficients
    /// `[g-point, eta, pressure, temperature]`.
    pub kmajor: Array4<FloatValue>,
    /// Minor species active below the tropopause.
    pub minor_lower: Vec<MinorGas>,
    /// Minor species active above the tropopause.
    pub minor_upper: Vec<MinorGas>,
    /// Rayleigh scattering coefficients, present for shortwave
    /// configurations.
    pub krayl: Option<RayleighTables>,
    /// Planck or solar source data.
    pub source: SourceTable,
}

impl ReferenceTables {
    /// Minimum pressure on the reference grid, in Pa.
    pub fn press_min(&self) -> FloatValue {
        self.press[0]
    }

    /// Maximum pressure on the reference grid, in Pa.
    pub fn press_max(&self) -> FloatValue {
        self.press[self.press.len() - 1]
    }

    /// Minimum temperature on the reference grid, in K.
    pub fn temp_min(&self) -> FloatValue {
        self.temp[0]
    }

    /// Maximum temperature on the reference grid, in K.
    pub fn temp_max(&self) -> FloatValue {
        self.temp[self.temp.len() - 1]
    }

    /// Whether a layer pressure belongs to the lower (tropospheric) tables.
    pub fn is_lower_atmosphere(&self, pressure: FloatValue) -> bool {
        pressure > self.press_trop
    }

    /// Bracket a layer pressure on the log-uniform pressure axis.
    pub fn locate_pressure(
        &self,
        pressure: FloatValue,
        col: usize,
        lay: usize,
        policy: ExtrapolationPolicy,
    ) -> RadResult<AxisLocation> {
        check_axis_len(self.press.len(), "pressure")?;
        if pressure <= 0.0 || !pressure.is_finite() {
            return Err(RadError::OutOfRange {
                quantity: "pressure",
                value: pressure,
                col,
                lay,
                min: self.press_min(),
                max: self.press_max(),
            });
        }
        let log_delta =
            (self.press[1].ln() - self.press[0].ln()).max(FloatValue::MIN_POSITIVE);
        let position = (pressure.ln() - self.press[0].ln()) / log_delta;
        locate_uniform(
            position,
            self.press.len(),
            pressure,
            "pressure",
            (self.press_min(), self.press_max()),
            col,
            lay,
            policy,
        )
    }

    /// Bracket a layer temperature on the uniform temperature axis.
    pub fn locate_temperature(
        &self,
        temperature: FloatValue,
        col: usize,
        lay: usize,
        policy: ExtrapolationPolicy,
    ) -> RadResult<AxisLocation> {
        check_axis_len(self.temp.len(), "temperature")?;
        if !temperature.is_finite() {
            return Err(RadError::OutOfRange {
                quantity: "temperature",
                value: temperature,
                col,
                lay,
                min: self.temp_min(),
                max: self.temp_max(),
            });
        }
        let delta = (self.temp[1] - self.temp[0]).max(FloatValue::MIN_POSITIVE);
        let position = (temperature - self.temp[0]) / delta;
        locate_uniform(
            position,
            self.temp.len(),
            temperature,
            "temperature",
            (self.temp_min(), self.temp_max()),
            col,
            lay,
            policy,
        )
    }

    /// All gases the tables reference: flavor pairs, minor species, and
    /// scaling gases, deduplicated and sorted.
    pub fn required_gases(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for flavor in &self.flavors {
            names.push(flavor.gas_a.to_ascii_lowercase());
            names.push(flavor.gas_b.to_ascii_lowercase());
        }
        for minor in self.minor_lower.iter().chain(&self.minor_upper) {
            names.push(minor.gas.to_ascii_lowercase());
            if let Some(scaling) = &minor.scaling_gas {
                names.push(scaling.to_ascii_lowercase());
            }
        }
        names.sort();
        names.dedup();
        names
    }

    /// Check axis monotonicity and tensor shapes.
    pub fn validate(&self) -> RadResult<()> {
        let ngpt = self.spectral.ngpt();
        let npress = self.press.len();
        let ntemp = self.temp.len();

        if npress < 2 || ntemp < 2 {
            return Err(RadError::InconsistentInput(format!(
                "reference axes need at least two points, got {npress} pressures and {ntemp} temperatures"
            )));
        }
        if !self.press.windows(2).into_iter().all(|w| w[0] < w[1]) {
            return Err(RadError::InconsistentInput(
                "reference pressure axis is not strictly ascending".to_string(),
            ));
        }
        if !self.temp.windows(2).into_iter().all(|w| w[0] < w[1]) {
            return Err(RadError::InconsistentInput(
                "reference temperature axis is not strictly ascending".to_string(),
            ));
        }

        let (kgpt, neta, kpress, ktemp) = self.kmajor.dim();
        if kgpt != ngpt || kpress != npress || ktemp != ntemp || neta < 2 {
            return Err(RadError::ShapeMismatch {
                quantity: "kmajor".to_string(),
                expected: vec![ngpt, 2, npress, ntemp],
                actual: vec![kgpt, neta, kpress, ktemp],
            });
        }

        if self.gpt_flavor_lower.len() != ngpt || self.gpt_flavor_upper.len() != ngpt {
            return Err(RadError::ShapeMismatch {
                quantity: "g-point flavor assignment".to_string(),
                expected: vec![ngpt],
                actual: vec![self.gpt_flavor_lower.len(), self.gpt_flavor_upper.len()],
            });
        }
        for &iflav in self.gpt_flavor_lower.iter().chain(&self.gpt_flavor_upper) {
            if iflav >= self.flavors.len() {
                return Err(RadError::InconsistentInput(format!(
                    "g-point flavor index {iflav} exceeds the {} defined flavors",
                    self.flavors.len()
                )));
            }
        }
        for flavor in &self.flavors {
            if flavor.ref_vmr_ratio.len() != ntemp {
                return Err(RadError::ShapeMismatch {
                    quantity: format!(
                        "reference vmr ratio for flavor {}/{}",
                        flavor.gas_a, flavor.gas_b
                    ),
                    expected: vec![ntemp],
                    actual: vec![flavor.ref_vmr_ratio.len()],
                });
            }
        }

        for minor in self.minor_lower.iter().chain(&self.minor_upper) {
            let (start, end) = minor.gpt_limits;
            if start >= end || end > ngpt {
                return Err(RadError::InconsistentInput(format!(
                    "minor gas '{}' has invalid g-point limits {start}..{end} (ngpt = {ngpt})",
                    minor.gas
                )));
            }
            let (mgpt, meta, mtemp) = minor.kminor.dim();
            if mgpt != end - start || meta != neta || mtemp != ntemp {
                return Err(RadError::ShapeMismatch {
                    quantity: format!("kminor for gas '{}'", minor.gas),
                    expected: vec![end - start, neta, ntemp],
                    actual: vec![mgpt, meta, mtemp],
                });
            }
        }

        if let Some(rayl) = &self.krayl {
            for (name, table) in [("lower", &rayl.lower), ("upper", &rayl.upper)] {
                let (rgpt, reta, rtemp) = table.dim();
                if rgpt != ngpt || reta != neta || rtemp != ntemp {
                    return Err(RadError::ShapeMismatch {
                        quantity: format!("krayl ({name})"),
                        expected: vec![ngpt, neta, ntemp],
                        actual: vec![rgpt, reta, rtemp],
                    });
                }
            }
        }

        match &self.source {
            SourceTable::Internal {
                totplnk,
                planck_frac,
                temp_delta,
                ..
            } => {
                let (nt, nband) = totplnk.dim();
                if nband != self.spectral.nband() || nt < 2 {
                    return Err(RadError::ShapeMismatch {
                        quantity: "totplnk".to_string(),
                        expected: vec![2, self.spectral.nband()],
                        actual: vec![nt, nband],
                    });
                }
                if planck_frac.len() != ngpt {
                    return Err(RadError::ShapeMismatch {
                        quantity: "planck_frac".to_string(),
                        expected: vec![ngpt],
                        actual: vec![planck_frac.len()],
                    });
                }
                if *temp_delta <= 0.0 {
                    return Err(RadError::InconsistentInput(
                        "Planck table temperature step must be positive".to_string(),
                    ));
                }
            }
            SourceTable::External { solar_src } => {
                if solar_src.len() != ngpt {
                    return Err(RadError::ShapeMismatch {
                        quantity: "solar_src".to_string(),
                        expected: vec![ngpt],
                        actual: vec![solar_src.len()],
                    });
                }
            }
        }

        Ok(())
    }
}

/// Axes need two points to bracket anything; tables are built by external
/// loaders with public fields, so this cannot be assumed here.
fn check_axis_len(len: usize, quantity: &'static str) -> RadResult<()> {
    if len < 2 {
        return Err(RadError::InconsistentInput(format!(
            "reference {quantity} axis has {len} point(s), need at least two"
        )));
    }
    Ok(())
}

/// Clamp-or-fail bracketing on a uniform axis given the fractional position.
#[allow(clippy::too_many_arguments)]
fn locate_uniform(
    position: FloatValue,
    len: usize,
    value: FloatValue,
    quantity: &'static str,
    (min, max): (FloatValue, FloatValue),
    col: usize,
    lay: usize,
    policy: ExtrapolationPolicy,
) -> RadResult<AxisLocation> {
    let out_of_range = position < 0.0 || position > (len - 1) as FloatValue;
    if out_of_range && policy == ExtrapolationPolicy::Error {
        return Err(RadError::OutOfRange {
            quantity,
            value,
            col,
            lay,
            min,
            max,
        });
    }
    let clamped_position = position.clamp(0.0, (len - 1) as FloatValue);
    let index = (clamped_position.floor() as usize).min(len - 2);
    Ok(AxisLocation {
        index,
        weight: clamped_position - index as FloatValue,
        clamped: out_of_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::test_tables::longwave_tables;

    #[test]
    fn test_locate_temperature_brackets() {
        let tables = longwave_tables();
        let loc = tables
            .locate_temperature(275.0, 0, 0, ExtrapolationPolicy::Error)
            .unwrap();
        // Axis is 200..=320 step 40: 275 sits between 240 and 280
        assert_eq!(loc.index, 1);
        assert_relative_eq!(loc.weight, 0.875, epsilon = 1e-12);
        assert!(!loc.clamped);
    }

    #[test]
    fn test_locate_pressure_is_log_uniform() {
        let tables = longwave_tables();
        let p = (tables.press[0] * tables.press[1]).sqrt();
        let loc = tables
            .locate_pressure(p, 0, 0, ExtrapolationPolicy::Error)
            .unwrap();
        assert_eq!(loc.index, 0);
        assert_relative_eq!(loc.weight, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_range_errors_by_default_and_clamps_on_request() {
        let tables = longwave_tables();
        let too_cold = tables.temp_min() - 10.0;

        let err = tables
            .locate_temperature(too_cold, 3, 7, ExtrapolationPolicy::Error)
            .unwrap_err();
        match err {
            RadError::OutOfRange { col, lay, .. } => {
                assert_eq!((col, lay), (3, 7));
            }
            other => panic!("expected OutOfRange, got {other:?}"),
        }

        let loc = tables
            .locate_temperature(too_cold, 3, 7, ExtrapolationPolicy::Clamp)
            .unwrap();
        assert_eq!(loc.index, 0);
        assert_eq!(loc.weight, 0.0);
        assert!(loc.clamped);
    }

    #[test]
    fn test_degenerate_axis_fails_instead_of_panicking() {
        // Fields are public, so a loader can hand over tables that never
        // passed validate()
        let mut tables = longwave_tables();
        tables.press = ndarray::Array1::from_vec(vec![1e4]);
        let err = tables
            .locate_pressure(1e4, 0, 0, ExtrapolationPolicy::Clamp)
            .unwrap_err();
        assert!(matches!(err, RadError::InconsistentInput(_)));

        let mut tables = longwave_tables();
        tables.temp = ndarray::Array1::from_vec(vec![250.0]);
        let err = tables
            .locate_temperature(250.0, 0, 0, ExtrapolationPolicy::Clamp)
            .unwrap_err();
        assert!(matches!(err, RadError::InconsistentInput(_)));
    }

    #[test]
    fn test_required_gases_deduplicates() {
        let tables = longwave_tables();
        let gases = tables.required_gases();
        assert_eq!(gases, vec!["co2", "h2o", "o3"]);
    }

    #[test]
    fn test_validate_catches_bad_shapes() {
        let mut tables = longwave_tables();
        tables.gpt_flavor_lower.pop();
        assert!(tables.validate().is_err());

        let mut tables = longwave_tables();
        tables.press[1] = tables.press[0];
        assert!(tables.validate().is_err());
    }
}
