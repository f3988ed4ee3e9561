//! Emission source functions and boundary conditions.
//!
//! Longwave solves carry Planck emission evaluated at layer centres, layer
//! interfaces, and the surface; shortwave solves carry the top-of-atmosphere
//! solar irradiance per g-point together with the per-column cosine of the
//! solar zenith angle. Surface boundary conditions (emissivity, albedo) are
//! supplied per band and expanded to g-points through the spectral
//! discretization before the solve.

use crate::errors::{RadError, RadResult};
use crate::optics::OpticalProps;
use crate::FloatValue;
use ndarray::{Array2, Array3};

/// Planck sources for an internal-source (longwave) problem, all in W/m².
///
/// Shapes: `lay_source` is `(ncol, nlay, ngpt)`, `lev_source` is
/// `(ncol, nlay + 1, ngpt)` (one entry per layer interface), `sfc_source` is
/// `(ncol, ngpt)`. Level ordering follows the optical properties the sources
/// were computed with; the orientation flag is threaded alongside by the
/// caller, never inferred.
#[derive(Debug, Clone)]
pub struct LongwaveSources {
    /// Planck source at layer centres.
    pub lay_source: Array3<FloatValue>,
    /// Planck source at layer interfaces.
    pub lev_source: Array3<FloatValue>,
    /// Planck source at the surface temperature.
    pub sfc_source: Array2<FloatValue>,
}

impl LongwaveSources {
    /// Check the source shapes against the optical properties they will be
    /// solved with.
    pub fn validate_against(&self, props: &OpticalProps) -> RadResult<()> {
        let (ncol, nlay, ngpt) = (props.ncol(), props.nlay(), props.ngpt());
        if self.lay_source.dim() != (ncol, nlay, ngpt) {
            let d = self.lay_source.dim();
            return Err(RadError::ShapeMismatch {
                quantity: "layer Planck source".to_string(),
                expected: vec![ncol, nlay, ngpt],
                actual: vec![d.0, d.1, d.2],
            });
        }
        if self.lev_source.dim() != (ncol, nlay + 1, ngpt) {
            let d = self.lev_source.dim();
            return Err(RadError::ShapeMismatch {
                quantity: "level Planck source".to_string(),
                expected: vec![ncol, nlay + 1, ngpt],
                actual: vec![d.0, d.1, d.2],
            });
        }
        if self.sfc_source.dim() != (ncol, ngpt) {
            let d = self.sfc_source.dim();
            return Err(RadError::ShapeMismatch {
                quantity: "surface Planck source".to_string(),
                expected: vec![ncol, ngpt],
                actual: vec![d.0, d.1],
            });
        }
        Ok(())
    }
}

/// Top-of-atmosphere inputs for an external-source (shortwave) problem.
#[derive(Debug, Clone)]
pub struct ShortwaveSources {
    /// Incident solar irradiance per g-point, `(ncol, ngpt)`, in W/m².
    pub toa_flux: Array2<FloatValue>,
    /// Cosine of the solar zenith angle per column, in `(0, 1]`.
    pub mu0: Vec<FloatValue>,
}

impl ShortwaveSources {
    pub fn validate_against(&self, props: &OpticalProps) -> RadResult<()> {
        let (ncol, ngpt) = (props.ncol(), props.ngpt());
        if self.toa_flux.dim() != (ncol, ngpt) {
            let d = self.toa_flux.dim();
            return Err(RadError::ShapeMismatch {
                quantity: "top-of-atmosphere flux".to_string(),
                expected: vec![ncol, ngpt],
                actual: vec![d.0, d.1],
            });
        }
        if self.mu0.len() != ncol {
            return Err(RadError::ShapeMismatch {
                quantity: "solar zenith cosine".to_string(),
                expected: vec![ncol],
                actual: vec![self.mu0.len()],
            });
        }
        for (icol, &mu0) in self.mu0.iter().enumerate() {
            if !(mu0 > 0.0 && mu0 <= 1.0) {
                return Err(RadError::InconsistentInput(format!(
                    "solar zenith cosine {mu0} at column {icol} is outside (0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Validate a per-band surface property (emissivity or albedo) against an
/// optical-properties object, returning its `(ncol, ngpt)` expansion.
pub fn expand_surface_bc(
    name: &str,
    by_band: &Array2<FloatValue>,
    props: &OpticalProps,
) -> RadResult<Array2<FloatValue>> {
    let (nband, ncol) = by_band.dim();
    if nband != props.spectral().nband() || ncol != props.ncol() {
        return Err(RadError::ShapeMismatch {
            quantity: format!("surface {name}"),
            expected: vec![props.spectral().nband(), props.ncol()],
            actual: vec![nband, ncol],
        });
    }
    for &v in by_band.iter() {
        if !(0.0..=1.0).contains(&v) {
            return Err(RadError::InconsistentInput(format!(
                "surface {name} {v} is outside [0, 1]"
            )));
        }
    }
    props.spectral().expand_to_gpt(by_band.view())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::SpectralDiscretization;
    use ndarray::Array2;

    #[test]
    fn test_surface_bc_expansion_and_bounds() {
        let sd = SpectralDiscretization::new(vec![(10.0, 350.0), (350.0, 700.0)], &[1, 2]).unwrap();
        let props = OpticalProps::one_scalar(sd, 2, 3);

        let emis = Array2::from_shape_vec((2, 2), vec![0.9, 0.8, 0.7, 0.6]).unwrap();
        let expanded = expand_surface_bc("emissivity", &emis, &props).unwrap();
        assert_eq!(expanded.dim(), (2, 3));
        assert_eq!(expanded.row(0).to_vec(), vec![0.9, 0.7, 0.7]);

        let bad = Array2::from_elem((2, 2), 1.2);
        assert!(expand_surface_bc("albedo", &bad, &props).is_err());
    }

    #[test]
    fn test_shortwave_mu0_bounds() {
        let sd = SpectralDiscretization::new(vec![(10.0, 700.0)], &[2]).unwrap();
        let props = OpticalProps::one_scalar(sd, 1, 1);
        let sw = ShortwaveSources {
            toa_flux: Array2::from_elem((1, 2), 100.0),
            mu0: vec![0.0],
        };
        assert!(sw.validate_against(&props).is_err());
    }
}
