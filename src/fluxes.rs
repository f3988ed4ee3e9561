//! Reduction of per-g-point fluxes to caller-facing outputs.
//!
//! Callers allocate the output arrays they want before the solve;
//! [`reduce`](FluxesBroadband::reduce) populates exactly the allocated ones
//! and never writes partially. G-points already carry their quadrature
//! weights, so reduction is an unweighted sum: over all g-points for
//! broadband output, over each band's g-point range for by-band output.

use crate::errors::{RadError, RadResult};
use crate::solver::GptFluxes;
use crate::spectral::SpectralDiscretization;
use crate::FloatValue;
use ndarray::{Array2, Array3, ArrayView3, Axis};

/// Broadband flux outputs, each `(ncol, nlev)` when allocated.
#[derive(Debug, Clone, Default)]
pub struct FluxesBroadband {
    pub flux_up: Option<Array2<FloatValue>>,
    pub flux_dn: Option<Array2<FloatValue>>,
    /// Net downward flux, `flux_dn - flux_up`.
    pub flux_net: Option<Array2<FloatValue>>,
    /// Direct-beam part of the downward flux (shortwave only).
    pub flux_dn_dir: Option<Array2<FloatValue>>,
}

impl FluxesBroadband {
    /// Allocate the up/down/net outputs, plus the direct flux if requested.
    pub fn new(ncol: usize, nlev: usize, with_direct: bool) -> Self {
        Self {
            flux_up: Some(Array2::zeros((ncol, nlev))),
            flux_dn: Some(Array2::zeros((ncol, nlev))),
            flux_net: Some(Array2::zeros((ncol, nlev))),
            flux_dn_dir: with_direct.then(|| Array2::zeros((ncol, nlev))),
        }
    }

    /// Whether any output array is allocated. A solver may skip bookkeeping
    /// for quantities nobody asked for.
    pub fn are_desired(&self) -> bool {
        self.flux_up.is_some()
            || self.flux_dn.is_some()
            || self.flux_net.is_some()
            || self.flux_dn_dir.is_some()
    }

    /// Sum per-g-point fluxes into the allocated outputs.
    ///
    /// The level ordering of the outputs follows the inputs; `top_at_1` is
    /// threaded through for reducers that distinguish the boundaries.
    pub fn reduce(
        &mut self,
        gpt_fluxes: &GptFluxes,
        spectral: &SpectralDiscretization,
        _top_at_1: bool,
    ) -> RadResult<()> {
        let (ncol, nlev, _) = check_gpt_shapes(gpt_fluxes, spectral)?;
        check_output_shapes(self, ncol, nlev)?;
        if self.flux_dn_dir.is_some() && gpt_fluxes.flux_dn_dir.is_none() {
            return Err(RadError::InconsistentInput(
                "direct flux output requested but the solve carried no direct beam".to_string(),
            ));
        }

        if let Some(out) = self.flux_up.as_mut() {
            out.assign(&gpt_fluxes.flux_up.sum_axis(Axis(2)));
        }
        if let Some(out) = self.flux_dn.as_mut() {
            out.assign(&gpt_fluxes.flux_dn.sum_axis(Axis(2)));
        }
        if let Some(out) = self.flux_net.as_mut() {
            out.assign(
                &(gpt_fluxes.flux_dn.sum_axis(Axis(2)) - gpt_fluxes.flux_up.sum_axis(Axis(2))),
            );
        }
        if let Some(out) = self.flux_dn_dir.as_mut() {
            // Presence checked above
            let dir = gpt_fluxes.flux_dn_dir.as_ref().unwrap();
            out.assign(&dir.sum_axis(Axis(2)));
        }
        Ok(())
    }
}

/// By-band flux outputs, each `(ncol, nlev, nband)` when allocated, together
/// with the broadband summary.
#[derive(Debug, Clone, Default)]
pub struct FluxesByBand {
    pub broadband: FluxesBroadband,
    pub bnd_flux_up: Option<Array3<FloatValue>>,
    pub bnd_flux_dn: Option<Array3<FloatValue>>,
    pub bnd_flux_net: Option<Array3<FloatValue>>,
    pub bnd_flux_dn_dir: Option<Array3<FloatValue>>,
}

impl FluxesByBand {
    /// Allocate up/down/net outputs by band and broadband, plus the direct
    /// flux if requested.
    pub fn new(ncol: usize, nlev: usize, nband: usize, with_direct: bool) -> Self {
        let band = |_| Some(Array3::zeros((ncol, nlev, nband)));
        Self {
            broadband: FluxesBroadband::new(ncol, nlev, with_direct),
            bnd_flux_up: band(()),
            bnd_flux_dn: band(()),
            bnd_flux_net: band(()),
            bnd_flux_dn_dir: with_direct.then(|| Array3::zeros((ncol, nlev, nband))),
        }
    }

    pub fn are_desired(&self) -> bool {
        self.broadband.are_desired()
            || self.bnd_flux_up.is_some()
            || self.bnd_flux_dn.is_some()
            || self.bnd_flux_net.is_some()
            || self.bnd_flux_dn_dir.is_some()
    }

    /// Sum per-g-point fluxes within each band's g-point range, then fill the
    /// broadband summary.
    pub fn reduce(
        &mut self,
        gpt_fluxes: &GptFluxes,
        spectral: &SpectralDiscretization,
        top_at_1: bool,
    ) -> RadResult<()> {
        let (ncol, nlev, _) = check_gpt_shapes(gpt_fluxes, spectral)?;
        for (name, out) in [
            ("by-band upward flux", &self.bnd_flux_up),
            ("by-band downward flux", &self.bnd_flux_dn),
            ("by-band net flux", &self.bnd_flux_net),
            ("by-band direct flux", &self.bnd_flux_dn_dir),
        ] {
            if let Some(out) = out {
                if out.dim() != (ncol, nlev, spectral.nband()) {
                    let d = out.dim();
                    return Err(RadError::ShapeMismatch {
                        quantity: name.to_string(),
                        expected: vec![ncol, nlev, spectral.nband()],
                        actual: vec![d.0, d.1, d.2],
                    });
                }
            }
        }
        if self.bnd_flux_dn_dir.is_some() && gpt_fluxes.flux_dn_dir.is_none() {
            return Err(RadError::InconsistentInput(
                "direct flux output requested but the solve carried no direct beam".to_string(),
            ));
        }

        if let Some(out) = self.bnd_flux_up.as_mut() {
            sum_by_band(gpt_fluxes.flux_up.view(), spectral, out);
        }
        if let Some(out) = self.bnd_flux_dn.as_mut() {
            sum_by_band(gpt_fluxes.flux_dn.view(), spectral, out);
        }
        if let Some(out) = self.bnd_flux_net.as_mut() {
            let mut up = Array3::zeros(out.dim());
            sum_by_band(gpt_fluxes.flux_up.view(), spectral, &mut up);
            sum_by_band(gpt_fluxes.flux_dn.view(), spectral, out);
            *out -= &up;
        }
        if let Some(out) = self.bnd_flux_dn_dir.as_mut() {
            let dir = gpt_fluxes.flux_dn_dir.as_ref().unwrap();
            sum_by_band(dir.view(), spectral, out);
        }

        self.broadband.reduce(gpt_fluxes, spectral, top_at_1)
    }
}

fn check_gpt_shapes(
    gpt_fluxes: &GptFluxes,
    spectral: &SpectralDiscretization,
) -> RadResult<(usize, usize, usize)> {
    let (ncol, nlev, ngpt) = gpt_fluxes.flux_up.dim();
    if ngpt != spectral.ngpt() {
        return Err(RadError::SpectralMismatch(format!(
            "per-g-point fluxes have {ngpt} g-points but the discretization has {}",
            spectral.ngpt()
        )));
    }
    if gpt_fluxes.flux_dn.dim() != (ncol, nlev, ngpt) {
        let d = gpt_fluxes.flux_dn.dim();
        return Err(RadError::ShapeMismatch {
            quantity: "per-g-point downward flux".to_string(),
            expected: vec![ncol, nlev, ngpt],
            actual: vec![d.0, d.1, d.2],
        });
    }
    Ok((ncol, nlev, ngpt))
}

fn check_output_shapes(fluxes: &FluxesBroadband, ncol: usize, nlev: usize) -> RadResult<()> {
    for (name, out) in [
        ("broadband upward flux", &fluxes.flux_up),
        ("broadband downward flux", &fluxes.flux_dn),
        ("broadband net flux", &fluxes.flux_net),
        ("broadband direct flux", &fluxes.flux_dn_dir),
    ] {
        if let Some(out) = out {
            if out.dim() != (ncol, nlev) {
                let d = out.dim();
                return Err(RadError::ShapeMismatch {
                    quantity: name.to_string(),
                    expected: vec![ncol, nlev],
                    actual: vec![d.0, d.1],
                });
            }
        }
    }
    Ok(())
}

fn sum_by_band(
    gpt: ArrayView3<'_, FloatValue>,
    spectral: &SpectralDiscretization,
    out: &mut Array3<FloatValue>,
) {
    for iband in 0..spectral.nband() {
        let band_sum = gpt
            .slice_axis(Axis(2), spectral.gpt_range(iband).into())
            .sum_axis(Axis(2));
        out.index_axis_mut(Axis(2), iband).assign(&band_sum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn spectral() -> SpectralDiscretization {
        SpectralDiscretization::new(vec![(10.0, 350.0), (350.0, 700.0)], &[2, 2]).unwrap()
    }

    fn gpt_fluxes(with_dir: bool) -> GptFluxes {
        // One column, two levels, four g-points with distinct values
        let flux_up =
            Array3::from_shape_fn((1, 2, 4), |(_, ilev, igpt)| (1 + igpt) as FloatValue
                + 10.0 * ilev as FloatValue);
        let flux_dn = &flux_up * 2.0;
        let flux_dn_dir = with_dir.then(|| &flux_up * 0.5);
        GptFluxes {
            flux_up,
            flux_dn,
            flux_dn_dir,
        }
    }

    #[test]
    fn test_broadband_sums_all_gpoints() {
        let mut fluxes = FluxesBroadband::new(1, 2, true);
        fluxes.reduce(&gpt_fluxes(true), &spectral(), true).unwrap();

        // Level 0: 1+2+3+4 = 10, level 1: 11+12+13+14 = 50
        let up = fluxes.flux_up.unwrap();
        assert_relative_eq!(up[(0, 0)], 10.0);
        assert_relative_eq!(up[(0, 1)], 50.0);
        let net = fluxes.flux_net.unwrap();
        assert_relative_eq!(net[(0, 0)], 10.0);
        let dir = fluxes.flux_dn_dir.unwrap();
        assert_relative_eq!(dir[(0, 1)], 25.0);
    }

    #[test]
    fn test_unallocated_outputs_stay_unwritten() {
        let mut fluxes = FluxesBroadband {
            flux_up: Some(Array2::zeros((1, 2))),
            ..FluxesBroadband::default()
        };
        assert!(fluxes.are_desired());
        fluxes.reduce(&gpt_fluxes(false), &spectral(), true).unwrap();
        assert!(fluxes.flux_up.is_some());
        assert!(fluxes.flux_dn.is_none());
        assert!(fluxes.flux_net.is_none());
    }

    #[test]
    fn test_direct_output_without_direct_solve_is_an_error() {
        let mut fluxes = FluxesBroadband::new(1, 2, true);
        assert!(matches!(
            fluxes.reduce(&gpt_fluxes(false), &spectral(), true),
            Err(RadError::InconsistentInput(_))
        ));
    }

    #[test]
    fn test_by_band_sums_match_broadband() {
        let mut fluxes = FluxesByBand::new(1, 2, 2, false);
        fluxes.reduce(&gpt_fluxes(false), &spectral(), true).unwrap();

        // Band 0 takes g-points 0..2, band 1 takes 2..4
        let bnd_up = fluxes.bnd_flux_up.unwrap();
        assert_relative_eq!(bnd_up[(0, 0, 0)], 3.0);
        assert_relative_eq!(bnd_up[(0, 0, 1)], 7.0);

        let up = fluxes.broadband.flux_up.unwrap();
        assert_relative_eq!(bnd_up[(0, 0, 0)] + bnd_up[(0, 0, 1)], up[(0, 0)]);

        let bnd_net = fluxes.bnd_flux_net.unwrap();
        let bnd_dn = fluxes.bnd_flux_dn.unwrap();
        assert_relative_eq!(
            bnd_net[(0, 1, 0)],
            bnd_dn[(0, 1, 0)] - bnd_up[(0, 1, 0)]
        );
    }

    #[test]
    fn test_expand_then_reduce_recovers_band_structure() {
        // A per-band constant expanded to g-points, used as a uniform flux,
        // reduces back to the constant scaled by the band's g-point count
        let sd = spectral();
        let per_band = ndarray::Array1::from(vec![3.0, 5.0]);
        let per_gpt = sd.expand(per_band.view()).unwrap();

        let flux = Array3::from_shape_fn((1, 1, sd.ngpt()), |(_, _, igpt)| per_gpt[igpt]);
        let gpt = GptFluxes {
            flux_up: flux.clone(),
            flux_dn: flux,
            flux_dn_dir: None,
        };
        let mut fluxes = FluxesByBand::new(1, 1, 2, false);
        fluxes.reduce(&gpt, &sd, true).unwrap();

        let bnd_up = fluxes.bnd_flux_up.unwrap();
        assert_relative_eq!(bnd_up[(0, 0, 0)], 2.0 * 3.0);
        assert_relative_eq!(bnd_up[(0, 0, 1)], 2.0 * 5.0);
    }

    #[test]
    fn test_reduce_rejects_gpoint_mismatch() {
        let other = SpectralDiscretization::new(vec![(10.0, 700.0)], &[3]).unwrap();
        let mut fluxes = FluxesBroadband::new(1, 2, false);
        assert!(matches!(
            fluxes.reduce(&gpt_fluxes(false), &other, true),
            Err(RadError::SpectralMismatch(_))
        ));
    }
}
