//! The adding method: recursive combination of layer reflectances,
//! transmittances, and sources into column fluxes.
//!
//! Layers are combined from the surface upward into an accumulated albedo
//! and upward source of the stack below each interface; the top boundary
//! condition then closes the system and a downward sweep back-substitutes
//! the fluxes at every interface. The layer recursion is strictly
//! sequential (interface `k`'s accumulator reads only interface `k + 1`'s),
//! so a column/g-point pair is the unit of work handed to a thread.
//!
//! All arrays are in canonical orientation: layer 0 adjacent to the top of
//! the atmosphere, interface `nlay` at the surface.

use super::two_stream::LayerCoeffs;
use crate::FloatValue;
use ndarray::Array2;

/// Interface-albedo denominator guard against a fully reflective cavity.
const DENOM_MIN: FloatValue = 1e-12;

/// Diffuse source terms for one column, already scaled to flux units
/// (longwave: thermal emission; shortwave: the direct beam scattered by each
/// layer and reflected at the surface).
#[derive(Debug, Clone)]
pub(crate) struct ColumnSources {
    /// Upward source per layer, `(nlay, ngpt)`.
    pub src_up: Array2<FloatValue>,
    /// Downward source per layer, `(nlay, ngpt)`.
    pub src_dn: Array2<FloatValue>,
    /// Upward source at the surface, per g-point.
    pub src_sfc: Vec<FloatValue>,
}

/// Per-column adding sweep over all g-points.
///
/// `coeffs[(ilay, igpt)]` holds the layer reflectance/transmittance,
/// `sfc_albedo` the diffuse surface albedo per g-point, and `flux_dn_top`
/// the diffuse flux incident on the top interface.
///
/// Returns `(flux_up, flux_dn)`, each `(nlay + 1, ngpt)`, diffuse only; any
/// direct beam is tracked by the caller.
pub(crate) fn add_layers(
    coeffs: &Array2<LayerCoeffs>,
    sources: &ColumnSources,
    sfc_albedo: &[FloatValue],
    flux_dn_top: &[FloatValue],
) -> (Array2<FloatValue>, Array2<FloatValue>) {
    let (nlay, ngpt) = coeffs.dim();
    let nlev = nlay + 1;
    let mut flux_up = Array2::zeros((nlev, ngpt));
    let mut flux_dn = Array2::zeros((nlev, ngpt));

    let mut albedo = vec![0.0; nlev];
    let mut src = vec![0.0; nlev];

    for igpt in 0..ngpt {
        // Upward sweep: albedo of and upward emission from the stack below
        // each interface
        albedo[nlay] = sfc_albedo[igpt];
        src[nlay] = sources.src_sfc[igpt];
        for ilay in (0..nlay).rev() {
            let c = coeffs[(ilay, igpt)];
            let denom = (1.0 - c.rdif * albedo[ilay + 1]).max(DENOM_MIN);
            albedo[ilay] = c.rdif + c.tdif * c.tdif * albedo[ilay + 1] / denom;
            src[ilay] = sources.src_up[(ilay, igpt)]
                + c.tdif / denom
                    * (src[ilay + 1] + albedo[ilay + 1] * sources.src_dn[(ilay, igpt)]);
        }

        // Top boundary closure and downward back-substitution
        flux_dn[(0, igpt)] = flux_dn_top[igpt];
        flux_up[(0, igpt)] = flux_dn_top[igpt] * albedo[0] + src[0];
        for ilay in 0..nlay {
            let c = coeffs[(ilay, igpt)];
            let denom = (1.0 - c.rdif * albedo[ilay + 1]).max(DENOM_MIN);
            flux_dn[(ilay + 1, igpt)] = (c.tdif * flux_dn[(ilay, igpt)]
                + c.rdif * src[ilay + 1]
                + sources.src_dn[(ilay, igpt)])
                / denom;
            flux_up[(ilay + 1, igpt)] =
                flux_dn[(ilay + 1, igpt)] * albedo[ilay + 1] + src[ilay + 1];
        }
    }

    (flux_up, flux_dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn transparent(nlay: usize, ngpt: usize) -> Array2<LayerCoeffs> {
        Array2::from_elem(
            (nlay, ngpt),
            LayerCoeffs {
                rdif: 0.0,
                tdif: 1.0,
                src_up: 0.0,
                src_dn: 0.0,
                t_dir: 1.0,
                clamps: 0,
            },
        )
    }

    fn no_sources(nlay: usize, ngpt: usize) -> ColumnSources {
        ColumnSources {
            src_up: Array2::zeros((nlay, ngpt)),
            src_dn: Array2::zeros((nlay, ngpt)),
            src_sfc: vec![0.0; ngpt],
        }
    }

    #[test]
    fn test_transparent_column_passes_flux_through() {
        let coeffs = transparent(3, 1);
        let (up, dn) = add_layers(&coeffs, &no_sources(3, 1), &[0.0], &[50.0]);
        for ilev in 0..4 {
            assert_relative_eq!(dn[(ilev, 0)], 50.0);
            assert_relative_eq!(up[(ilev, 0)], 0.0);
        }
    }

    #[test]
    fn test_fully_reflective_surface_returns_flux() {
        let coeffs = transparent(2, 1);
        let (up, dn) = add_layers(&coeffs, &no_sources(2, 1), &[1.0], &[50.0]);
        assert_relative_eq!(dn[(2, 0)], 50.0);
        for ilev in 0..3 {
            assert_relative_eq!(up[(ilev, 0)], 50.0);
        }
    }

    #[test]
    fn test_zero_boundaries_give_zero_fluxes() {
        let mut coeffs = transparent(2, 2);
        for c in coeffs.iter_mut() {
            c.rdif = 0.2;
            c.tdif = 0.5;
        }
        let (up, dn) = add_layers(&coeffs, &no_sources(2, 2), &[0.3, 0.3], &[0.0, 0.0]);
        assert!(up.iter().all(|&v| v == 0.0));
        assert!(dn.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_surface_source_propagates_up() {
        let mut coeffs = transparent(1, 1);
        coeffs[(0, 0)].tdif = 0.5;
        let sources = ColumnSources {
            src_up: Array2::zeros((1, 1)),
            src_dn: Array2::zeros((1, 1)),
            src_sfc: vec![40.0],
        };
        let (up, dn) = add_layers(&coeffs, &sources, &[0.0], &[0.0]);
        assert_relative_eq!(up[(1, 0)], 40.0);
        assert_relative_eq!(up[(0, 0)], 20.0);
        assert!(dn.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_layer_source_splits_between_boundaries() {
        // One isotropically emitting, otherwise transparent layer between
        // black boundaries: the up source leaves the top, the down source
        // the bottom
        let coeffs = transparent(1, 1);
        let sources = ColumnSources {
            src_up: Array2::from_elem((1, 1), 7.0),
            src_dn: Array2::from_elem((1, 1), 9.0),
            src_sfc: vec![0.0],
        };
        let (up, dn) = add_layers(&coeffs, &sources, &[0.0], &[0.0]);
        assert_relative_eq!(up[(0, 0)], 7.0);
        assert_relative_eq!(dn[(1, 0)], 9.0);
        assert_relative_eq!(up[(1, 0)], 0.0);
        assert_relative_eq!(dn[(0, 0)], 0.0);
    }
}
