//! Solver paths for absorption-only optical properties.
//!
//! Without scattering the plane-parallel transfer equation decouples by
//! direction, so the longwave problem is integrated exactly layer by layer
//! along a small set of discrete ordinates and summed with Gaussian
//! quadrature weights, and the shortwave problem reduces to attenuation of
//! the direct beam. This is the cheapest path and is numerically exact for
//! pure absorption.
//!
//! All arrays are in canonical orientation (layer 0 at the top).

use super::SolverConfig;
use crate::FloatValue;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// Largest supported quadrature angle count.
pub(crate) const MAX_GAUSS_ANGLES: usize = 3;

/// First-moment Gaussian quadrature secants over the hemisphere, by angle
/// count. One angle reduces to the classic 1.66 diffusivity approximation.
const GAUSS_SECANTS: [[FloatValue; MAX_GAUSS_ANGLES]; MAX_GAUSS_ANGLES] = [
    [1.660_000_00, 0.0, 0.0],
    [1.183_503_43, 2.816_496_55, 0.0],
    [1.097_198_58, 1.693_385_07, 4.709_416_30],
];

/// Matching quadrature weights, normalized to unit hemispheric flux.
const GAUSS_WEIGHTS: [[FloatValue; MAX_GAUSS_ANGLES]; MAX_GAUSS_ANGLES] = [
    [1.0, 0.0, 0.0],
    [0.636_082_763_4, 0.363_917_236_6, 0.0],
    [0.401_863_827_4, 0.458_482_212_8, 0.139_653_959_8],
];

/// Longwave no-scattering integration for one column.
///
/// Shapes: `tau` and `lay_source` are `(nlay, ngpt)`, `lev_source` is
/// `(nlay + 1, ngpt)`, the rest per g-point. Returns `(flux_up, flux_dn)`
/// at `(nlay + 1, ngpt)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn lw_column(
    tau: ArrayView2<'_, FloatValue>,
    lay_source: ArrayView2<'_, FloatValue>,
    lev_source: ArrayView2<'_, FloatValue>,
    sfc_source: ArrayView1<'_, FloatValue>,
    sfc_emis: ArrayView1<'_, FloatValue>,
    inc_flux: Option<ArrayView1<'_, FloatValue>>,
    n_angles: usize,
    config: &SolverConfig,
) -> (Array2<FloatValue>, Array2<FloatValue>) {
    let (nlay, ngpt) = tau.dim();
    let nlev = nlay + 1;
    let mut flux_up = Array2::zeros((nlev, ngpt));
    let mut flux_dn = Array2::zeros((nlev, ngpt));

    let secants = &GAUSS_SECANTS[n_angles - 1][..n_angles];
    let weights = &GAUSS_WEIGHTS[n_angles - 1][..n_angles];

    for igpt in 0..ngpt {
        let emis = sfc_emis[igpt];
        let incident = inc_flux.map_or(0.0, |f| f[igpt]);

        for (&secant, &weight) in secants.iter().zip(weights) {
            // Downward sweep
            let mut rad_dn = weight * incident;
            flux_dn[(0, igpt)] += rad_dn;
            for ilay in 0..nlay {
                let (trans, fact) = layer_transmission(tau[(ilay, igpt)], secant, config);
                let lev_bot = lev_source[(ilay + 1, igpt)];
                let source_dn = (1.0 - trans) * lev_bot
                    + 2.0 * fact * (lay_source[(ilay, igpt)] - lev_bot);
                rad_dn = rad_dn * trans + weight * source_dn;
                flux_dn[(ilay + 1, igpt)] += rad_dn;
            }

            // Surface emission plus reflection of the downwelling flux
            let mut rad_up = emis * weight * sfc_source[igpt] + (1.0 - emis) * rad_dn;
            flux_up[(nlay, igpt)] += rad_up;

            // Upward sweep
            for ilay in (0..nlay).rev() {
                let (trans, fact) = layer_transmission(tau[(ilay, igpt)], secant, config);
                let lev_top = lev_source[(ilay, igpt)];
                let source_up = (1.0 - trans) * lev_top
                    + 2.0 * fact * (lay_source[(ilay, igpt)] - lev_top);
                rad_up = rad_up * trans + weight * source_up;
                flux_up[(ilay, igpt)] += rad_up;
            }
        }
    }

    (flux_up, flux_dn)
}

/// Shortwave direct-beam attenuation for one column.
///
/// Absorption-only shortwave scatters nothing into the diffuse field, so
/// the result is the attenuated direct beam alone; any incident diffuse
/// flux is carried separately by [`sw_diffuse_column`]. The upward flux is
/// zero.
pub(crate) fn sw_direct_column(
    tau: ArrayView2<'_, FloatValue>,
    toa_flux: ArrayView1<'_, FloatValue>,
    mu0: FloatValue,
) -> Array2<FloatValue> {
    let (nlay, ngpt) = tau.dim();
    let mut flux_dir = Array2::zeros((nlay + 1, ngpt));
    for igpt in 0..ngpt {
        let mut dir = toa_flux[igpt] * mu0;
        flux_dir[(0, igpt)] = dir;
        for ilay in 0..nlay {
            dir *= (-tau[(ilay, igpt)] / mu0).exp();
            flux_dir[(ilay + 1, igpt)] = dir;
        }
    }
    flux_dir
}

/// Attenuation of a diffuse flux incident on the top of an absorption-only
/// column, at the single-angle diffusivity secant.
pub(crate) fn sw_diffuse_column(
    tau: ArrayView2<'_, FloatValue>,
    inc_flux_dif: ArrayView1<'_, FloatValue>,
) -> Array2<FloatValue> {
    let (nlay, ngpt) = tau.dim();
    let secant = GAUSS_SECANTS[0][0];
    let mut flux_dn = Array2::zeros((nlay + 1, ngpt));
    for igpt in 0..ngpt {
        let mut dif = inc_flux_dif[igpt];
        flux_dn[(0, igpt)] = dif;
        for ilay in 0..nlay {
            dif *= (-tau[(ilay, igpt)] * secant).exp();
            flux_dn[(ilay + 1, igpt)] = dif;
        }
    }
    flux_dn
}

/// Transmittance along one ordinate plus the linear-in-tau source factor.
///
/// The factor `(1 - trans) / tau - trans` loses precision for small optical
/// depths and is replaced by its series expansion below the configured
/// threshold.
fn layer_transmission(
    tau: FloatValue,
    secant: FloatValue,
    config: &SolverConfig,
) -> (FloatValue, FloatValue) {
    let tau_loc = tau * secant;
    let trans = (-tau_loc).exp();
    let fact = if tau_loc > config.tau_thresh {
        (1.0 - trans) / tau_loc - trans
    } else {
        tau_loc * (0.5 - tau_loc / 3.0)
    };
    (trans, fact)
}
