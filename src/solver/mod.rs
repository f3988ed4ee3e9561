//! Radiative transfer through a stack of plane-parallel layers.
//!
//! The entry points are [`solve_longwave`] and [`solve_shortwave`]; each
//! branches on the optical-property variant. Absorption-only properties use
//! the exact discrete-ordinate paths in [`noscat`]; scattering properties use
//! the two-stream layer coefficients in [`two_stream`] combined by the adding
//! method in [`adding`].
//!
//! Inputs in either vertical orientation are normalized to a canonical
//! top-at-index-0 ordering on entry and the output fluxes flipped back, so
//! the numerical core has a single code path. Columns are independent and
//! solved in parallel; the layer recursion within a column is strictly
//! sequential.

mod adding;
mod noscat;
mod two_stream;

use crate::errors::{RadError, RadResult};
use crate::optics::OpticalProps;
use crate::sources::{expand_surface_bc, LongwaveSources, ShortwaveSources};
use crate::FloatValue;
use adding::ColumnSources;
use log::warn;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use two_stream::LayerCoeffs;

/// Numeric policy of the solver.
///
/// The epsilons guard the closed-form two-stream expressions where physically
/// legitimate inputs make them singular; clamping is deterministic and
/// reported once per solve at `warn!` level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of quadrature angles for the no-scattering longwave path
    /// (1 to 3). One angle is the 1.66 diffusivity approximation.
    pub n_gauss_angles: usize,
    /// Floor on `k² = (γ1 - γ2)(γ1 + γ2)` before the square root, reached
    /// under fully conservative scattering.
    pub k_min: FloatValue,
    /// The single-scattering albedo is capped at `1 - ssa_eps` in the
    /// longwave two-stream gammas.
    pub ssa_eps: FloatValue,
    /// Magnitude floor on the direct-beam resonance denominator
    /// `1 - (k μ0)²`.
    pub denom_eps: FloatValue,
    /// Optical depth below which the linear-in-tau source factor switches to
    /// its series expansion.
    pub tau_thresh: FloatValue,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            n_gauss_angles: 1,
            k_min: 1e-12,
            ssa_eps: 1e-9,
            denom_eps: 1e-10,
            tau_thresh: 1e-6,
        }
    }
}

impl SolverConfig {
    fn validate(&self) -> RadResult<()> {
        if !(1..=noscat::MAX_GAUSS_ANGLES).contains(&self.n_gauss_angles) {
            return Err(RadError::InconsistentInput(format!(
                "quadrature angle count {} is outside 1..={}",
                self.n_gauss_angles,
                noscat::MAX_GAUSS_ANGLES
            )));
        }
        Ok(())
    }
}

/// Per-g-point fluxes at layer interfaces, `(ncol, nlay + 1, ngpt)`, in the
/// vertical orientation of the inputs they were solved from.
///
/// `flux_dn` is the total downward flux; `flux_dn_dir` additionally reports
/// its direct-beam part for shortwave solves.
#[derive(Debug, Clone)]
pub struct GptFluxes {
    pub flux_up: Array3<FloatValue>,
    pub flux_dn: Array3<FloatValue>,
    pub flux_dn_dir: Option<Array3<FloatValue>>,
}

/// Solve an internal-source (longwave) problem.
///
/// `sfc_emis` is the surface emissivity per band, `(nband, ncol)`. `inc_flux`
/// is an optional diffuse flux incident on the top of the atmosphere,
/// `(ncol, ngpt)`; without it the top boundary is dark.
pub fn solve_longwave(
    props: &OpticalProps,
    sources: &LongwaveSources,
    sfc_emis: &Array2<FloatValue>,
    top_at_1: bool,
    inc_flux: Option<&Array2<FloatValue>>,
    config: &SolverConfig,
) -> RadResult<GptFluxes> {
    config.validate()?;
    props.validate()?;
    sources.validate_against(props)?;
    let emis_gpt = expand_surface_bc("emissivity", sfc_emis, props)?;
    let (ncol, nlay, ngpt) = (props.ncol(), props.nlay(), props.ngpt());
    if let Some(inc) = inc_flux {
        check_gpt_field("incident diffuse flux", inc.view(), ncol, ngpt)?;
    }

    let tau = canonical(props.tau(), top_at_1);
    let scattering = props
        .ssa()
        .map(|ssa| (canonical(ssa, top_at_1), canonical(props.g().unwrap(), top_at_1)));
    let lay_source = canonical(sources.lay_source.view(), top_at_1);
    let lev_source = canonical(sources.lev_source.view(), top_at_1);

    let columns: Vec<ColumnFluxes> = (0..ncol)
        .into_par_iter()
        .map(|icol| {
            let tau_c = tau.index_axis(Axis(0), icol);
            let lev_c = lev_source.index_axis(Axis(0), icol);
            match &scattering {
                None => {
                    let (up, dn) = noscat::lw_column(
                        tau_c,
                        lay_source.index_axis(Axis(0), icol),
                        lev_c,
                        sources.sfc_source.row(icol),
                        emis_gpt.row(icol),
                        inc_flux.map(|f| f.row(icol)),
                        config.n_gauss_angles,
                        config,
                    );
                    ColumnFluxes { up, dn, dir: None, clamps: 0 }
                }
                Some((ssa, g)) => {
                    let ssa_c = ssa.index_axis(Axis(0), icol);
                    let g_c = g.index_axis(Axis(0), icol);
                    let mut clamps = 0;
                    let mut coeffs = Array2::from_elem((nlay, ngpt), LayerCoeffs::default());
                    let mut src = ColumnSources {
                        src_up: Array2::zeros((nlay, ngpt)),
                        src_dn: Array2::zeros((nlay, ngpt)),
                        src_sfc: vec![0.0; ngpt],
                    };
                    for ilay in 0..nlay {
                        for igpt in 0..ngpt {
                            let c = two_stream::lw_layer(
                                tau_c[(ilay, igpt)],
                                ssa_c[(ilay, igpt)],
                                g_c[(ilay, igpt)],
                                lev_c[(ilay, igpt)],
                                lev_c[(ilay + 1, igpt)],
                                config,
                            );
                            clamps += c.clamps;
                            src.src_up[(ilay, igpt)] = c.src_up;
                            src.src_dn[(ilay, igpt)] = c.src_dn;
                            coeffs[(ilay, igpt)] = c;
                        }
                    }
                    let mut sfc_albedo = vec![0.0; ngpt];
                    for igpt in 0..ngpt {
                        let emis = emis_gpt[(icol, igpt)];
                        sfc_albedo[igpt] = 1.0 - emis;
                        src.src_sfc[igpt] = emis * sources.sfc_source[(icol, igpt)];
                    }
                    let dn_top = match inc_flux {
                        Some(f) => f.row(icol).to_vec(),
                        None => vec![0.0; ngpt],
                    };
                    let (up, dn) = adding::add_layers(&coeffs, &src, &sfc_albedo, &dn_top);
                    ColumnFluxes { up, dn, dir: None, clamps }
                }
            }
        })
        .collect();

    Ok(assemble(columns, ncol, nlay, ngpt, top_at_1, false))
}

/// Solve an external-source (shortwave) problem.
///
/// `sfc_alb_dir`/`sfc_alb_dif` are the surface albedos for direct and
/// diffuse radiation per band, `(nband, ncol)`. `inc_flux_dif` is an optional
/// diffuse flux incident on the top of the atmosphere, `(ncol, ngpt)`.
pub fn solve_shortwave(
    props: &OpticalProps,
    sources: &ShortwaveSources,
    sfc_alb_dir: &Array2<FloatValue>,
    sfc_alb_dif: &Array2<FloatValue>,
    top_at_1: bool,
    inc_flux_dif: Option<&Array2<FloatValue>>,
    config: &SolverConfig,
) -> RadResult<GptFluxes> {
    config.validate()?;
    props.validate()?;
    sources.validate_against(props)?;
    let alb_dir_gpt = expand_surface_bc("direct albedo", sfc_alb_dir, props)?;
    let alb_dif_gpt = expand_surface_bc("diffuse albedo", sfc_alb_dif, props)?;
    let (ncol, nlay, ngpt) = (props.ncol(), props.nlay(), props.ngpt());
    if let Some(inc) = inc_flux_dif {
        check_gpt_field("incident diffuse flux", inc.view(), ncol, ngpt)?;
    }

    let tau = canonical(props.tau(), top_at_1);
    let scattering = props
        .ssa()
        .map(|ssa| (canonical(ssa, top_at_1), canonical(props.g().unwrap(), top_at_1)));

    let columns: Vec<ColumnFluxes> = (0..ncol)
        .into_par_iter()
        .map(|icol| {
            let tau_c = tau.index_axis(Axis(0), icol);
            let mu0 = sources.mu0[icol];
            match &scattering {
                None => {
                    let dir = noscat::sw_direct_column(tau_c, sources.toa_flux.row(icol), mu0);
                    let mut dn = dir.clone();
                    if let Some(inc) = inc_flux_dif {
                        dn += &noscat::sw_diffuse_column(tau_c, inc.row(icol));
                    }
                    ColumnFluxes {
                        up: Array2::zeros((nlay + 1, ngpt)),
                        dn,
                        dir: Some(dir),
                        clamps: 0,
                    }
                }
                Some((ssa, g)) => {
                    let ssa_c = ssa.index_axis(Axis(0), icol);
                    let g_c = g.index_axis(Axis(0), icol);
                    let mut clamps = 0;
                    let mut coeffs = Array2::from_elem((nlay, ngpt), LayerCoeffs::default());
                    for ilay in 0..nlay {
                        for igpt in 0..ngpt {
                            let c = two_stream::sw_layer(
                                tau_c[(ilay, igpt)],
                                ssa_c[(ilay, igpt)],
                                g_c[(ilay, igpt)],
                                mu0,
                                config,
                            );
                            clamps += c.clamps;
                            coeffs[(ilay, igpt)] = c;
                        }
                    }

                    // Attenuate the direct beam, scaling each layer's
                    // scattering sources by the direct flux at its top
                    let mut dir = Array2::zeros((nlay + 1, ngpt));
                    let mut src = ColumnSources {
                        src_up: Array2::zeros((nlay, ngpt)),
                        src_dn: Array2::zeros((nlay, ngpt)),
                        src_sfc: vec![0.0; ngpt],
                    };
                    for igpt in 0..ngpt {
                        let mut beam = sources.toa_flux[(icol, igpt)] * mu0;
                        dir[(0, igpt)] = beam;
                        for ilay in 0..nlay {
                            let c = coeffs[(ilay, igpt)];
                            src.src_up[(ilay, igpt)] = c.src_up * beam;
                            src.src_dn[(ilay, igpt)] = c.src_dn * beam;
                            beam *= c.t_dir;
                            dir[(ilay + 1, igpt)] = beam;
                        }
                        src.src_sfc[igpt] = beam * alb_dir_gpt[(icol, igpt)];
                    }

                    let sfc_albedo: Vec<FloatValue> =
                        (0..ngpt).map(|igpt| alb_dif_gpt[(icol, igpt)]).collect();
                    let dn_top = match inc_flux_dif {
                        Some(f) => f.row(icol).to_vec(),
                        None => vec![0.0; ngpt],
                    };
                    let (up, mut dn) = adding::add_layers(&coeffs, &src, &sfc_albedo, &dn_top);
                    dn += &dir;
                    ColumnFluxes { up, dn, dir: Some(dir), clamps }
                }
            }
        })
        .collect();

    Ok(assemble(columns, ncol, nlay, ngpt, top_at_1, true))
}

/// Fluxes of one solved column, canonical orientation.
struct ColumnFluxes {
    up: Array2<FloatValue>,
    dn: Array2<FloatValue>,
    dir: Option<Array2<FloatValue>>,
    clamps: usize,
}

/// Copy a `(ncol, nlay, ngpt)` or `(ncol, nlev, ngpt)` view into canonical
/// orientation (vertical index 0 at the top of the atmosphere).
fn canonical(view: ArrayView3<'_, FloatValue>, top_at_1: bool) -> Array3<FloatValue> {
    if top_at_1 {
        view.to_owned()
    } else {
        view.slice(s![.., ..;-1, ..]).to_owned()
    }
}

fn check_gpt_field(
    name: &str,
    field: ArrayView2<'_, FloatValue>,
    ncol: usize,
    ngpt: usize,
) -> RadResult<()> {
    if field.dim() != (ncol, ngpt) {
        return Err(RadError::ShapeMismatch {
            quantity: name.to_string(),
            expected: vec![ncol, ngpt],
            actual: vec![field.dim().0, field.dim().1],
        });
    }
    Ok(())
}

/// Gather per-column results into output arrays, restoring the caller's
/// vertical orientation and reporting accumulated clamps.
fn assemble(
    columns: Vec<ColumnFluxes>,
    ncol: usize,
    nlay: usize,
    ngpt: usize,
    top_at_1: bool,
    with_dir: bool,
) -> GptFluxes {
    let nlev = nlay + 1;
    let mut flux_up = Array3::zeros((ncol, nlev, ngpt));
    let mut flux_dn = Array3::zeros((ncol, nlev, ngpt));
    let mut flux_dn_dir = with_dir.then(|| Array3::zeros((ncol, nlev, ngpt)));

    let mut clamps = 0;
    for (icol, col) in columns.into_iter().enumerate() {
        clamps += col.clamps;
        flux_up.index_axis_mut(Axis(0), icol).assign(&col.up);
        flux_dn.index_axis_mut(Axis(0), icol).assign(&col.dn);
        if let (Some(out), Some(dir)) = (flux_dn_dir.as_mut(), col.dir) {
            out.index_axis_mut(Axis(0), icol).assign(&dir);
        }
    }
    if clamps > 0 {
        warn!("clamped {clamps} near-singular two-stream coefficient(s)");
    }

    if !top_at_1 {
        flux_up.invert_axis(Axis(1));
        flux_dn.invert_axis(Axis(1));
        if let Some(dir) = flux_dn_dir.as_mut() {
            dir.invert_axis(Axis(1));
        }
    }

    GptFluxes {
        flux_up,
        flux_dn,
        flux_dn_dir,
    }
}
