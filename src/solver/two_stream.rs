//! Closed-form two-stream layer coefficients.
//!
//! Per layer and g-point, the coupled diffuse-flux ODEs under the two-stream
//! closure have closed-form reflectance and transmittance. Longwave uses the
//! hemispheric-mean closure with a fixed diffusivity secant; shortwave uses
//! the practical-improved-flux-method (PIFM) coefficients of Zdunkowski and
//! additionally couples the attenuated direct beam into the diffuse field.
//!
//! Fully conservative scattering (`ssa = 1`) and the resonance
//! `k μ0 = 1` make the closed forms singular; both are clamped by the
//! documented epsilons in [`SolverConfig`](super::SolverConfig), a
//! deterministic policy, since these arise from legitimate physical limits
//! rather than invalid input.

use super::SolverConfig;
use crate::FloatValue;

/// Diffusivity secant of the longwave hemispheric-mean closure.
const LW_DIFF_SEC: FloatValue = 1.66;

/// Optical depth below which a layer is treated as emitting nothing in the
/// longwave two-stream source computation.
const LW_SOURCE_TAU_MIN: FloatValue = 1e-10;

/// Diffuse reflectance/transmittance of one layer plus its source coupling.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LayerCoeffs {
    pub rdif: FloatValue,
    pub tdif: FloatValue,
    /// Upward diffuse source of the layer (longwave: thermal emission;
    /// shortwave: reflected direct beam per unit incident direct flux).
    pub src_up: FloatValue,
    /// Downward diffuse source of the layer.
    pub src_dn: FloatValue,
    /// Direct-beam transmittance (shortwave only; 1 otherwise).
    pub t_dir: FloatValue,
    /// Number of epsilon clamps applied while computing this layer.
    pub clamps: usize,
}

/// Longwave diffuse reflectance/transmittance and emission sources for one
/// layer.
///
/// `lev_src_top`/`lev_src_bot` are the Planck source at the layer's upper and
/// lower interface (canonical orientation, top at index 0).
pub(crate) fn lw_layer(
    tau: FloatValue,
    ssa: FloatValue,
    g: FloatValue,
    lev_src_top: FloatValue,
    lev_src_bot: FloatValue,
    config: &SolverConfig,
) -> LayerCoeffs {
    let mut clamps = 0;
    let ssa = if ssa > 1.0 - config.ssa_eps {
        clamps += 1;
        1.0 - config.ssa_eps
    } else {
        ssa
    };

    let gamma1 = LW_DIFF_SEC * (1.0 - 0.5 * ssa * (1.0 + g));
    let gamma2 = LW_DIFF_SEC * 0.5 * ssa * (1.0 - g);
    let (rdif, tdif, k_clamped) = reftrans(tau, gamma1, gamma2, config);
    if k_clamped {
        clamps += 1;
    }

    // Linear-in-tau source (Toon et al. 1989): the emitted diffuse flux of a
    // layer whose Planck source varies linearly between its interfaces.
    let (src_up, src_dn) = if tau > LW_SOURCE_TAU_MIN {
        let z = (lev_src_bot - lev_src_top) / (tau * (gamma1 + gamma2));
        let zup_top = z + lev_src_top;
        let zup_bot = z + lev_src_bot;
        let zdn_top = -z + lev_src_top;
        let zdn_bot = -z + lev_src_bot;
        (
            zup_top - rdif * zdn_top - tdif * zup_bot,
            zdn_bot - rdif * zup_bot - tdif * zdn_top,
        )
    } else {
        (0.0, 0.0)
    };

    LayerCoeffs {
        rdif,
        tdif,
        src_up,
        src_dn,
        t_dir: 1.0,
        clamps,
    }
}

/// Shortwave (PIFM) layer coefficients for a given solar zenith cosine.
///
/// `src_up`/`src_dn` are per unit direct flux incident on the layer top; the
/// caller scales them by the attenuated beam while adding layers.
pub(crate) fn sw_layer(
    tau: FloatValue,
    ssa: FloatValue,
    g: FloatValue,
    mu0: FloatValue,
    config: &SolverConfig,
) -> LayerCoeffs {
    let mut clamps = 0;

    let gamma1 = (8.0 - ssa * (5.0 + 3.0 * g)) * 0.25;
    let gamma2 = 3.0 * (ssa * (1.0 - g)) * 0.25;
    let gamma3 = (2.0 - 3.0 * mu0 * g) * 0.25;
    let gamma4 = 1.0 - gamma3;
    let alpha1 = gamma1 * gamma4 + gamma2 * gamma3;
    let alpha2 = gamma1 * gamma3 + gamma2 * gamma4;

    let (rdif, tdif, k_clamped) = reftrans(tau, gamma1, gamma2, config);
    if k_clamped {
        clamps += 1;
    }
    let k = ((gamma1 - gamma2) * (gamma1 + gamma2)).max(config.k_min).sqrt();

    let t_noscat = (-tau / mu0).exp();
    let k_mu = k * mu0;
    let k_gamma3 = k * gamma3;
    let k_gamma4 = k * gamma4;

    // Resonance between the direct-beam and diffuse propagation rates
    let denom_raw = 1.0 - k_mu * k_mu;
    let denom = if denom_raw.abs() < config.denom_eps {
        clamps += 1;
        config.denom_eps.copysign(if denom_raw == 0.0 { 1.0 } else { denom_raw })
    } else {
        denom_raw
    };

    let exp_minusktau = (-k * tau).exp();
    let exp_minus2ktau = exp_minusktau * exp_minusktau;
    let rt_term =
        1.0 / (k * (1.0 + exp_minus2ktau) + gamma1 * (1.0 - exp_minus2ktau));
    let rt_term2 = ssa * rt_term / denom;

    let rdir = rt_term2
        * ((1.0 - k_mu) * (alpha2 + k_gamma3)
            - (1.0 + k_mu) * (alpha2 - k_gamma3) * exp_minus2ktau
            - 2.0 * (k_gamma3 - alpha2 * k_mu) * exp_minusktau * t_noscat);
    let tdir = -rt_term2
        * ((1.0 + k_mu) * (alpha1 + k_gamma4) * t_noscat
            - (1.0 - k_mu) * (alpha1 - k_gamma4) * exp_minus2ktau * t_noscat
            - 2.0 * (k_gamma4 + alpha1 * k_mu) * exp_minusktau);

    // Keep the direct-beam sources jointly inside the energy removed from
    // the beam: src_up + src_dn must not exceed 1 - t_noscat
    let src_up = rdir.clamp(0.0, 1.0 - t_noscat);
    let src_dn = tdir.clamp(0.0, 1.0 - t_noscat - src_up);

    LayerCoeffs {
        rdif,
        tdif,
        src_up,
        src_dn,
        t_dir: t_noscat,
        clamps,
    }
}

/// Diffuse reflectance and transmittance from the two-stream gammas.
fn reftrans(
    tau: FloatValue,
    gamma1: FloatValue,
    gamma2: FloatValue,
    config: &SolverConfig,
) -> (FloatValue, FloatValue, bool) {
    let k_sq = (gamma1 - gamma2) * (gamma1 + gamma2);
    let clamped = k_sq < config.k_min;
    let k = k_sq.max(config.k_min).sqrt();

    let exp_minusktau = (-k * tau).exp();
    let exp_minus2ktau = exp_minusktau * exp_minusktau;
    let rt_term =
        1.0 / (k * (1.0 + exp_minus2ktau) + gamma1 * (1.0 - exp_minus2ktau));
    (
        rt_term * gamma2 * (1.0 - exp_minus2ktau),
        rt_term * 2.0 * k * exp_minusktau,
        clamped,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> SolverConfig {
        SolverConfig::default()
    }

    #[test]
    fn test_pure_absorption_layer_transmits_direct_beam_only() {
        let coeffs = sw_layer(1.0, 0.0, 0.0, 1.0, &config());
        assert_relative_eq!(coeffs.t_dir, (-1.0f64).exp());
        assert_relative_eq!(coeffs.rdif, 0.0);
        assert_relative_eq!(coeffs.src_up, 0.0);
        assert_relative_eq!(coeffs.src_dn, 0.0);
        // Diffuse transmittance of a non-scattering layer is exp(-k tau)
        // with k = gamma1 = 2
        assert_relative_eq!(coeffs.tdif, (-2.0f64).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_zero_optical_depth_layer_is_transparent() {
        for coeffs in [
            sw_layer(0.0, 0.5, 0.3, 0.8, &config()),
            lw_layer(0.0, 0.5, 0.3, 10.0, 12.0, &config()),
        ] {
            assert_relative_eq!(coeffs.rdif, 0.0, epsilon = 1e-12);
            assert_relative_eq!(coeffs.tdif, 1.0, epsilon = 1e-12);
            assert_relative_eq!(coeffs.src_up, 0.0, epsilon = 1e-12);
            assert_relative_eq!(coeffs.src_dn, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_conservative_scattering_is_clamped_not_nan() {
        let coeffs = lw_layer(1.0, 1.0, 0.0, 10.0, 10.0, &config());
        assert!(coeffs.clamps > 0);
        assert!(coeffs.rdif.is_finite() && coeffs.tdif.is_finite());
        assert!(coeffs.rdif >= 0.0 && coeffs.tdif >= 0.0);
        // Near-conservative scattering: almost no absorption, so the layer
        // redistributes nearly all energy
        assert!(coeffs.rdif + coeffs.tdif > 0.99);
    }

    #[test]
    fn test_isothermal_layer_emits_its_absorptivity() {
        // For an isothermal non-scattering layer the emitted diffuse flux is
        // (1 - tdif) * B in each direction
        let b = 25.0;
        let coeffs = lw_layer(0.5, 0.0, 0.0, b, b, &config());
        assert_relative_eq!(coeffs.src_up, (1.0 - coeffs.tdif) * b, max_relative = 1e-10);
        assert_relative_eq!(coeffs.src_dn, (1.0 - coeffs.tdif) * b, max_relative = 1e-10);
    }

    #[test]
    fn test_direct_beam_sources_never_exceed_beam_extinction() {
        // src_up + src_dn is bounded by the energy removed from the direct
        // beam, including at and around the resonance where the denominator
        // is clamped
        let cfg = config();
        for tau in [0.05, 0.5, 1.0, 3.0] {
            for ssa in [0.3, 0.9, 0.999, 1.0] {
                for g in [0.0, 0.3, 0.85] {
                    let gamma1: FloatValue = (8.0 - ssa * (5.0 + 3.0 * g)) * 0.25;
                    let gamma2 = 3.0 * (ssa * (1.0 - g)) * 0.25;
                    let k = ((gamma1 - gamma2) * (gamma1 + gamma2))
                        .max(cfg.k_min)
                        .sqrt();
                    let mut mu0s = vec![0.2, 0.6, 1.0];
                    if (0.0..=1.0).contains(&k.recip()) {
                        mu0s.push(k.recip());
                        mu0s.push(k.recip() * (1.0 + 1e-11));
                    }
                    for mu0 in mu0s {
                        let c = sw_layer(tau, ssa, g, mu0, &cfg);
                        assert!(c.src_up >= 0.0 && c.src_dn >= 0.0);
                        assert!(
                            c.src_up + c.src_dn <= 1.0 - c.t_dir + 1e-12,
                            "src_up {} + src_dn {} exceeds 1 - t_dir {} \
                             at tau={tau} ssa={ssa} g={g} mu0={mu0}",
                            c.src_up,
                            c.src_dn,
                            1.0 - c.t_dir
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_direct_beam_resonance_clamped() {
        // Choose ssa/g so that k mu0 is essentially 1
        let mu0 = 0.5;
        // gamma1 = 2 - 11/8 ssa, gamma2 = 3 ssa / 8 at g = 0; k = 2 at ssa = 0
        // k mu0 = 1 at ssa = 0 exactly
        let coeffs = sw_layer(1.0, 0.0, 0.0, mu0, &config());
        assert!(coeffs.clamps > 0);
        assert!(coeffs.src_up.is_finite() && coeffs.src_dn.is_finite());
    }
}
