//! Per-g-point optical properties of a column stack.
//!
//! [`OpticalProps`] pairs a [`SpectralDiscretization`] with one of two value
//! sets: absorption-only optical depth ([`OpticalValues::OneScalar`]) or the
//! two-stream triple of optical depth, single-scattering albedo, and
//! asymmetry parameter ([`OpticalValues::TwoStream`]). The two variants feed
//! fundamentally different solver paths, so they are a tagged enum the solver
//! branches on rather than a trait hierarchy.
//!
//! Lifecycle: created empty at problem size, filled by the gas-optics engine,
//! optionally delta-scaled or combined with other processes in place, then
//! handed read-only to the solver.

use crate::errors::{RadError, RadResult};
use crate::spectral::SpectralDiscretization;
use crate::FloatValue;
use ndarray::{Array3, ArrayView3, Zip};

/// Denominator threshold below which delta-scaling and increment treat a
/// ratio as zero scattering instead of dividing.
const EPS: FloatValue = 1e-12;

/// The two optical-property variants.
#[derive(Debug, Clone)]
pub enum OpticalValues {
    /// Absorption optical depth only; no scattering.
    OneScalar { tau: Array3<FloatValue> },
    /// Extinction optical depth, single-scattering albedo, and asymmetry
    /// parameter.
    TwoStream {
        tau: Array3<FloatValue>,
        ssa: Array3<FloatValue>,
        g: Array3<FloatValue>,
    },
}

/// Optical properties on a `(ncol, nlay, ngpt)` grid.
#[derive(Debug, Clone)]
pub struct OpticalProps {
    spectral: SpectralDiscretization,
    values: OpticalValues,
}

impl OpticalProps {
    /// Create zeroed absorption-only properties at the given problem size.
    pub fn one_scalar(spectral: SpectralDiscretization, ncol: usize, nlay: usize) -> Self {
        let ngpt = spectral.ngpt();
        Self {
            spectral,
            values: OpticalValues::OneScalar {
                tau: Array3::zeros((ncol, nlay, ngpt)),
            },
        }
    }

    /// Create zeroed two-stream properties at the given problem size.
    pub fn two_stream(spectral: SpectralDiscretization, ncol: usize, nlay: usize) -> Self {
        let ngpt = spectral.ngpt();
        Self {
            spectral,
            values: OpticalValues::TwoStream {
                tau: Array3::zeros((ncol, nlay, ngpt)),
                ssa: Array3::zeros((ncol, nlay, ngpt)),
                g: Array3::zeros((ncol, nlay, ngpt)),
            },
        }
    }

    /// Wrap pre-computed values, checking the g-point dimension against the
    /// discretization.
    pub fn from_values(
        spectral: SpectralDiscretization,
        values: OpticalValues,
    ) -> RadResult<Self> {
        let ngpt = spectral.ngpt();
        let tau_dim = match &values {
            OpticalValues::OneScalar { tau } => tau.dim(),
            OpticalValues::TwoStream { tau, ssa, g } => {
                if ssa.dim() != tau.dim() || g.dim() != tau.dim() {
                    return Err(RadError::ShapeMismatch {
                        quantity: "two-stream ssa/g".to_string(),
                        expected: vec![tau.dim().0, tau.dim().1, tau.dim().2],
                        actual: vec![ssa.dim().0, ssa.dim().1, ssa.dim().2],
                    });
                }
                tau.dim()
            }
        };
        if tau_dim.2 != ngpt {
            return Err(RadError::ShapeMismatch {
                quantity: "optical depth g-point dimension".to_string(),
                expected: vec![tau_dim.0, tau_dim.1, ngpt],
                actual: vec![tau_dim.0, tau_dim.1, tau_dim.2],
            });
        }
        Ok(Self { spectral, values })
    }

    /// The spectral discretization these properties are expressed against.
    pub fn spectral(&self) -> &SpectralDiscretization {
        &self.spectral
    }

    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.tau().dim().0
    }

    /// Number of layers.
    pub fn nlay(&self) -> usize {
        self.tau().dim().1
    }

    /// Number of g-points.
    pub fn ngpt(&self) -> usize {
        self.tau().dim().2
    }

    /// Whether these properties carry scattering information.
    pub fn has_scattering(&self) -> bool {
        matches!(self.values, OpticalValues::TwoStream { .. })
    }

    /// Optical depth view.
    pub fn tau(&self) -> ArrayView3<'_, FloatValue> {
        match &self.values {
            OpticalValues::OneScalar { tau } => tau.view(),
            OpticalValues::TwoStream { tau, .. } => tau.view(),
        }
    }

    /// Single-scattering albedo view, if the variant carries scattering.
    pub fn ssa(&self) -> Option<ArrayView3<'_, FloatValue>> {
        match &self.values {
            OpticalValues::OneScalar { .. } => None,
            OpticalValues::TwoStream { ssa, .. } => Some(ssa.view()),
        }
    }

    /// Asymmetry-parameter view, if the variant carries scattering.
    pub fn g(&self) -> Option<ArrayView3<'_, FloatValue>> {
        match &self.values {
            OpticalValues::OneScalar { .. } => None,
            OpticalValues::TwoStream { g, .. } => Some(g.view()),
        }
    }

    /// Mutable access to the underlying values (used by the gas-optics
    /// engine while filling).
    pub fn values_mut(&mut self) -> &mut OpticalValues {
        &mut self.values
    }

    /// Fail if any value is outside its physical bounds: `tau ≥ 0`,
    /// `ssa ∈ [0, 1]`, `g ∈ [-1, 1]`.
    ///
    /// The first offending entry is identified by column, layer, and g-point.
    pub fn validate(&self) -> RadResult<()> {
        check_bounds(self.tau(), "tau", 0.0, FloatValue::INFINITY, "[0, inf)")?;
        if let OpticalValues::TwoStream { ssa, g, .. } = &self.values {
            check_bounds(ssa.view(), "ssa", 0.0, 1.0, "[0, 1]")?;
            check_bounds(g.view(), "g", -1.0, 1.0, "[-1, 1]")?;
        }
        Ok(())
    }

    /// Remove the forward-scattering peak in place.
    ///
    /// With forward fraction `f` (default `g²`):
    ///
    /// ```text
    /// tau' = tau (1 - ssa f)
    /// ssa' = ssa (1 - f) / (1 - ssa f)
    /// g'   = (g - f) / (1 - f)
    /// ```
    ///
    /// Near-zero denominators are treated as no scattering (result zero)
    /// rather than divided through. Absorption-only properties are left
    /// unchanged.
    pub fn delta_scale(
        &mut self,
        forward_fraction: Option<ArrayView3<'_, FloatValue>>,
    ) -> RadResult<()> {
        let OpticalValues::TwoStream { tau, ssa, g } = &mut self.values else {
            return Ok(());
        };
        if let Some(f) = &forward_fraction {
            if f.dim() != tau.dim() {
                return Err(RadError::ShapeMismatch {
                    quantity: "forward-scattering fraction".to_string(),
                    expected: vec![tau.dim().0, tau.dim().1, tau.dim().2],
                    actual: vec![f.dim().0, f.dim().1, f.dim().2],
                });
            }
            check_bounds(f.view(), "forward-scattering fraction", 0.0, 1.0, "[0, 1]")?;
        }

        match forward_fraction {
            Some(f) => {
                Zip::from(tau)
                    .and(ssa)
                    .and(g)
                    .and(&f)
                    .for_each(|tau, ssa, g, &f| delta_scale_point(tau, ssa, g, f));
            }
            None => {
                Zip::from(tau).and(ssa).and(g).for_each(|tau, ssa, g| {
                    let f = *g * *g;
                    delta_scale_point(tau, ssa, g, f);
                });
            }
        }
        Ok(())
    }

    /// Add the optical properties of an independent physical process at the
    /// same grid points.
    ///
    /// Optical depths add; for scattering variants the single-scattering
    /// albedo is combined weighted by optical depth and the asymmetry
    /// parameter weighted by scattering optical depth. Adding a scattering
    /// operand into an absorption-only target keeps only its absorption part
    /// `tau (1 - ssa)`, since the target cannot represent scattering.
    ///
    /// Fails with [`RadError::SpectralMismatch`] unless both objects share
    /// the same band and g-point structure.
    pub fn increment(&mut self, other: &OpticalProps) -> RadResult<()> {
        if !self.spectral.gpoints_are_equal(&other.spectral) {
            return Err(RadError::SpectralMismatch(
                "cannot combine optical properties with different band/g-point structure"
                    .to_string(),
            ));
        }
        if self.tau().dim() != other.tau().dim() {
            let (ncol, nlay, ngpt) = self.tau().dim();
            let (oncol, onlay, ongpt) = other.tau().dim();
            return Err(RadError::ShapeMismatch {
                quantity: "incremented optical properties".to_string(),
                expected: vec![ncol, nlay, ngpt],
                actual: vec![oncol, onlay, ongpt],
            });
        }

        match (&mut self.values, &other.values) {
            (OpticalValues::OneScalar { tau }, OpticalValues::OneScalar { tau: tau_b }) => {
                *tau += tau_b;
            }
            (
                OpticalValues::OneScalar { tau },
                OpticalValues::TwoStream {
                    tau: tau_b,
                    ssa: ssa_b,
                    ..
                },
            ) => {
                // Only the absorption part of the scattering operand
                Zip::from(tau).and(tau_b).and(ssa_b).for_each(
                    |tau, &tau_b, &ssa_b| {
                        *tau += tau_b * (1.0 - ssa_b);
                    },
                );
            }
            (
                OpticalValues::TwoStream { tau, ssa, .. },
                OpticalValues::OneScalar { tau: tau_b },
            ) => {
                // Pure absorption dilutes the albedo; g is unchanged because
                // the scattering optical depth is unchanged.
                Zip::from(tau).and(ssa).and(tau_b).for_each(|tau, ssa, &tau_b| {
                    let tau_total = *tau + tau_b;
                    *ssa = if tau_total > EPS {
                        *tau * *ssa / tau_total
                    } else {
                        0.0
                    };
                    *tau = tau_total;
                });
            }
            (
                OpticalValues::TwoStream { tau, ssa, g },
                OpticalValues::TwoStream {
                    tau: tau_b,
                    ssa: ssa_b,
                    g: g_b,
                },
            ) => {
                Zip::from(tau)
                    .and(ssa)
                    .and(g)
                    .and(tau_b)
                    .and(ssa_b)
                    .and(g_b)
                    .for_each(|tau, ssa, g, &tau_b, &ssa_b, &g_b| {
                        let tau_total = *tau + tau_b;
                        let scat_a = *tau * *ssa;
                        let scat_b = tau_b * ssa_b;
                        let scat_total = scat_a + scat_b;
                        *g = if scat_total > EPS {
                            (scat_a * *g + scat_b * g_b) / scat_total
                        } else {
                            0.0
                        };
                        *ssa = if tau_total > EPS {
                            scat_total / tau_total
                        } else {
                            0.0
                        };
                        *tau = tau_total;
                    });
            }
        }
        Ok(())
    }
}

fn delta_scale_point(tau: &mut FloatValue, ssa: &mut FloatValue, g: &mut FloatValue, f: FloatValue) {
    let wf = *ssa * f;
    let denom_tau = 1.0 - wf;
    let denom_g = 1.0 - f;
    *tau *= denom_tau;
    *ssa = if denom_tau > EPS {
        *ssa * (1.0 - f) / denom_tau
    } else {
        0.0
    };
    *g = if denom_g > EPS { (*g - f) / denom_g } else { 0.0 };
}

fn check_bounds(
    values: ArrayView3<'_, FloatValue>,
    quantity: &'static str,
    min: FloatValue,
    max: FloatValue,
    bounds: &'static str,
) -> RadResult<()> {
    for ((col, lay, gpt), &value) in values.indexed_iter() {
        if !(min..=max).contains(&value) || value.is_nan() {
            return Err(RadError::InvalidOpticalProperty {
                quantity,
                value,
                col,
                lay,
                gpt,
                bounds,
            });
        }
    }
    Ok(())
}
