//! Lookup-table index and weight computation.
//!
//! The reference grids are uniform (temperature) or log-uniform (pressure),
//! so bracketing is direct arithmetic. The mixing-fraction axis (eta) is
//! resolved per flavor and per bracketing temperature index, because the
//! reference ratio of the two key species is itself a function of
//! temperature. Major-species absorption is then a 2×2×2 interpolation over
//! (eta, pressure, temperature); minor-species and Rayleigh coefficients are
//! 2×2 over (eta, temperature).

use crate::reference::{AxisLocation, ExtrapolationPolicy, Flavor, ReferenceTables};
use crate::errors::RadResult;
use crate::FloatValue;
use ndarray::{ArrayView3, ArrayView4};

/// Smallest key-species mixture treated as present; below this the mixing
/// fraction is pinned to the midpoint.
const MIX_TINY: FloatValue = 1e-30;

/// Bracketing indices and weights for one column/layer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayerIndex {
    pub jtemp: usize,
    pub ftemp: FloatValue,
    pub jpress: usize,
    pub fpress: FloatValue,
    /// Whether the layer uses the lower-atmosphere (tropospheric) tables.
    pub lower: bool,
    /// Whether either axis lookup was clamped to the grid edge.
    pub clamped: bool,
}

impl LayerIndex {
    pub fn locate(
        tables: &ReferenceTables,
        pressure: FloatValue,
        temperature: FloatValue,
        col: usize,
        lay: usize,
        policy: ExtrapolationPolicy,
    ) -> RadResult<Self> {
        let AxisLocation {
            index: jpress,
            weight: fpress,
            clamped: p_clamped,
        } = tables.locate_pressure(pressure, col, lay, policy)?;
        let AxisLocation {
            index: jtemp,
            weight: ftemp,
            clamped: t_clamped,
        } = tables.locate_temperature(temperature, col, lay, policy)?;
        Ok(Self {
            jtemp,
            ftemp,
            jpress,
            fpress,
            lower: tables.is_lower_atmosphere(pressure),
            clamped: p_clamped || t_clamped,
        })
    }
}

/// Mixing-fraction bracket for one flavor at one layer, one entry per
/// bracketing temperature index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EtaIndex {
    pub jeta: [usize; 2],
    pub feta: [FloatValue; 2],
}

impl EtaIndex {
    /// Compute the mixing fraction `eta = x_a / (x_a + r x_b)` for a flavor,
    /// with `r` the reference vmr ratio at each bracketing temperature.
    ///
    /// When neither key species is present eta is pinned to 0.5, matching the
    /// table midpoint.
    pub fn compute(
        flavor: &Flavor,
        vmr_a: FloatValue,
        vmr_b: FloatValue,
        jtemp: usize,
        neta: usize,
    ) -> Self {
        let mut jeta = [0usize; 2];
        let mut feta = [0.0; 2];
        for corner in 0..2 {
            let ratio = flavor.ref_vmr_ratio[jtemp + corner];
            let denom = vmr_a + ratio * vmr_b;
            let eta = if denom > MIX_TINY { vmr_a / denom } else { 0.5 };
            let position = eta * (neta - 1) as FloatValue;
            let index = (position.floor() as usize).min(neta - 2);
            jeta[corner] = index;
            feta[corner] = position - index as FloatValue;
        }
        Self { jeta, feta }
    }
}

/// 2×2×2 interpolation of a major-species coefficient at one g-point.
pub(crate) fn interp_major(
    kmajor: ArrayView4<'_, FloatValue>,
    igpt: usize,
    eta: &EtaIndex,
    layer: &LayerIndex,
) -> FloatValue {
    let mut acc = 0.0;
    for (it, wt) in temp_weights(layer.ftemp) {
        let jeta = eta.jeta[it];
        let feta = eta.feta[it];
        for (ip, wp) in [(0, 1.0 - layer.fpress), (1, layer.fpress)] {
            for (ie, we) in [(0, 1.0 - feta), (1, feta)] {
                acc += wt
                    * wp
                    * we
                    * kmajor[(igpt, jeta + ie, layer.jpress + ip, layer.jtemp + it)];
            }
        }
    }
    acc
}

/// 2×2 interpolation of a minor-species or Rayleigh coefficient at one
/// g-point (first axis of the table).
pub(crate) fn interp_minor(
    ktable: ArrayView3<'_, FloatValue>,
    igpt: usize,
    eta: &EtaIndex,
    layer: &LayerIndex,
) -> FloatValue {
    let mut acc = 0.0;
    for (it, wt) in temp_weights(layer.ftemp) {
        let jeta = eta.jeta[it];
        let feta = eta.feta[it];
        for (ie, we) in [(0, 1.0 - feta), (1, feta)] {
            acc += wt * we * ktable[(igpt, jeta + ie, layer.jtemp + it)];
        }
    }
    acc
}

fn temp_weights(ftemp: FloatValue) -> [(usize, FloatValue); 2] {
    [(0, 1.0 - ftemp), (1, ftemp)]
}
