//! Per-column gas volume mixing ratios.
//!
//! [`GasConcentrations`] collects volume mixing ratios keyed by gas name
//! (case-insensitive). A gas is either well mixed, stored as a scalar and
//! broadcast over all columns and layers, or fully resolved as an
//! `ncol × nlay` field. All field-valued gases must share the container's
//! shape, and concentrations must be non-negative; tiny negative values from
//! upstream interpolation are tolerated and treated as zero.

use crate::errors::{RadError, RadResult};
use crate::FloatValue;
use ndarray::Array2;
use std::collections::HashMap;

/// Largest negative volume mixing ratio accepted as numerical noise.
/// Anything below this fails validation; anything in `[-VMR_TOLERANCE, 0)`
/// is treated as zero.
pub const VMR_TOLERANCE: FloatValue = 1e-10;

/// A single gas concentration entry: well mixed or spatially resolved.
#[derive(Debug, Clone)]
pub enum ConcField {
    /// Uniform volume mixing ratio, broadcast over all columns and layers.
    Scalar(FloatValue),
    /// Full `ncol × nlay` volume mixing ratio field.
    Field(Array2<FloatValue>),
}

/// A collection of gas volume mixing ratios for one `ncol × nlay` problem.
#[derive(Debug, Clone)]
pub struct GasConcentrations {
    ncol: usize,
    nlay: usize,
    concs: HashMap<String, ConcField>,
}

impl GasConcentrations {
    /// Create an empty collection for the given problem size.
    pub fn new(ncol: usize, nlay: usize) -> RadResult<Self> {
        if ncol == 0 || nlay == 0 {
            return Err(RadError::InconsistentInput(format!(
                "gas concentrations need at least one column and layer, got {ncol} x {nlay}"
            )));
        }
        Ok(Self {
            ncol,
            nlay,
            concs: HashMap::new(),
        })
    }

    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Number of layers.
    pub fn nlay(&self) -> usize {
        self.nlay
    }

    /// Set a well-mixed gas from a single volume mixing ratio.
    ///
    /// Replaces any previous entry for the same gas.
    pub fn set_vmr_scalar(&mut self, gas: &str, vmr: FloatValue) -> RadResult<()> {
        let vmr = validate_vmr(gas, vmr)?;
        self.concs.insert(normalize(gas), ConcField::Scalar(vmr));
        Ok(())
    }

    /// Set a spatially resolved gas from an `ncol × nlay` field.
    ///
    /// Replaces any previous entry for the same gas.
    pub fn set_vmr(&mut self, gas: &str, vmr: Array2<FloatValue>) -> RadResult<()> {
        if vmr.dim() != (self.ncol, self.nlay) {
            return Err(RadError::ShapeMismatch {
                quantity: format!("vmr field for gas '{gas}'"),
                expected: vec![self.ncol, self.nlay],
                actual: vec![vmr.dim().0, vmr.dim().1],
            });
        }
        let mut vmr = vmr;
        for v in vmr.iter_mut() {
            *v = validate_vmr(gas, *v)?;
        }
        self.concs.insert(normalize(gas), ConcField::Field(vmr));
        Ok(())
    }

    /// Whether a gas is present (by case-insensitive name).
    pub fn has_gas(&self, gas: &str) -> bool {
        self.concs.contains_key(&normalize(gas))
    }

    /// Names of all gases present, in no particular order.
    pub fn gas_names(&self) -> Vec<&str> {
        self.concs.keys().map(String::as_str).collect()
    }

    /// Volume mixing ratio field for a gas, broadcasting well-mixed entries.
    ///
    /// Fails with [`RadError::MissingGas`] if the gas is absent.
    pub fn get_vmr(&self, gas: &str) -> RadResult<Array2<FloatValue>> {
        match self.concs.get(&normalize(gas)) {
            Some(ConcField::Scalar(vmr)) => {
                Ok(Array2::from_elem((self.ncol, self.nlay), *vmr))
            }
            Some(ConcField::Field(vmr)) => Ok(vmr.clone()),
            None => Err(RadError::MissingGas {
                gas: gas.to_string(),
            }),
        }
    }
}

fn normalize(gas: &str) -> String {
    gas.to_ascii_lowercase()
}

fn validate_vmr(gas: &str, vmr: FloatValue) -> RadResult<FloatValue> {
    if vmr < -VMR_TOLERANCE {
        return Err(RadError::InconsistentInput(format!(
            "negative volume mixing ratio {vmr} for gas '{gas}'"
        )));
    }
    Ok(vmr.max(0.0))
}
