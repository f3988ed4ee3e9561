use crate::FloatValue;
use thiserror::Error;

/// Error type for invalid inputs and invalid computed states.
///
/// All validation errors are raised eagerly, before any interpolation or
/// solve work starts, and identify the offending column/layer/gas so the
/// caller can correct the input. Numerical edge cases inside the solver
/// (near-singular two-stream coefficients) are handled by deterministic
/// clamping instead and never surface here.
#[derive(Error, Debug)]
pub enum RadError {
    #[error("shape mismatch for {quantity}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        quantity: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    #[error("gas '{gas}' is required by the reference tables but absent from the concentrations")]
    MissingGas { gas: String },
    #[error(
        "{quantity} = {value} at column {col}, layer {lay} is outside the \
         reference grid range [{min}, {max}] and no extrapolation policy allows it"
    )]
    OutOfRange {
        quantity: &'static str,
        value: FloatValue,
        col: usize,
        lay: usize,
        min: FloatValue,
        max: FloatValue,
    },
    #[error(
        "invalid optical property: {quantity} = {value} at column {col}, \
         layer {lay}, g-point {gpt} is outside {bounds}"
    )]
    InvalidOpticalProperty {
        quantity: &'static str,
        value: FloatValue,
        col: usize,
        lay: usize,
        gpt: usize,
        bounds: &'static str,
    },
    #[error("spectral discretizations differ: {0}")]
    SpectralMismatch(String),
    #[error("inconsistent input: {0}")]
    InconsistentInput(String),
}

/// Convenience type for `Result<T, RadError>`.
pub type RadResult<T> = Result<T, RadError>;
