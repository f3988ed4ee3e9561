//! Plane-parallel radiative transfer kernel for climate-model columns.
//!
//! The crate is split along the two halves of the problem:
//!
//! - **Gas optics** ([`gas_optics`]): turns per-column atmospheric state
//!   (pressure, temperature, [`gases::GasConcentrations`]) into per-g-point
//!   optical properties by multi-dimensional interpolation of the immutable
//!   [`reference::ReferenceTables`], plus Planck or solar source functions.
//! - **RTE solver** ([`solver`]): propagates those optical properties through
//!   the vertical column, by Gaussian-quadrature integration when there is no
//!   scattering and by the two-stream approximation plus the adding method
//!   when there is, producing per-g-point fluxes which [`fluxes`] reduces to
//!   broadband or by-band output.
//!
//! Reference tables are loaded by an external collaborator and shared
//! read-only across solves; everything else is owned per solve invocation.

pub mod errors;
pub mod fluxes;
pub mod gas_optics;
pub mod gases;
pub mod optics;
pub mod reference;
pub mod solver;
pub mod sources;
pub mod spectral;

#[cfg(test)]
pub(crate) mod test_tables;

/// Floating point type used for all physical quantities.
pub type FloatValue = f64;

pub use errors::{RadError, RadResult};
