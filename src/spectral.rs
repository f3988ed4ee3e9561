//! Spectral discretization shared by all optical quantities.
//!
//! A [`SpectralDiscretization`] is an ordered sequence of bands, each covering
//! a wavenumber interval and owning a contiguous range of g-points (the
//! quadrature points of the k-distribution). Every optical-properties object,
//! source function, and boundary condition is expressed against one of these,
//! and objects may only be combined when their discretizations match.

use crate::errors::{RadError, RadResult};
use crate::FloatValue;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Mapping between spectral bands and g-points.
///
/// Invariant: the per-band g-point ranges partition `0..ngpt` exactly and
/// monotonically, i.e. band 0 owns `0..n0`, band 1 owns `n0..n1`, and so on
/// with no gaps or overlaps. This is validated on construction and relied on
/// everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralDiscretization {
    /// Wavenumber bounds (lower, upper) per band, in cm⁻¹.
    band_bounds: Vec<(FloatValue, FloatValue)>,
    /// Half-open g-point range per band.
    gpt_limits: Vec<(usize, usize)>,
    /// Band index for each g-point.
    gpt_band: Vec<usize>,
}

impl SpectralDiscretization {
    /// Create a discretization from per-band wavenumber bounds and g-point
    /// counts.
    ///
    /// Bands are laid out in order: band `i` owns the `gpt_counts[i]` g-points
    /// following those of band `i - 1`.
    pub fn new(
        band_bounds: Vec<(FloatValue, FloatValue)>,
        gpt_counts: &[usize],
    ) -> RadResult<Self> {
        if band_bounds.is_empty() || band_bounds.len() != gpt_counts.len() {
            return Err(RadError::InconsistentInput(format!(
                "expected one g-point count per band, got {} bands and {} counts",
                band_bounds.len(),
                gpt_counts.len()
            )));
        }
        for (iband, &(lower, upper)) in band_bounds.iter().enumerate() {
            if !(lower < upper) {
                return Err(RadError::InconsistentInput(format!(
                    "band {iband} has non-increasing wavenumber bounds ({lower}, {upper})"
                )));
            }
        }

        let mut gpt_limits = Vec::with_capacity(gpt_counts.len());
        let mut gpt_band = Vec::new();
        let mut start = 0;
        for (iband, &count) in gpt_counts.iter().enumerate() {
            if count == 0 {
                return Err(RadError::InconsistentInput(format!(
                    "band {iband} has zero g-points"
                )));
            }
            gpt_limits.push((start, start + count));
            gpt_band.extend(std::iter::repeat(iband).take(count));
            start += count;
        }

        Ok(Self {
            band_bounds,
            gpt_limits,
            gpt_band,
        })
    }

    /// Number of bands.
    pub fn nband(&self) -> usize {
        self.band_bounds.len()
    }

    /// Total number of g-points.
    pub fn ngpt(&self) -> usize {
        self.gpt_band.len()
    }

    /// Wavenumber bounds of a band, in cm⁻¹.
    pub fn band_bounds(&self, iband: usize) -> (FloatValue, FloatValue) {
        self.band_bounds[iband]
    }

    /// Half-open g-point range owned by a band.
    pub fn gpt_range(&self, iband: usize) -> std::ops::Range<usize> {
        let (start, end) = self.gpt_limits[iband];
        start..end
    }

    /// Band owning a g-point.
    pub fn band_of_gpt(&self, igpt: usize) -> usize {
        self.gpt_band[igpt]
    }

    /// Broadcast a per-band quantity to per-g-point resolution.
    ///
    /// Pure; the input is not modified.
    pub fn expand(&self, band_values: ArrayView1<FloatValue>) -> RadResult<Array1<FloatValue>> {
        if band_values.len() != self.nband() {
            return Err(RadError::ShapeMismatch {
                quantity: "band values".to_string(),
                expected: vec![self.nband()],
                actual: vec![band_values.len()],
            });
        }
        Ok(Array1::from_iter(
            self.gpt_band.iter().map(|&iband| band_values[iband]),
        ))
    }

    /// Broadcast a `(nband, ncol)` quantity to `(ncol, ngpt)`.
    ///
    /// Boundary conditions (surface albedo, emissivity) are supplied per band
    /// with the column dimension last; the solver consumes them per g-point
    /// with the column dimension first. This does both steps at once.
    pub fn expand_to_gpt(
        &self,
        band_by_col: ArrayView2<FloatValue>,
    ) -> RadResult<Array2<FloatValue>> {
        let (nband, ncol) = band_by_col.dim();
        if nband != self.nband() {
            return Err(RadError::ShapeMismatch {
                quantity: "per-band boundary condition".to_string(),
                expected: vec![self.nband(), ncol],
                actual: vec![nband, ncol],
            });
        }
        Ok(Array2::from_shape_fn((ncol, self.ngpt()), |(icol, igpt)| {
            band_by_col[(self.gpt_band[igpt], icol)]
        }))
    }

    /// Whether two discretizations have identical band structure (count and
    /// wavenumber bounds).
    pub fn bands_are_equal(&self, other: &Self) -> bool {
        self.band_bounds == other.band_bounds
    }

    /// Whether two discretizations are fully identical, including the
    /// band → g-point mapping.
    pub fn gpoints_are_equal(&self, other: &Self) -> bool {
        self.bands_are_equal(other) && self.gpt_limits == other.gpt_limits
    }
}
