//! Scalar parameters passed alongside an operation.

use smallvec::SmallVec;

use ndexec_traits::Element;

/// Ordered read-only scalar operands of one call (epsilon, alpha, bounds,
/// probabilities, ...).
///
/// Values are stored as `f64` and re-materialized in the element type of
/// the kernel that reads them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraArguments {
    values: SmallVec<[f64; 4]>,
}

impl ExtraArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            values: SmallVec::from_slice(values),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Value at `index`, or `default` when absent.
    #[inline]
    pub fn get_or(&self, index: usize, default: f64) -> f64 {
        self.get(index).unwrap_or(default)
    }

    /// Value at `index` converted to the kernel's element type.
    #[inline]
    pub fn value<T: Element>(&self, index: usize, default: f64) -> T {
        T::from_f64(self.get_or(index, default))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

impl From<Vec<f64>> for ExtraArguments {
    fn from(values: Vec<f64>) -> Self {
        Self {
            values: SmallVec::from_vec(values),
        }
    }
}

impl From<&[f64]> for ExtraArguments {
    fn from(values: &[f64]) -> Self {
        Self::from_slice(values)
    }
}

impl<const N: usize> From<[f64; N]> for ExtraArguments {
    fn from(values: [f64; N]) -> Self {
        Self::from_slice(&values)
    }
}

impl FromIterator<f64> for ExtraArguments {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
