//! Distance measures between dataset vectors.
use crate::data::Element;
use crate::error::{Error, Result};

/// The way to measure distance between two vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    L1,
    L2,
}

impl MetricKind {
    /// Numeric tag used by callers that configure the metric externally.
    pub fn from_tag(tag: u32) -> Result<Self> {
        match tag {
            1 => Ok(MetricKind::L1),
            2 => Ok(MetricKind::L2),
            t => Err(Error::UnknownMetric(t)),
        }
    }

    pub fn tag(self) -> u32 {
        match self {
            MetricKind::L1 => 1,
            MetricKind::L2 => 2,
        }
    }
}

/// Stateless distance function over `dim`-dimensional vectors.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    dim: usize,
    kind: MetricKind,
}

impl Metric {
    pub fn new(dim: usize, kind: MetricKind) -> Self {
        Metric { dim, kind }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Distance between two vectors, in single precision.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if either slice length differs from `dim`.
    pub fn dist<T: Element>(&self, a: &[T], b: &[T]) -> f32 {
        debug_assert_eq!(a.len(), self.dim);
        debug_assert_eq!(b.len(), self.dim);
        match self.kind {
            MetricKind::L1 => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| (x.to_f32() - y.to_f32()).abs())
                .sum(),
            MetricKind::L2 => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| {
                    let d = x.to_f32() - y.to_f32();
                    d * d
                })
                .sum::<f32>()
                .sqrt(),
        }
    }
}
