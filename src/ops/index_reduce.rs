//! Index-reduction kernel bodies.

opcodes! {
    /// Reductions returning the position of the selected element.
    pub enum IndexReduceOp ("index_reduce") {
        IndexMax = 0,
        IndexMin = 1,
        IndexAbsMax = 2,
        IndexAbsMin = 3,
    }
}

/// Best value seen so far and its linear index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexValue {
    pub value: f64,
    pub index: i64,
}

impl IndexReduceOp {
    #[inline]
    fn key(self, x: f64) -> f64 {
        match self {
            IndexReduceOp::IndexAbsMax | IndexReduceOp::IndexAbsMin => x.abs(),
            _ => x,
        }
    }

    /// Whether `candidate` replaces `best`; ties keep the earlier index.
    #[inline]
    fn better(self, candidate: f64, best: f64) -> bool {
        match self {
            IndexReduceOp::IndexMax | IndexReduceOp::IndexAbsMax => candidate > best,
            IndexReduceOp::IndexMin | IndexReduceOp::IndexAbsMin => candidate < best,
        }
    }

    #[inline]
    pub fn update(self, best: Option<IndexValue>, x: f64, index: usize) -> Option<IndexValue> {
        let candidate = IndexValue {
            value: self.key(x),
            index: index as i64,
        };
        match best {
            None => Some(candidate),
            Some(b) if self.better(candidate.value, b.value) => Some(candidate),
            keep => keep,
        }
    }

    /// Combine partial results; `left` covers the lower indices.
    #[inline]
    pub fn merge(self, left: Option<IndexValue>, right: Option<IndexValue>) -> Option<IndexValue> {
        match (left, right) {
            (Some(l), Some(r)) => {
                if self.better(r.value, l.value) {
                    Some(r)
                } else {
                    Some(l)
                }
            }
            (l, None) => l,
            (None, r) => r,
        }
    }

    /// Resulting index, -1 for an empty input.
    #[inline]
    pub fn finish(best: Option<IndexValue>) -> i64 {
        best.map_or(-1, |b| b.index)
    }
}
