use std::iter::FusedIterator;
use std::ops::Range;

use smallvec::smallvec;

use crate::layout::DimList;

/// Iterator over all N-dimensional indices within a box, in row-major
/// order (the last dimension changes fastest).
///
/// If the index has no dimensions, the iterator yields a single empty index.
pub struct Indices {
    /// Start index along each dimension.
    start: DimList,

    /// End index (exclusive) along each dimension.
    end: DimList,

    next: Option<DimList>,

    /// Remaining iteration steps.
    remaining: usize,
}

impl Indices {
    fn from_start_and_end(start: DimList, end: DimList) -> Indices {
        let remaining: usize = start
            .iter()
            .zip(end.iter())
            .map(|(&from, &to)| to.saturating_sub(from))
            .product();
        Indices {
            next: if remaining > 0 || start.is_empty() {
                Some(start.clone())
            } else {
                None
            },
            start,
            end,
            remaining,
        }
    }

    /// Return an iterator over all the indices where each dimension lies
    /// within the corresponding range in `ranges`.
    pub fn from_ranges(ranges: &[Range<usize>]) -> Indices {
        let start = ranges.iter().map(|r| r.start).collect();
        let end = ranges.iter().map(|r| r.end).collect();
        Self::from_start_and_end(start, end)
    }

    /// Return an iterator over all the indices where each dimension is between
    /// `0` and `shape[dim]`.
    pub fn from_shape(shape: &[usize]) -> Indices {
        let start = smallvec![0; shape.len()];
        let end = shape.iter().copied().collect();
        Self::from_start_and_end(start, end)
    }

    /// Return an iterator over the cartesian product of per-axis position
    /// lists, in row-major order.
    ///
    /// Each yielded index holds one entry from each list.
    pub fn from_lists(lists: &[Vec<usize>]) -> impl Iterator<Item = DimList> + '_ {
        let shape: DimList = lists.iter().map(|l| l.len()).collect();
        Indices::from_shape(&shape).map(move |pos| {
            pos.iter()
                .zip(lists)
                .map(|(&i, list)| list[i])
                .collect::<DimList>()
        })
    }
}

impl Iterator for Indices {
    type Item = DimList;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.clone()?;

        let mut next = current.clone();
        let mut has_next = false;
        for ((&dim_end, &dim_start), index) in self
            .end
            .iter()
            .zip(self.start.iter())
            .zip(next.iter_mut())
            .rev()
        {
            *index += 1;
            if *index == dim_end {
                *index = dim_start;
            } else {
                has_next = true;
                break;
            }
        }

        self.next = has_next.then_some(next);
        self.remaining -= 1;

        Some(current)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Indices {}

impl FusedIterator for Indices {}
