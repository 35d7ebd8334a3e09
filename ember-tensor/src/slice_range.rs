use std::fmt::Debug;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};
use std::str::FromStr;

use crate::errors::IndexError;

/// One term of an index passed to [`Tensor::index`](crate::Tensor::index).
///
/// Can be constructed from an integer, a range, or parsed from a string
/// using `"start:stop:step"` syntax or `"..."` for an ellipsis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IndexItem {
    /// Select a single position along an axis. Negative values count back
    /// from the end.
    Index(isize),

    /// Select a stepped sub-range of an axis.
    Slice(SliceRange),

    /// Select the full range of as many axes as needed so that the index
    /// covers every axis. At most one may appear in an index.
    Ellipsis,
}

impl IndexItem {
    /// Return an item that selects the full range of an axis.
    pub fn full_range() -> IndexItem {
        IndexItem::Slice(SliceRange::full())
    }

    /// Return an item that selects part of an axis.
    pub fn range(start: isize, end: Option<isize>, step: isize) -> IndexItem {
        IndexItem::Slice(SliceRange::new(start, end, step))
    }
}

impl From<i32> for IndexItem {
    #[inline]
    fn from(value: i32) -> Self {
        IndexItem::Index(value as isize)
    }
}

impl From<isize> for IndexItem {
    #[inline]
    fn from(value: isize) -> Self {
        IndexItem::Index(value)
    }
}

impl From<usize> for IndexItem {
    #[inline]
    fn from(value: usize) -> Self {
        IndexItem::Index(value as isize)
    }
}

impl<R> From<R> for IndexItem
where
    R: Into<SliceRange>,
{
    fn from(value: R) -> Self {
        IndexItem::Slice(value.into())
    }
}

impl FromStr for IndexItem {
    type Err = IndexError;

    /// Parse `"..."` as an ellipsis, a string containing `:` as a slice and
    /// anything else as a single index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "..." {
            Ok(IndexItem::Ellipsis)
        } else if s.contains(':') {
            s.parse().map(IndexItem::Slice)
        } else {
            s.parse()
                .map(IndexItem::Index)
                .map_err(|_| IndexError::Parse(s.to_string()))
        }
    }
}

/// A stepped range along one axis of a tensor.
///
/// `start` is inclusive and `end` is exclusive. Either endpoint may be
/// negative, in which case it counts back from the end of the axis. An `end`
/// of `None` means the range extends to the end of the axis.
///
/// Only forward traversal is supported, so the step must be positive when
/// the range is resolved.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceRange {
    pub start: isize,
    pub end: Option<isize>,
    pub step: isize,
}

impl SliceRange {
    pub fn new(start: isize, end: Option<isize>, step: isize) -> SliceRange {
        SliceRange { start, end, step }
    }

    /// Return a range which selects every position of an axis.
    pub fn full() -> SliceRange {
        SliceRange::new(0, None, 1)
    }

    /// Resolve this range against an axis of size `dim_size`.
    ///
    /// After negative endpoints are adjusted, both must lie in
    /// `[0, dim_size]`. If `end <= start` the result is empty.
    pub fn resolve(&self, axis: usize, dim_size: usize) -> Result<IndexRange, IndexError> {
        if self.step <= 0 {
            return Err(IndexError::InvalidStep);
        }
        let size = dim_size as isize;
        let adjust = |idx: isize| if idx < 0 { idx + size } else { idx };

        let start = adjust(self.start);
        let end = self.end.map(adjust).unwrap_or(size);
        if !(0..=size).contains(&start) || !(0..=size).contains(&end) {
            return Err(IndexError::InvalidRange { axis });
        }

        Ok(IndexRange {
            start: start as usize,
            end: end.max(start) as usize,
            step: self.step as usize,
        })
    }
}

impl FromStr for SliceRange {
    type Err = IndexError;

    /// Parse a Python-style slice, `"start:stop"` or `"start:stop:step"`.
    ///
    /// Empty fields take their defaults: `start` is 0, `stop` is the end of
    /// the axis and `step` is 1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || IndexError::Parse(s.to_string());
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(parse_err());
        }

        let field = |text: &str| -> Result<Option<isize>, IndexError> {
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse().map(Some).map_err(|_| parse_err())
            }
        };

        let start = field(parts[0])?.unwrap_or(0);
        let end = field(parts[1])?;
        let step = match parts.get(2) {
            Some(text) => field(*text)?.unwrap_or(1),
            None => 1,
        };
        if step == 0 {
            return Err(IndexError::InvalidStep);
        }

        Ok(SliceRange::new(start, end, step))
    }
}

impl<T> From<Range<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: Range<T>) -> SliceRange {
        let start = r.start.try_into().unwrap();
        let end = r.end.try_into().unwrap();
        SliceRange::new(start, Some(end), 1)
    }
}

impl<T> From<RangeTo<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: RangeTo<T>) -> SliceRange {
        let end = r.end.try_into().unwrap();
        SliceRange::new(0, Some(end), 1)
    }
}

impl<T> From<RangeFrom<T>> for SliceRange
where
    T: TryInto<isize>,
    <T as TryInto<isize>>::Error: Debug,
{
    fn from(r: RangeFrom<T>) -> SliceRange {
        let start = r.start.try_into().unwrap();
        SliceRange::new(start, None, 1)
    }
}

impl From<RangeFull> for SliceRange {
    #[inline]
    fn from(_: RangeFull) -> SliceRange {
        SliceRange::full()
    }
}

/// A resolved, in-bounds range of positions along an axis.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IndexRange {
    start: usize,
    end: usize,
    step: usize,
}

impl IndexRange {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Return the number of positions in this range.
    pub fn steps(&self) -> usize {
        (self.end - self.start).div_ceil(self.step)
    }
}

impl IntoIterator for IndexRange {
    type Item = usize;
    type IntoIter = std::iter::StepBy<Range<usize>>;

    fn into_iter(self) -> Self::IntoIter {
        (self.start..self.end).step_by(self.step)
    }
}
