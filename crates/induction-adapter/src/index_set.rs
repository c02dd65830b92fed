//! Ordered index requests.
//!
//! An [`IndexSet`] is what the presentation layer hands back when it wants
//! records: a duplicate-free list of positions whose order is the order the
//! caller wants the records returned in.

use crate::error::{DataError, Result};
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Largest range `FromStr` expands, e.g. the `N` in `0-N`
pub const MAX_PARSED_RANGE: usize = 1_000_000;

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct IndexSet {
    indexes: Vec<usize>,
    members: HashSet<usize>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contiguous ascending range
    pub fn from_range(range: Range<usize>) -> Self {
        range.collect()
    }

    /// Append an index; duplicates are ignored and keep their first position
    pub fn insert(&mut self, index: usize) -> bool {
        if !self.members.insert(index) {
            return false;
        }
        self.indexes.push(index);
        true
    }

    fn reserve(&mut self, additional: usize) {
        self.indexes.reserve(additional);
        self.members.reserve(additional);
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.contains(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indexes.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.indexes
    }

    pub fn min(&self) -> Option<usize> {
        self.indexes.iter().copied().min()
    }

    pub fn max(&self) -> Option<usize> {
        self.indexes.iter().copied().max()
    }

    /// Fail on the first index that is not below `count`
    pub fn check_bounds(&self, count: usize) -> Result<()> {
        match self.indexes.iter().find(|&&index| index >= count) {
            Some(&index) => Err(DataError::IndexOutOfRange { index, count }),
            None => Ok(()),
        }
    }
}

impl FromIterator<usize> for IndexSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = IndexSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

impl From<&[usize]> for IndexSet {
    fn from(indexes: &[usize]) -> Self {
        indexes.iter().copied().collect()
    }
}

impl<const N: usize> From<[usize; N]> for IndexSet {
    fn from(indexes: [usize; N]) -> Self {
        indexes.into_iter().collect()
    }
}

impl From<Range<usize>> for IndexSet {
    fn from(range: Range<usize>) -> Self {
        Self::from_range(range)
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = usize;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, usize>>;

    fn into_iter(self) -> Self::IntoIter {
        self.indexes.iter().copied()
    }
}

/// Parses comma-separated indexes and inclusive ranges, e.g. `"0-4,7,2"`.
/// A single range may span at most [`MAX_PARSED_RANGE`] indexes.
impl FromStr for IndexSet {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let mut set = IndexSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let parse = |text: &str| {
                text.trim().parse::<usize>().map_err(|_| {
                    DataError::invalid_configuration(format!("Invalid index '{}'", text))
                })
            };

            match part.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (parse(start)?, parse(end)?);
                    if end < start {
                        return Err(DataError::invalid_configuration(format!(
                            "Invalid index range '{}'",
                            part
                        )));
                    }
                    if end - start >= MAX_PARSED_RANGE {
                        return Err(DataError::invalid_configuration(format!(
                            "Index range '{}' spans more than {} indexes",
                            part, MAX_PARSED_RANGE
                        )));
                    }
                    set.reserve(end - start + 1);
                    for index in start..=end {
                        set.insert(index);
                    }
                }
                None => {
                    set.insert(parse(part)?);
                }
            }
        }
        Ok(set)
    }
}

impl fmt::Display for IndexSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.indexes.iter().map(|i| i.to_string()).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_request_order() {
        let set = IndexSet::from([5, 2, 8]);
        assert_eq!(set.as_slice(), &[5, 2, 8]);
        assert_eq!(set.min(), Some(2));
        assert_eq!(set.max(), Some(8));
    }

    #[test]
    fn test_duplicates_keep_first_position() {
        let set: IndexSet = vec![3, 1, 3, 0, 1].into_iter().collect();
        assert_eq!(set.as_slice(), &[3, 1, 0]);
    }

    #[test]
    fn test_check_bounds_reports_first_offender() {
        let set = IndexSet::from([5, 2, 8]);
        assert_eq!(
            set.check_bounds(4),
            Err(DataError::IndexOutOfRange { index: 5, count: 4 })
        );
        assert!(IndexSet::from([0, 3]).check_bounds(4).is_ok());
        assert!(IndexSet::new().check_bounds(0).is_ok());
    }

    #[test]
    fn test_parse() {
        let set: IndexSet = "0-2, 7,1".parse().unwrap();
        assert_eq!(set.as_slice(), &[0, 1, 2, 7]);
        assert!("".parse::<IndexSet>().unwrap().is_empty());
        assert!("4-1".parse::<IndexSet>().is_err());
        assert!("x".parse::<IndexSet>().is_err());
    }

    #[test]
    fn test_parse_large_range() {
        let set: IndexSet = format!("0-{}", MAX_PARSED_RANGE - 1).parse().unwrap();
        assert_eq!(set.len(), MAX_PARSED_RANGE);
        assert!(set.contains(MAX_PARSED_RANGE - 1));
        assert_eq!(set.as_slice()[12_345], 12_345);

        let err = format!("0-{}", usize::MAX).parse::<IndexSet>().unwrap_err();
        assert!(matches!(err, DataError::InvalidConfiguration(_)));
        assert!(format!("5-{}", MAX_PARSED_RANGE + 5)
            .parse::<IndexSet>()
            .is_err());
    }

    #[test]
    fn test_equality_ignores_build_path() {
        let parsed: IndexSet = "2,0,2".parse().unwrap();
        assert_eq!(parsed, IndexSet::from([2, 0]));
        assert_eq!(IndexSet::from_range(0..3), IndexSet::from([0, 1, 2]));
    }

    #[test]
    fn test_display() {
        assert_eq!(IndexSet::from([2, 0]).to_string(), "{2, 0}");
    }
}
