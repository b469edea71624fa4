// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::ops::AddAssign;

use crate::Cell;

/// True when there are at least two columns and some column's value
/// differs from column 0 by string form. Absent only compares equal to
/// absent.
pub fn is_diff(values: &[Cell]) -> bool {
    let Some((baseline, rest)) = values.split_first() else {
        return false;
    };
    let baseline = baseline.compare_key();
    rest.iter().any(|value| value.compare_key() != baseline)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffCounts {
    pub diffs: usize,
    pub total: usize,
}

impl DiffCounts {
    pub const fn leaf(is_diff: bool) -> Self {
        Self {
            diffs: if is_diff { 1 } else { 0 },
            total: 1,
        }
    }

    pub const fn has_diffs(self) -> bool {
        self.diffs > 0
    }

    pub const fn is_empty(self) -> bool {
        self.total == 0
    }
}

impl AddAssign for DiffCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.diffs += rhs.diffs;
        self.total += rhs.total;
    }
}

impl std::iter::Sum for DiffCounts {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut acc, counts| {
            acc += counts;
            acc
        })
    }
}
