// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Groups: image sets sharing a group number, processed as one indivisible job
//! (spec.md §3, GLOSSARY).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::image_set::ImageSetNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupNumber(pub u32);

impl fmt::Display for GroupNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupIndex(pub u32);

/// An ordered collection of image sets sharing a group number.
///
/// Invariant: a group is never split across jobs (spec.md §3) — the
/// caller that builds a `Group` is responsible for gathering every
/// image set with this `number` before constructing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub number: GroupNumber,
    /// Image sets ordered by ascending group index (spec.md §4.2: "within
    /// each group sort by group index").
    pub image_sets: Vec<ImageSetNumber>,
}

impl Group {
    pub fn new(number: GroupNumber, mut members: Vec<(GroupIndex, ImageSetNumber)>) -> Self {
        members.sort_by_key(|(index, _)| *index);
        Self {
            number,
            image_sets: members.into_iter().map(|(_, image_set)| image_set).collect(),
        }
    }
}
