// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Image sets and their status (spec.md §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer index addressing one image record in the measurements store.
///
/// Always a positive integer (spec.md GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageSetNumber(pub u32);

impl ImageSetNumber {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ImageSetNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ImageSetNumber {
    fn from(n: u32) -> Self {
        Self(n)
    }
}

/// Status of one image set. Transitions are strictly monotonic:
/// `Unprocessed -> InProcess -> Done` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSetStatus {
    Unprocessed,
    InProcess,
    Done,
}

impl ImageSetStatus {
    fn rank(self) -> u8 {
        match self {
            ImageSetStatus::Unprocessed => 0,
            ImageSetStatus::InProcess => 1,
            ImageSetStatus::Done => 2,
        }
    }

    /// Attempt to advance to `next`. Returns `false` (and leaves `self`
    /// unchanged) if `next` would move status backward — the caller is
    /// expected to treat that as a no-op, not an error, since "returned
    /// measurements always win over in-process updates" (spec.md §4.2)
    /// relies on a Done status silently rejecting a later InProcess write.
    pub fn advance_to(&mut self, next: ImageSetStatus) -> bool {
        if next.rank() >= self.rank() {
            *self = next;
            true
        } else {
            false
        }
    }

    pub fn is_done(self) -> bool {
        matches!(self, ImageSetStatus::Done)
    }
}

impl fmt::Display for ImageSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSetStatus::Unprocessed => write!(f, "unprocessed"),
            ImageSetStatus::InProcess => write!(f, "in_process"),
            ImageSetStatus::Done => write!(f, "done"),
        }
    }
}

/// Inverse of `Display`, so status can round-trip through the
/// measurements store's `(entity, key, image_set)` string records
/// (the controller stores status as `("Image", "Status", n)`, mirroring
/// `original_source/cellprofiler/analysis.py`'s direct use of the
/// measurements object as its own status table).
impl std::str::FromStr for ImageSetStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(ImageSetStatus::Unprocessed),
            "in_process" => Ok(ImageSetStatus::InProcess),
            "done" => Ok(ImageSetStatus::Done),
            _ => Err(()),
        }
    }
}
