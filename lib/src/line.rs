// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::chip::Chip;
use crate::Result;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;

mod event;
pub use event::{EventKind, WatchEvent};

mod registry;
pub(crate) use registry::Registry;

/// An identifier for a line on a particular chip.
///
/// Valid offsets are in the range 0..`num_lines` as reported in the chip [`Info`](crate::chip::Info).
pub type Offset = u32;

/// The observation state of a line.
///
/// Watching and requesting are independent, so a line may be in any
/// combination of the two.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineState {
    /// The line is watched via its chip.
    ///
    /// Only changed by a successful watch or unwatch.
    pub watched: bool,

    /// The line is requested by some process.
    ///
    /// This is only as current as the most recent event read for the line,
    /// and is never set for lines that have not been watched.
    pub requested: bool,
}

/// A handle to a line on a [`Chip`].
///
/// The handle borrows the chip, so cannot outlive it.
#[derive(Clone, Copy)]
pub struct Line<'a> {
    chip: &'a Chip,
    offset: Offset,
}

impl<'a> Line<'a> {
    // The offset must already have been checked against the chip.
    pub(crate) fn new(chip: &'a Chip, offset: Offset) -> Line<'a> {
        Line { chip, offset }
    }

    /// The offset of the line on its chip.
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// The name of the line.
    ///
    /// Empty if the line is unnamed.
    pub fn name(&self) -> &'a str {
        self.chip.lines.name(self.idx())
    }

    /// The chip containing the line.
    pub fn chip(&self) -> &'a Chip {
        self.chip
    }

    /// The current observation state of the line.
    pub fn state(&self) -> LineState {
        self.chip.lines.state(self.idx())
    }

    /// Check if the line is being watched.
    pub fn is_watched(&self) -> bool {
        self.state().watched
    }

    /// Check if the line is requested, as last reported by a watch event.
    pub fn is_requested(&self) -> bool {
        self.state().requested
    }

    /// Start watching the line for changes to its request state.
    ///
    /// Subsequent requests, reconfigurations and releases of the line will
    /// generate events that can be read from the chip.
    ///
    /// Fails with [`Busy`](crate::Error::Busy) if the line is already watched.
    pub fn watch(&self) -> Result<()> {
        self.chip.lines.watch(self.chip.device(), self.offset)
    }

    /// Stop watching the line.
    ///
    /// Events for the line already queued on the chip remain available to read.
    ///
    /// Fails with [`Busy`](crate::Error::Busy) if the line is not watched.
    pub fn unwatch(&self) -> Result<()> {
        self.chip.lines.unwatch(self.chip.device(), self.offset)
    }

    fn idx(&self) -> usize {
        self.offset as usize
    }
}

impl fmt::Debug for Line<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Line")
            .field("chip", &self.chip.name())
            .field("offset", &self.offset)
            .finish()
    }
}

impl PartialEq for Line<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.chip, other.chip) && self.offset == other.offset
    }
}

impl Eq for Line<'_> {}
