// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::Line;
use gpiowatch_uapi::WatchEventKind;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// A change in the request state of a watched line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WatchEvent<'a> {
    /// The trigger for the change.
    pub kind: EventKind,

    /// The best estimate of time of event occurrence, in nanoseconds.
    ///
    /// Read from **CLOCK_MONOTONIC**, so is intended for comparing times
    /// between events and should be converted to
    /// [`Duration`](std::time::Duration).
    pub timestamp_ns: u64,

    /// The line that changed.
    pub line: Line<'a>,
}

/// The trigger identifier for a [`WatchEvent`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum EventKind {
    /// The line has been requested.
    Requested,

    /// The configuration of a requested line has changed.
    ConfigChanged,

    /// The line has been released.
    Released,
}

impl EventKind {
    /// The request state of the line after the event.
    pub fn is_requested(&self) -> bool {
        !matches!(self, EventKind::Released)
    }
}

impl From<WatchEventKind> for EventKind {
    fn from(kind: WatchEventKind) -> Self {
        match kind {
            WatchEventKind::Requested => EventKind::Requested,
            WatchEventKind::ConfigChanged => EventKind::ConfigChanged,
            WatchEventKind::Released => EventKind::Released,
        }
    }
}

impl From<EventKind> for WatchEventKind {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Requested => WatchEventKind::Requested,
            EventKind::ConfigChanged => WatchEventKind::ConfigChanged,
            EventKind::Released => WatchEventKind::Released,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Requested => "requested",
            EventKind::ConfigChanged => "config-changed",
            EventKind::Released => "released",
        };
        write!(f, "{}", name)
    }
}
