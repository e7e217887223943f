// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The watch event record read from a chip descriptor.
//!
//! Records are a fixed [`RECORD_SIZE`] bytes, in native byte order, and are
//! concatenated in the stream with no other framing:
//!
//! | bytes    | field                                  |
//! |----------|----------------------------------------|
//! | 0..4     | kind (`u32`)                           |
//! | 4..8     | reserved                               |
//! | 8..16    | timestamp, in nanoseconds (`u64`)      |
//! | 16..20   | line offset (`u32`)                    |
//! | 20..32   | reserved                               |

use super::common::{Offset, UnderReadError, ValidationError};
use super::Result;

/// The size of a watch event record in the stream.
pub const RECORD_SIZE: usize = 32;

const KIND: usize = 0;
const TIMESTAMP: usize = 8;
const OFFSET: usize = 16;

/// The trigger identifier for a [`WatchEventRecord`].
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum WatchEventKind {
    /// The line has been requested.
    Requested = 1,
    /// The configuration of a requested line has changed.
    ConfigChanged = 2,
    /// The line has been released.
    Released = 3,
}

impl TryFrom<u32> for WatchEventKind {
    type Error = String;

    fn try_from(v: u32) -> std::result::Result<Self, Self::Error> {
        use WatchEventKind::*;
        match v {
            x if x == Requested as u32 => Ok(Requested),
            x if x == ConfigChanged as u32 => Ok(ConfigChanged),
            x if x == Released as u32 => Ok(Released),
            x => Err(format!("invalid value: {}", x)),
        }
    }
}

/// A single state change of a watched line, as read from the chip.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WatchEventRecord {
    /// The trigger for the change.
    pub kind: WatchEventKind,

    /// The best estimate of time of event occurrence, in nanoseconds.
    ///
    /// Read from **CLOCK_MONOTONIC**.
    pub timestamp_ns: u64,

    /// The offset of the line that changed.
    pub offset: Offset,
}

impl WatchEventRecord {
    /// Decode a record from the start of a buffer.
    ///
    /// The buffer is assumed to have been populated by a read of the chip
    /// descriptor, so the content is validated before being returned.
    pub fn from_slice(d: &[u8]) -> Result<WatchEventRecord> {
        if d.len() < RECORD_SIZE {
            return Err(UnderReadError::new("WatchEventRecord", RECORD_SIZE, d.len()).into());
        }
        let raw_kind = u32_at(d, KIND);
        let kind = WatchEventKind::try_from(raw_kind).map_err(|e| ValidationError::new("kind", e))?;
        Ok(WatchEventRecord {
            kind,
            timestamp_ns: u64_at(d, TIMESTAMP),
            offset: u32_at(d, OFFSET),
        })
    }

    /// Encode the record into its stream form.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        encode(self.kind as u32, self.timestamp_ns, self.offset)
    }
}

/// Encode a record with an arbitrary kind value.
///
/// For producers passing through values they cannot interpret,
/// which the reader will then reject.
pub(crate) fn encode(kind: u32, timestamp_ns: u64, offset: Offset) -> [u8; RECORD_SIZE] {
    let mut d = [0; RECORD_SIZE];
    d[KIND..KIND + 4].copy_from_slice(&kind.to_ne_bytes());
    d[TIMESTAMP..TIMESTAMP + 8].copy_from_slice(&timestamp_ns.to_ne_bytes());
    d[OFFSET..OFFSET + 4].copy_from_slice(&offset.to_ne_bytes());
    d
}

#[inline]
pub(crate) fn u32_at(d: &[u8], idx: usize) -> u32 {
    let mut b = [0; 4];
    b.copy_from_slice(&d[idx..idx + 4]);
    u32::from_ne_bytes(b)
}

#[inline]
pub(crate) fn u64_at(d: &[u8], idx: usize) -> u64 {
    let mut b = [0; 8];
    b.copy_from_slice(&d[idx..idx + 8]);
    u64::from_ne_bytes(b)
}
