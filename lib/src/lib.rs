// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for watching GPIO lines on Linux platforms for changes in their
//! request state.
//!
//! Lines are watched via their [`Chip`], and the chip then reports a
//! [`WatchEvent`] each time a watched line is requested, reconfigured or
//! released by another process.
//!
//! To watch a line and wait for it to be requested:
//! ```no_run
//! # use gpiowatch::Result;
//! use gpiowatch::{Chip, EventKind};
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let chip = Chip::from_path("/dev/gpiochip0")?;
//! let line = chip.watched_line(3)?;
//! while chip.wait_watch_event(Duration::from_secs(10))? {
//!     let evt = chip.read_watch_event()?;
//!     if evt.kind == EventKind::Requested {
//!         println!("line {} requested", evt.line.offset());
//!     }
//! }
//! line.unwatch()?;
//! # Ok(())
//! # }
//! ```
//!
//! The chip descriptor may be added to an external poller, such as `mio` or
//! `poll(2)`, as it is readable exactly when a watch event is available.
//!
//! [`Chip`]: chip::Chip
//! [`WatchEvent`]: line::WatchEvent

use gpiowatch_uapi as uapi;
use std::fmt;
use std::path::PathBuf;

/// Types and functions specific to chips.
pub mod chip;
pub use chip::Chip;

/// Types specific to lines.
pub mod line;
pub use line::{EventKind, Line, LineState, Offset, WatchEvent};

mod r#async;
#[cfg(feature = "async_io")]
pub use r#async::async_io;
#[cfg(feature = "async_tokio")]
pub use r#async::tokio;

/// Errors returned by [`gpiowatch`] functions.
///
/// [`gpiowatch`]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The line is busy: it is already watched, or is not watched, depending
    /// on the operation attempted.
    ///
    /// The state of the line is unchanged.
    #[error("line {0} is busy: {1}")]
    Busy(Offset, BusyKind),

    /// An error returned when there is a problem with an argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// Problem accessing GPIO chip character devices
    #[error("\"{0}\" {1}.")]
    GpioChip(PathBuf, chip::ErrorKind),

    /// The chip descriptor has reached the end of its event stream.
    ///
    /// Typically the device has been removed.
    #[error("chip has been closed")]
    Closed,

    /// A record read from the chip could not be decoded.
    ///
    /// The count is the number of valid records decoded in the same read
    /// before the corrupted record.
    #[error("watch event stream corrupted after {0} valid events: {1}")]
    Corrupted(usize, Corruption),

    /// An error returned from an underlying uAPI call.
    #[error("uAPI {0} returned: {1}")]
    Uapi(UapiCall, #[source] uapi::Error),

    /// An error returned from an underlying os call.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The reasons a line may be [`Busy`].
///
/// Both report the same error classification, the split is only for
/// diagnostics.
///
/// [`Busy`]: Error::Busy
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BusyKind {
    /// A watch was attempted on a line that is already watched.
    AlreadyWatched,

    /// An unwatch was attempted on a line that is not watched.
    NotWatched,
}

impl fmt::Display for BusyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyKind::AlreadyWatched => write!(f, "already watched"),
            BusyKind::NotWatched => write!(f, "not watched"),
        }
    }
}

/// The ways a watch event record may be corrupted.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Corruption {
    /// The read returned a partial record of the given number of bytes.
    Truncated(usize),

    /// A field of the record contained an invalid value.
    InvalidField(uapi::ValidationError),

    /// The record refers to an offset that is not on the chip, which has the
    /// given number of lines.
    OffsetOutOfRange(Offset, u32),
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::Truncated(n) => write!(
                f,
                "truncated record of {} bytes, expected {}",
                n,
                uapi::RECORD_SIZE
            ),
            Corruption::InvalidField(e) => write!(f, "{}", e),
            Corruption::OffsetOutOfRange(offset, num_lines) => write!(
                f,
                "offset {} out of range for chip with {} lines",
                offset, num_lines
            ),
        }
    }
}

/// Identifiers for the underlying uAPI calls.
#[doc(hidden)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UapiCall {
    GetChipInfo,
    GetLineName,
    HasEvent,
    Open,
    ReadEvent,
    UnwatchLine,
    WaitEvent,
    WatchLine,
}

impl fmt::Display for UapiCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UapiCall::GetChipInfo => "get_chip_info",
            UapiCall::GetLineName => "get_line_name",
            UapiCall::HasEvent => "has_event",
            UapiCall::Open => "open",
            UapiCall::ReadEvent => "read_event",
            UapiCall::UnwatchLine => "unwatch_line",
            UapiCall::WaitEvent => "wait_event",
            UapiCall::WatchLine => "watch_line",
        };
        write!(f, "{}", name)
    }
}

/// The result for [`gpiowatch`] functions.
///
/// [`gpiowatch`]: crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            Error::Busy(3, BusyKind::AlreadyWatched).to_string(),
            "line 3 is busy: already watched"
        );
        assert_eq!(
            Error::Busy(4, BusyKind::NotWatched).to_string(),
            "line 4 is busy: not watched"
        );
        assert_eq!(
            Error::Corrupted(2, Corruption::Truncated(5)).to_string(),
            "watch event stream corrupted after 2 valid events: truncated record of 5 bytes, expected 32"
        );
        assert_eq!(
            Error::Corrupted(0, Corruption::OffsetOutOfRange(9, 8)).to_string(),
            "watch event stream corrupted after 0 valid events: offset 9 out of range for chip with 8 lines"
        );
        assert_eq!(
            Error::Uapi(UapiCall::WatchLine, uapi::Error::from_errno(libc::ENODEV))
                .to_string()
                .split(':')
                .next(),
            Some("uAPI watch_line returned")
        );
    }
}
