// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{ChipInfo, Name, Offset, Result};
use std::fmt;
use std::os::unix::io::AsFd;

/// The operations that may be performed on a line via its chip.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ControlOp {
    /// Start reporting state changes of the line.
    Watch,
    /// Stop reporting state changes of the line.
    Unwatch,
    /// Request the line for use.
    Request,
    /// Release a requested line.
    Release,
    /// Change the configuration of a requested line.
    Reconfigure,
}

impl fmt::Display for ControlOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlOp::Watch => "watch",
            ControlOp::Unwatch => "unwatch",
            ControlOp::Request => "request",
            ControlOp::Release => "release",
            ControlOp::Reconfigure => "reconfigure",
        };
        write!(f, "{}", name)
    }
}

/// An open chip device.
///
/// The descriptor returned by [`AsFd`] is the readiness descriptor for the
/// chip's watch event queue - it is readable exactly when at least one
/// record is queued, or when the device has been closed by the far end.
pub trait Device: AsFd + fmt::Debug + Send + Sync {
    /// Get the publicly available information for the chip.
    fn chip_info(&self) -> Result<ChipInfo>;

    /// Get the name of a line on the chip.
    ///
    /// The name is empty if the line is unnamed.
    fn line_name(&self, offset: Offset) -> Result<Name>;

    /// Perform an operation on a line.
    ///
    /// Fails with `EBUSY` when watching a watched line, or unwatching a line
    /// that is not watched.
    fn control(&self, offset: Offset, op: ControlOp) -> Result<()>;

    /// Read queued watch event records into the buffer.
    ///
    /// Returns the number of bytes read, which is a multiple of [`RECORD_SIZE`]
    /// unless the stream is corrupted. Returns zero at the end of the stream.
    ///
    /// Blocks until at least one record is available.
    ///
    /// [`RECORD_SIZE`]: crate::RECORD_SIZE
    fn read_records(&self, buf: &mut [u8]) -> Result<usize>;
}
