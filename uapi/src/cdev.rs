// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::common::{read_event, ChipInfo, Error, Name, Offset, Result, UnderReadError};
use super::device::{ControlOp, Device};
use super::record::{encode, u32_at, u64_at, RECORD_SIZE};
use libc::ioctl;
use std::fs::File;
use std::io::Error as IoError;
use std::mem::{size_of, MaybeUninit};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd};
use std::path::Path;

const IOCTL_MAGIC: u8 = 0xb4;

#[repr(u8)]
enum Ioctl {
    GetChipInfo = 1,
    GetLineInfo = 2,
    WatchLineInfo = 0xB,
    UnwatchLineInfo = 0xC,
}

/// The size of the kernel's line info changed event.
const CHANGE_EVENT_SIZE: usize = 104;
const CHANGE_EVENT_TIMESTAMP: usize = 72;
const CHANGE_EVENT_KIND: usize = 80;

/// The most kernel events read in a single read.
const MAX_READ_EVENTS: usize = 1024;

/// Information about a line, as returned by the uAPI v1 line info ioctls.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineInfo {
    /// The offset of the line within the chip.
    pub offset: Offset,
    /// The raw uAPI v1 line flags.
    pub flags: u32,
    /// The system name for the line.
    pub name: Name,
    /// A functional name for the consumer of the line.
    pub consumer: Name,
}

/// A GPIO character device, such as `/dev/gpiochip0`.
///
/// Watches are performed using the uAPI v1 line info watch ioctls, and the
/// resulting kernel change events are converted to watch event records.
#[derive(Debug)]
pub struct Cdev {
    f: File,
}

impl Cdev {
    /// Open the character device at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Cdev> {
        Ok(Cdev {
            f: File::open(path)?,
        })
    }

    /// Get the info for a line on the chip.
    pub fn line_info(&self, offset: Offset) -> Result<LineInfo> {
        let mut li = LineInfo {
            offset,
            ..Default::default()
        };
        // SAFETY: li is a repr(C) struct of the size encoded in the request.
        match unsafe {
            ioctl(
                self.f.as_raw_fd(),
                nix::request_code_readwrite!(
                    IOCTL_MAGIC,
                    Ioctl::GetLineInfo,
                    size_of::<LineInfo>()
                ),
                &mut li,
            )
        } {
            0 => Ok(li),
            _ => Err(Error::from(IoError::last_os_error())),
        }
    }

    fn watch_line_info(&self, offset: Offset) -> Result<()> {
        let mut li = LineInfo {
            offset,
            ..Default::default()
        };
        // SAFETY: li is a repr(C) struct of the size encoded in the request.
        match unsafe {
            ioctl(
                self.f.as_raw_fd(),
                nix::request_code_readwrite!(
                    IOCTL_MAGIC,
                    Ioctl::WatchLineInfo,
                    size_of::<LineInfo>()
                ),
                &mut li,
            )
        } {
            0 => Ok(()),
            _ => Err(Error::from(IoError::last_os_error())),
        }
    }

    fn unwatch_line_info(&self, offset: Offset) -> Result<()> {
        let mut offset = offset;
        // SAFETY: the request expects a pointer to a u32 offset.
        match unsafe {
            ioctl(
                self.f.as_raw_fd(),
                nix::request_code_readwrite!(
                    IOCTL_MAGIC,
                    Ioctl::UnwatchLineInfo,
                    size_of::<u32>()
                ),
                &mut offset,
            )
        } {
            0 => Ok(()),
            _ => Err(Error::from(IoError::last_os_error())),
        }
    }
}

impl AsFd for Cdev {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.f.as_fd()
    }
}

impl Device for Cdev {
    fn chip_info(&self) -> Result<ChipInfo> {
        let mut chip = MaybeUninit::<ChipInfo>::uninit();
        // SAFETY: ChipInfo is repr(C) and fully populated by a successful call.
        unsafe {
            match ioctl(
                self.f.as_raw_fd(),
                nix::request_code_read!(IOCTL_MAGIC, Ioctl::GetChipInfo, size_of::<ChipInfo>()),
                chip.as_mut_ptr(),
            ) {
                0 => Ok(chip.assume_init()),
                _ => Err(Error::from(IoError::last_os_error())),
            }
        }
    }

    fn line_name(&self, offset: Offset) -> Result<Name> {
        self.line_info(offset).map(|li| li.name)
    }

    fn control(&self, offset: Offset, op: ControlOp) -> Result<()> {
        match op {
            ControlOp::Watch => self.watch_line_info(offset),
            ControlOp::Unwatch => self.unwatch_line_info(offset),
            // lines are requested and reconfigured via request descriptors, not the chip
            _ => Err(Error::from_errno(libc::EOPNOTSUPP)),
        }
    }

    fn read_records(&self, buf: &mut [u8]) -> Result<usize> {
        let count = buf.len() / RECORD_SIZE;
        if count == 0 {
            return Err(UnderReadError::new("WatchEventRecord", RECORD_SIZE, buf.len()).into());
        }
        let count = count.min(MAX_READ_EVENTS);
        let mut kbuf = vec![0_u8; count * CHANGE_EVENT_SIZE];
        let n = read_event(self.f.as_fd(), &mut kbuf)?;
        transcode(&kbuf[..n], buf)
    }
}

// Convert kernel line info changed events into watch event records.
//
// A partial trailing kernel event becomes a short zeroed tail, shorter than
// a record, following the records that did decode.
fn transcode(kevents: &[u8], buf: &mut [u8]) -> Result<usize> {
    let mut written = 0;
    for ke in kevents.chunks(CHANGE_EVENT_SIZE) {
        if ke.len() < CHANGE_EVENT_SIZE {
            let tail = ke.len().min(RECORD_SIZE - 1);
            buf[written..written + tail].fill(0);
            return Ok(written + tail);
        }
        // the kernel orders kinds as requested, released, reconfigured.
        let kind = match u32_at(ke, CHANGE_EVENT_KIND) {
            1 => 1,
            2 => 3,
            3 => 2,
            _ => 0,
        };
        let rec = encode(kind, u64_at(ke, CHANGE_EVENT_TIMESTAMP), u32_at(ke, 0));
        buf[written..written + RECORD_SIZE].copy_from_slice(&rec);
        written += RECORD_SIZE;
    }
    Ok(written)
}
