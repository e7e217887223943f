// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ptr::null;
use libc::{c_long, pollfd, ppoll, sigset_t, time_t, timespec, POLLIN};
use std::ffi::OsStr;
use std::io::Error as IoError;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::time::Duration;

/// Check if the descriptor has an event available to read.
pub fn has_event(fd: BorrowedFd<'_>) -> Result<bool> {
    wait_event(fd, Duration::ZERO)
}

/// Wait for the descriptor to have an event available to read.
///
/// Returns false if the timeout expired before an event became available.
pub fn wait_event(fd: BorrowedFd<'_>, d: Duration) -> Result<bool> {
    let mut pfd = pollfd {
        fd: fd.as_raw_fd(),
        events: POLLIN,
        revents: 0,
    };
    let timeout = timespec {
        tv_sec: d.as_secs() as time_t,
        tv_nsec: d.subsec_nanos() as c_long,
    };
    // SAFETY: pfd and timeout are owned by this frame and outlive the call.
    unsafe {
        match ppoll(
            std::ptr::addr_of_mut!(pfd),
            1,
            std::ptr::addr_of!(timeout),
            null() as *const sigset_t,
        ) {
            -1 => Err(Error::from(IoError::last_os_error())),
            0 => Ok(false),
            _ => Ok(true),
        }
    }
}

/// Read whatever is available from the descriptor into the buffer.
///
/// Blocks if nothing is available, unless the descriptor is non-blocking.
/// Returns the number of bytes read, with zero indicating the end of the stream.
pub fn read_event(fd: BorrowedFd<'_>, buf: &mut [u8]) -> Result<usize> {
    // SAFETY: the buffer is valid for writes of its full length.
    let n = unsafe {
        libc::read(
            fd.as_raw_fd(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len(),
        )
    };
    if n < 0 {
        return Err(Error::from(IoError::last_os_error()));
    }
    Ok(n as usize)
}

/// Information about a particular GPIO chip.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChipInfo {
    /// The Linux kernel name of this GPIO chip.
    pub name: Name,
    /// A functional name for this GPIO chip, such as a product number.
    ///
    /// May be empty.
    pub label: Name,
    /// The number of GPIO lines on this chip.
    pub num_lines: u32,
}

/// The result returned by [`gpiowatch_uapi`] functions.
///
/// [`gpiowatch_uapi`]: crate
pub type Result<T> = std::result::Result<T, Error>;

/// Result returned by struct validators.
pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Errors returned by [`gpiowatch_uapi`] functions.
///
/// [`gpiowatch_uapi`]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error returned from an underlying system call.
    #[error(transparent)]
    Os(#[from] std::io::Error),

    /// An error validating a data structure retuned from the kernel.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The buffer provided was too small to contain the expected data.
    #[error(transparent)]
    UnderRead(#[from] UnderReadError),
}

impl Error {
    /// Create an error from a raw OS error number.
    pub fn from_errno(errno: i32) -> Error {
        Error::Os(IoError::from_raw_os_error(errno))
    }

    /// The raw OS error number, if the error came from a system call.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Os(e) => e.raw_os_error(),
            _ => None,
        }
    }

    /// Check if the error indicates the object is busy.
    pub fn is_busy(&self) -> bool {
        self.errno() == Some(libc::EBUSY)
    }
}

/// A failure to validate a struct returned from a system call.
//
// Should only be seen if a kernel update adds an enum value we are unaware of,
// or if the event stream has been corrupted.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("Kernel returned invalid {field}: {msg}")]
pub struct ValidationError {
    pub field: String,
    pub msg: String,
}

impl ValidationError {
    pub fn new<S: Into<String>, T: Into<String>>(field: S, msg: T) -> ValidationError {
        ValidationError {
            field: field.into(),
            msg: msg.into(),
        }
    }
}

/// A failure to read a complete object from the kernel.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("Reading {obj} returned {found} bytes, expected {expected}.")]
pub struct UnderReadError {
    /// The struct being read.
    pub obj: &'static str,
    /// The number of bytes expected.
    pub expected: usize,
    /// The number of bytes read.
    pub found: usize,
}

impl UnderReadError {
    pub fn new(obj: &'static str, expected: usize, found: usize) -> UnderReadError {
        UnderReadError {
            obj,
            expected,
            found,
        }
    }
}

/// The maximum number of bytes stored in a Name.
pub const NAME_MAX: usize = 32;

/// A uAPI name string.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Name([u8; NAME_MAX]);

impl Name {
    /// Checks whether the Name is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
    /// The length of the contained name.
    #[inline]
    pub fn strlen(&self) -> usize {
        self.0.iter().position(|&x| x == 0).unwrap_or(self.0.len())
    }
    /// Convert the contained name to a OsString slice.
    pub fn as_os_str(&self) -> &OsStr {
        OsStr::from_bytes(&self.0[..self.strlen()])
    }
    /// Construct a Name from byte slice.
    ///
    /// May result in invalid UTF-8 if truncated in the middle of a multi-byte character.
    pub fn from_bytes(s: &[u8]) -> Name {
        let mut d: Name = Default::default();
        for (src, dst) in s.iter().zip(d.0.iter_mut()) {
            *dst = *src;
        }
        d
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_bytes(s.as_bytes())
    }
}

impl From<&Name> for String {
    fn from(n: &Name) -> Self {
        n.as_os_str().to_string_lossy().into_owned()
    }
}

/// An identifier for a line on a particular chip.
///
/// Valid offsets are in the range 0..`num_lines` as reported in the [`ChipInfo`].
pub type Offset = u32;
