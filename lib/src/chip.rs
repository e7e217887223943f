// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::{Line, Offset, Registry, WatchEvent};
use crate::{Corruption, Error, Result, UapiCall};
use gpiowatch_uapi::{self as uapi, Cdev, Device, WatchEventRecord, RECORD_SIZE};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::os::linux::fs::MetadataExt;
use std::os::unix::prelude::{AsFd, AsRawFd, BorrowedFd, OsStrExt, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace, warn};

mod watch_event_buffer;
pub use watch_event_buffer::WatchEventBuffer;

const CHARDEV_MODE: u32 = 0x2000;

/// The most watch events read from the chip in a single read.
///
/// Larger batch sizes and buffer capacities are clamped to this.
pub const MAX_BATCH_SIZE: usize = 1024;

/// Check if a path corresponds to a GPIO character device.
///
/// Returns the resolved path to the character device.
pub fn is_chip<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let pb = fs::canonicalize(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            Error::GpioChip(path.as_ref().to_path_buf(), ErrorKind::NotFound)
        }
        _ => Error::from(e),
    })?;
    // if canonical path is of form /dev/gpiochipXX assume we are good
    if let Some(pbstr) = pb.to_str() {
        if let Some(num) = pbstr.strip_prefix("/dev/gpiochip") {
            if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
                return Ok(pb);
            }
        }
    }

    // else take a more detailed look...
    let m = fs::metadata(&pb)?;
    if m.st_mode() & CHARDEV_MODE == 0 {
        return Err(Error::GpioChip(pb, ErrorKind::NotCharacterDevice));
    }
    let file_name = match pb.file_name() {
        Some(name) => name.to_owned(),
        None => return Err(Error::GpioChip(pb, ErrorKind::NotGpioDevice)),
    };
    let mut sysfs_dev = PathBuf::from("/sys/bus/gpio/devices");
    sysfs_dev.push(file_name);
    sysfs_dev.push("dev");
    if let Ok(rdev) = fs::read_to_string(sysfs_dev) {
        if rdev.trim_end() == rdev_id(m.st_rdev()) {
            return Ok(pb);
        }
    }
    Err(Error::GpioChip(pb, ErrorKind::NotGpioDevice))
}

// The "major:minor" form of a device number, as found in sysfs dev files.
fn rdev_id(rdev: u64) -> String {
    format!("{}:{}", libc::major(rdev), libc::minor(rdev))
}

/// Compare two chip paths.
///
// Sorts paths naturally, assuming any chip numbering is at the end of the path - as it is for gpiochips.
pub fn path_compare(a: &Path, b: &Path) -> std::cmp::Ordering {
    let a = a.as_os_str().as_bytes();
    let b = b.as_os_str().as_bytes();

    if a.len() == b.len() {
        // if equal length then just compare lexicographically
        return a.cmp(b);
    }
    for (ai, bi) in a.iter().zip(b.iter()) {
        if *ai != *bi {
            if !ai.is_ascii_digit() || !bi.is_ascii_digit() {
                // if either is not a digit then this character is definitive
                return (*ai).cmp(bi);
            }
            // else drop thru to length comparison
            break;
        }
    }
    // equal up to to the length of the shortest - or to digits and shorter numbers are smaller
    a.len().cmp(&b.len())
}

/// Returns the paths of all the GPIO character devices on the system.
///
/// The returned paths are sorted in name order and are confirmed to be GPIO character devices,
/// so there is no need to check them with [`is_chip`].
pub fn chips() -> Result<Vec<PathBuf>> {
    let mut chips = fs::read_dir("/dev")?
        .filter_map(|x| x.ok())
        .flat_map(|de| is_chip(de.path()))
        .collect::<Vec<PathBuf>>();
    chips.sort_unstable_by(|a, b| path_compare(a, b));
    chips.dedup();
    Ok(chips)
}

/// A GPIO chip, and the watch state of its lines.
///
/// The chip owns the device descriptor, which is closed when the chip is
/// dropped. The descriptor is readable exactly when a watch event is queued,
/// so it may be added to an external poller via [`watch_fd`] or [`AsFd`].
///
/// [`watch_fd`]: Chip::watch_fd
#[derive(Debug)]
pub struct Chip {
    /// The resolved path of the GPIO character device, if opened from a path.
    path: Option<PathBuf>,

    info: Info,

    dev: Box<dyn Device>,

    pub(crate) lines: Registry,
}

impl Chip {
    /// Constructs a Chip using the given path.
    ///
    /// The path must resolve to a valid GPIO character device.
    ///
    /// # Examples
    ///```no_run
    /// # fn example() -> gpiowatch::Result<gpiowatch::Chip>{
    /// let chip = gpiowatch::Chip::from_path("/dev/gpiochip0")?;
    /// # Ok(chip)
    /// # }
    ///```
    pub fn from_path<P: AsRef<Path>>(p: P) -> Result<Chip> {
        let path = is_chip(p.as_ref())?;
        let dev = Cdev::open(&path).map_err(|e| Error::Uapi(UapiCall::Open, e))?;
        let mut chip = Chip::from_device(dev)?;
        chip.path = Some(path);
        Ok(chip)
    }

    /// Constructs a Chip using the given name.
    ///
    /// The name must resolve to a valid GPIO character device.
    ///
    /// # Examples
    ///```no_run
    /// # fn example() -> gpiowatch::Result<gpiowatch::Chip>{
    /// let chip = gpiowatch::Chip::from_name("gpiochip0")?;
    /// # Ok(chip)
    /// # }
    ///```
    pub fn from_name(n: &str) -> Result<Chip> {
        Chip::from_path(format!("/dev/{}", n))
    }

    /// Constructs a Chip from an already open device.
    ///
    /// The chip takes ownership of the device.
    /// No lines are watched on the returned chip.
    pub fn from_device<D: Device + 'static>(dev: D) -> Result<Chip> {
        let info = Info::from(
            dev.chip_info()
                .map_err(|e| Error::Uapi(UapiCall::GetChipInfo, e))?,
        );
        let names = (0..info.num_lines)
            .map(|offset| {
                dev.line_name(offset)
                    .map(|name| String::from(&name))
                    .map_err(|e| Error::Uapi(UapiCall::GetLineName, e))
            })
            .collect::<Result<Vec<String>>>()?;
        debug!(chip = %info.name, num_lines = info.num_lines, "chip opened");
        Ok(Chip {
            path: None,
            info,
            dev: Box::new(dev),
            lines: Registry::new(names),
        })
    }

    /// Close the chip.
    ///
    /// Equivalent to dropping the chip.
    /// Any watches on its lines are removed by the kernel when the descriptor
    /// is closed.
    pub fn close(self) {
        debug!(chip = %self.info.name, "chip closed");
    }

    /// Get the information for the chip.
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Return the name of the chip.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Return the path of the chip, if it was opened from a path.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The number of lines on the chip.
    pub fn num_lines(&self) -> u32 {
        self.info.num_lines
    }

    pub(crate) fn device(&self) -> &dyn Device {
        self.dev.as_ref()
    }

    /// Get the handle for a line on the chip.
    pub fn line(&self, offset: Offset) -> Result<Line<'_>> {
        if offset as usize >= self.lines.len() {
            return Err(Error::InvalidArgument(format!(
                "offset {} is out of range for chip {} with {} lines",
                offset, self.info.name, self.info.num_lines
            )));
        }
        Ok(Line::new(self, offset))
    }

    /// An iterator over the handles of all the lines on the chip.
    pub fn lines(&self) -> impl Iterator<Item = Line<'_>> + '_ {
        (0..self.num_lines()).map(move |offset| Line::new(self, offset))
    }

    /// Find the handle of the named line.
    ///
    /// Returns the first matching line.
    pub fn find_line(&self, name: &str) -> Option<Line<'_>> {
        self.lines().find(|l| !name.is_empty() && l.name() == name)
    }

    /// Get the handle for a line, and start watching it.
    pub fn watched_line(&self, offset: Offset) -> Result<Line<'_>> {
        let line = self.line(offset)?;
        line.watch()?;
        Ok(line)
    }

    /// Get the handles for a set of lines, and start watching them.
    ///
    /// Either all the lines are watched, or none are - any lines watched
    /// before a failure are unwatched.
    pub fn watched_lines(&self, offsets: &[Offset]) -> Result<Vec<Line<'_>>> {
        let lines = offsets
            .iter()
            .map(|offset| self.line(*offset))
            .collect::<Result<Vec<Line>>>()?;
        for (i, line) in lines.iter().enumerate() {
            if let Err(e) = line.watch() {
                for watched in &lines[..i] {
                    if let Err(ue) = watched.unwatch() {
                        warn!(offset = watched.offset(), "rollback of watch failed: {}", ue);
                    }
                }
                return Err(e);
            }
        }
        Ok(lines)
    }

    /// Start watching a line for changes to its request state.
    ///
    /// Equivalent to [`Line::watch`].
    pub fn watch_line(&self, offset: Offset) -> Result<()> {
        self.line(offset)?.watch()
    }

    /// Stop watching a line.
    ///
    /// Equivalent to [`Line::unwatch`].
    pub fn unwatch_line(&self, offset: Offset) -> Result<()> {
        self.line(offset)?.unwatch()
    }

    /// The descriptor to poll for watch events.
    ///
    /// The descriptor is readable exactly when a watch event is available to read,
    /// or when the chip has been closed.
    pub fn watch_fd(&self) -> BorrowedFd<'_> {
        self.dev.as_fd()
    }

    /// Check if the chip has at least one watch event available to read.
    pub fn has_watch_event(&self) -> Result<bool> {
        uapi::has_event(self.dev.as_fd()).map_err(|e| Error::Uapi(UapiCall::HasEvent, e))
    }

    /// Wait for a watch event to be available.
    ///
    /// Returns true if an event is available, or false if the timeout
    /// expired first. A zero timeout does not block.
    pub fn wait_watch_event(&self, timeout: Duration) -> Result<bool> {
        uapi::wait_event(self.dev.as_fd(), timeout)
            .map_err(|e| Error::Uapi(UapiCall::WaitEvent, e))
    }

    /// Read a single watch event from the chip.
    ///
    /// Will block until an event is available.
    pub fn read_watch_event(&self) -> Result<WatchEvent<'_>> {
        let mut buf = [0_u8; RECORD_SIZE];
        let n = self.read_records(&mut buf)?;
        self.event_from_slice(&buf[..n])
            .map_err(|c| self.corrupted(0, c))
    }

    /// Read up to `max` watch events from the chip, appending them to `events`.
    ///
    /// Will block until at least one event is available, but does not block
    /// waiting for further events once one has been read.
    ///
    /// Returns the number of events read.
    ///
    /// At most [`MAX_BATCH_SIZE`] events are read, regardless of `max`.
    ///
    /// If a corrupted record is read then the valid events preceding it are
    /// still appended, and their count is reported in the [`Corrupted`] error.
    ///
    /// [`Corrupted`]: Error::Corrupted
    pub fn read_watch_events<'a>(
        &'a self,
        events: &mut Vec<WatchEvent<'a>>,
        max: usize,
    ) -> Result<usize> {
        if max == 0 {
            return Err(Error::InvalidArgument(
                "number of events to read must be non-zero".into(),
            ));
        }
        let mut buf = vec![0_u8; max.min(MAX_BATCH_SIZE) * RECORD_SIZE];
        let n = self.read_records(&mut buf)?;
        let mut count = 0;
        for rec in buf[..n].chunks(RECORD_SIZE) {
            match self.event_from_slice(rec) {
                Ok(evt) => events.push(evt),
                Err(c) => return Err(self.corrupted(count, c)),
            }
            count += 1;
        }
        trace!(chip = %self.info.name, count, "read watch events");
        Ok(count)
    }

    /// Create a buffer for reading watch events in bulk.
    ///
    /// * `capacity` - The number of events that can be buffered,
    ///   clamped to [`MAX_BATCH_SIZE`].
    pub fn new_watch_event_buffer(&self, capacity: usize) -> WatchEventBuffer<'_> {
        WatchEventBuffer::new(self, capacity)
    }

    /// An iterator for watch events from the chip.
    ///
    /// Blocks until events are available, and ends when the chip is closed.
    pub fn watch_events(&self) -> WatchEventBuffer<'_> {
        self.new_watch_event_buffer(1)
    }

    // Read raw records into the buffer, mapping the end of the stream to Closed.
    pub(crate) fn read_records(&self, buf: &mut [u8]) -> Result<usize> {
        match self.dev.read_records(buf) {
            Ok(0) => Err(Error::Closed),
            Ok(n) => Ok(n),
            Err(e) => Err(Error::Uapi(UapiCall::ReadEvent, e)),
        }
    }

    // Decode a single record and resolve its line.
    pub(crate) fn event_from_slice(&self, d: &[u8]) -> std::result::Result<WatchEvent<'_>, Corruption> {
        let rec = WatchEventRecord::from_slice(d).map_err(|e| match e {
            uapi::Error::UnderRead(_) => Corruption::Truncated(d.len()),
            uapi::Error::Validation(e) => Corruption::InvalidField(e),
            e => Corruption::InvalidField(uapi::ValidationError::new("record", e.to_string())),
        })?;
        if rec.offset >= self.info.num_lines {
            return Err(Corruption::OffsetOutOfRange(rec.offset, self.info.num_lines));
        }
        let kind = rec.kind.into();
        self.lines.observe(rec.offset as usize, kind);
        Ok(WatchEvent {
            kind,
            timestamp_ns: rec.timestamp_ns,
            line: Line::new(self, rec.offset),
        })
    }

    pub(crate) fn corrupted(&self, count: usize, c: Corruption) -> Error {
        warn!(chip = %self.info.name, count, "corrupted watch event: {}", c);
        Error::Corrupted(count, c)
    }
}

impl AsFd for Chip {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.dev.as_fd()
    }
}

impl AsRawFd for Chip {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.dev.as_fd().as_raw_fd()
    }
}

impl AsRef<Chip> for Chip {
    #[inline]
    fn as_ref(&self) -> &Chip {
        self
    }
}

/// The publicly available information for a GPIO chip.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct Info {
    /// The system name for the chip, such as "*gpiochip0*".
    pub name: String,

    /// A functional name for the chip.
    ///
    /// This typically identifies the type of GPIO chip.
    pub label: String,

    /// The number of lines provided by the chip.
    pub num_lines: u32,
}

impl From<uapi::ChipInfo> for Info {
    fn from(ci: uapi::ChipInfo) -> Self {
        Info {
            name: String::from(&ci.name),
            label: String::from(&ci.label),
            num_lines: ci.num_lines,
        }
    }
}

/// Reasons a file cannot be opened as a GPIO character device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// File does not exist.
    NotFound,

    /// File is not a character device.
    NotCharacterDevice,

    /// File is not a GPIO character device.
    NotGpioDevice,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::NotFound => "does not exist",
            ErrorKind::NotCharacterDevice => "is not a character device",
            ErrorKind::NotGpioDevice => "is not a GPIO character device",
        };
        write!(f, "{}", msg)
    }
}
