// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for simulating GPIO chips, and the external actors using their lines,
//! for testing line state watchers.
//!
//! Simulators can be built using the [`Builder`].
//!
//! For simple tests that only require one chip with unnamed lines the
//! [`Simpleton`] provides a simplified interface.
//!
//! Each [`open`] of a simulated chip returns a [`SimDevice`], which is a
//! [`Device`] with its own set of watched lines and its own event queue.
//! The queue is backed by a pipe, so the device descriptor may be polled
//! like that of a real chip.
//!
//! The simulator runs entirely in process, so requires no special permissions.
//!
//! [`Builder`]: fn.builder.html
//! [`Simpleton`]: struct.Simpleton.html
//! [`open`]: Chip::open

use gpiowatch_uapi::{
    read_event, ChipInfo, ControlOp, Device, Name, Offset, WatchEventKind, WatchEventRecord,
};
use nohash_hasher::IntMap;
use parking_lot::Mutex;
use std::env;
use std::fs::File;
use std::io::Write;
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, FromRawFd};
use std::path::Path;
use std::process;
use std::sync::{Arc, Weak};

#[macro_use]
extern crate global_counter;

/// A live simulator of one or more chips.
#[derive(Debug)]
pub struct Sim {
    /// The name of the simulator.
    name: String,

    /// The chips being simulated.
    chips: Vec<Chip>,
}

impl Sim {
    /// The chips being simulated.
    pub fn chips(&self) -> &[Chip] {
        self.chips.as_slice()
    }

    /// The name of the simulator.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A live simulated chip.
///
/// Dropping the chip closes the event queues of all devices opened on it.
#[derive(Debug)]
pub struct Chip {
    /// The name of the simulated chip.
    pub chip_name: String,

    /// The configuration for the chip.
    pub cfg: Bank,

    shared: Arc<Shared>,
}

impl Chip {
    /// Open the chip, as a process opening the chip device would.
    ///
    /// Each device has its own set of watched lines and its own event queue.
    pub fn open(&self) -> Result<SimDevice> {
        let (rx, tx) = pipe()?;
        let watched = Arc::new(Mutex::new(vec![false; self.cfg.num_lines as usize]));
        self.shared.state.lock().watchers.push(Watcher {
            tx,
            watched: Arc::downgrade(&watched),
        });
        let names = (0..self.cfg.num_lines)
            .map(|offset| match self.cfg.names.get(&offset) {
                Some(name) => Name::from(name.as_str()),
                None => Name::default(),
            })
            .collect();
        Ok(SimDevice {
            rx,
            watched,
            chip: Arc::downgrade(&self.shared),
            info: self.shared.info.clone(),
            names,
        })
    }

    /// Request a line, as an external actor would.
    ///
    /// Devices watching the line are sent a requested event.
    pub fn request(&self, offset: Offset) -> Result<()> {
        self.shared.transition(offset, ControlOp::Request)
    }

    /// Reconfigure a requested line, as an external actor would.
    ///
    /// Devices watching the line are sent a config changed event.
    pub fn reconfigure(&self, offset: Offset) -> Result<()> {
        self.shared.transition(offset, ControlOp::Reconfigure)
    }

    /// Release a requested line, as an external actor would.
    ///
    /// Devices watching the line are sent a released event.
    pub fn release(&self, offset: Offset) -> Result<()> {
        self.shared.transition(offset, ControlOp::Release)
    }

    /// Check if a line is currently requested.
    pub fn is_requested(&self, offset: Offset) -> Result<bool> {
        let idx = self.shared.index(offset)?;
        Ok(self.shared.state.lock().requested[idx])
    }

    /// Write raw data to the event queue of every open device.
    ///
    /// Used to simulate a corrupted event stream.
    pub fn inject(&self, data: &[u8]) {
        self.shared.state.lock().emit(None, data);
    }

    /// The number of events dropped as device queues were full.
    pub fn dropped(&self) -> u64 {
        self.shared.state.lock().dropped
    }

    /// The configuration of the chip.
    pub fn config(&self) -> &Bank {
        &self.cfg
    }
}

#[derive(Debug)]
struct Shared {
    info: ChipInfo,
    state: Mutex<State>,
}

impl Shared {
    fn index(&self, offset: Offset) -> Result<usize> {
        if offset >= self.info.num_lines {
            return Err(Error::InvalidOffset(offset));
        }
        Ok(offset as usize)
    }

    fn transition(&self, offset: Offset, op: ControlOp) -> Result<()> {
        let idx = self.index(offset)?;
        let mut state = self.state.lock();
        let kind = match op {
            ControlOp::Request => {
                if state.requested[idx] {
                    return Err(Error::Busy(offset));
                }
                state.requested[idx] = true;
                WatchEventKind::Requested
            }
            ControlOp::Reconfigure => {
                if !state.requested[idx] {
                    return Err(Error::NotRequested(offset));
                }
                WatchEventKind::ConfigChanged
            }
            ControlOp::Release => {
                if !state.requested[idx] {
                    return Err(Error::NotRequested(offset));
                }
                state.requested[idx] = false;
                WatchEventKind::Released
            }
            op => return Err(Error::UnsupportedOp(op)),
        };
        let rec = WatchEventRecord {
            kind,
            timestamp_ns: monotonic_ns(),
            offset,
        };
        state.emit(Some(offset), &rec.to_bytes());
        Ok(())
    }
}

#[derive(Debug)]
struct State {
    requested: Vec<bool>,
    watchers: Vec<Watcher>,
    dropped: u64,
}

impl State {
    // Write to the queue of every device watching the line, or to all devices
    // if no line is specified.
    fn emit(&mut self, offset: Option<Offset>, data: &[u8]) {
        self.watchers.retain(|w| w.watched.strong_count() > 0);
        let mut dropped = 0;
        for w in &self.watchers {
            let watching = match offset {
                Some(offset) => w
                    .watched
                    .upgrade()
                    .map_or(false, |ws| ws.lock()[offset as usize]),
                None => true,
            };
            // the queue is non-blocking, so a full queue drops the event,
            // including one only partly written.
            if watching && (&w.tx).write_all(data).is_err() {
                dropped += 1;
            }
        }
        self.dropped += dropped;
    }
}

type WatchSet = Mutex<Vec<bool>>;

#[derive(Debug)]
struct Watcher {
    tx: File,
    watched: Weak<WatchSet>,
}

/// A simulated chip, opened as a [`Device`].
#[derive(Debug)]
pub struct SimDevice {
    rx: File,
    watched: Arc<WatchSet>,
    chip: Weak<Shared>,
    info: ChipInfo,
    names: Vec<Name>,
}

impl SimDevice {
    fn index(&self, offset: Offset) -> gpiowatch_uapi::Result<usize> {
        if offset >= self.info.num_lines {
            return Err(gpiowatch_uapi::Error::from_errno(libc::EINVAL));
        }
        Ok(offset as usize)
    }
}

impl AsFd for SimDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }
}

impl Device for SimDevice {
    fn chip_info(&self) -> gpiowatch_uapi::Result<ChipInfo> {
        Ok(self.info.clone())
    }

    fn line_name(&self, offset: Offset) -> gpiowatch_uapi::Result<Name> {
        let idx = self.index(offset)?;
        Ok(self.names[idx].clone())
    }

    fn control(&self, offset: Offset, op: ControlOp) -> gpiowatch_uapi::Result<()> {
        let idx = self.index(offset)?;
        match op {
            ControlOp::Watch | ControlOp::Unwatch => {
                let mut watched = self.watched.lock();
                if watched[idx] == (op == ControlOp::Watch) {
                    return Err(gpiowatch_uapi::Error::from_errno(libc::EBUSY));
                }
                watched[idx] = op == ControlOp::Watch;
                Ok(())
            }
            op => {
                let chip = self
                    .chip
                    .upgrade()
                    .ok_or_else(|| gpiowatch_uapi::Error::from_errno(libc::ENODEV))?;
                chip.transition(offset, op)
                    .map_err(|e| gpiowatch_uapi::Error::from_errno(e.errno()))
            }
        }
    }

    fn read_records(&self, buf: &mut [u8]) -> gpiowatch_uapi::Result<usize> {
        read_event(self.rx.as_fd(), buf)
    }
}

/// Start building a GPIO simulator.
pub fn builder() -> Builder {
    Builder::default()
}

/// Build a basic single bank sim and take it live.
///
/// This is sufficient for tests that do not require named lines, hogged lines
/// or multiple chips.
pub fn simpleton(num_lines: u32) -> Simpleton {
    Simpleton::new(num_lines)
}

/// A basic single bank/chip sim.
///
/// This is sufficient for tests that do not require named lines, hogged lines
/// or multiple chips.
#[derive(Debug)]
pub struct Simpleton(Sim);

impl Simpleton {
    /// Create a live simulator with one chip with the given number of lines.
    pub fn new(num_lines: u32) -> Self {
        Simpleton(
            builder()
                .with_bank(&Bank::new(num_lines, "simpleton"))
                .live()
                .expect("simpleton config should be valid"),
        )
    }

    /// Return the only chip simulated by the Simpleton.
    pub fn chip(&self) -> &Chip {
        &self.0.chips[0]
    }

    /// The configuration of the chip.
    pub fn config(&self) -> &Bank {
        self.chip().config()
    }

    /// Open the chip.
    pub fn open(&self) -> Result<SimDevice> {
        self.chip().open()
    }

    /// Request a line, as an external actor would.
    pub fn request(&self, offset: Offset) -> Result<()> {
        self.chip().request(offset)
    }

    /// Reconfigure a requested line, as an external actor would.
    pub fn reconfigure(&self, offset: Offset) -> Result<()> {
        self.chip().reconfigure(offset)
    }

    /// Release a requested line, as an external actor would.
    pub fn release(&self, offset: Offset) -> Result<()> {
        self.chip().release(offset)
    }

    /// Write raw data to the event queue of every open device.
    pub fn inject(&self, data: &[u8]) {
        self.chip().inject(data)
    }
}

/// A builder of simulators.
///
/// Collects the configuration for the simulator, and then creates
/// the simulator when taken live.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Builder {
    /// The name for the simulator.
    ///
    /// If None when [`live`] is called then a unique name is generated.
    ///
    /// [`live`]: Builder::live
    pub name: Option<String>,

    /// The details of the banks to be simulated.
    ///
    /// Each bank becomes a chip when the simulator goes live.
    pub banks: Vec<Bank>,
}

impl Builder {
    /// A convenience function to add a bank to the configuration.
    pub fn with_bank(&mut self, bank: &Bank) -> &mut Self {
        self.banks.push(bank.clone());
        self
    }

    /// A convenience function to specify the name for the simulator.
    pub fn with_name<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Take the builder config live and return the created simulator.
    ///
    /// If no name has been provided for the builder then one is generated
    /// in the format `<app>-p<pid>-<N>` where:
    ///  - the app name is drawn from `argv[0]` of the executable
    ///  - pid is the process id
    ///  - N is a counter of sims taken live by this process, starting at 0
    ///
    /// The chips are named `<sim name>-<bank index>`.
    pub fn live(&mut self) -> Result<Sim> {
        let name = match &self.name {
            Some(n) => n.clone(),
            None => default_name(),
        };
        let mut chips = Vec::new();
        for (i, b) in self.banks.iter().enumerate() {
            b.validate()?;
            let chip_name = format!("{}-{}", name, i);
            let mut requested = vec![false; b.num_lines as usize];
            for offset in b.hogs.keys() {
                requested[*offset as usize] = true;
            }
            let info = ChipInfo {
                name: Name::from(chip_name.as_str()),
                label: Name::from(b.label.as_str()),
                num_lines: b.num_lines,
            };
            chips.push(Chip {
                chip_name,
                cfg: b.clone(),
                shared: Arc::new(Shared {
                    info,
                    state: Mutex::new(State {
                        requested,
                        watchers: Vec::new(),
                        dropped: 0,
                    }),
                }),
            });
        }
        Ok(Sim { name, chips })
    }
}

/// The configuration for a single simulated chip.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Bank {
    /// The number of lines simulated by this bank.
    pub num_lines: u32,

    /// The label of the chip.
    pub label: String,

    /// Lines assigned a name.
    pub names: IntMap<Offset, String>,

    /// Lines that are already requested by some other entity, keyed by offset
    /// with the name of the consumer.
    pub hogs: IntMap<Offset, String>,
}

impl Bank {
    /// Basic constructor.
    pub fn new<N: Into<String>>(num_lines: u32, label: N) -> Bank {
        Bank {
            num_lines,
            label: label.into(),
            names: IntMap::default(),
            hogs: IntMap::default(),
        }
    }

    /// Assign a name to a line on the chip.
    pub fn name<N: Into<String>>(&mut self, offset: Offset, name: N) -> &mut Self {
        self.names.insert(offset, name.into());
        self
    }

    /// Remove the name from a line.
    pub fn unname(&mut self, offset: Offset) -> &mut Self {
        self.names.remove(&offset);
        self
    }

    /// Add a hog on a line on the chip.
    ///
    /// The line starts out requested, so the first event it can
    /// generate is a release.
    pub fn hog<N: Into<String>>(&mut self, offset: Offset, consumer: N) -> &mut Self {
        self.hogs.insert(offset, consumer.into());
        self
    }

    /// Unhog a line on the chip.
    pub fn unhog(&mut self, offset: Offset) -> &mut Self {
        self.hogs.remove(&offset);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.num_lines == 0 {
            return Err(Error::InvalidConfig(format!(
                "bank '{}' has no lines",
                self.label
            )));
        }
        for offset in self.names.keys().chain(self.hogs.keys()) {
            if *offset >= self.num_lines {
                return Err(Error::InvalidConfig(format!(
                    "offset {} is out of range on bank '{}'",
                    offset, self.label
                )));
            }
        }
        Ok(())
    }
}

/// Create a unique, but predictable, name for the simulator.
///
/// The name format is `<app>-p<pid>-<N>[-<instance>]`
/// where:
///   - the app name provided by the caller
///   - pid is the process id
///   - N is a counter of the sims created, starting at 0
///   - instance is optionally provided by the caller
pub fn unique_name(app: &str, instance: Option<&str>) -> String {
    global_counter!(SIM_COUNT, u32, 0);

    let mut name = format!("{}-p{}-{}", app, process::id(), SIM_COUNT.inc_cloning());
    if let Some(i) = instance {
        name += "-";
        name += i;
    }
    name
}

fn app_name() -> String {
    if let Some(app) = env::args_os().next() {
        if let Some(path) = Path::new(app.as_os_str()).file_name() {
            if let Some(app) = path.to_str() {
                return app.into();
            }
        }
    }
    "gpiowatch".into()
}

fn default_name() -> String {
    unique_name(&app_name(), None)
}

// Create the queue for a device.
//
// The read end blocks, as a chip descriptor does, while the write end does not,
// so a full queue drops events rather than stalling the external actor.
fn pipe() -> Result<(File, File)> {
    let mut fds = [0; 2];
    // SAFETY: fds is valid for the two descriptors written by pipe2.
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    // SAFETY: pipe2 succeeded so both descriptors are open and owned by nobody else.
    let (rx, tx) = unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) };
    // SAFETY: tx is a valid open descriptor.
    unsafe {
        let flags = libc::fcntl(tx.as_raw_fd(), libc::F_GETFL);
        if flags < 0 || libc::fcntl(tx.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
    }
    Ok((rx, tx))
}

fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is self-contained.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, std::ptr::addr_of_mut!(ts));
    }
    (ts.tv_sec as u64) * 1_000_000_000 + (ts.tv_nsec as u64)
}

/// The result for [`gpiowatch_sim`] functions.
///
/// [`gpiowatch_sim`]: crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`gpiowatch_sim`] functions.
///
/// [`gpiowatch_sim`]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The offset is not a line on the chip.
    #[error("offset {0} is out of range")]
    InvalidOffset(Offset),

    /// The line is already requested.
    #[error("line {0} is already requested")]
    Busy(Offset),

    /// The line must be requested for the operation.
    #[error("line {0} is not requested")]
    NotRequested(Offset),

    /// The operation is not one performed by an external actor.
    #[error("{0} is not a line transition")]
    UnsupportedOp(ControlOp),

    /// The simulator configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An error detected while creating the simulator.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// The equivalent OS error number, as would be returned by a kernel.
    pub fn errno(&self) -> i32 {
        match self {
            Error::Busy(_) => libc::EBUSY,
            Error::IoError(e) => e.raw_os_error().unwrap_or(libc::EIO),
            _ => libc::EINVAL,
        }
    }
}
