// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A thin but safe Rust layer for watching GPIO line state changes on Linux.
//!
//! Provides the primitives the watch subsystem is built upon:
//!  - readiness and raw reads on the chip descriptor,
//!  - the fixed layout watch event record,
//!  - the [`Device`] seam, and the [`Cdev`] GPIO character device implementation.

pub(crate) mod common;

pub use common::{
    has_event, read_event, wait_event, ChipInfo, Error, Name, Offset, Result, UnderReadError,
    ValidationError, NAME_MAX,
};

mod cdev;
pub use cdev::{Cdev, LineInfo};

mod device;
pub use device::{ControlOp, Device};

mod record;
pub use record::{WatchEventKind, WatchEventRecord, RECORD_SIZE};
