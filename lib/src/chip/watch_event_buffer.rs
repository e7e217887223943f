// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Chip, MAX_BATCH_SIZE};
use crate::line::WatchEvent;
use crate::{Error, Result};
use gpiowatch_uapi::RECORD_SIZE;
use std::time::Duration;

/// A user space buffer for reading watch events in bulk from a [`Chip`].
///
/// Reads watch events from the kernel in bulk, where possible, while providing them
/// serially to the caller.
///
/// As an iterator the buffer ends when the chip is closed.
pub struct WatchEventBuffer<'a> {
    chip: &'a Chip,

    /// The number of bytes currently written into the buffer
    filled: usize,

    /// The number of bytes currently read from the buffer.
    read: usize,

    /// The buffer for raw watch event records, sized by record size and capacity
    buf: Vec<u8>,
}

impl<'a> WatchEventBuffer<'a> {
    pub(super) fn new(chip: &'a Chip, capacity: usize) -> WatchEventBuffer<'a> {
        WatchEventBuffer {
            chip,
            filled: 0,
            read: 0,
            buf: vec![0; capacity.clamp(1, MAX_BATCH_SIZE) * RECORD_SIZE],
        }
    }

    /// The number of events that can be stored in the buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len() / RECORD_SIZE
    }

    /// The number of unread events currently stored in this buffer.
    ///
    /// This does not include events which may be queued in the kernel.
    pub fn len(&self) -> usize {
        // a trailing partial record counts, as it is reported when read
        (self.filled - self.read + RECORD_SIZE - 1) / RECORD_SIZE
    }

    /// Returns true if there are no unread events in the buffer.
    ///
    /// This does not check whether events are available in the kernel,
    /// only if there are events currently stored in this buffer.
    pub fn is_empty(&self) -> bool {
        self.read >= self.filled
    }

    /// Returns true when either the buffer, or the chip, has watch events available to read.
    pub fn has_event(&self) -> Result<bool> {
        if self.read < self.filled {
            return Ok(true);
        }
        self.chip.has_watch_event()
    }

    /// Returns the next event from the buffer.
    ///
    /// If the buffer is empty then events are read from the chip, which may block if no
    /// events are available. To avoid blocking, check [`has_event`] first, or use
    /// [`wait_event`] with a suitable timeout.
    ///
    /// [`has_event`]: #method.has_event
    /// [`wait_event`]: #method.wait_event
    pub fn read_event(&mut self) -> Result<WatchEvent<'a>> {
        if self.read >= self.filled {
            self.read = 0;
            self.filled = 0;
            self.filled = self.chip.read_records(&mut self.buf)?;
        }
        let start = self.read;
        let end = (start + RECORD_SIZE).min(self.filled);
        let res = self.chip.event_from_slice(&self.buf[start..end]);
        match res {
            Ok(evt) => {
                self.read = end;
                Ok(evt)
            }
            Err(c) => {
                // the remainder of the read cannot be trusted
                self.read = self.filled;
                Err(self.chip.corrupted(0, c))
            }
        }
    }

    /// Wait for a watch event to be available, and return it.
    ///
    /// Returns None if the timeout expired before an event became available.
    ///
    /// * `timeout` - The maximum time to wait for an event.
    pub fn wait_event(&mut self, timeout: Duration) -> Result<Option<WatchEvent<'a>>> {
        if self.is_empty() && !self.chip.wait_watch_event(timeout)? {
            return Ok(None);
        }
        self.read_event().map(Some)
    }
}

impl<'a> Iterator for WatchEventBuffer<'a> {
    type Item = Result<WatchEvent<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_event() {
            Err(Error::Closed) => None,
            res => Some(res),
        }
    }
}
