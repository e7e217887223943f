// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{EventKind, LineState, Offset};
use crate::{BusyKind, Error, Result, UapiCall};
use gpiowatch_uapi::{ControlOp, Device};
use parking_lot::Mutex;
use tracing::debug;

/// The table of lines on a chip, and their observation state.
///
/// Each line has its own lock, so operations on different lines never
/// contend, while watch and unwatch on the same line are serialized.
#[derive(Debug)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
}

#[derive(Debug)]
struct Slot {
    name: String,
    state: Mutex<LineState>,
}

impl Registry {
    pub(crate) fn new(names: Vec<String>) -> Registry {
        Registry {
            slots: names
                .into_iter()
                .map(|name| Slot {
                    name,
                    state: Mutex::new(LineState::default()),
                })
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn name(&self, idx: usize) -> &str {
        &self.slots[idx].name
    }

    pub(crate) fn state(&self, idx: usize) -> LineState {
        *self.slots[idx].state.lock()
    }

    pub(crate) fn watch(&self, dev: &dyn Device, offset: Offset) -> Result<()> {
        self.transition(dev, offset, ControlOp::Watch)
    }

    pub(crate) fn unwatch(&self, dev: &dyn Device, offset: Offset) -> Result<()> {
        self.transition(dev, offset, ControlOp::Unwatch)
    }

    // Update the requested state of a line from an event read for it.
    pub(crate) fn observe(&self, idx: usize, kind: EventKind) {
        self.slots[idx].state.lock().requested = kind.is_requested();
    }

    fn transition(&self, dev: &dyn Device, offset: Offset, op: ControlOp) -> Result<()> {
        let watch = op == ControlOp::Watch;
        let (busy, call) = if watch {
            (BusyKind::AlreadyWatched, UapiCall::WatchLine)
        } else {
            (BusyKind::NotWatched, UapiCall::UnwatchLine)
        };
        // held across the control op so racing callers see a consistent state
        let mut state = self.slots[offset as usize].state.lock();
        if state.watched == watch {
            return Err(Error::Busy(offset, busy));
        }
        dev.control(offset, op).map_err(|e| {
            if e.is_busy() {
                Error::Busy(offset, busy)
            } else {
                Error::Uapi(call, e)
            }
        })?;
        state.watched = watch;
        debug!(offset, "line {}", if watch { "watched" } else { "unwatched" });
        Ok(())
    }
}
