// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::chip::{Chip, WatchEventBuffer};
use crate::line::WatchEvent;
use crate::Result;
use futures::ready;
use futures::task::{Context, Poll};
use std::pin::Pin;
use tokio::io::unix::AsyncFd;
use tokio_stream::Stream;

/// Async wrapper around [`Chip`] for the tokio reactor.
///
/// # Example
///  ```no_run
/// # use gpiowatch::Result;
/// use gpiowatch::Chip;
/// use gpiowatch::tokio::AsyncChip;
///
/// # async fn docfn() -> Result<()> {
/// let chip = Chip::from_path("/dev/gpiochip0")?;
/// chip.watch_line(3)?;
/// let achip = AsyncChip::new(chip)?;
/// let evt = achip.read_watch_event().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AsyncChip(AsyncFd<Chip>);

impl AsyncChip {
    /// Create a Tokio wrapper for a Chip.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(chip: Chip) -> Result<Self> {
        Ok(AsyncChip(AsyncFd::new(chip)?))
    }

    /// Async form of [`Chip::read_watch_event`].
    pub async fn read_watch_event(&self) -> Result<WatchEvent<'_>> {
        loop {
            let mut guard = self.0.readable().await?;
            let chip = self.0.get_ref();
            if chip.has_watch_event()? {
                let res = chip.read_watch_event();
                if !chip.has_watch_event()? {
                    guard.clear_ready();
                }
                return res;
            }
            guard.clear_ready();
        }
    }

    /// Async form of [`Chip::read_watch_events`].
    pub async fn read_watch_events<'a>(
        &'a self,
        events: &mut Vec<WatchEvent<'a>>,
        max: usize,
    ) -> Result<usize> {
        loop {
            let mut guard = self.0.readable().await?;
            let chip = self.0.get_ref();
            if chip.has_watch_event()? {
                let res = chip.read_watch_events(events, max);
                if !chip.has_watch_event()? {
                    guard.clear_ready();
                }
                return res;
            }
            guard.clear_ready();
        }
    }

    /// Async form of [`Chip::new_watch_event_buffer`].
    ///
    /// * `capacity` - The number of events that can be buffered in user space.
    pub fn new_watch_event_stream(&self, capacity: usize) -> WatchEventStream<'_> {
        WatchEventStream {
            chip: self,
            events: self.0.get_ref().new_watch_event_buffer(capacity),
        }
    }

    /// Async form of [`Chip::watch_events`].
    pub fn watch_events(&self) -> WatchEventStream<'_> {
        WatchEventStream {
            chip: self,
            events: self.0.get_ref().watch_events(),
        }
    }

    /// Return the wrapped Chip.
    pub fn into_inner(self) -> Chip {
        self.0.into_inner()
    }
}

impl AsRef<Chip> for AsyncChip {
    fn as_ref(&self) -> &Chip {
        self.0.get_ref()
    }
}

/// Async form of [`WatchEventBuffer`] in its role as an iterator.
///
/// The stream ends when the chip is closed.
pub struct WatchEventStream<'a> {
    chip: &'a AsyncChip,
    events: WatchEventBuffer<'a>,
}

impl<'a> Stream for WatchEventStream<'a> {
    type Item = Result<WatchEvent<'a>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let chip = self.chip;
        loop {
            if !self.events.is_empty() {
                return Poll::Ready(self.events.next());
            }
            let mut guard = ready!(chip.0.poll_read_ready(cx))?;
            if self.events.has_event()? {
                let res = self.events.next();
                if !self.events.has_event()? {
                    guard.clear_ready();
                }
                return Poll::Ready(res);
            }
            guard.clear_ready();
        }
    }
}
