// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::chip::{Chip, WatchEventBuffer};
use crate::line::WatchEvent;
use crate::Result;
use async_io::Async;
use futures::task::{Context, Poll};
use futures::{ready, Stream};
use std::pin::Pin;

/// Async wrapper around [`Chip`] for the async-io reactor.
///
/// The chip descriptor is switched to non-blocking mode by the reactor.
///
/// # Example
///  ```no_run
/// # use gpiowatch::Result;
/// use gpiowatch::Chip;
/// use gpiowatch::async_io::AsyncChip;
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
pub struct AsyncChip(Async<Chip>);

impl AsyncChip {
    /// Create an async-io wrapper for a Chip.
    pub fn new(chip: Chip) -> Result<Self> {
        Ok(AsyncChip(Async::new(chip)?))
    }

    /// Async form of [`Chip::read_watch_event`].
    pub async fn read_watch_event(&self) -> Result<WatchEvent<'_>> {
        loop {
            self.0.readable().await?;
            let chip = self.0.get_ref();
            if chip.has_watch_event()? {
                return chip.read_watch_event();
            }
        }
    }

    /// Async form of [`Chip::read_watch_events`].
    pub async fn read_watch_events<'a>(
        &'a self,
        events: &mut Vec<WatchEvent<'a>>,
        max: usize,
    ) -> Result<usize> {
        loop {
            self.0.readable().await?;
            let chip = self.0.get_ref();
            if chip.has_watch_event()? {
                return chip.read_watch_events(events, max);
            }
        }
    }

    /// Async form of [`Chip::watch_events`].
    ///
    /// # Example
    /// ```no_run
    /// # use gpiowatch::Result;
    /// # use gpiowatch::Chip;
    /// use gpiowatch::async_io::AsyncChip;
    /// use futures::StreamExt;
    ///
    /// # async fn docfn() -> Result<()> {
    /// let chip = Chip::from_path("/dev/gpiochip0")?;
    /// chip.watch_line(3)?;
    /// let achip = AsyncChip::new(chip)?;
    /// let mut events = achip.watch_events();
    /// while let Some(evt) = events.next().await {
    ///     let evt = evt?;
    ///     // process event...
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn watch_events(&self) -> WatchEventStream<'_> {
        WatchEventStream {
            chip: self,
            events: self.0.get_ref().watch_events(),
        }
    }

    /// Return the wrapped Chip.
    pub fn into_inner(self) -> Result<Chip> {
        Ok(self.0.into_inner()?)
    }
}

impl AsRef<Chip> for AsyncChip {
    fn as_ref(&self) -> &Chip {
        self.0.get_ref()
    }
}

/// Async form of [`WatchEventBuffer`] in its role as an iterator.
///
/// Created by [`AsyncChip::watch_events`].
pub struct WatchEventStream<'a> {
    chip: &'a AsyncChip,
    events: WatchEventBuffer<'a>,
}

impl<'a> Stream for WatchEventStream<'a> {
    type Item = Result<WatchEvent<'a>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let chip = self.chip;
        loop {
            if self.events.has_event()? {
                return Poll::Ready(self.events.next());
            }
            ready!(chip.0.poll_readable(cx))?;
        }
    }
}
