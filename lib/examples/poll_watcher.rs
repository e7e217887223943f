// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Watch lines on several chips from a single thread, using mio to wait on
// all the chips at once.

use anyhow::Context;
use gpiowatch::Chip;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::os::unix::io::AsRawFd;
use std::result::Result;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let chips = [
        Chip::from_path("/dev/gpiochip0")?,
        Chip::from_path("/dev/gpiochip1")?,
    ];
    let mut poll = Poll::new()?;
    for (idx, chip) in chips.iter().enumerate() {
        chip.watch_line(4)
            .with_context(|| format!("Failed to watch line on {}", chip.name()))?;
        poll.registry().register(
            &mut SourceFd(&chip.as_raw_fd()),
            Token(idx),
            Interest::READABLE,
        )?;
    }
    let mut events = Events::with_capacity(chips.len());
    let mut buf = Vec::new();
    loop {
        poll.poll(&mut events, None)?;
        for event in events.iter() {
            let chip = &chips[event.token().0];
            // drain, as mio readiness is edge triggered
            while chip.has_watch_event()? {
                buf.clear();
                chip.read_watch_events(&mut buf, 16)?;
                for evt in &buf {
                    println!("{} {} {}", chip.name(), evt.line.offset(), evt.kind);
                }
            }
        }
    }
}
