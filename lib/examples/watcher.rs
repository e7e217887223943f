// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::Context;
use gpiowatch::Chip;
use std::result::Result;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let chip = Chip::from_path("/dev/gpiochip0")?;
    chip.watched_lines(&[22, 23])
        .context("Failed to watch lines")?;

    /* loop version
    let mut buf = chip.new_watch_event_buffer(4);
    loop {
        println!("{:?}", buf.read_event()?);
    }
    */
    for event in chip.watch_events() {
        let event = event?;
        println!(
            "{} {} {}",
            event.timestamp_ns,
            event.line.offset(),
            event.kind
        );
    }
    Ok(())
}
