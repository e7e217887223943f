// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::Context;
use futures::StreamExt;
use gpiowatch::async_io::AsyncChip;
use gpiowatch::Chip;
use std::result::Result;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    async_io::block_on(async {
        let chip = Chip::from_path("/dev/gpiochip0")?;
        chip.watch_line(23).context("Failed to watch line")?;
        let chip = AsyncChip::new(chip)?;
        let mut events = chip.watch_events();
        while let Some(event) = events.next().await {
            println!("{:?}", event?);
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
