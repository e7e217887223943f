// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::Context;
use gpiowatch::tokio::AsyncChip;
use gpiowatch::Chip;
use std::result::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let chip = Chip::from_path("/dev/gpiochip0")?;
    chip.watch_line(23).context("Failed to watch line")?;
    let chip = AsyncChip::new(chip)?;
    loop {
        let event = chip.read_watch_event().await?;
        println!("{:?} requested: {}", event, event.line.is_requested());
    }
}
