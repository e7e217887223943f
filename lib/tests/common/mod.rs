// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use gpiowatch::Chip;
use gpiowatch_sim::Simpleton;
use gpiowatch_uapi::{Offset, RECORD_SIZE};
use std::time::Duration;

// long enough that a test will not fail on a loaded machine,
// but only ever waited out when a test is failing
pub const EVENT_WAIT: Duration = Duration::from_secs(1);

// for waits that are expected to time out
pub const IDLE_WAIT: Duration = Duration::from_millis(20);

pub fn new_chip(s: &Simpleton) -> Chip {
    Chip::from_device(s.open().unwrap()).unwrap()
}

// A raw record, as written by the kernel, with an arbitrary kind.
pub fn raw_record(kind: u32, timestamp_ns: u64, offset: Offset) -> [u8; RECORD_SIZE] {
    let mut d = [0_u8; RECORD_SIZE];
    d[0..4].copy_from_slice(&kind.to_ne_bytes());
    d[8..16].copy_from_slice(&timestamp_ns.to_ne_bytes());
    d[16..20].copy_from_slice(&offset.to_ne_bytes());
    d
}
