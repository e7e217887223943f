// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{Context, Result};
use clap::Parser;
use gpiowatch::chip::{chips, is_chip};
use std::path::PathBuf;
use std::time::Duration;

// common helper functions

pub fn all_chip_paths() -> Result<Vec<PathBuf>> {
    chips().context("unable to find any chips")
}

fn chip_path_from_id(id: &str) -> PathBuf {
    if id.chars().all(char::is_numeric) {
        // from number
        return format!("/dev/gpiochip{id}").into();
    }
    if !id.chars().any(|x| x == '/') {
        // from name
        let mut p: PathBuf = "/dev".into();
        p.push(id);
        return p;
    }
    // from raw path
    id.into()
}

pub fn chip_lookup_from_id(id: &str) -> Result<PathBuf> {
    is_chip(chip_path_from_id(id))
        .with_context(|| format!("cannot find GPIO chip character device '{id}'"))
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ParseDurationError {
    #[error("'{0}' unknown units - use 's', 'ms' or 'us'.")]
    Units(String),
    #[error("'{0}' must start with a digit")]
    NoDigits(String),
    #[error("'{0}' {1}")]
    ParseDigits(String, std::num::ParseIntError),
}

/// Parse a duration with optional units.
///
/// A bare number is taken as milliseconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, ParseDurationError> {
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let t = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(0) => return Err(ParseDurationError::NoDigits(s.into())),
        Some(n) => {
            let (num, units) = s.split_at(n);
            let t = num
                .parse::<u64>()
                .map_err(|e| ParseDurationError::ParseDigits(num.into(), e))?;
            t * match units {
                "us" => 1000,
                "ms" => 1000000,
                "s" => 1000000000,
                _ => return Err(ParseDurationError::Units(s.into())),
            }
        }
        None => {
            s.parse::<u64>()
                .map_err(|e| ParseDurationError::ParseDigits(s.into(), e))?
                * 1000000
        }
    };
    Ok(Duration::from_nanos(t))
}

// common command line parser options

#[derive(Clone, Copy, Debug, Default, Parser)]
pub struct EmitOpts {
    #[arg(from_global)]
    pub verbose: bool,

    /// Emit output in JSON format
    #[cfg(feature = "json")]
    #[arg(long, group = "emit")]
    pub json: bool,

    /// Quote line names.
    #[arg(long)]
    pub quoted: bool,
}

pub fn emit_error(opts: &EmitOpts, e: &anyhow::Error) {
    let e_str = format_error(opts, e);
    #[cfg(feature = "json")]
    if opts.json {
        println!("{{\"error\":{}}}", serde_json::Value::from(e_str));
        return;
    }
    eprintln!("{e_str}");
}

pub fn format_error(opts: &EmitOpts, e: &anyhow::Error) -> String {
    if opts.verbose {
        format!("{e:#}")
    } else {
        format!("{e}")
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeFmt {
    Seconds,
    Localtime,
    Utc,
}

pub fn format_chip_name(n: &str) -> &str {
    if n.is_empty() {
        "??"
    } else {
        n
    }
}

pub fn format_time(evtime: u64, timefmt: TimeFmt) -> String {
    use chrono::{Local, TimeZone, Utc};

    let ts_sec = (evtime / 1000000000) as i64;
    let ts_nsec = (evtime % 1000000000) as u32;
    let seconds = || format!("{ts_sec}.{ts_nsec:09}");
    match timefmt {
        TimeFmt::Seconds => seconds(),
        TimeFmt::Localtime => match Local.timestamp_opt(ts_sec, ts_nsec).single() {
            Some(t) => format!("{}", t.format("%FT%T%.9f")),
            None => seconds(),
        },
        TimeFmt::Utc => match Utc.timestamp_opt(ts_sec, ts_nsec).single() {
            Some(t) => format!("{}", t.format("%FT%T%.9fZ")),
            None => seconds(),
        },
    }
}

/// Errors returned by cli functions.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum Error {
    #[error("line {0} is repeated")]
    RepeatedLine(u32),

    #[error("offset {0} is out of range on chip '{1}'")]
    OffsetOutOfRange(u32, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chip_path() {
        assert_eq!(chip_path_from_id("3"), PathBuf::from("/dev/gpiochip3"));
        assert_eq!(chip_path_from_id("gpiochip1"), PathBuf::from("/dev/gpiochip1"));
        assert_eq!(chip_path_from_id("/dev/gpiochip0"), PathBuf::from("/dev/gpiochip0"));
        assert_eq!(chip_path_from_id("./bogus"), PathBuf::from("./bogus"));
    }

    #[test]
    fn chip_lookup_nonexistent() {
        let e = chip_lookup_from_id("/dev/gpiochip_nonexistent").unwrap_err();
        assert_eq!(
            e.to_string(),
            "cannot find GPIO chip character device '/dev/gpiochip_nonexistent'"
        );
    }

    #[test]
    fn time() {
        assert_eq!(format_time(0, TimeFmt::Seconds), "0.000000000");
        assert_eq!(
            format_time(1_234_567_890_123_456_789, TimeFmt::Seconds),
            "1234567890.123456789"
        );
        assert_eq!(
            format_time(1_234_567_890_123_456_789, TimeFmt::Utc),
            "2009-02-13T23:31:30.123456789Z"
        );
        assert_eq!(format_time(42, TimeFmt::Utc), "1970-01-01T00:00:00.000000042Z");
    }

    #[test]
    fn chip_name() {
        assert_eq!(format_chip_name(""), "??");
        assert_eq!(format_chip_name("gpiochip0"), "gpiochip0");
    }

    #[test]
    fn error_format() {
        let e = anyhow::Error::new(Error::RepeatedLine(3)).context("bad line list");
        let mut opts = EmitOpts::default();
        assert_eq!(format_error(&opts, &e), "bad line list");
        opts.verbose = true;
        assert_eq!(format_error(&opts, &e), "bad line list: line 3 is repeated");
    }

    mod parse {
        #[test]
        fn duration() {
            use super::{parse_duration, ParseDurationError};
            use std::time::Duration;

            assert_eq!(
                parse_duration("0").expect("duration should be valid"),
                Duration::ZERO
            );
            assert_eq!(
                parse_duration("1").expect("duration should be valid"),
                Duration::from_millis(1)
            );
            assert_eq!(
                parse_duration("2ms").expect("duration should be valid"),
                Duration::from_millis(2)
            );
            assert_eq!(
                parse_duration("3us").expect("duration should be valid"),
                Duration::from_micros(3)
            );
            assert_eq!(
                parse_duration("4s").expect("duration should be valid"),
                Duration::new(4, 0)
            );
            assert_eq!(
                parse_duration("5ns").expect_err("duration should be invalid"),
                ParseDurationError::Units("5ns".to_string())
            );
            assert_eq!(
                parse_duration("bad").expect_err("duration should be invalid"),
                ParseDurationError::NoDigits("bad".to_string())
            );
        }
    }
}
