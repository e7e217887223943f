// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::common::{self, emit_error, EmitOpts, Error, TimeFmt};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use gpiowatch::{Chip, EventKind, Offset, WatchEvent};
use libc::timespec;
#[cfg(feature = "json")]
use serde_derive::Serialize;
use std::io::Write;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(alias("w"))]
pub struct Opts {
    /// The chip hosting the lines.
    ///
    /// The chip may be identified by number, name, or path.
    /// e.g. the following all select the same chip:
    ///     0
    ///     gpiochip0
    ///     /dev/gpiochip0
    #[arg(name = "chip", verbatim_doc_comment)]
    chip: String,

    /// The offsets of the lines to watch.
    #[arg(name = "offset", required = true)]
    offsets: Vec<Offset>,

    /// The longest to wait for events before checking again.
    ///
    /// The period is taken as milliseconds unless otherwise specified.
    #[arg(
        short = 't',
        long,
        name = "period",
        default_value = "10s",
        env = "GPIOWATCH_WAIT_TIMEOUT",
        value_parser = common::parse_duration
    )]
    wait_timeout: Duration,

    /// The maximum number of events to read from the chip at once.
    #[arg(
        short = 'b',
        long,
        name = "events",
        default_value_t = 32,
        value_parser = clap::value_parser!(u16).range(1..=1024)
    )]
    batch_size: u16,

    /// Specify the events to report.
    ///
    /// Default is all events.
    #[arg(short = 'e', long, name = "event")]
    event: Option<Event>,

    /// Exit after the specified number of events.
    ///
    /// If not specified then watching continues indefinitely.
    #[arg(short, long, name = "num")]
    num_events: Option<usize>,

    /// Specify a custom output format.
    ///
    /// Format specifiers:
    ///   %o   GPIO line offset
    ///   %l   GPIO line name
    ///   %c   GPIO chip name
    ///   %e   numeric event type ('1' - requested, '2' - config-changed or '3' - released)
    ///   %E   event type ('requested', 'config-changed' or 'released')
    ///   %S   event timestamp as seconds
    ///   %U   event timestamp as UTC
    ///   %L   event timestamp as local time
    ///   %%   a literal '%'
    #[arg(
        short = 'F',
        long,
        name = "fmt",
        group = "timefmt",
        verbatim_doc_comment
    )]
    format: Option<String>,

    /// Format event timestamps as local time.
    #[arg(long, group = "timefmt")]
    localtime: bool,

    /// Format event timestamps as UTC.
    #[arg(long, group = "timefmt")]
    utc: bool,

    /// Display a banner once the lines are being watched.
    #[arg(long)]
    banner: bool,

    /// Don't generate any output
    #[arg(short = 'q', long, group = "timefmt", alias = "silent")]
    quiet: bool,

    #[command(flatten)]
    emit: EmitOpts,
}

impl Opts {
    fn timefmt(&self) -> TimeFmt {
        if self.localtime {
            TimeFmt::Localtime
        } else if self.utc {
            TimeFmt::Utc
        } else {
            TimeFmt::Seconds
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Event {
    Requested,
    ConfigChanged,
    Released,
}

impl From<Event> for EventKind {
    fn from(e: Event) -> Self {
        match e {
            Event::Requested => EventKind::Requested,
            Event::ConfigChanged => EventKind::ConfigChanged,
            Event::Released => EventKind::Released,
        }
    }
}

pub fn cmd(opts: &Opts) -> bool {
    match do_cmd(opts) {
        Ok(()) => true,
        Err(e) => {
            emit_error(&opts.emit, &e);
            false
        }
    }
}

fn do_cmd(opts: &Opts) -> Result<()> {
    check_repeats(&opts.offsets)?;
    let path = common::chip_lookup_from_id(&opts.chip)?;
    let chip = Chip::from_path(&path)
        .with_context(|| format!("unable to open chip '{}'", path.display()))?;
    arm(&chip, &opts.offsets)?;
    debug!(chip = %chip.name(), offsets = ?opts.offsets, "watching lines");
    let mut stdout = std::io::stdout().lock();
    if opts.banner {
        print_banner(&mut stdout, &chip, &opts.offsets)?;
    }
    monitor(&chip, opts, &mut stdout)
}

fn check_repeats(offsets: &[Offset]) -> Result<()> {
    for (idx, offset) in offsets.iter().enumerate() {
        if offsets[..idx].contains(offset) {
            bail!(Error::RepeatedLine(*offset));
        }
    }
    Ok(())
}

fn arm(chip: &Chip, offsets: &[Offset]) -> Result<()> {
    let name = common::format_chip_name(chip.name());
    for &offset in offsets {
        if offset >= chip.num_lines() {
            bail!(Error::OffsetOutOfRange(offset, name.into()));
        }
    }
    chip.watched_lines(offsets)
        .with_context(|| format!("failed to watch lines on {name}"))?;
    Ok(())
}

fn monitor<W: Write>(chip: &Chip, opts: &Opts, out: &mut W) -> Result<()> {
    let timefmt = opts.timefmt();
    let batch_size = usize::from(opts.batch_size);
    let mut events = Vec::with_capacity(batch_size);
    let mut count = 0;
    loop {
        let ready = chip
            .wait_watch_event(opts.wait_timeout)
            .with_context(|| format!("failed to wait for events on {}", chip.name()))?;
        if !ready {
            debug!(timeout = ?opts.wait_timeout, "no events");
            continue;
        }
        events.clear();
        // valid events preceding a corrupted record are still reported
        let res = chip.read_watch_events(&mut events, batch_size);
        for evt in &events {
            if let Some(filter) = opts.event {
                if evt.kind != filter.into() {
                    continue;
                }
            }
            if !opts.quiet {
                emit_event(out, evt, opts, timefmt)?;
            }
            if let Some(limit) = opts.num_events {
                count += 1;
                if count >= limit {
                    return Ok(());
                }
            }
        }
        res.with_context(|| format!("failed to read events from {}", chip.name()))?;
        out.flush()?;
    }
}

fn print_banner<W: Write>(out: &mut W, chip: &Chip, offsets: &[Offset]) -> Result<()> {
    let name = common::format_chip_name(chip.name());
    if offsets.len() > 1 {
        write!(out, "Watching lines ")?;
        for o in offsets.iter().take(offsets.len() - 1) {
            write!(out, "{o}, ")?;
        }
        writeln!(out, "and {} on {name}...", offsets[offsets.len() - 1])?;
    } else {
        writeln!(out, "Watching line {} on {name}...", offsets[0])?;
    }
    out.flush()?;
    Ok(())
}

fn emit_event<W: Write>(
    out: &mut W,
    evt: &WatchEvent<'_>,
    opts: &Opts,
    timefmt: TimeFmt,
) -> Result<()> {
    #[cfg(feature = "json")]
    if opts.emit.json {
        let report = Report::new(evt, timefmt);
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
        return Ok(());
    }
    if let Some(format) = &opts.format {
        writeln!(out, "{}", format_event(evt, format))?;
        return Ok(());
    }
    writeln!(out, "{}", event_line(evt, timefmt, opts.emit.quoted))?;
    Ok(())
}

#[cfg(feature = "json")]
#[derive(Serialize)]
struct Report<'a> {
    chip: &'a str,
    offset: Offset,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    kind: EventKind,
    timestamp_ns: u64,
    timestamp: String,
}

#[cfg(feature = "json")]
impl<'a> Report<'a> {
    fn new(evt: &WatchEvent<'a>, timefmt: TimeFmt) -> Self {
        Report {
            chip: evt.line.chip().name(),
            offset: evt.line.offset(),
            name: Some(evt.line.name()).filter(|n| !n.is_empty()),
            kind: evt.kind,
            timestamp_ns: evt.timestamp_ns,
            timestamp: format_time(evt.timestamp_ns, timefmt),
        }
    }
}

// the default event format: "<timestamp>\t<kind>\t<chip> <offset> [<name>]"
fn event_line(evt: &WatchEvent<'_>, timefmt: TimeFmt, quoted: bool) -> String {
    let chip = common::format_chip_name(evt.line.chip().name());
    let mut s = format!(
        "{}\t{}\t{} {}",
        format_time(evt.timestamp_ns, timefmt),
        evt.kind,
        chip,
        evt.line.offset()
    );
    let lname = evt.line.name();
    if !lname.is_empty() {
        if quoted {
            s.push_str(&format!(" \"{lname}\""));
        } else {
            s.push_str(&format!(" {lname}"));
        }
    }
    s
}

fn format_event(evt: &WatchEvent<'_>, format: &str) -> String {
    let mut s = String::new();
    let mut escaped = false;

    for chr in format.chars() {
        if escaped {
            match chr {
                '%' => s.push('%'),
                'c' => s.push_str(common::format_chip_name(evt.line.chip().name())),
                'e' => s.push_str(&event_kind_num(evt.kind).to_string()),
                'E' => s.push_str(&evt.kind.to_string()),
                'l' => s.push_str(evt.line.name()),
                'L' => s.push_str(&format_time(evt.timestamp_ns, TimeFmt::Localtime)),
                'o' => s.push_str(&evt.line.offset().to_string()),
                'S' => s.push_str(&format_time(evt.timestamp_ns, TimeFmt::Seconds)),
                'U' => s.push_str(&format_time(evt.timestamp_ns, TimeFmt::Utc)),
                x => {
                    s.push('%');
                    s.push(x);
                }
            }
            escaped = false;
        } else if chr == '%' {
            escaped = true;
        } else {
            s.push(chr);
        }
    }
    if escaped {
        s.push('%');
    }
    s
}

// event timestamps are CLOCK_MONOTONIC, so wall clock formats need conversion.
fn format_time(timestamp_ns: u64, timefmt: TimeFmt) -> String {
    let evtime = match timefmt {
        TimeFmt::Seconds => timestamp_ns,
        TimeFmt::Localtime | TimeFmt::Utc => monotonic_to_realtime(timestamp_ns),
    };
    common::format_time(evtime, timefmt)
}

fn event_kind_num(kind: EventKind) -> u8 {
    match kind {
        EventKind::Requested => 1,
        EventKind::ConfigChanged => 2,
        EventKind::Released => 3,
    }
}

fn monotonic_to_realtime(timestamp: u64) -> u64 {
    use libc::{CLOCK_MONOTONIC, CLOCK_REALTIME};

    // SAFETY: tspec is self-contained
    unsafe {
        let mut tspec = timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        libc::clock_gettime(CLOCK_REALTIME, std::ptr::addr_of_mut!(tspec));
        let before = timespec_to_ns(&tspec);
        libc::clock_gettime(CLOCK_MONOTONIC, std::ptr::addr_of_mut!(tspec));
        let mono = timespec_to_ns(&tspec);
        libc::clock_gettime(CLOCK_REALTIME, std::ptr::addr_of_mut!(tspec));
        let after = timespec_to_ns(&tspec);
        (timestamp + after / 2 + before / 2).saturating_sub(mono)
    }
}

fn timespec_to_ns(ts: &timespec) -> u64 {
    (ts.tv_sec as u64) * 1000000000 + (ts.tv_nsec as u64)
}
