// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::common::{self, emit_error, EmitOpts};
use anyhow::Context;
use clap::Parser;
use gpiowatch::chip::{Chip, Info};
#[cfg(feature = "serde")]
use serde_derive::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(aliases(["c", "detect"]))]
pub struct Opts {
    /// The chips to report
    ///
    /// If none specified then all chips are returned.
    ///
    /// Chips may be identified by number, name, or path.
    /// e.g. the following all select the same chip:
    ///     0
    ///     gpiochip0
    ///     /dev/gpiochip0
    #[arg(name = "chip", verbatim_doc_comment)]
    chips: Vec<String>,

    #[command(flatten)]
    emit: EmitOpts,
}

pub fn cmd(opts: &Opts) -> bool {
    let mut res = CmdResults {
        opts: opts.emit,
        ..Default::default()
    };
    let paths = if opts.chips.is_empty() {
        match common::all_chip_paths() {
            Ok(p) => p,
            Err(e) => {
                emit_error(&opts.emit, &e);
                return false;
            }
        }
    } else {
        let mut paths = Vec::new();
        for id in &opts.chips {
            match common::chip_lookup_from_id(id) {
                Ok(p) => paths.push(p),
                Err(e) => res.push_error(&e),
            }
        }
        paths
    };
    for p in paths {
        match chip_info(&p) {
            Ok(info) => res.chips.push(info),
            Err(e) => res.push_error(&e),
        }
    }
    res.emit();
    res.errors.is_empty()
}

fn chip_info(p: &Path) -> anyhow::Result<ChipInfo> {
    let c = Chip::from_path(p).with_context(|| format!("unable to open '{}'", p.display()))?;
    Ok(ChipInfo {
        path: p.to_path_buf(),
        info: c.info().clone(),
    })
}

#[cfg_attr(feature = "serde", derive(Serialize))]
struct ChipInfo {
    path: PathBuf,
    #[cfg_attr(feature = "serde", serde(flatten))]
    info: Info,
}

#[derive(Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
struct CmdResults {
    #[cfg_attr(feature = "serde", serde(skip))]
    opts: EmitOpts,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    chips: Vec<ChipInfo>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    errors: Vec<String>,
}

impl CmdResults {
    fn emit(&self) {
        #[cfg(feature = "json")]
        if self.opts.json {
            match serde_json::to_string(self) {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("{e}"),
            }
            return;
        }
        for ci in &self.chips {
            println!(
                "{} [{}] ({} lines)",
                common::format_chip_name(&ci.info.name),
                ci.info.label,
                ci.info.num_lines
            );
        }
        for e in &self.errors {
            eprintln!("{e}");
        }
    }

    fn push_error(&mut self, e: &anyhow::Error) {
        self.errors.push(common::format_error(&self.opts, e))
    }
}
