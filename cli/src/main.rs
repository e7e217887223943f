// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A command line tool for watching GPIO lines being requested, reconfigured
//! and released.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod chip;
mod common;
mod watch;

fn main() -> ExitCode {
    match Opts::try_parse() {
        Ok(opt) => {
            init_tracing(opt.verbose);
            let res = match opt.cmd {
                Command::Chip(cfg) => chip::cmd(&cfg),
                Command::Watch(cfg) => watch::cmd(&cfg),
            };
            return if res {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
        Err(e) => {
            // help and version are reported as errors by try_parse
            let _ = e.print();
            if !e.use_stderr() {
                return ExitCode::SUCCESS;
            }
        }
    }
    ExitCode::FAILURE
}

// diagnostics go to stderr so they never interleave with reported events.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "gpiowatch",
    about = "A utility to watch GPIO lines on Linux for request and configuration changes.",
    version,
    propagate_version = true
)]
struct Opts {
    /// Provide more detailed error messages and diagnostics.
    #[arg(short = 'v', long, global = true, display_order = 800)]
    pub verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
enum Command {
    /// Get information about GPIO chips.
    Chip(chip::Opts),

    /// Watch lines for requests, configuration changes and releases.
    Watch(watch::Opts),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }
}
