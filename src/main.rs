// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the RS-485 send/receive utility

use std::io;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::debug;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use rs485_util::cli::{Args, Command};
use rs485_util::device::Device;
use rs485_util::rs485;
use rs485_util::transfer::{self, ReceiveOptions};

/// Set by the SIGINT handler, polled by the receive loop.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_signal: c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

/// Route SIGINT to [`INTERRUPTED`] so an unbounded receive stops cleanly
/// mid-transaction instead of killing the process with the device half
/// configured. `SA_RESTART` stays off: a read that is blocked when the
/// signal lands must come back with `EINTR`, not resume.
fn install_sigint_handler() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(on_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe { signal::sigaction(Signal::SIGINT, &action) }
        .context("cannot install SIGINT handler")?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    // The device is closed when `device` drops, on every path out of this
    // function, configuration failures included.
    let device = Device::open(&args.device, args.command.direction())?;
    rs485::configure(&device)?;

    match args.command {
        Command::Send { payload } => {
            transfer::send_line(device.file(), payload.as_bytes())?;
        }
        Command::Receive { count, timeout } => {
            install_sigint_handler()?;
            let options = ReceiveOptions {
                cancel: Some(&INTERRUPTED),
                timeout: timeout.map(Duration::from_secs),
            };
            let mut stdout = io::stdout().lock();
            let received = transfer::receive(device.file(), count, &options, &mut stdout)?;
            debug!("transaction done, {} bytes received", received);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    run(args)
}
