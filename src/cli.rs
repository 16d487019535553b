// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Command line surface: `rs485 <DEVICE> <COMMAND>`.
//!
//! The command set is closed and known at build time, so it is modelled as
//! a subcommand enum rather than a lookup table. Argument validation
//! (missing payload, unknown command, negative counts) happens here,
//! before any device access.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::device::Direction;

/// RS-485 half-duplex send/receive utility
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Baud rate, parity and echoing are not configured \
here; use stty on the device beforehand.")]
pub struct Args {
    /// Serial device node, e.g. /dev/ttyS0
    pub device: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write a payload to the bus, followed by a newline
    Send {
        /// Bytes to transmit
        payload: String,
    },
    /// Read bytes from the bus and echo them to stdout
    Receive {
        /// Number of bytes to read (0 = until end of stream or Ctrl+C)
        #[arg(default_value_t = 0)]
        count: u64,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },
}

impl Command {
    /// Access direction this command needs when opening the device.
    pub fn direction(&self) -> Direction {
        match self {
            Command::Send { .. } => Direction::Send,
            Command::Receive { .. } => Direction::Receive,
        }
    }
}
