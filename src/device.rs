// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Opening the serial device node.
//!
//! A transaction opens the device with flags matching its direction, then
//! clears the descriptor's status flags so the data phase blocks as the
//! transaction model expects. The resulting [`Device`] owns the descriptor
//! and closes it on drop, so every path out of a transaction releases the
//! device, including RS-485 configuration failure.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use log::debug;
use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use thiserror::Error;

/// Errors while acquiring the device handle. Both abort the transaction
/// before any RS-485 configuration is attempted.
#[derive(Debug, Error)]
pub enum DeviceOpenError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot clear status flags on {path}: {source}")]
    ClearStatusFlags {
        path: PathBuf,
        #[source]
        source: Errno,
    },
}

/// Access direction of a transaction; decides the open(2) flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl Direction {
    /// Open options for this direction. Both directions open synchronous
    /// so the data phase is unbuffered: a completed write has reached the
    /// device, not a kernel buffer.
    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            Direction::Send => {
                options
                    .write(true)
                    .custom_flags((OFlag::O_SYNC | OFlag::O_DSYNC).bits());
            }
            Direction::Receive => {
                options.read(true).custom_flags(OFlag::O_SYNC.bits());
            }
        }
        options
    }
}

/// An open serial device, exclusively owned for the duration of one
/// transaction. Closed on drop.
#[derive(Debug)]
pub struct Device {
    file: File,
    path: PathBuf,
}

impl Device {
    /// Open `path` for a transaction in the given direction.
    ///
    /// After the open, the file status flags are cleared (`F_SETFL 0`):
    /// the tty layer can hand out a descriptor with `O_NONBLOCK` latched,
    /// and the transfer loops require plain blocking reads and writes.
    /// This step is mandatory for both directions.
    pub fn open(path: &Path, direction: Direction) -> Result<Device, DeviceOpenError> {
        let file = direction
            .open_options()
            .open(path)
            .map_err(|source| DeviceOpenError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        fcntl(file.as_raw_fd(), FcntlArg::F_SETFL(OFlag::empty())).map_err(|source| {
            DeviceOpenError::ClearStatusFlags {
                path: path.to_path_buf(),
                source,
            }
        })?;

        debug!("opened {} for {:?}", path.display(), direction);
        Ok(Device {
            file,
            path: path.to_path_buf(),
        })
    }

    /// The underlying file, for the data-transfer phase.
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for Device {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}
