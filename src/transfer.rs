// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! The transaction executor: exactly one blocking send or receive per
//! invocation, on a device that is already open and configured.
//!
//! There is no framing and no retry above the byte stream. Send pushes
//! every buffer to completion; receive echoes bytes one at a time and
//! terminates on the requested count, end of stream, cancellation, an
//! elapsed deadline, or an I/O error.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use thiserror::Error;

/// How long the receive loop waits in poll(2) before re-checking the
/// cancellation flag and deadline.
const POLL_TICK_MS: u16 = 100;

/// Errors during the data-transfer phase of a transaction.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error("receive timed out")]
    TimedOut,
}

/// Termination controls for [`receive`].
///
/// An unbounded receive blocks until the line produces an end of stream,
/// which on a quiet RS-485 bus is never. Callers wanting the loop to be
/// stoppable set a cancellation flag (typically from a signal handler),
/// a deadline, or both. The defaults reproduce the plain blocking loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveOptions<'a> {
    /// Cooperative stop flag, polled between byte reads. Setting it stops
    /// the receive cleanly; it is not an error.
    pub cancel: Option<&'a AtomicBool>,

    /// Overall deadline for the whole receive. Expiry is an error.
    pub timeout: Option<Duration>,
}

/// Write `payload` to the device, followed by a single newline.
///
/// Each of the two buffers is pushed until completely written; short
/// writes continue where they left off and `EINTR` is retried. An empty
/// payload is legal and produces just the newline.
pub fn send_line(device: &File, payload: &[u8]) -> Result<(), TransferError> {
    let mut writer: &File = device;
    writer.write_all(payload).map_err(TransferError::Write)?;
    writer.write_all(b"\n").map_err(TransferError::Write)?;
    debug!("sent {} payload bytes and a newline", payload.len());
    Ok(())
}

/// Read up to `count` bytes (0 = unbounded) from the device, echoing each
/// byte to `out` the moment it arrives.
///
/// Returns the number of bytes echoed. The output is flushed per byte so
/// the echo stays interactive at any line speed. Readability is awaited
/// with poll(2) on a short tick, so a silent bus cannot keep the loop
/// from noticing cancellation or the deadline.
pub fn receive<W: Write>(
    device: &File,
    count: u64,
    options: &ReceiveOptions,
    out: &mut W,
) -> Result<u64, TransferError> {
    let deadline = options.timeout.map(|timeout| Instant::now() + timeout);
    let mut reader: &File = device;
    let mut received: u64 = 0;

    while count == 0 || received < count {
        if options
            .cancel
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            info!("receive cancelled after {} bytes", received);
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(TransferError::TimedOut);
            }
        }

        // Wait at most one tick, and never past the deadline, so expiry
        // is tight instead of rounded up to a whole tick.
        let wait = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                remaining.as_millis().min(u128::from(POLL_TICK_MS)) as u16
            }
            None => POLL_TICK_MS,
        };

        let mut fds = [PollFd::new(device.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(wait)) {
            // Tick elapsed with nothing to read; re-check the flags.
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(TransferError::Read(io::Error::from(errno))),
        }

        let mut byte = [0u8; 1];
        match reader.read(&mut byte) {
            Ok(0) => {
                debug!("end of stream after {} bytes", received);
                break;
            }
            Ok(_) => {
                out.write_all(&byte).map_err(TransferError::Write)?;
                out.flush().map_err(TransferError::Write)?;
                received += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::Read(e)),
        }
    }

    Ok(received)
}
