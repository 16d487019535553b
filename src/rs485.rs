// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RS-485 transceiver configuration.
//!
//! Linux exposes RS-485 direction control as a `struct serial_rs485`
//! record, read and written with the `TIOCGRS485`/`TIOCSRS485` ioctls.
//! This module owns the read-modify-write of that record; the record type
//! never leaves the module. Field layout and flag semantics are the
//! kernel ABI (`include/uapi/linux/serial.h`), not ours to choose.
//!
//! Configuration runs once per transaction, after the open and before any
//! data transfer. A failure at any step aborts the transaction: an RS-485
//! bus with stale direction control misbehaves silently, so transferring
//! anyway is unsafe.

use std::os::fd::AsRawFd;

use log::debug;
use nix::errno::Errno;
use thiserror::Error;

/// Errors while switching the device into RS-485 half-duplex mode.
/// Each carries the errno reported by the driver.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read RS-485 settings: {0} (errno {num})", num = errno_num(.0))]
    ReadSettings(Errno),

    #[error("cannot clear the RTS line: {0} (errno {num})", num = errno_num(.0))]
    ClearRts(Errno),

    #[error("cannot write RS-485 settings: {0} (errno {num})", num = errno_num(.0))]
    WriteSettings(Errno),
}

fn errno_num(errno: &Errno) -> i32 {
    *errno as i32
}

/// Mirror of the kernel's `struct serial_rs485`. Only `flags` and the two
/// delay fields matter here; the padding words are reserved space that
/// must round-trip untouched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
struct SerialRs485 {
    flags: u32,
    delay_rts_before_send: u32,
    delay_rts_after_send: u32,
    padding: [u32; 5],
}

const SER_RS485_ENABLED: u32 = 1 << 0;
const SER_RS485_RTS_ON_SEND: u32 = 1 << 1;
const SER_RS485_RTS_AFTER_SEND: u32 = 1 << 2;
const SER_RS485_RX_DURING_TX: u32 = 1 << 4;

mod ioctl {
    use nix::{ioctl_read_bad, ioctl_write_ptr_bad};

    use super::SerialRs485;

    ioctl_read_bad!(tiocgrs485, libc::TIOCGRS485, SerialRs485);
    ioctl_write_ptr_bad!(tiocsrs485, libc::TIOCSRS485, SerialRs485);
    ioctl_write_ptr_bad!(tiocmbic, libc::TIOCMBIC, libc::c_int);
}

/// Apply the half-duplex policy to a configuration record: RS-485
/// enabled, RTS asserted for the duration of a send and dropped
/// immediately after the last byte, no guard delays, and no reception
/// while transmitting (the transceiver has no echo suppression, so bytes
/// received mid-send would be our own).
fn apply_half_duplex_policy(conf: &mut SerialRs485) {
    conf.flags |= SER_RS485_ENABLED;
    conf.flags |= SER_RS485_RTS_ON_SEND;
    conf.flags &= !SER_RS485_RTS_AFTER_SEND;
    conf.delay_rts_before_send = 0;
    conf.delay_rts_after_send = 0;
    conf.flags &= !SER_RS485_RX_DURING_TX;
}

/// Switch the open device into RS-485 half-duplex mode.
///
/// Reads the current record, clears the RTS modem line, then writes the
/// record back with the half-duplex policy applied. The RTS clear comes
/// first: Linux asserts RTS whenever a tty is opened, and on a
/// transceiver wired to use RTS as the direction line, an asserted RTS at
/// idle holds the driver in transmit and silently blocks all reception.
pub fn configure<F: AsRawFd>(device: &F) -> Result<(), ConfigError> {
    let fd = device.as_raw_fd();

    let mut conf = SerialRs485::default();
    unsafe { ioctl::tiocgrs485(fd, &mut conf) }.map_err(ConfigError::ReadSettings)?;
    debug!("current RS-485 settings: {:?}", conf);

    let rts: libc::c_int = libc::TIOCM_RTS;
    unsafe { ioctl::tiocmbic(fd, &rts) }.map_err(ConfigError::ClearRts)?;

    apply_half_duplex_policy(&mut conf);
    unsafe { ioctl::tiocsrs485(fd, &conf) }.map_err(ConfigError::WriteSettings)?;
    debug!("applied RS-485 settings: {:?}", conf);

    Ok(())
}
