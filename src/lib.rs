// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rs485-util project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RS-485 half-duplex transaction utility
//!
//! This crate switches a Linux serial device into RS-485 half-duplex mode
//! and performs a single blocking send or receive transaction over it.
//! Baud rate, parity and echoing are deliberately not touched here;
//! configure them beforehand with `stty`.
//!
//! The pieces compose linearly:
//! - [`device`]: open the device node with direction-appropriate flags
//! - [`rs485`]: put the transceiver into RS-485 half-duplex mode
//! - [`transfer`]: run exactly one send or receive transaction
//!
//! One device handle is open at a time, exclusively owned by the running
//! transaction and closed when it ends, whether or not it succeeded.

pub mod cli;
pub mod device;
pub mod rs485;
pub mod transfer;
