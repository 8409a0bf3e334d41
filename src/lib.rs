#![cfg_attr(not(test), no_std)]
//! This is a platform agnostic library for the ON Semiconductor CAT25xxx SPI EEPROM series.
//!
//! The driver talks to the chip through a [`Transport`](transport::Transport), a small capability
//! trait supplied by the host (byte transmit, byte receive, chip select and chip deselect).
//! An adapter for [embedded-hal](https://github.com/rust-embedded/embedded-hal) buses is provided,
//! see [`transport::SpiTransport`].
//!
//! Multiple chips are supported:
//! * [CAT25128](https://www.onsemi.com/pdf/datasheet/cat25128-d.pdf)
//! * [CAT25256](https://www.onsemi.com/pdf/datasheet/cat25256-d.pdf)
//!
//! Both a [blocking] and an [asynchronous] driver are available. Arbitrary writes are split on
//! page boundaries, each page write is followed by polling the status register until the chip
//! is ready again.
//!
//! A multi page write that fails midway leaves the pages written before the failure on the chip,
//! there is no rollback.

pub mod address;
pub mod asynchronous;
pub mod blocking;
mod command;
pub mod error;
pub mod register;
pub mod transport;

#[cfg(test)]
mod sim;

use crate::error::Error;

pub const PAGE_SIZE: u32 = 64;

/// Value of an erased byte
pub const ERASED: u8 = 0xFF;

pub(crate) fn check_erase<E>(capacity: usize, from: u32, to: u32) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    if from > to || to > capacity {
        return Err(Error::OutOfBounds);
    }
    if from % PAGE_SIZE != 0 || to % PAGE_SIZE != 0 {
        return Err(Error::NotAligned);
    }
    Ok(())
}

pub(crate) fn check_read<E>(capacity: usize, offset: u32, length: usize) -> Result<(), Error<E>> {
    check_write(capacity, offset, length)
}

pub(crate) fn check_write<E>(capacity: usize, offset: u32, length: usize) -> Result<(), Error<E>> {
    let capacity = capacity as u32;
    let length = length as u32;
    if length > capacity || offset > capacity - length {
        return Err(Error::OutOfBounds);
    }
    Ok(())
}
