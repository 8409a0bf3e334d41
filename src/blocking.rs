use crate::{
    address::{Address, Channel, PageWrites},
    check_erase, check_read, check_write,
    command::{Command, Operation},
    error::Error,
    register::{BlockProtection, StatusRegister},
    transport::{Capability, Transport},
    ERASED, PAGE_SIZE,
};
use bit::BitIndex;
use core::fmt::Debug;
use embedded_storage::nor_flash::{ErrorType, MultiwriteNorFlash, NorFlash, ReadNorFlash};

/// Type alias for the CAT25128
pub type CAT25128<T> = Cat25<0x3FFF, T>;

/// Type alias for the CAT25256
pub type CAT25256<T> = Cat25<0x7FFF, T>;

/// The generic blocking CAT25xxx driver.
///
/// Every call runs to completion on the calling thread, including the status register polling
/// that follows a page write. The driver keeps no state between calls, exclusive access is
/// given by `&mut self`.
pub struct Cat25<const SIZE: u32, T> {
    transport: T,
}

impl<const SIZE: u32, T, E> Cat25<SIZE, T>
where
    T: Transport<Error = E>,
{
    pub const fn capacity() -> usize {
        SIZE as usize + 1
    }

    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Give back the transport
    pub fn release(self) -> T {
        self.transport
    }

    /// Access the chip on `channel` through the `embedded-storage` NOR flash traits
    pub fn device(&mut self, channel: Channel) -> Device<'_, SIZE, T> {
        Device {
            driver: self,
            channel,
        }
    }

    fn check_transport(&self) -> Result<(), Error<E>> {
        if Capability::ALL
            .iter()
            .all(|capability| self.transport.provides(*capability))
        {
            Ok(())
        } else {
            #[cfg(feature = "defmt")]
            defmt::error!("Transport is missing a capability");
            Err(Error::InvalidHandle)
        }
    }

    /// Run `operations` with the chip selected. The chip is deselected whatever happens,
    /// an error of the operations takes precedence over a deselect error.
    fn transaction(
        &mut self,
        channel: Channel,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error<E>> {
        let transport = &mut self.transport;
        let res = transport.select(channel).and_then(|()| {
            operations.iter_mut().try_for_each(|op| match op {
                Operation::Transmit(bytes) => transport.transmit(bytes),
                Operation::Receive(buff) => transport.receive(buff),
            })
        });
        let deselect = transport.deselect(channel);

        res.map_err(Error::Transport)?;
        deselect.map_err(Error::Transport)
    }

    fn command_write(&mut self, bytes: &[u8], channel: Channel) -> Result<(), Error<E>> {
        self.transaction(channel, &mut [Operation::Transmit(bytes)])
    }

    fn read_base(&mut self, addr: Address, buff: &mut [u8], channel: Channel) -> Result<(), Error<E>> {
        let cmd = Command::Read.with_address(addr);
        let res = self.transaction(
            channel,
            &mut [Operation::Transmit(&cmd), Operation::Receive(buff)],
        );
        #[cfg(feature = "defmt")]
        if res.is_ok() {
            defmt::trace!("Read from {=u32}, {=usize}: {:?}", addr.0, buff.len(), buff);
        } else {
            defmt::error!("ERROR READ");
        }
        res
    }

    fn write_base(&mut self, addr: Address, buff: &[u8], channel: Channel) -> Result<(), Error<E>> {
        let cmd = Command::Write.with_address(addr);
        self.transaction(
            channel,
            &mut [Operation::Transmit(&cmd), Operation::Transmit(buff)],
        )
    }

    fn status(&mut self, channel: Channel) -> Result<u8, Error<E>> {
        let mut status = [0u8];
        self.transaction(
            channel,
            &mut [
                Operation::Transmit(&[Command::ReadStatus as u8]),
                Operation::Receive(&mut status),
            ],
        )?;
        Ok(status[0])
    }

    fn wait(&mut self, channel: Channel) -> Result<(), Error<E>> {
        while self.status(channel)?.bit(StatusRegister::NOT_READY) {}
        Ok(())
    }

    /// Latch enable, program, latch disable and wait for the write cycle to end.
    /// The latch is disabled even when programming failed, in which case the programming
    /// error is returned. Once the data went out the write cycle is waited for, a latch
    /// disable error is only reported afterwards.
    fn program_page(&mut self, addr: Address, buff: &[u8], channel: Channel) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteEnable as u8], channel)?;
        let res = self.write_base(addr, buff, channel);
        let disable = self.command_write(&[Command::WriteDisable as u8], channel);
        res?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Write to {=u32} len {=usize}", addr.0, buff.len());
        let waited = self.wait(channel);
        disable?;
        waited
    }

    /// Read n bytes from an address
    pub fn read(&mut self, addr: Address, buff: &mut [u8], channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.read_base(addr, buff, channel)
    }

    /// Write at most a page of bytes, then wait until the chip is ready.
    ///
    /// The length is not checked, a write running past the end of the page wraps around to
    /// the start of that same page on the chip. Use [`Self::write`] for arbitrary writes.
    pub fn write_page(&mut self, addr: Address, buff: &[u8], channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.program_page(addr, buff, channel)
    }

    /// Write any number of bytes at any address, one page at a time and in ascending order.
    ///
    /// On failure the remaining pages are not written, but the pages written before the
    /// failure stay written.
    pub fn write(&mut self, addr: Address, buff: &[u8], channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        for (addr, chunk) in PageWrites::new(addr, buff) {
            self.program_page(addr, chunk, channel)?;
        }
        Ok(())
    }

    /// Read the raw status register
    pub fn read_status_register(&mut self, channel: Channel) -> Result<u8, Error<E>> {
        self.check_transport()?;
        self.status(channel)
    }

    /// Write the raw status register. The chip only accepts it after [`Self::write_enable`],
    /// see [`Self::set_block_protection`].
    pub fn write_status_register(&mut self, value: u8, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteStatus as u8, value], channel)
    }

    /// Read and decode the status register
    pub fn read_status(&mut self, channel: Channel) -> Result<StatusRegister, Error<E>> {
        Ok(self.read_status_register(channel)?.into())
    }

    /// Whether a write cycle is in progress
    pub fn is_busy(&mut self, channel: Channel) -> Result<bool, Error<E>> {
        Ok(self.read_status(channel)?.not_ready)
    }

    /// Poll the status register until the chip reports ready. There is no timeout,
    /// a transport error ends the wait.
    pub fn wait_ready(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.wait(channel)
    }

    /// Set the write enable latch, though you shouldn't need this function since it's already handled in the write operations.
    pub fn write_enable(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteEnable as u8], channel)
    }

    /// Reset the write enable latch
    pub fn write_disable(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteDisable as u8], channel)
    }

    /// Protect a portion of the array. With `write_protect_enable` the status register
    /// can no longer be written while the WP pin is low.
    pub fn set_block_protection(
        &mut self,
        protection: BlockProtection,
        write_protect_enable: bool,
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.check_transport()?;
        let status = StatusRegister {
            write_protect_enable,
            block_protection: protection,
            write_enable_latch: false,
            not_ready: false,
        };
        self.command_write(&[Command::WriteEnable as u8], channel)?;
        self.command_write(&[Command::WriteStatus as u8, status.into()], channel)?;
        self.wait(channel)
    }
}

/// A chip on a given channel, implementing the `embedded-storage` NOR flash traits.
///
/// The EEPROM needs no erase before writing, erasing fills whole pages with [`ERASED`].
pub struct Device<'a, const SIZE: u32, T> {
    driver: &'a mut Cat25<SIZE, T>,
    channel: Channel,
}

impl<'a, const SIZE: u32, T, E> ErrorType for Device<'a, SIZE, T>
where
    T: Transport<Error = E>,
    E: Debug,
{
    type Error = Error<E>;
}

impl<'a, const SIZE: u32, T, E> ReadNorFlash for Device<'a, SIZE, T>
where
    T: Transport<Error = E>,
    E: Debug,
{
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self.capacity(), offset, bytes.len())?;
        self.driver.read(Address(offset), bytes, self.channel)
    }

    fn capacity(&self) -> usize {
        Cat25::<SIZE, T>::capacity()
    }
}

impl<'a, const SIZE: u32, T, E> NorFlash for Device<'a, SIZE, T>
where
    T: Transport<Error = E>,
    E: Debug,
{
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = PAGE_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self.capacity(), from, to)?;
        self.driver.check_transport()?;

        let erased = [ERASED; PAGE_SIZE as usize];
        for page in (from..to).step_by(PAGE_SIZE as usize) {
            #[cfg(feature = "defmt")]
            defmt::trace!("Erase page {=u32}", page / PAGE_SIZE);
            self.driver
                .program_page(Address(page), &erased, self.channel)?;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self.capacity(), offset, bytes.len())?;
        self.driver.write(Address(offset), bytes, self.channel)
    }
}

impl<'a, const SIZE: u32, T, E> MultiwriteNorFlash for Device<'a, SIZE, T>
where
    T: Transport<Error = E>,
    E: Debug,
{
}
