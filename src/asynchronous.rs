use crate::{
    address::{Address, Channel, PageWrites},
    check_erase, check_read, check_write,
    command::{Command, Operation},
    error::Error,
    register::{BlockProtection, StatusRegister},
    transport::{AsyncTransport, Capability},
    ERASED, PAGE_SIZE,
};
use bit::BitIndex;
use core::fmt::Debug;
use embassy_futures::yield_now;
use embedded_storage_async::nor_flash::{ErrorType, MultiwriteNorFlash, NorFlash, ReadNorFlash};

/// Type alias for the AsyncCAT25128
pub type AsyncCAT25128<T> = AsyncCat25<0x3FFF, T>;

/// Type alias for the AsyncCAT25256
pub type AsyncCAT25256<T> = AsyncCat25<0x7FFF, T>;

/// The generic async CAT25xxx driver.
///
/// Same sequencing as the [blocking](crate::blocking) driver, but the executor gets control back
/// between two status register polls.
pub struct AsyncCat25<const SIZE: u32, T> {
    transport: T,
}

impl<const SIZE: u32, T, E> AsyncCat25<SIZE, T>
where
    T: AsyncTransport<Error = E>,
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

    /// Access the chip on `channel` through the `embedded-storage-async` traits
    pub fn device(&mut self, channel: Channel) -> AsyncDevice<'_, SIZE, T> {
        AsyncDevice {
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

    async fn perform(transport: &mut T, operations: &mut [Operation<'_>]) -> Result<(), E> {
        for op in operations.iter_mut() {
            match op {
                Operation::Transmit(bytes) => transport.transmit(bytes).await?,
                Operation::Receive(buff) => transport.receive(buff).await?,
            }
        }
        Ok(())
    }

    /// Run `operations` with the chip selected, then deselect it whatever happened
    async fn transaction(
        &mut self,
        channel: Channel,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error<E>> {
        let res = match self.transport.select(channel).await {
            Ok(()) => Self::perform(&mut self.transport, operations).await,
            err @ Err(_) => err,
        };
        let deselect = self.transport.deselect(channel).await;

        res.map_err(Error::Transport)?;
        deselect.map_err(Error::Transport)
    }

    async fn command_write(&mut self, bytes: &[u8], channel: Channel) -> Result<(), Error<E>> {
        self.transaction(channel, &mut [Operation::Transmit(bytes)])
            .await
    }

    async fn read_base(
        &mut self,
        addr: Address,
        buff: &mut [u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        let cmd = Command::Read.with_address(addr);
        let res = self
            .transaction(
                channel,
                &mut [Operation::Transmit(&cmd), Operation::Receive(buff)],
            )
            .await;
        #[cfg(feature = "defmt")]
        if res.is_ok() {
            defmt::trace!("Read from {=u32}, {=usize}: {:?}", addr.0, buff.len(), buff);
        } else {
            defmt::error!("ERROR READ");
        }
        res
    }

    async fn write_base(
        &mut self,
        addr: Address,
        buff: &[u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        let cmd = Command::Write.with_address(addr);
        self.transaction(
            channel,
            &mut [Operation::Transmit(&cmd), Operation::Transmit(buff)],
        )
        .await
    }

    async fn status(&mut self, channel: Channel) -> Result<u8, Error<E>> {
        let mut status = [0u8];
        self.transaction(
            channel,
            &mut [
                Operation::Transmit(&[Command::ReadStatus as u8]),
                Operation::Receive(&mut status),
            ],
        )
        .await?;
        Ok(status[0])
    }

    async fn wait(&mut self, channel: Channel) -> Result<(), Error<E>> {
        loop {
            if !self.status(channel).await?.bit(StatusRegister::NOT_READY) {
                return Ok(());
            }
            yield_now().await;
        }
    }

    async fn program_page(
        &mut self,
        addr: Address,
        buff: &[u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteEnable as u8], channel)
            .await?;
        let res = self.write_base(addr, buff, channel).await;
        let disable = self
            .command_write(&[Command::WriteDisable as u8], channel)
            .await;
        res?;

        #[cfg(feature = "defmt")]
        defmt::debug!("Write to {=u32} len {=usize}", addr.0, buff.len());
        // Wait for the write to complete, to behave like a flush
        let waited = self.wait(channel).await;
        disable?;
        waited
    }

    /// Read n bytes from an address
    pub async fn read(
        &mut self,
        addr: Address,
        buff: &mut [u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.read_base(addr, buff, channel).await
    }

    /// Write at most a page of bytes, then wait until the chip is ready.
    /// A write running past the end of the page wraps around within that page.
    pub async fn write_page(
        &mut self,
        addr: Address,
        buff: &[u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.program_page(addr, buff, channel).await
    }

    /// Write any number of bytes at any address, one page at a time and in ascending order.
    /// Pages written before a failure stay written.
    pub async fn write(
        &mut self,
        addr: Address,
        buff: &[u8],
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.check_transport()?;
        for (addr, chunk) in PageWrites::new(addr, buff) {
            self.program_page(addr, chunk, channel).await?;
        }
        Ok(())
    }

    /// Read the raw status register
    pub async fn read_status_register(&mut self, channel: Channel) -> Result<u8, Error<E>> {
        self.check_transport()?;
        self.status(channel).await
    }

    /// Write the raw status register, the write enable latch must be set
    pub async fn write_status_register(
        &mut self,
        value: u8,
        channel: Channel,
    ) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteStatus as u8, value], channel)
            .await
    }

    /// Read and decode the status register
    pub async fn read_status(&mut self, channel: Channel) -> Result<StatusRegister, Error<E>> {
        Ok(self.read_status_register(channel).await?.into())
    }

    /// Whether a write cycle is in progress
    pub async fn is_busy(&mut self, channel: Channel) -> Result<bool, Error<E>> {
        Ok(self.read_status(channel).await?.not_ready)
    }

    /// Poll the status register until the chip reports ready, yielding between polls
    pub async fn wait_ready(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.wait(channel).await
    }

    /// Set the write enable latch, though you shouldn't need this function since it's already handled in the write operations.
    pub async fn write_enable(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteEnable as u8], channel)
            .await
    }

    /// Reset the write enable latch
    pub async fn write_disable(&mut self, channel: Channel) -> Result<(), Error<E>> {
        self.check_transport()?;
        self.command_write(&[Command::WriteDisable as u8], channel)
            .await
    }

    /// Protect a portion of the array. [`Self::write_enable`] is called internally
    pub async fn set_block_protection(
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
        self.command_write(&[Command::WriteEnable as u8], channel)
            .await?;
        self.command_write(&[Command::WriteStatus as u8, status.into()], channel)
            .await?;
        self.wait(channel).await
    }
}

/// A chip on a given channel, implementing the `embedded-storage-async` NOR flash traits.
///
/// The EEPROM needs no erase before writing, erasing fills whole pages with [`ERASED`].
pub struct AsyncDevice<'a, const SIZE: u32, T> {
    driver: &'a mut AsyncCat25<SIZE, T>,
    channel: Channel,
}

impl<'a, const SIZE: u32, T, E> ErrorType for AsyncDevice<'a, SIZE, T>
where
    T: AsyncTransport<Error = E>,
    E: Debug,
{
    type Error = Error<E>;
}

impl<'a, const SIZE: u32, T, E> ReadNorFlash for AsyncDevice<'a, SIZE, T>
where
    T: AsyncTransport<Error = E>,
    E: Debug,
{
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self.capacity(), offset, bytes.len())?;
        self.driver.read(Address(offset), bytes, self.channel).await
    }

    fn capacity(&self) -> usize {
        AsyncCat25::<SIZE, T>::capacity()
    }
}

impl<'a, const SIZE: u32, T, E> NorFlash for AsyncDevice<'a, SIZE, T>
where
    T: AsyncTransport<Error = E>,
    E: Debug,
{
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = PAGE_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self.capacity(), from, to)?;
        self.driver.check_transport()?;

        let erased = [ERASED; PAGE_SIZE as usize];
        let mut idx = from;
        while idx < to {
            #[cfg(feature = "defmt")]
            defmt::trace!("Erase page {=u32}", idx / PAGE_SIZE);
            self.driver
                .program_page(Address(idx), &erased, self.channel)
                .await?;
            idx += PAGE_SIZE;
        }
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self.capacity(), offset, bytes.len())?;
        self.driver.write(Address(offset), bytes, self.channel).await
    }
}

impl<'a, const SIZE: u32, T, E> MultiwriteNorFlash for AsyncDevice<'a, SIZE, T>
where
    T: AsyncTransport<Error = E>,
    E: Debug,
{
}
