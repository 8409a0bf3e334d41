//! The bus capability the driver consumes.
//!
//! A host hands the driver something implementing [`Transport`] (or [`AsyncTransport`]).
//! The implementor is free to carry whatever context it needs, the driver never looks inside.
//!
//! The transport is not required to serialize access between channels, but if several drivers
//! share one physical bus through different transports, the host has to.

use crate::address::Channel;
use embedded_hal::digital::{OutputPin, PinState};

/// A capability a transport may or may not provide
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Transmit,
    Receive,
    Select,
    Deselect,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Transmit,
        Capability::Receive,
        Capability::Select,
        Capability::Deselect,
    ];
}

/// Blocking byte transport with chip select control
pub trait Transport {
    type Error;

    /// Whether the transport is able to perform `capability`.
    /// The driver refuses to touch the bus when any capability is missing.
    fn provides(&self, _capability: Capability) -> bool {
        true
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill the whole buffer with bytes clocked out of the chip
    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Assert the chip select line of `channel`
    fn select(&mut self, channel: Channel) -> Result<(), Self::Error>;

    /// Release the chip select line of `channel`
    fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error>;
}

/// Async byte transport with chip select control, see [`Transport`]
#[allow(async_fn_in_trait)]
pub trait AsyncTransport {
    type Error;

    fn provides(&self, _capability: Capability) -> bool {
        true
    }

    async fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    async fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    async fn select(&mut self, channel: Channel) -> Result<(), Self::Error>;

    async fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn provides(&self, capability: Capability) -> bool {
        T::provides(self, capability)
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        T::transmit(self, bytes)
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
        T::receive(self, buffer)
    }

    fn select(&mut self, channel: Channel) -> Result<(), Self::Error> {
        T::select(self, channel)
    }

    fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error> {
        T::deselect(self, channel)
    }
}

/// Errors of [`SpiTransport`]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiTransportError<SpiError, PinError> {
    /// Internal Spi error
    Spi(SpiError),

    /// A chip select pin could not be set
    Pin(PinError),

    /// No chip select pin for the requested channel
    Channel,
}

/// A [`Transport`] over an embedded-hal SPI bus and `N` active low chip select pins.
/// Channel `i` drives `cs[i]`.
pub struct SpiTransport<SPI, CS, const N: usize> {
    spi: SPI,
    cs: [CS; N],
}

impl<SPI, CS, const N: usize> SpiTransport<SPI, CS, N>
where
    CS: OutputPin,
{
    /// Create a new transport, releasing every chip select line
    pub fn new(spi: SPI, mut cs: [CS; N]) -> Result<Self, CS::Error> {
        for pin in cs.iter_mut() {
            pin.set_high()?;
        }
        Ok(Self { spi, cs })
    }

    /// Give back the bus and the pins
    pub fn release(self) -> (SPI, [CS; N]) {
        (self.spi, self.cs)
    }

    fn set_cs<E>(
        &mut self,
        channel: Channel,
        state: PinState,
    ) -> Result<(), SpiTransportError<E, CS::Error>> {
        match self.cs.get_mut(channel.0) {
            Some(pin) => pin.set_state(state).map_err(SpiTransportError::Pin),
            None => Err(SpiTransportError::Channel),
        }
    }
}

mod blocking_spi {
    use super::*;
    use embedded_hal::spi::SpiBus;

    impl<SPI, CS, const N: usize> Transport for SpiTransport<SPI, CS, N>
    where
        SPI: SpiBus,
        CS: OutputPin,
    {
        type Error = SpiTransportError<SPI::Error, CS::Error>;

        fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.spi.write(bytes).map_err(SpiTransportError::Spi)
        }

        fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
            self.spi.read(buffer).map_err(SpiTransportError::Spi)
        }

        fn select(&mut self, channel: Channel) -> Result<(), Self::Error> {
            self.set_cs(channel, PinState::Low)
        }

        fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error> {
            let flushed = self.spi.flush().map_err(SpiTransportError::Spi);
            let released = self.set_cs(channel, PinState::High);
            released.and(flushed)
        }
    }
}

mod async_spi {
    use super::*;
    use embedded_hal_async::spi::SpiBus;

    impl<SPI, CS, const N: usize> AsyncTransport for SpiTransport<SPI, CS, N>
    where
        SPI: SpiBus,
        CS: OutputPin,
    {
        type Error = SpiTransportError<SPI::Error, CS::Error>;

        async fn transmit(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
            self.spi.write(bytes).await.map_err(SpiTransportError::Spi)
        }

        async fn receive(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error> {
            self.spi.read(buffer).await.map_err(SpiTransportError::Spi)
        }

        async fn select(&mut self, channel: Channel) -> Result<(), Self::Error> {
            self.set_cs(channel, PinState::Low)
        }

        async fn deselect(&mut self, channel: Channel) -> Result<(), Self::Error> {
            let flushed = self.spi.flush().await.map_err(SpiTransportError::Spi);
            let released = self.set_cs(channel, PinState::High);
            released.and(flushed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embedded_hal::digital::ErrorType as PinErrorType;
    use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
    use embedded_hal_async::spi::SpiBus as AsyncSpiBus;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct MockBus {
        log: Log,
        rx: u8,
    }

    impl SpiErrorType for MockBus {
        type Error = Infallible;
    }

    impl SpiBus for MockBus {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            words.fill(self.rx);
            self.log.borrow_mut().push(format!("read {}", words.len()));
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            self.log.borrow_mut().push(format!("write {:?}", words));
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            SpiBus::write(self, write)?;
            SpiBus::read(self, read)
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            SpiBus::read(self, words)
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push("flush".into());
            Ok(())
        }
    }

    impl AsyncSpiBus for MockBus {
        async fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            SpiBus::read(self, words)
        }

        async fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
            SpiBus::write(self, words)
        }

        async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
            SpiBus::transfer(self, read, write)
        }

        async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
            SpiBus::transfer_in_place(self, words)
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            SpiBus::flush(self)
        }
    }

    struct MockPin {
        id: usize,
        log: Log,
    }

    impl PinErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push(format!("cs{} low", self.id));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.log.borrow_mut().push(format!("cs{} high", self.id));
            Ok(())
        }
    }

    fn transport(log: &Log) -> SpiTransport<MockBus, MockPin, 2> {
        let bus = MockBus {
            log: log.clone(),
            rx: 0xA5,
        };
        let pins = [0, 1].map(|id| MockPin {
            id,
            log: log.clone(),
        });
        SpiTransport::new(bus, pins).unwrap()
    }

    #[test]
    fn channels_drive_their_own_pin() {
        let log = Log::default();
        let mut spi = transport(&log);
        log.borrow_mut().clear();

        let mut buf = [0u8; 2];
        Transport::select(&mut spi, Channel(1)).unwrap();
        Transport::transmit(&mut spi, &[0x03, 0x00, 0x10]).unwrap();
        Transport::receive(&mut spi, &mut buf).unwrap();
        Transport::deselect(&mut spi, Channel(1)).unwrap();

        assert_eq!(buf, [0xA5, 0xA5]);
        assert_eq!(
            *log.borrow(),
            ["cs1 low", "write [3, 0, 16]", "read 2", "flush", "cs1 high"]
        );
    }

    #[test]
    fn pins_start_released() {
        let log = Log::default();
        let _spi = transport(&log);
        assert_eq!(*log.borrow(), ["cs0 high", "cs1 high"]);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let log = Log::default();
        let mut spi = transport(&log);
        assert_eq!(
            Transport::select(&mut spi, Channel(2)),
            Err(SpiTransportError::Channel)
        );
    }

    #[test]
    fn async_transport_matches_blocking() {
        let log = Log::default();
        let mut spi = transport(&log);
        log.borrow_mut().clear();

        block_on(async {
            AsyncTransport::select(&mut spi, Channel(0)).await.unwrap();
            AsyncTransport::transmit(&mut spi, &[0x06]).await.unwrap();
            AsyncTransport::deselect(&mut spi, Channel(0)).await.unwrap();
        });

        assert_eq!(*log.borrow(), ["cs0 low", "write [6]", "flush", "cs0 high"]);
    }
}
