use core::fmt::Debug;

use embedded_storage::nor_flash::{NorFlashError, NorFlashErrorKind};

/// All possible errors emitted by the driver
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<TransportError> {
    /// The transport failed to transmit, receive, select or deselect
    Transport(TransportError),

    /// The transport lacks one of the capabilities the driver needs.
    /// Reported before any bus activity.
    InvalidHandle,

    /// Address out of bound
    OutOfBounds,

    /// Address not aligned
    NotAligned,
}

impl<E> NorFlashError for Error<E>
where
    E: Debug,
{
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::Transport(_) | Error::InvalidHandle => NorFlashErrorKind::Other,
        }
    }
}
