use crate::PAGE_SIZE;

/// A page id, each page containing 64 bytes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Page(pub u16);

/// An address on the memory chip
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(pub u32);

/// The chip select line a device sits on. Passed as is to the transport.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Channel(pub usize);

impl Address {
    /// Represents any address in memory.
    pub fn from_addr(page: Page, offset: u8) -> Self {
        Address(page.0 as u32 * PAGE_SIZE + offset as u32)
    }

    /// Represents a specific page in memory.
    pub fn from_page(page: Page) -> Self {
        Self::from_addr(page, 0)
    }

    /// The page containing this address
    pub fn page(self) -> Page {
        Page((self.0 / PAGE_SIZE) as u16)
    }

    /// Offset of the address within its page
    pub fn page_offset(self) -> u32 {
        self.0 % PAGE_SIZE
    }

    pub fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }
}

impl From<u16> for Page {
    fn from(page_id: u16) -> Page {
        Page(page_id)
    }
}

impl From<u32> for Address {
    fn from(addr: u32) -> Address {
        Address(addr)
    }
}

impl From<Address> for u32 {
    fn from(addr: Address) -> u32 {
        addr.0
    }
}

impl From<usize> for Channel {
    fn from(channel: usize) -> Channel {
        Channel(channel)
    }
}

/// Splits a write of arbitrary length at an arbitrary address into page writes.
///
/// * A write of at most one page is issued as is, aligned or not.
/// * Otherwise an unaligned start is first completed up to the next page boundary,
///   then the remainder goes out one full page at a time, the last page holding what is left.
///
/// Chunks come out in ascending address order and never have a zero length, except for
/// an empty write which yields a single empty chunk.
#[derive(Debug, Clone)]
pub struct PageWrites<'a> {
    address: u32,
    data: &'a [u8],
    started: bool,
}

impl<'a> PageWrites<'a> {
    pub fn new(address: Address, data: &'a [u8]) -> Self {
        Self {
            address: address.0,
            data,
            started: false,
        }
    }
}

impl<'a> Iterator for PageWrites<'a> {
    type Item = (Address, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            if self.data.len() <= PAGE_SIZE as usize {
                return Some((Address(self.address), core::mem::take(&mut self.data)));
            }
        }
        if self.data.is_empty() {
            return None;
        }

        let room = (PAGE_SIZE - self.address % PAGE_SIZE) as usize;
        let (chunk, rest) = self.data.split_at(room.min(self.data.len()));
        let address = Address(self.address);
        self.address = self.address.wrapping_add(chunk.len() as u32);
        self.data = rest;
        Some((address, chunk))
    }
}
