use crate::address::Address;

/// Instruction set of the CAT25xxx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Command {
    WriteStatus = 0x01,
    Write = 0x02,
    Read = 0x03,
    WriteDisable = 0x04,
    ReadStatus = 0x05,
    WriteEnable = 0x06,
}

impl Command {
    /// Header of an addressed command. The part decodes 16 address bits, anything above is dropped.
    pub(crate) fn with_address(self, addr: Address) -> [u8; 3] {
        let addr_val: u32 = addr.into();
        [self as u8, (addr_val >> 8) as u8, addr_val as u8]
    }
}

/// One step of a chip select bracket
pub(crate) enum Operation<'a> {
    Transmit(&'a [u8]),
    Receive(&'a mut [u8]),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_truncated_to_16_bits() {
        assert_eq!(Command::Read.with_address(Address(0x1234)), [0x03, 0x12, 0x34]);
        assert_eq!(Command::Write.with_address(Address(0xAB_1234)), [0x02, 0x12, 0x34]);
    }
}
