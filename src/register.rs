use bit::BitIndex;

/// Portion of the array protected from writes by the BP0 and BP1 bits
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockProtection {
    None,
    UpperQuarter,
    UpperHalf,
    All,
}

impl From<u8> for BlockProtection {
    fn from(val: u8) -> Self {
        match val & 0b11 {
            0 => BlockProtection::None,
            1 => BlockProtection::UpperQuarter,
            2 => BlockProtection::UpperHalf,
            _ => BlockProtection::All,
        }
    }
}

impl From<BlockProtection> for u8 {
    fn from(val: BlockProtection) -> Self {
        match val {
            BlockProtection::None => 0,
            BlockProtection::UpperQuarter => 1,
            BlockProtection::UpperHalf => 2,
            BlockProtection::All => 3,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    /// Honor the WP pin, locking the status register while it is low
    pub write_protect_enable: bool,
    pub block_protection: BlockProtection,
    pub write_enable_latch: bool,
    /// Set while an internal write cycle is in progress
    pub not_ready: bool,
}

impl StatusRegister {
    pub(crate) const NOT_READY: usize = 0;
    const WRITE_ENABLE_LATCH: usize = 1;
    const BLOCK_PROTECTION: core::ops::Range<usize> = 2..4;
    const WRITE_PROTECT_ENABLE: usize = 7;
}

impl From<u8> for StatusRegister {
    fn from(val: u8) -> StatusRegister {
        StatusRegister {
            write_protect_enable: val.bit(Self::WRITE_PROTECT_ENABLE),
            block_protection: val.bit_range(Self::BLOCK_PROTECTION).into(),
            write_enable_latch: val.bit(Self::WRITE_ENABLE_LATCH),
            not_ready: val.bit(Self::NOT_READY),
        }
    }
}

impl From<StatusRegister> for u8 {
    fn from(reg: StatusRegister) -> u8 {
        let mut val = 0u8;
        val.set_bit(StatusRegister::WRITE_PROTECT_ENABLE, reg.write_protect_enable);
        val.set_bit_range(StatusRegister::BLOCK_PROTECTION, reg.block_protection.into());
        val.set_bit(StatusRegister::WRITE_ENABLE_LATCH, reg.write_enable_latch);
        val.set_bit(StatusRegister::NOT_READY, reg.not_ready);
        val
    }
}
