//! Memory mapped registers of the LPC8N04 blocks driven from Rust.

use core::ptr;

use bilge::prelude::*;
use defmt::Format;

pub const IOCON_BASE: usize = 0x4004_4000;
pub const NFC_BASE: usize = 0x4005_8000;
pub const TSEN_BASE: usize = 0x4006_0000;
pub const EEPROM_BASE: usize = 0x4003_4000;
pub const GPIO_BASE: usize = 0x5000_0000;
pub const CT16B0_BASE: usize = 0x4000_C000;
pub const CT32B0_BASE: usize = 0x4001_4000;

/// Shared buffer of the NFC block, 128 words
pub const NFC_BUF: usize = NFC_BASE + 0x80;
pub const NFC_BUF_WORDS: usize = 128;

/// Masked data access: address bits 2..13 select the pins touched
pub const GPIO_DATA: usize = GPIO_BASE;
pub const GPIO_DIR: usize = GPIO_BASE + 0x8000;

pub mod timer {
    /// Interrupt register, write 1 to clear
    pub const IR: usize = 0x00;
    pub const TC: usize = 0x08;
    pub const PR: usize = 0x0C;
    /// Match register of channel `n`
    pub const fn mr(n: u8) -> usize {
        0x18 + 4 * n as usize
    }
    pub const PWMC: usize = 0x74;
}

#[inline]
pub fn read_word(addr: usize) -> u32 {
    // SAFETY: callers only pass addresses of mapped registers or the NFC buffer
    unsafe { ptr::read_volatile(addr as *const u32) }
}

#[inline]
pub fn write_word(addr: usize, value: u32) {
    // SAFETY: see read_word
    unsafe { ptr::write_volatile(addr as *mut u32, value) }
}

/// A 32-bit register at a fixed offset from its block
pub trait Register: Copy + Sized + PartialEq + From<u32> + Into<u32> {
    const OFFSET: usize;
    fn read(base: usize) -> Self {
        Self::from(read_word(base + Self::OFFSET))
    }
    fn write(self, base: usize) {
        write_word(base + Self::OFFSET, self.into())
    }
    fn modify(base: usize, f: impl FnOnce(&mut Self)) {
        let mut reg = Self::read(base);
        let copy = reg;
        f(&mut reg);
        if reg != copy {
            reg.write(base)
        }
    }
}

macro_rules! register_impl {
    ($type:ty, $offset:literal) => {
        impl Register for $type {
            const OFFSET: usize = $offset;
        }
    };
}

register_impl!(TimerControl, 0x04);
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerControl {
    pub enable: bool,
    /// Holds counter and prescaler at zero while set
    pub reset: bool,
    reserved: u30,
}

#[bitsize(3)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchAction {
    pub interrupt: bool,
    pub reset: bool,
    pub stop: bool,
}

register_impl!(MatchControl, 0x14);
/// Per channel action when the counter equals the match register
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchControl {
    pub channels: [MatchAction; 4],
    reserved: u20,
}

register_impl!(ExternalMatchControl, 0x3C);
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExternalMatchControl {
    /// Current level of each match output
    pub levels: [bool; 4],
    /// What each match does to its output, see `ledtag::interface::ExternalMatch`
    pub actions: [u2; 4],
    reserved: u20,
}

pub mod iocon {
    use bilge::prelude::*;
    use defmt::Format;

    #[bitsize(2)]
    #[derive(FromBits, Debug, Format, Clone, Copy, Default, PartialEq, Eq)]
    pub enum Resistor {
        #[default]
        Inactive = 0b00,
        PullDown = 0b01,
        PullUp = 0b10,
        Repeater = 0b11,
    }
}

/// Function and pull resistor of one pin, at `IOCON_BASE + 4 * pin`
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinConfig {
    pub func: u3,
    pub resistor: iocon::Resistor,
    reserved: u27,
}

impl PinConfig {
    pub fn set(pin: u8, func: u8, resistor: iocon::Resistor) {
        let addr = IOCON_BASE + 4 * pin as usize;
        let mut reg = Self::from(read_word(addr));
        reg.set_func(u3::new(func));
        reg.set_resistor(resistor);
        write_word(addr, reg.into());
    }
}

/// Status word of the temperature sensor
#[bitsize(32)]
#[derive(FromBits, DebugBits, Format, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsenStatus {
    pub in_operation: bool,
    pub ready: bool,
    reserved: u30,
}

register_impl!(TsenStatus, 0x08);
