//! Peripheral interrupt numbers and the device part of the vector table.

use crate::sdk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[allow(non_camel_case_types)]
#[repr(u16)]
pub enum Interrupt {
    PIO0_0 = 0,
    PIO0_1 = 1,
    PIO0_2 = 2,
    PIO0_3 = 3,
    PIO0_4 = 4,
    PIO0_5 = 5,
    PIO0_6 = 6,
    PIO0_7 = 7,
    PIO0_8 = 8,
    PIO0_9 = 9,
    PIO0_10 = 10,
    RFFIELD = 11,
    RTCPWREQ = 12,
    NFC = 13,
    RTC = 14,
    I2C0 = 15,
    CT16B0 = 16,
    PMUFLD = 17,
    CT32B0 = 18,
    PMUBOD = 19,
    SSP0 = 20,
    TSEN = 21,
    C2D = 22,
    I2D = 24,
    ADC = 25,
    WDT = 26,
    FLASH = 27,
    EEPROM = 28,
    PIO0 = 31,
}

pub use self::Interrupt as interrupt;

// SAFETY: every variant is a valid IRQ number of this chip
unsafe impl cortex_m::interrupt::InterruptNumber for Interrupt {
    fn number(self) -> u16 {
        self as u16
    }
}

pub union Vector {
    handler: unsafe extern "C" fn(),
    reserved: usize,
}

extern "C" {
    fn PIO0_0();
    fn PIO0_1();
    fn PIO0_2();
    fn PIO0_3();
    fn PIO0_4();
    fn PIO0_5();
    fn PIO0_6();
    fn PIO0_7();
    fn PIO0_8();
    fn PIO0_9();
    fn PIO0_10();
    fn RFFIELD();
    fn RTCPWREQ();
    fn I2C0();
    fn CT16B0();
    fn PMUFLD();
    fn CT32B0();
    fn PMUBOD();
    fn SSP0();
    fn C2D();
    fn I2D();
    fn ADC();
    fn WDT();
    fn FLASH();
    fn EEPROM();
    fn PIO0();
}

#[link_section = ".vector_table.interrupts"]
#[no_mangle]
pub static __INTERRUPTS: [Vector; 32] = [
    Vector { handler: PIO0_0 },
    Vector { handler: PIO0_1 },
    Vector { handler: PIO0_2 },
    Vector { handler: PIO0_3 },
    Vector { handler: PIO0_4 },
    Vector { handler: PIO0_5 },
    Vector { handler: PIO0_6 },
    Vector { handler: PIO0_7 },
    Vector { handler: PIO0_8 },
    Vector { handler: PIO0_9 },
    Vector { handler: PIO0_10 },
    Vector { handler: RFFIELD },
    Vector { handler: RTCPWREQ },
    // NFC, RTC and temperature sensor belong to the SDK modules
    Vector { handler: sdk::NFC_IRQHandler },
    Vector { handler: sdk::RTC_IRQHandler },
    Vector { handler: I2C0 },
    Vector { handler: CT16B0 },
    Vector { handler: PMUFLD },
    Vector { handler: CT32B0 },
    Vector { handler: PMUBOD },
    Vector { handler: SSP0 },
    Vector { handler: sdk::TSEN_IRQHandler },
    Vector { handler: C2D },
    Vector { reserved: 0 },
    Vector { handler: I2D },
    Vector { handler: ADC },
    Vector { handler: WDT },
    Vector { handler: FLASH },
    Vector { handler: EEPROM },
    Vector { reserved: 0 },
    Vector { reserved: 0 },
    Vector { handler: PIO0 },
];
