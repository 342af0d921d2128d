//! Routines linked from the chip SDK static library.
//!
//! The NDEF message handling, the temperature measurement, the RTC based
//! measurement timeout, the EEPROM controller and the power management unit
//! stay in the vendor code; everything else is driven from Rust.

use core::ffi::{c_int, c_void};

/// Bytes the NDEF module keeps per instance
pub const NDEFT2T_INSTANCE_SIZE: usize = 64;

pub const RECORD_TYPE_TEXT: c_int = 1;
pub const RECORD_TYPE_MIME: c_int = 3;

pub const TSEN_10BITS: c_int = 3;
pub const TMEAS_FORMAT_FAHRENHEIT: c_int = 3;

pub const CLOCK_PERIPHERAL_16TIMER0: u32 = 1 << 7;
pub const CLOCK_PERIPHERAL_32TIMER0: u32 = 1 << 9;

pub const PMU_DPD_WAKEUPREASON_RTC: c_int = 1;
pub const PMU_DPD_WAKEUPREASON_NFCPOWER: c_int = 2;
pub const PMU_DPD_WAKEUPREASON_NONE: c_int = 0;
pub const PMU_STATUS_BROWNOUT: u32 = 1 << 4;

#[repr(C)]
pub struct CreateRecordInfo {
    /// NUL terminated language code or MIME type
    pub string: *const u8,
    pub short_record: bool,
    pub uri_code: u8,
}

#[repr(C)]
pub struct ParseRecordInfo {
    pub kind: c_int,
    pub string: *const u8,
    pub uri_code: u8,
}

extern "C" {
    pub fn Chip_Clock_System_SetClockFreq(frequency: u32);
    pub fn Chip_Clock_Peripheral_EnableClock(clk: u32);
    pub fn Board_Init();

    pub fn Chip_NFC_Init(nfc: *mut c_void);
    pub fn NDEFT2T_Init();
    pub fn NDEFT2T_DeInit();
    pub fn NDEFT2T_CreateMessage(instance: *mut u8, data: *mut u8, length: c_int, short_message: bool);
    pub fn NDEFT2T_CreateTextRecord(instance: *mut u8, info: *const CreateRecordInfo) -> bool;
    pub fn NDEFT2T_CreateMimeRecord(instance: *mut u8, info: *const CreateRecordInfo) -> bool;
    pub fn NDEFT2T_WriteRecordPayload(instance: *mut u8, data: *const c_void, size: c_int) -> c_int;
    pub fn NDEFT2T_CommitRecord(instance: *mut u8) -> bool;
    pub fn NDEFT2T_CommitMessage(instance: *mut u8) -> bool;
    pub fn NDEFT2T_GetMessage(instance: *mut u8, data: *mut u8, length: c_int) -> bool;
    pub fn NDEFT2T_GetNextRecord(instance: *mut u8, info: *mut ParseRecordInfo) -> bool;
    pub fn NDEFT2T_GetRecordPayload(instance: *mut u8, length: *mut c_int) -> *const u8;

    pub fn TMeas_Measure(resolution: c_int, format: c_int, synchronous: bool, context: u32) -> c_int;

    pub fn Timer_Init();
    pub fn Timer_StartMeasurementTimeout(seconds: c_int);
    pub fn Timer_CheckMeasurementTimeout() -> bool;

    pub fn Chip_EEPROM_Init(eeprom: *mut c_void);
    pub fn Chip_EEPROM_Read(eeprom: *mut c_void, offset: c_int, buf: *mut c_void, size: c_int);
    pub fn Chip_EEPROM_Write(eeprom: *mut c_void, offset: c_int, buf: *const c_void, size: c_int);
    pub fn Chip_EEPROM_Flush(eeprom: *mut c_void, wait: bool);

    pub fn Chip_PMU_PowerMode_GetDPDWakeupReason() -> c_int;
    pub fn Chip_PMU_SetBODEnabled(enabled: bool);
    pub fn Chip_PMU_GetStatus() -> u32;
    pub fn Chip_PMU_PowerMode_EnterDeepPowerDown(brownout: bool);
    pub fn Chip_PMU_Switch_OpenVDDBat();

    /// Interrupt handlers owned by the SDK modules
    pub fn NFC_IRQHandler();
    pub fn RTC_IRQHandler();
    pub fn TSEN_IRQHandler();
}
