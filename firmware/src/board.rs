//! The LPC8N04 behind the `ledtag` collaborator traits.

use core::ffi::{c_int, c_void, CStr};

use bilge::prelude::u2;
use defmt::Format;
use embedded_storage::{ReadStorage, Storage};
use ledtag::config::MESSAGE_CAPACITY;
use ledtag::interface::{
    Board, Eeprom, ExternalMatch, LedPort, MatchTimer, NdefTag, OutputMode, PinMux, Power,
    Record, RecordType, SharedMemory, Thermometer, Ticker, WakeReason,
};
use ledtag::Peripherals;

use crate::regs::{self, iocon::Resistor, timer, PinConfig, Register};
use crate::sdk;

pub struct Lpc8n04;

impl Board for Lpc8n04 {
    type DisplayTimer = CtTimer;
    type ToneTimer = CtTimer;
    type Port = Gpio;
    type Pins = Iocon;
    type Memory = NfcBuffer;
    type Tag = Ndeft2t;
    type Storage = Lpc8n04Eeprom;
    type Ticker = MeasurementTimer;
    type Thermometer = Tsen;
    type Power = Pmu;
}

/// The 2 MHz system clock, the highest a weak field sustains
const SYSTEM_CLOCK: u32 = 2_000_000;
/// Pin routed to the tone timer match output
const TONE_PIN: u8 = 3;
/// Debug pins, kept on their SWD function until the matrix starts
const SWD_PINS: [u8; 2] = [10, 11];

/// Brings up clocks and SDK modules, returns every collaborator
pub fn init() -> Option<Peripherals<Lpc8n04>> {
    // SAFETY: called once before interrupts are enabled
    unsafe {
        sdk::Chip_Clock_System_SetClockFreq(SYSTEM_CLOCK);
        sdk::Board_Init();
        sdk::Chip_NFC_Init(regs::NFC_BASE as *mut c_void);
        sdk::NDEFT2T_Init();
        sdk::Chip_EEPROM_Init(regs::EEPROM_BASE as *mut c_void);
        sdk::Timer_Init();
        sdk::Chip_Clock_Peripheral_EnableClock(
            sdk::CLOCK_PERIPHERAL_16TIMER0 | sdk::CLOCK_PERIPHERAL_32TIMER0,
        );
    }
    for pin in 0..10 {
        PinConfig::set(pin, 0, Resistor::Inactive);
    }
    for pin in SWD_PINS {
        PinConfig::set(pin, 2, Resistor::PullDown);
    }
    let buffers = cortex_m::singleton!(: NdefBuffers = NdefBuffers::new())?;
    Some(Peripherals {
        display_timer: CtTimer::new(regs::CT32B0_BASE),
        tone_timer: CtTimer::new(regs::CT16B0_BASE),
        port: Gpio,
        pins: Iocon,
        memory: NfcBuffer,
        tag: Ndeft2t { buffers },
        storage: Lpc8n04Eeprom,
        ticker: MeasurementTimer,
        thermometer: Tsen,
        power: Pmu,
    })
}

/// One CT16B/CT32B counter/timer block
pub struct CtTimer {
    base: usize,
}

impl CtTimer {
    const fn new(base: usize) -> Self {
        Self { base }
    }

    fn match_action(&mut self, channel: u8, f: impl FnOnce(&mut regs::MatchAction)) {
        regs::MatchControl::modify(self.base, |mcr| {
            let mut action = mcr.channels_at(channel as usize);
            f(&mut action);
            mcr.set_channels_at(channel as usize, action);
        });
    }
}

impl MatchTimer for CtTimer {
    fn count(&self) -> u32 {
        regs::read_word(self.base + timer::TC)
    }

    fn set_match(&mut self, channel: u8, value: u32) {
        regs::write_word(self.base + timer::mr(channel), value);
    }

    fn enable_match_interrupt(&mut self, channel: u8) {
        self.match_action(channel, |a| a.set_interrupt(true));
    }

    fn disable_match_interrupt(&mut self, channel: u8) {
        self.match_action(channel, |a| a.set_interrupt(false));
    }

    fn match_pending(&self, channel: u8) -> bool {
        regs::read_word(self.base + timer::IR) & (1 << channel) != 0
    }

    fn clear_match(&mut self, channel: u8) {
        regs::write_word(self.base + timer::IR, 1 << channel);
    }

    fn set_reset_on_match(&mut self, channel: u8, enabled: bool) {
        self.match_action(channel, |a| a.set_reset(enabled));
    }

    fn set_stop_on_match(&mut self, channel: u8, enabled: bool) {
        self.match_action(channel, |a| a.set_stop(enabled));
    }

    fn enable(&mut self) {
        regs::TimerControl::modify(self.base, |tcr| tcr.set_enable(true));
    }

    fn disable(&mut self) {
        regs::TimerControl::modify(self.base, |tcr| tcr.set_enable(false));
    }

    fn reset(&mut self) {
        let saved = regs::TimerControl::read(self.base);
        regs::TimerControl::from(0u32).write(self.base);
        regs::write_word(self.base + timer::TC, 1);
        let mut reset = regs::TimerControl::from(0u32);
        reset.set_reset(true);
        reset.write(self.base);
        while regs::read_word(self.base + timer::TC) != 0 {}
        saved.write(self.base);
    }

    fn set_prescale(&mut self, prescale: u32) {
        regs::write_word(self.base + timer::PR, prescale);
    }

    fn set_external_match(&mut self, channel: u8, initial_high: bool, action: ExternalMatch) {
        regs::ExternalMatchControl::modify(self.base, |emr| {
            emr.set_levels_at(channel as usize, initial_high);
            emr.set_actions_at(channel as usize, u2::new(action as u8));
        });
    }

    fn set_output_mode(&mut self, channel: u8, mode: OutputMode) {
        // only MAT0 and MAT1 have a PWM mode
        let bit = 1 << (channel & 1);
        let pwmc = regs::read_word(self.base + timer::PWMC);
        let pwmc = match mode {
            OutputMode::Pwm => pwmc | bit,
            OutputMode::ExternalMatch => pwmc & !bit,
        };
        regs::write_word(self.base + timer::PWMC, pwmc);
    }
}

/// PIO0, the matrix and the switch
pub struct Gpio;

const PORT_PINS: u16 = 0xFFF;

impl LedPort for Gpio {
    fn write(&mut self, mask: u16, value: u16) {
        regs::write_word(regs::GPIO_DATA + 4 * (mask & PORT_PINS) as usize, value as u32);
    }

    fn read(&self, mask: u16) -> u16 {
        regs::read_word(regs::GPIO_DATA + 4 * (mask & PORT_PINS) as usize) as u16
    }

    fn set_direction(&mut self, mask: u16, output: bool) {
        let dir = regs::read_word(regs::GPIO_DIR) & PORT_PINS as u32;
        let dir = if output {
            dir | mask as u32
        } else {
            dir & !(mask as u32)
        };
        regs::write_word(regs::GPIO_DIR, dir);
    }
}

pub struct Iocon;

impl PinMux for Iocon {
    fn matrix_mode(&mut self) {
        PinConfig::set(TONE_PIN, 0, Resistor::Inactive);
        for pin in SWD_PINS {
            PinConfig::set(pin, 0, Resistor::Inactive);
        }
    }

    fn tone_output(&mut self, enabled: bool) {
        PinConfig::set(TONE_PIN, enabled as u8, Resistor::Inactive);
    }
}

/// Word view of the NFC shared buffer
pub struct NfcBuffer;

impl SharedMemory for NfcBuffer {
    fn len_words(&self) -> usize {
        regs::NFC_BUF_WORDS
    }

    fn read_word(&self, index: usize) -> u32 {
        debug_assert!(index < regs::NFC_BUF_WORDS);
        regs::read_word(regs::NFC_BUF + 4 * index.min(regs::NFC_BUF_WORDS - 1))
    }

    fn write_word(&mut self, index: usize, value: u32) {
        debug_assert!(index < regs::NFC_BUF_WORDS);
        if index < regs::NFC_BUF_WORDS {
            regs::write_word(regs::NFC_BUF + 4 * index, value);
        }
    }
}

/// Working memory handed to the NDEF module, must not move once used
#[repr(C, align(4))]
pub struct NdefBuffers {
    instance: [u8; sdk::NDEFT2T_INSTANCE_SIZE],
    data: [u8; MESSAGE_CAPACITY],
}

impl NdefBuffers {
    const fn new() -> Self {
        Self {
            instance: [0; sdk::NDEFT2T_INSTANCE_SIZE],
            data: [0; MESSAGE_CAPACITY],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NdefError {
    /// Language code or MIME type longer than the scratch buffer
    TypeTooLong,
    Create,
    Write,
    Commit,
}

pub struct Ndeft2t {
    buffers: &'static mut NdefBuffers,
}

impl Ndeft2t {
    fn instance(&mut self) -> *mut u8 {
        self.buffers.instance.as_mut_ptr()
    }
}

impl NdefTag for Ndeft2t {
    type Error = NdefError;

    fn begin_message(&mut self) -> Result<(), NdefError> {
        let data = self.buffers.data.as_mut_ptr();
        // SAFETY: both buffers are 'static and never move
        unsafe { sdk::NDEFT2T_CreateMessage(self.instance(), data, MESSAGE_CAPACITY as c_int, false) };
        Ok(())
    }

    fn create_record(&mut self, kind: RecordType<'_>) -> Result<(), NdefError> {
        let mut name = [0u8; 32];
        let (text, create): (&str, unsafe extern "C" fn(*mut u8, *const sdk::CreateRecordInfo) -> bool) =
            match kind {
                RecordType::Text { language } => (language, sdk::NDEFT2T_CreateTextRecord),
                RecordType::Mime { mime_type } => (mime_type, sdk::NDEFT2T_CreateMimeRecord),
                RecordType::Other => return Err(NdefError::Create),
            };
        // keep one NUL behind the copied name
        let dest = name
            .get_mut(..text.len())
            .filter(|d| d.len() < 32)
            .ok_or(NdefError::TypeTooLong)?;
        dest.copy_from_slice(text.as_bytes());
        let info = sdk::CreateRecordInfo {
            string: name.as_ptr(),
            short_record: true,
            uri_code: 0,
        };
        // SAFETY: the module copies the type string before returning
        if unsafe { create(self.instance(), &info) } {
            Ok(())
        } else {
            Err(NdefError::Create)
        }
    }

    fn write_payload(&mut self, payload: &[u8]) -> Result<(), NdefError> {
        // SAFETY: the payload is copied into the message buffer
        let written = unsafe {
            sdk::NDEFT2T_WriteRecordPayload(
                self.instance(),
                payload.as_ptr() as *const c_void,
                payload.len() as c_int,
            )
        };
        if written as usize == payload.len() {
            Ok(())
        } else {
            Err(NdefError::Write)
        }
    }

    fn commit_record(&mut self) -> Result<(), NdefError> {
        if unsafe { sdk::NDEFT2T_CommitRecord(self.instance()) } {
            Ok(())
        } else {
            Err(NdefError::Commit)
        }
    }

    fn commit_message(&mut self) -> Result<(), NdefError> {
        if unsafe { sdk::NDEFT2T_CommitMessage(self.instance()) } {
            Ok(())
        } else {
            Err(NdefError::Commit)
        }
    }

    fn read_message(&mut self) -> bool {
        let data = self.buffers.data.as_mut_ptr();
        // SAFETY: the module fills at most MESSAGE_CAPACITY bytes
        unsafe { sdk::NDEFT2T_GetMessage(self.instance(), data, MESSAGE_CAPACITY as c_int) }
    }

    fn next_record(&mut self) -> Option<Record<'_>> {
        let mut info = sdk::ParseRecordInfo {
            kind: 0,
            string: core::ptr::null(),
            uri_code: 0,
        };
        let instance = self.instance();
        // SAFETY: pointers handed back by the module point into `data`, which
        // stays borrowed for the lifetime of the record
        unsafe {
            if !sdk::NDEFT2T_GetNextRecord(instance, &mut info) {
                return None;
            }
            let mut len: c_int = 0;
            let payload = sdk::NDEFT2T_GetRecordPayload(instance, &mut len);
            let payload = if payload.is_null() {
                &[][..]
            } else {
                core::slice::from_raw_parts(payload, len.max(0) as usize)
            };
            let name = if info.string.is_null() {
                ""
            } else {
                CStr::from_ptr(info.string.cast()).to_str().unwrap_or("")
            };
            let kind = match info.kind {
                sdk::RECORD_TYPE_TEXT => RecordType::Text { language: name },
                sdk::RECORD_TYPE_MIME => RecordType::Mime { mime_type: name },
                _ => RecordType::Other,
            };
            Some(Record { kind, payload })
        }
    }

    fn shutdown(&mut self) {
        unsafe { sdk::NDEFT2T_DeInit() }
    }
}

/// EEPROM rows writable by the application
const EEPROM_RW_BYTES: usize = 58 * 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum EepromError {
    OutOfRange,
}

pub struct Lpc8n04Eeprom;

impl Lpc8n04Eeprom {
    fn check(offset: u32, len: usize) -> Result<(), EepromError> {
        match (offset as usize).checked_add(len) {
            Some(end) if end <= EEPROM_RW_BYTES => Ok(()),
            _ => Err(EepromError::OutOfRange),
        }
    }
}

impl ReadStorage for Lpc8n04Eeprom {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), EepromError> {
        Self::check(offset, bytes.len())?;
        // SAFETY: range checked above
        unsafe {
            sdk::Chip_EEPROM_Read(
                regs::EEPROM_BASE as *mut c_void,
                offset as c_int,
                bytes.as_mut_ptr() as *mut c_void,
                bytes.len() as c_int,
            )
        };
        Ok(())
    }

    fn capacity(&self) -> usize {
        EEPROM_RW_BYTES
    }
}

impl Storage for Lpc8n04Eeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), EepromError> {
        Self::check(offset, bytes.len())?;
        // SAFETY: range checked above
        unsafe {
            sdk::Chip_EEPROM_Write(
                regs::EEPROM_BASE as *mut c_void,
                offset as c_int,
                bytes.as_ptr() as *const c_void,
                bytes.len() as c_int,
            )
        };
        Ok(())
    }
}

impl Eeprom for Lpc8n04Eeprom {
    fn flush(&mut self) -> Result<(), EepromError> {
        unsafe { sdk::Chip_EEPROM_Flush(regs::EEPROM_BASE as *mut c_void, true) };
        Ok(())
    }
}

/// RTC based timeout of the SDK timer module, one tick per second
pub struct MeasurementTimer;

impl Ticker for MeasurementTimer {
    fn start(&mut self, ticks: u16) {
        unsafe { sdk::Timer_StartMeasurementTimeout(ticks as c_int) }
    }

    fn expired(&mut self) -> bool {
        unsafe { sdk::Timer_CheckMeasurementTimeout() }
    }
}

pub struct Tsen;

impl Thermometer for Tsen {
    fn measure(&mut self) {
        // result arrives through App_TmeasCb with context 0
        unsafe {
            sdk::TMeas_Measure(sdk::TSEN_10BITS, sdk::TMEAS_FORMAT_FAHRENHEIT, false, 0);
        }
    }

    fn busy(&mut self) -> bool {
        regs::TsenStatus::read(regs::TSEN_BASE).in_operation()
    }
}

pub struct Pmu;

impl Power for Pmu {
    fn wake_reason(&mut self) -> WakeReason {
        match unsafe { sdk::Chip_PMU_PowerMode_GetDPDWakeupReason() } {
            sdk::PMU_DPD_WAKEUPREASON_NONE => WakeReason::None,
            sdk::PMU_DPD_WAKEUPREASON_RTC => WakeReason::Rtc,
            sdk::PMU_DPD_WAKEUPREASON_NFCPOWER => WakeReason::NfcField,
            _ => WakeReason::Reset,
        }
    }

    fn sample_brownout(&mut self) -> bool {
        unsafe {
            sdk::Chip_PMU_SetBODEnabled(true);
            let status = sdk::Chip_PMU_GetStatus();
            sdk::Chip_PMU_SetBODEnabled(false);
            status & sdk::PMU_STATUS_BROWNOUT != 0
        }
    }

    fn enter_deep_power_down(&mut self, brownout: bool) {
        unsafe { sdk::Chip_PMU_PowerMode_EnterDeepPowerDown(brownout) }
    }

    fn power_off(&mut self) {
        unsafe { sdk::Chip_PMU_Switch_OpenVDDBat() }
    }
}
