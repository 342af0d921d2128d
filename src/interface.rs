//! Primitive operations the logic needs from the chip.
//!
//! Everything here is implemented by the firmware over the LPC8N04 registers
//! and vendor routines, and by in-memory mocks for the host tests.

use embedded_storage::Storage;

/// Word access into the NFC shared buffer
pub trait SharedMemory {
    /// Size of the region in 32-bit words
    fn len_words(&self) -> usize;
    fn read_word(&self, index: usize) -> u32;
    fn write_word(&mut self, index: usize, value: u32);
}

/// What a match output pin does when the counter hits the match register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ExternalMatch {
    DoNothing = 0,
    Clear = 1,
    Set = 2,
    Toggle = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputMode {
    /// Output driven by the external match control
    ExternalMatch,
    Pwm,
}

/// One counter/timer block with its match channels
pub trait MatchTimer {
    /// Current counter value, in timer ticks
    fn count(&self) -> u32;
    fn set_match(&mut self, channel: u8, value: u32);
    fn enable_match_interrupt(&mut self, channel: u8);
    fn disable_match_interrupt(&mut self, channel: u8);
    fn match_pending(&self, channel: u8) -> bool;
    fn clear_match(&mut self, channel: u8);
    fn set_reset_on_match(&mut self, channel: u8, enabled: bool);
    fn set_stop_on_match(&mut self, channel: u8, enabled: bool);
    /// Starts counting
    fn enable(&mut self);
    /// Stops counting, keeps the count
    fn disable(&mut self);
    /// Clears the counter and the prescale counter
    fn reset(&mut self);
    fn set_prescale(&mut self, prescale: u32);
    fn set_external_match(&mut self, channel: u8, initial_high: bool, action: ExternalMatch);
    fn set_output_mode(&mut self, channel: u8, mode: OutputMode);
}

/// The 12-pin GPIO port the matrix and the switch live on
pub trait LedPort {
    /// Writes `value` to the pins selected by `mask`, leaving the others alone
    fn write(&mut self, mask: u16, value: u16);
    fn read(&self, mask: u16) -> u16;
    /// Pins set in `mask` become outputs when `output` is true, inputs otherwise
    fn set_direction(&mut self, mask: u16, output: bool);
}

/// Pin function selection
pub trait PinMux {
    /// All matrix pins as plain GPIO without pulls
    fn matrix_mode(&mut self);
    /// Routes the tone timer match output to the buzzer pin, or back to GPIO
    fn tone_output(&mut self, enabled: bool);
}

/// Byte addressed, page programmed persistent storage
pub trait Eeprom: Storage {
    /// Programs everything written so far, returns once it is committed
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Kind of an NDEF record, with its language code or MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordType<'a> {
    Text { language: &'a str },
    Mime { mime_type: &'a str },
    Other,
}

/// One record of a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Record<'a> {
    pub kind: RecordType<'a>,
    pub payload: &'a [u8],
}

/// Message level access to the NDEF collaborator owning the shared buffer
pub trait NdefTag {
    type Error;
    /// Starts an empty outgoing message
    fn begin_message(&mut self) -> Result<(), Self::Error>;
    /// Opens a short record of the given type in the outgoing message
    fn create_record(&mut self, kind: RecordType<'_>) -> Result<(), Self::Error>;
    fn write_payload(&mut self, payload: &[u8]) -> Result<(), Self::Error>;
    fn commit_record(&mut self) -> Result<(), Self::Error>;
    /// Makes the outgoing message visible to the reader
    fn commit_message(&mut self) -> Result<(), Self::Error>;
    /// Loads the message last written by the reader, false if there is none
    fn read_message(&mut self) -> bool;
    /// Next record of the loaded message
    fn next_record(&mut self) -> Option<Record<'_>>;
    /// Ends the NFC session
    fn shutdown(&mut self);
}

/// Free running measurement tick, independent from the display timer
pub trait Ticker {
    fn start(&mut self, ticks: u16);
    /// True once the started window elapsed
    fn expired(&mut self) -> bool;
}

pub trait Thermometer {
    /// Starts a conversion, the result arrives through the temperature callback
    fn measure(&mut self);
    fn busy(&mut self) -> bool;
}

/// Why the chip came out of deep power down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    None,
    NfcField,
    Rtc,
    Reset,
}

pub trait Power {
    fn wake_reason(&mut self) -> WakeReason;
    /// Enables brown-out detection long enough to read its status
    fn sample_brownout(&mut self) -> bool;
    /// Only returns when the power domain is kept alive externally
    fn enter_deep_power_down(&mut self, brownout: bool);
    /// Only returns when the power domain is kept alive externally
    fn power_off(&mut self);
}

/// Names every collaborator of one platform
pub trait Board {
    type DisplayTimer: MatchTimer;
    type ToneTimer: MatchTimer;
    type Port: LedPort;
    type Pins: PinMux;
    type Memory: SharedMemory;
    type Tag: NdefTag;
    type Storage: Eeprom;
    type Ticker: Ticker;
    type Thermometer: Thermometer;
    type Power: Power;
}
