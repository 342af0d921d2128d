//! In-memory stand-ins for the chip, used by the host tests.

extern crate std;

use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use embedded_storage::{ReadStorage, Storage};

use crate::interface::*;
use crate::semaphore::UNLOCKED;

#[derive(Debug, Default)]
pub struct MockTimer {
    pub counter: u32,
    pub matches: [u32; 4],
    pub interrupts: [bool; 4],
    pub pending: [bool; 4],
    pub reset_on_match: [bool; 4],
    pub stop_on_match: [bool; 4],
    pub external: [Option<(bool, ExternalMatch)>; 4],
    pub output_mode: [Option<OutputMode>; 4],
    pub prescale: u32,
    pub running: bool,
}

impl MatchTimer for MockTimer {
    fn count(&self) -> u32 {
        self.counter
    }

    fn set_match(&mut self, channel: u8, value: u32) {
        self.matches[channel as usize] = value;
    }

    fn enable_match_interrupt(&mut self, channel: u8) {
        self.interrupts[channel as usize] = true;
    }

    fn disable_match_interrupt(&mut self, channel: u8) {
        self.interrupts[channel as usize] = false;
    }

    fn match_pending(&self, channel: u8) -> bool {
        self.pending[channel as usize]
    }

    fn clear_match(&mut self, channel: u8) {
        self.pending[channel as usize] = false;
    }

    fn set_reset_on_match(&mut self, channel: u8, enabled: bool) {
        self.reset_on_match[channel as usize] = enabled;
    }

    fn set_stop_on_match(&mut self, channel: u8, enabled: bool) {
        self.stop_on_match[channel as usize] = enabled;
    }

    fn enable(&mut self) {
        self.running = true;
    }

    fn disable(&mut self) {
        self.running = false;
    }

    fn reset(&mut self) {
        self.counter = 0;
    }

    fn set_prescale(&mut self, prescale: u32) {
        self.prescale = prescale;
    }

    fn set_external_match(&mut self, channel: u8, initial_high: bool, action: ExternalMatch) {
        self.external[channel as usize] = Some((initial_high, action));
    }

    fn set_output_mode(&mut self, channel: u8, mode: OutputMode) {
        self.output_mode[channel as usize] = Some(mode);
    }
}

/// Output pins read back their level, input pins read `input`
#[derive(Debug, Default)]
pub struct MockPort {
    pub levels: u16,
    pub input: u16,
    pub output: u16,
}

impl LedPort for MockPort {
    fn write(&mut self, mask: u16, value: u16) {
        self.levels = (self.levels & !mask) | (value & mask);
    }

    fn read(&self, mask: u16) -> u16 {
        ((self.input & !self.output) | (self.levels & self.output)) & mask
    }

    fn set_direction(&mut self, mask: u16, output: bool) {
        if output {
            self.output |= mask;
        } else {
            self.output &= !mask;
        }
    }
}

#[derive(Debug, Default)]
pub struct MockPins {
    pub matrix: bool,
    pub tone: bool,
}

impl PinMux for MockPins {
    fn matrix_mode(&mut self) {
        self.matrix = true;
    }

    fn tone_output(&mut self, enabled: bool) {
        self.tone = enabled;
    }
}

#[derive(Debug)]
pub struct MockMemory {
    pub words: [u32; 64],
}

impl Default for MockMemory {
    fn default() -> Self {
        Self {
            words: [UNLOCKED; 64],
        }
    }
}

impl SharedMemory for MockMemory {
    fn len_words(&self) -> usize {
        self.words.len()
    }

    fn read_word(&self, index: usize) -> u32 {
        self.words[index]
    }

    fn write_word(&mut self, index: usize, value: u32) {
        self.words[index] = value;
    }
}

/// Outgoing message steps, recorded once they succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOp {
    Begin,
    Text(String),
    Mime(String),
    Payload(Vec<u8>),
    CommitRecord,
    CommitMessage,
}

/// A record written by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String, Vec<u8>),
    Mime(String, Vec<u8>),
    Other(Vec<u8>),
}

#[derive(Debug, Default)]
pub struct MockTag {
    pub ops: Vec<TagOp>,
    /// Fails the outgoing step with this index
    pub fail_at: Option<usize>,
    steps: usize,
    /// Messages the reader will write, oldest first
    pub inbox: VecDeque<Vec<Inbound>>,
    loaded: Vec<Inbound>,
    cursor: usize,
    pub shut_down: bool,
}

impl MockTag {
    /// Tag whose outgoing step `index` fails
    pub fn failing_at(index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::default()
        }
    }

    fn step(&mut self, op: TagOp) -> Result<(), ()> {
        let index = self.steps;
        self.steps += 1;
        if self.fail_at == Some(index) {
            return Err(());
        }
        self.ops.push(op);
        Ok(())
    }

    /// Payloads of the last committed message
    pub fn committed_payloads(&self) -> Vec<Vec<u8>> {
        let Some(end) = self.ops.iter().rposition(|op| *op == TagOp::CommitMessage) else {
            return Vec::new();
        };
        let start = self.ops[..end]
            .iter()
            .rposition(|op| *op == TagOp::Begin)
            .unwrap_or(0);
        self.ops[start..end]
            .iter()
            .filter_map(|op| match op {
                TagOp::Payload(payload) => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }
}

impl NdefTag for MockTag {
    type Error = ();

    fn begin_message(&mut self) -> Result<(), ()> {
        self.step(TagOp::Begin)
    }

    fn create_record(&mut self, kind: RecordType<'_>) -> Result<(), ()> {
        let op = match kind {
            RecordType::Text { language } => TagOp::Text(language.into()),
            RecordType::Mime { mime_type } => TagOp::Mime(mime_type.into()),
            RecordType::Other => TagOp::Mime(String::new()),
        };
        self.step(op)
    }

    fn write_payload(&mut self, payload: &[u8]) -> Result<(), ()> {
        self.step(TagOp::Payload(payload.to_vec()))
    }

    fn commit_record(&mut self) -> Result<(), ()> {
        self.step(TagOp::CommitRecord)
    }

    fn commit_message(&mut self) -> Result<(), ()> {
        self.step(TagOp::CommitMessage)
    }

    fn read_message(&mut self) -> bool {
        match self.inbox.pop_front() {
            Some(message) => {
                self.loaded = message;
                self.cursor = 0;
                true
            }
            None => false,
        }
    }

    fn next_record(&mut self) -> Option<Record<'_>> {
        self.cursor += 1;
        let record = match self.loaded.get(self.cursor - 1)? {
            Inbound::Text(language, payload) => Record {
                kind: RecordType::Text { language: language.as_str() },
                payload: payload.as_slice(),
            },
            Inbound::Mime(mime_type, payload) => Record {
                kind: RecordType::Mime { mime_type: mime_type.as_str() },
                payload: payload.as_slice(),
            },
            Inbound::Other(payload) => Record {
                kind: RecordType::Other,
                payload: payload.as_slice(),
            },
        };
        Some(record)
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

/// Erased EEPROM reading 0xFF
#[derive(Debug)]
pub struct MockEeprom {
    pub data: [u8; 4096],
    pub flushes: usize,
    /// Every access fails while set
    pub fail: bool,
}

impl Default for MockEeprom {
    fn default() -> Self {
        Self {
            data: [0xFF; 4096],
            flushes: 0,
            fail: false,
        }
    }
}

impl MockEeprom {
    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, MockError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if !self.fail && end <= self.data.len() => Ok(start..end),
            _ => Err(MockError),
        }
    }
}

impl ReadStorage for MockEeprom {
    type Error = MockError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), MockError> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl Storage for MockEeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), MockError> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

impl Eeprom for MockEeprom {
    fn flush(&mut self) -> Result<(), MockError> {
        if self.fail {
            return Err(MockError);
        }
        self.flushes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockTicker {
    pub started: Option<u16>,
    /// Expires on the next poll
    pub due: bool,
    /// Expires on every poll
    pub always: bool,
}

impl Ticker for MockTicker {
    fn start(&mut self, ticks: u16) {
        self.started = Some(ticks);
    }

    fn expired(&mut self) -> bool {
        let due = self.due || self.always;
        self.due = false;
        due
    }
}

#[derive(Debug, Default)]
pub struct MockThermometer {
    pub measurements: usize,
    /// Polls answered busy after the next measurement
    pub busy_for: usize,
    pub busy_polls: usize,
}

impl Thermometer for MockThermometer {
    fn measure(&mut self) {
        self.measurements += 1;
    }

    fn busy(&mut self) -> bool {
        self.busy_polls += 1;
        if self.busy_for > 0 {
            self.busy_for -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug)]
pub struct MockPower {
    pub wake: WakeReason,
    pub brownout: bool,
    /// Brown-out flag handed to deep power down
    pub deep_power_down: Option<bool>,
    pub powered_off: bool,
}

impl Default for MockPower {
    fn default() -> Self {
        Self {
            wake: WakeReason::Reset,
            brownout: false,
            deep_power_down: None,
            powered_off: false,
        }
    }
}

impl Power for MockPower {
    fn wake_reason(&mut self) -> WakeReason {
        self.wake
    }

    fn sample_brownout(&mut self) -> bool {
        self.brownout
    }

    fn enter_deep_power_down(&mut self, brownout: bool) {
        self.deep_power_down = Some(brownout);
    }

    fn power_off(&mut self) {
        self.powered_off = true;
    }
}

pub struct MockBoard;

impl Board for MockBoard {
    type DisplayTimer = MockTimer;
    type ToneTimer = MockTimer;
    type Port = MockPort;
    type Pins = MockPins;
    type Memory = MockMemory;
    type Tag = MockTag;
    type Storage = MockEeprom;
    type Ticker = MockTicker;
    type Thermometer = MockThermometer;
    type Power = MockPower;
}
