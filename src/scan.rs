//! Column multiplexed scan of the 5x7 matrix.
//!
//! Every refresh interrupt shows one matrix column. Five ticks make a full
//! frame, `speed` frames make one scroll step of one raster column.

use bitvec::prelude::*;

use crate::config::{MATRIX_COLUMNS, MATRIX_ROWS};
use crate::font::SPINNER;
use crate::interface::LedPort;

/// Port pin of every matrix row, top row first
pub const ROW_PINS: [u8; MATRIX_ROWS] = [2, 7, 8, 9, 1, 0, 3];
/// Port pin of every matrix column, left column first
pub const COLUMN_PINS: [u8; MATRIX_COLUMNS] = [11, 10, 4, 5, 6];
/// Every pin driven by the scan
pub const MATRIX_PINS: u16 = 0xFFF;
/// The switch shares a row pin and is sampled between two columns
pub const SWITCH_PIN: u16 = 1 << 0;
/// Consecutive high samples confirming a press
pub const DEBOUNCE_TICKS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    /// Bouncing dot, shown before any text
    Spinner,
    /// The rendered raster
    Pattern,
}

/// Scroll position, mutated only by [`ScanEngine::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    /// Raster column shown in the leftmost matrix column
    pub start: usize,
    /// Matrix column lit by the next tick
    pub step: u8,
    /// Frames shown since the last scroll step
    pub scan_count: u8,
    /// Frames per scroll step
    pub speed: u8,
    /// Raster length in columns
    pub len: usize,
}

/// Result of one refresh tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    /// Levels of [`MATRIX_PINS`] for this column
    pub levels: u16,
    /// The scroll went past the end of the raster
    pub wrapped: bool,
}

#[derive(Debug, Clone)]
pub struct ScanEngine {
    source: Source,
    pos: Position,
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanEngine {
    pub const fn new() -> Self {
        Self {
            source: Source::Spinner,
            pos: Position {
                start: 0,
                step: 0,
                scan_count: 0,
                speed: 0,
                len: SPINNER.len(),
            },
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    fn rewind(&mut self, len: usize) {
        self.pos.start = 0;
        self.pos.step = 0;
        self.pos.scan_count = 0;
        self.pos.len = len;
    }

    pub fn show_spinner(&mut self, speed: u8) {
        self.source = Source::Spinner;
        self.pos.speed = speed;
        self.rewind(SPINNER.len());
    }

    /// Starts scrolling a freshly rendered raster from its beginning
    pub fn show_pattern(&mut self, len: usize) {
        self.source = Source::Pattern;
        self.rewind(len);
    }

    /// Follows a raster that changed length without restarting the scroll
    pub fn resize(&mut self, len: usize) {
        self.pos.len = len;
        if self.pos.start >= len {
            self.pos.start = 0;
        }
    }

    pub fn set_speed(&mut self, speed: u8) {
        self.pos.speed = speed;
        if self.pos.scan_count >= speed {
            self.pos.scan_count = 0;
        }
    }

    fn column(&self, pattern: &[u8]) -> u8 {
        let Position { start, step, len, .. } = self.pos;
        match self.source {
            Source::Spinner => SPINNER[start % SPINNER.len()][step as usize],
            Source::Pattern if len == 0 => 0,
            Source::Pattern => pattern.get((start + step as usize) % len).copied().unwrap_or(0),
        }
    }

    /// Renders the current column and advances the scroll
    pub fn tick(&mut self, pattern: &[u8]) -> Tick {
        let column = self.column(pattern);
        let bits = column.view_bits::<Lsb0>();
        let mut levels = MATRIX_PINS;
        for (row, pin) in ROW_PINS.iter().enumerate() {
            if !bits[MATRIX_ROWS - 1 - row] {
                levels &= !(1 << pin);
            }
        }
        levels &= !(1 << COLUMN_PINS[self.pos.step as usize]);

        let mut wrapped = false;
        let pos = &mut self.pos;
        pos.step += 1;
        if pos.step as usize == MATRIX_COLUMNS {
            pos.step = 0;
            pos.scan_count = pos.scan_count.saturating_add(1);
            if pos.scan_count >= pos.speed {
                pos.scan_count = 0;
                pos.start += 1;
                if pos.start >= pos.len {
                    pos.start = 0;
                    wrapped = true;
                }
            }
        }
        Tick { levels, wrapped }
    }
}

/// Switch debouncer fed once per refresh tick
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    count: u8,
    pressed: bool,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            count: 0,
            pressed: false,
        }
    }

    pub fn pressed(&self) -> bool {
        self.pressed
    }

    /// Returns true once per confirmed press
    pub fn sample(&mut self, high: bool) -> bool {
        if high {
            if self.count < DEBOUNCE_TICKS {
                self.count += 1;
            }
            if !self.pressed && self.count >= DEBOUNCE_TICKS {
                self.pressed = true;
                return true;
            }
        } else {
            self.count = self.count.saturating_sub(1);
            if self.pressed && self.count == 0 {
                self.pressed = false;
            }
        }
        false
    }
}

/// Reads the switch by briefly turning its row pin into an input
pub fn sample_switch<P: LedPort>(port: &mut P) -> bool {
    port.write(SWITCH_PIN, 0);
    port.set_direction(SWITCH_PIN, false);
    let high = port.read(SWITCH_PIN) != 0;
    port.set_direction(SWITCH_PIN, true);
    high
}
