use fugit::MicrosDurationU32;

/// Bytes reserved for one NDEF message in the shared buffer, a multiple of 4
pub const MESSAGE_CAPACITY: usize = 512;
/// Display text including the temperature suffix
pub const MAX_DISPLAY_CHARS: usize = 130;
/// Room kept free for the temperature suffix
pub const SUFFIX_CHARS: usize = 20;
/// Longest user text, persisted or received over NFC
pub const MAX_TEXT_CHARS: usize = MAX_DISPLAY_CHARS - SUFFIX_CHARS;
/// One glyph is six columns wide, the last one being the gap
pub const GLYPH_COLUMNS: usize = 6;
pub const MAX_PATTERN_LEN: usize = GLYPH_COLUMNS * MAX_DISPLAY_CHARS;
/// Columns of the physical matrix, also the number of ticks per scroll step
pub const MATRIX_COLUMNS: usize = 5;
pub const MATRIX_ROWS: usize = 7;
pub const MAX_SONG_LEN: usize = 200;

/// Where the device goes once the host stops talking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    DeepPowerDown,
    /// Disconnects the supply; only taken when explicitly configured
    PowerOff,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Window for the first command after boot, in measurement ticks
    pub first_host_timeout: u16,
    /// Window renewed by every field-on and message event
    pub host_timeout: u16,
    /// Grace period after the field drops, covers PCDs that cycle the field
    pub last_host_timeout: u16,
    /// Period of the display interrupt, one matrix column per period
    pub refresh_period: MicrosDurationU32,
    /// Scan ticks per scroll step when nothing valid is stored
    pub default_speed: u8,
    /// Scroll speed of the idle spinner
    pub idle_speed: u8,
    pub min_speed: u8,
    pub max_speed: u8,
    /// The host sends and stores speeds relative to this offset
    pub speed_offset: u8,
    pub default_text: &'static str,
    pub power_mode: PowerMode,
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Config {
    pub const DEFAULT: Self = Self {
        first_host_timeout: 100,
        host_timeout: 100,
        last_host_timeout: 100,
        refresh_period: MicrosDurationU32::millis(4),
        default_speed: 20,
        idle_speed: 5,
        min_speed: 5,
        max_speed: 30,
        speed_offset: 5,
        default_text: "The LPC Experience; Your World Reimagined",
        power_mode: PowerMode::DeepPowerDown,
    };

    /// Refresh period in milliseconds, as reported to the reader
    pub fn refresh_millis(&self) -> u32 {
        self.refresh_period.to_millis()
    }

    /// Converts a raw host/EEPROM speed into scan ticks per step.
    ///
    /// Out of range values fall back to the default instead of clamping.
    pub fn speed_from_raw(&self, raw: u8) -> u8 {
        let speed = raw as u16 + self.speed_offset as u16;
        if speed < self.min_speed as u16 || speed > self.max_speed as u16 {
            self.default_speed
        } else {
            speed as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_speed_is_offset() {
        let conf = Config::default();
        assert_eq!(conf.speed_from_raw(10), 15);
        assert_eq!(conf.speed_from_raw(0), 5);
        assert_eq!(conf.speed_from_raw(25), 30);
    }

    #[test]
    fn out_of_range_speed_falls_back() {
        let conf = Config::default();
        assert_eq!(conf.speed_from_raw(26), 20);
        assert_eq!(conf.speed_from_raw(255), 20);
    }
}
