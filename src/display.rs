//! Scroll text composition: the user text plus the temperature suffix.

use core::fmt::Write;

use heapless::String;

use crate::config::{MAX_DISPLAY_CHARS, MAX_TEXT_CHARS, SUFFIX_CHARS};

/// Lowest reading, in tenths of a degree Fahrenheit
pub const MIN_TEMPERATURE: i32 = -1211;
/// Highest reading, in tenths of a degree Fahrenheit
pub const MAX_TEMPERATURE: i32 = 1851;

/// Saturates a sensor reading to the range the suffix is laid out for
pub fn clamp_temperature(tenths: i32) -> i32 {
    if tenths < -1210 {
        MIN_TEMPERATURE
    } else if tenths > 1850 {
        MAX_TEMPERATURE
    } else {
        tenths
    }
}

/// `" Temp is 72.5 F "` for 725
pub fn temperature_suffix(tenths: i32) -> String<SUFFIX_CHARS> {
    let tenths = clamp_temperature(tenths);
    let sign = if tenths < 0 { "-" } else { "" };
    let abs = tenths.unsigned_abs();
    let mut suffix = String::new();
    // at most 18 characters after clamping
    let _ = write!(suffix, " Temp is {}{}.{} F ", sign, abs / 10, abs % 10);
    suffix
}

#[derive(Debug, Clone, Default)]
pub struct DisplayText {
    base: String<MAX_TEXT_CHARS>,
    shown: String<MAX_DISPLAY_CHARS>,
}

impl DisplayText {
    /// Replaces the user text.
    ///
    /// Bytes outside printable ASCII become `?`, the text is cut at the first
    /// NUL and at the maximum length. The shown text follows without suffix.
    pub fn set_base(&mut self, bytes: &[u8]) {
        self.base.clear();
        for &b in bytes.iter().take_while(|&&b| b != 0).take(MAX_TEXT_CHARS) {
            let c = if (0x20..0x7F).contains(&b) { b as char } else { '?' };
            // capacity is checked by take()
            let _ = self.base.push(c);
        }
        if bytes.len() > MAX_TEXT_CHARS && !bytes[..MAX_TEXT_CHARS].contains(&0) {
            debug!("Text cut to {=usize} characters", MAX_TEXT_CHARS);
        }
        self.show_base();
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// The text as it is rendered
    pub fn shown(&self) -> &str {
        &self.shown
    }

    fn show_base(&mut self) {
        self.shown.clear();
        let _ = self.shown.push_str(&self.base);
    }

    /// Shows the user text followed by the current temperature
    pub fn show_with_temperature(&mut self, tenths: i32) {
        self.show_base();
        // base and suffix capacities add up to the shown capacity
        let _ = self.shown.push_str(&temperature_suffix(tenths));
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;

    #[test]
    fn boundary_temperatures() {
        assert_eq!(temperature_suffix(-1211), " Temp is -121.1 F ");
        assert_eq!(temperature_suffix(-1210), " Temp is -121.0 F ");
        assert_eq!(temperature_suffix(-1209), " Temp is -120.9 F ");
        assert_eq!(temperature_suffix(-5), " Temp is -0.5 F ");
        assert_eq!(temperature_suffix(0), " Temp is 0.0 F ");
        assert_eq!(temperature_suffix(5), " Temp is 0.5 F ");
        assert_eq!(temperature_suffix(725), " Temp is 72.5 F ");
        assert_eq!(temperature_suffix(1000), " Temp is 100.0 F ");
        assert_eq!(temperature_suffix(1849), " Temp is 184.9 F ");
        assert_eq!(temperature_suffix(1850), " Temp is 185.0 F ");
        assert_eq!(temperature_suffix(1851), " Temp is 185.1 F ");
        assert_eq!(temperature_suffix(i32::MIN), " Temp is -121.1 F ");
        assert_eq!(temperature_suffix(i32::MAX), " Temp is 185.1 F ");
    }

    #[test]
    fn clamp_matches_sensor_range() {
        assert_eq!(clamp_temperature(-1300), -1211);
        assert_eq!(clamp_temperature(-1211), -1211);
        assert_eq!(clamp_temperature(-1210), -1210);
        assert_eq!(clamp_temperature(1850), 1850);
        assert_eq!(clamp_temperature(1851), 1851);
        assert_eq!(clamp_temperature(2000), 1851);
    }

    #[test]
    fn suffix_appended() {
        let mut text = DisplayText::default();
        text.set_base(b"HELLO");
        assert_eq!(text.shown(), "HELLO");
        text.show_with_temperature(-5);
        assert_eq!(text.shown(), "HELLO Temp is -0.5 F ");
        assert_eq!(text.base(), "HELLO");
        text.show_with_temperature(700);
        assert_eq!(text.shown(), "HELLO Temp is 70.0 F ");
    }

    #[test]
    fn base_is_sanitized() {
        let mut text = DisplayText::default();
        text.set_base(b"a\tb\xFFc\0ignored");
        assert_eq!(text.base(), "a?b?c");
        text.set_base(&[b'x'; 200]);
        assert_eq!(text.base().len(), MAX_TEXT_CHARS);
        text.show_with_temperature(-1211);
        assert_eq!(text.shown().len(), MAX_TEXT_CHARS + 18);
        text.set_base(b"");
        assert!(text.is_empty());
    }
}
