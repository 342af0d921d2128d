//! Melody playback on the tone timer.
//!
//! The tone timer toggles the buzzer pin at twice the note frequency. The
//! duration of every note and gap is scheduled on a second match channel of
//! the display timer, whose interrupt steps through the precomputed table.

use heapless::Vec;

use crate::config::MAX_SONG_LEN;
use crate::interface::{ExternalMatch, MatchTimer, OutputMode};

/// Display timer channel ending the current note
pub const STEP_CHANNEL: u8 = 1;
/// Tone timer channel driving the buzzer
pub const TONE_CHANNEL: u8 = 0;

/// Half periods in microseconds of every note a song may use
const NOTES: [(u8, u16); 18] = [
    (b'c', 1915),
    (b'd', 1700),
    (b'e', 1519),
    (b'f', 1432),
    (b's', 1352),
    (b'g', 1275),
    (b'a', 1136),
    (b'v', 1073),
    (b'b', 1014),
    (b'C', 956),
    (b'D', 852),
    (b'E', 758),
    (b'F', 593),
    (b'G', 468),
    (b'A', 346),
    (b'B', 224),
    (b'x', 655),
    (b'y', 715),
];

/// Half period of a note, zero for rests and unknown notes
pub fn half_period(note: u8) -> u16 {
    NOTES
        .iter()
        .find(|(n, _)| *n == note)
        .map_or(0, |(_, half)| *half)
}

/// A stored melody: one note character and one beat count per step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    /// Milliseconds per beat
    pub tempo: u16,
    pub notes: Vec<u8, MAX_SONG_LEN>,
    pub beats: Vec<u8, MAX_SONG_LEN>,
}

impl Song {
    /// Parses `tempo (u16 LE) | length | notes | beats`.
    ///
    /// Returns `None` for truncated data and for songs without tempo or notes.
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (&[lo, hi, len], rest) = data.split_first_chunk::<3>()?;
        let tempo = u16::from_le_bytes([lo, hi]);
        let len = len as usize;
        if tempo == 0 || len == 0 || rest.len() < 2 * len {
            return None;
        }
        Some(Self {
            tempo,
            notes: Vec::from_slice(&rest[..len]).ok()?,
            beats: Vec::from_slice(&rest[len..2 * len]).ok()?,
        })
    }

    /// Bytes taken by [`Song::decode`]
    pub fn encoded_len(&self) -> usize {
        3 + 2 * self.notes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Step {
    /// Zero is silence
    pub half_period: u16,
    /// Microseconds until the next step
    pub duration: u32,
}

#[derive(Debug, Default)]
pub struct Sequencer {
    steps: Vec<Step, { 2 * MAX_SONG_LEN }>,
    index: usize,
    playing: bool,
}

impl Sequencer {
    pub const fn new() -> Self {
        Self {
            steps: Vec::new(),
            index: 0,
            playing: false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Expands every note into the note itself and a half beat of silence
    pub fn load(&mut self, song: &Song) {
        self.steps.clear();
        let tempo_us = song.tempo as u32 * 1000;
        for (&note, &beats) in song.notes.iter().zip(song.beats.iter()) {
            let note = Step {
                half_period: half_period(note),
                duration: (beats as u32).saturating_mul(tempo_us),
            };
            let gap = Step {
                half_period: 0,
                duration: tempo_us / 2,
            };
            // two steps per note always fit
            let _ = self.steps.push(note);
            let _ = self.steps.push(gap);
        }
        self.index = 0;
        debug!("Loaded {=usize} music steps", self.steps.len());
    }

    /// Starts the loaded sequence from its first step
    pub fn start<D: MatchTimer, T: MatchTimer>(&mut self, display: &mut D, tone: &mut T) {
        self.index = 0;
        if self.steps.is_empty() {
            return;
        }
        tone.set_prescale(1);
        tone.reset();
        tone.disable();
        self.playing = true;
        self.advance(display, tone);
    }

    /// Handles the end of the current step, on the display timer interrupt
    pub fn on_step<D: MatchTimer, T: MatchTimer>(&mut self, display: &mut D, tone: &mut T) {
        display.clear_match(STEP_CHANNEL);
        if !self.playing || self.steps.is_empty() {
            return;
        }
        tone.disable();
        tone.set_external_match(TONE_CHANNEL, false, ExternalMatch::Toggle);
        self.advance(display, tone);
    }

    fn advance<D: MatchTimer, T: MatchTimer>(&mut self, display: &mut D, tone: &mut T) {
        let Some(&step) = self.steps.get(self.index) else {
            self.index = 0;
            return;
        };
        if step.half_period != 0 {
            play_tone(tone, step.half_period);
        }
        display.set_match(STEP_CHANNEL, display.count().wrapping_add(step.duration));
        display.set_reset_on_match(STEP_CHANNEL, false);
        display.set_stop_on_match(STEP_CHANNEL, false);
        display.enable_match_interrupt(STEP_CHANNEL);
        self.index += 1;
        if self.index >= self.steps.len() {
            self.index = 0;
        }
    }

    /// Silences the buzzer and stops stepping
    pub fn stop<D: MatchTimer, T: MatchTimer>(&mut self, display: &mut D, tone: &mut T) {
        tone.disable();
        tone.reset();
        tone.set_external_match(TONE_CHANNEL, false, ExternalMatch::Toggle);
        display.disable_match_interrupt(STEP_CHANNEL);
        self.playing = false;
    }
}

fn play_tone<T: MatchTimer>(tone: &mut T, half_period: u16) {
    tone.disable();
    tone.reset();
    tone.set_match(TONE_CHANNEL, half_period as u32);
    tone.set_reset_on_match(TONE_CHANNEL, true);
    tone.set_stop_on_match(TONE_CHANNEL, false);
    tone.disable_match_interrupt(TONE_CHANNEL);
    tone.set_output_mode(TONE_CHANNEL, OutputMode::ExternalMatch);
    tone.set_external_match(TONE_CHANNEL, false, ExternalMatch::Toggle);
    tone.enable();
}
