//! Messages exchanged with the reader.
//!
//! The device publishes a text record with the scrolled text and a binary
//! status record. The reader answers with a text record replacing the text, or
//! a binary record carrying a command byte and its argument.

use heapless::Vec;

use crate::config::MAX_TEXT_CHARS;
use crate::font::Font;
use crate::interface::{NdefTag, Record, RecordType};
use crate::music::Song;
use crate::scan::Position;

pub const LANGUAGE: &str = "en";
pub const MIME_TYPE: &str = "application/octet-stream";

/// Leading byte of the binary records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    Speed = 0x51,
    Status = 0x52,
    Music = 0x53,
}

/// Raster columns between the scan position and the reported position
const LOOKAHEAD: usize = 5;

/// Where the scroll will be, reported so the reader can follow along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// Raster column five columns ahead of the scan
    pub index: usize,
    /// Milliseconds until the scroll reaches `index`
    pub delay: u16,
    /// Milliseconds per scroll step
    pub period: u16,
    /// Speed relative to the speed offset
    pub raw_speed: u8,
    pub font: Font,
}

impl Status {
    pub fn new(pos: Position, refresh_ms: u32, speed_offset: u8, font: Font) -> Self {
        let index = match pos.len {
            0 => 0,
            len => (pos.start + LOOKAHEAD) % len,
        };
        let frame = refresh_ms as i64 * crate::config::MATRIX_COLUMNS as i64;
        let delay = (pos.speed as i64 - pos.scan_count as i64) * frame - pos.step as i64 * refresh_ms as i64;
        Self {
            index,
            delay: delay as u16,
            period: (pos.speed as i64 * frame) as u16,
            raw_speed: pos.speed.wrapping_sub(speed_offset),
            font,
        }
    }

    pub fn encode(&self) -> [u8; 9] {
        let delay = self.delay.to_le_bytes();
        let period = self.period.to_le_bytes();
        [
            Command::Status as u8,
            (self.index / 6) as u8,
            (self.index % 6) as u8,
            delay[0],
            delay[1],
            period[0],
            period[1],
            self.raw_speed,
            self.font.code(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError<E> {
    /// A record step failed, the message was not committed
    Tag(E),
}

/// Writes the text and status records and commits the message.
///
/// Nothing is committed when any step fails.
pub fn publish<T: NdefTag>(
    tag: &mut T,
    text: &str,
    status: &Status,
) -> Result<(), PublishError<T::Error>> {
    tag.begin_message().map_err(PublishError::Tag)?;
    tag.create_record(RecordType::Text { language: LANGUAGE })
        .map_err(PublishError::Tag)?;
    tag.write_payload(text.as_bytes()).map_err(PublishError::Tag)?;
    tag.commit_record().map_err(PublishError::Tag)?;
    tag.create_record(RecordType::Mime { mime_type: MIME_TYPE })
        .map_err(PublishError::Tag)?;
    tag.write_payload(&status.encode()).map_err(PublishError::Tag)?;
    tag.commit_record().map_err(PublishError::Tag)?;
    tag.commit_message().map_err(PublishError::Tag)?;
    trace!("Published status {}", status);
    Ok(())
}

/// A decoded record sent by the reader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Text(Vec<u8, MAX_TEXT_CHARS>),
    /// `None` when the reader sent a melody without tempo or notes
    Music(Option<Song>),
    /// Raw speed, still relative to the speed offset
    Speed(u8),
}

impl HostCommand {
    pub fn decode(record: &Record<'_>) -> Option<Self> {
        match record.kind {
            RecordType::Text { language } if language.starts_with(LANGUAGE) => {
                let len = record.payload.len().min(MAX_TEXT_CHARS);
                Vec::from_slice(&record.payload[..len]).ok().map(Self::Text)
            }
            RecordType::Mime { mime_type } if mime_type.starts_with(MIME_TYPE) => {
                match record.payload.split_first() {
                    Some((&cmd, data)) if cmd == Command::Music as u8 => {
                        Some(Self::Music(Song::decode(data)))
                    }
                    Some((&cmd, &[raw, ..])) if cmd == Command::Speed as u8 => Some(Self::Speed(raw)),
                    _ => {
                        debug!("Ignoring binary record {=[u8]:x}", record.payload);
                        None
                    }
                }
            }
            _ => {
                debug!("Ignoring record {}", record.kind);
                None
            }
        }
    }
}
