//! Tagged records in fixed EEPROM slots.
//!
//! Every record starts with a 4 byte header holding its tag and payload
//! length. A slot whose header does not carry the expected tag, or claims more
//! than the slot holds, reads as empty.

use bilge::prelude::*;

use crate::config::MAX_TEXT_CHARS;
use crate::display::DisplayText;
use crate::interface::Eeprom;
use crate::music::Song;

pub const HEADER_SIZE: u32 = 4;
pub const PAGE_SIZE: u32 = 64;

/// Start of every slot in tag order, the last entry ends the table
const SLOT_ADDRESS: [u32; 5] = [0, 2 * PAGE_SIZE, 3 * PAGE_SIZE, 19 * PAGE_SIZE, 60 * PAGE_SIZE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Tag {
    Text = 0xA1,
    Speed = 0xA2,
    Music = 0xA3,
    /// Slot reserved for logged temperatures, unused
    TemperatureLog = 0xA4,
}

impl Tag {
    fn slot(self) -> usize {
        (self as u8 - Tag::Text as u8) as usize
    }

    pub fn address(self) -> u32 {
        SLOT_ADDRESS[self.slot()]
    }

    /// Largest payload the slot holds
    pub fn capacity(self) -> u32 {
        SLOT_ADDRESS[self.slot() + 1] - self.address() - HEADER_SIZE
    }
}

#[bitsize(32)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub tag: u8,
    /// Payload length, little endian on storage
    pub len: u16,
    reserved: u8,
}

impl RecordHeader {
    fn for_payload(tag: Tag, len: u16) -> Self {
        let mut header = Self::from(0u32);
        header.set_tag(tag as u8);
        header.set_len(len);
        header
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    Storage(E),
    /// Header and payload would run into the next slot
    Overflow,
}

pub struct Settings<S: Eeprom> {
    storage: S,
}

impl<S: Eeprom> Settings<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn release(self) -> S {
        self.storage
    }

    /// Copies the payload of `tag` into `buf` and returns its length.
    ///
    /// Zero when the slot is empty or invalid, or the payload does not fit `buf`.
    pub fn read_tag(&mut self, tag: Tag, buf: &mut [u8]) -> usize {
        let mut raw = [0; HEADER_SIZE as usize];
        if self.storage.read(tag.address(), &mut raw).is_err() {
            warn!("EEPROM header read failed for {}", tag);
            return 0;
        }
        let header = RecordHeader::from(u32::from_le_bytes(raw));
        let len = header.len() as usize;
        if header.tag() != tag as u8 || len as u32 > tag.capacity() {
            debug!("No valid record for {}", tag);
            return 0;
        }
        let Some(dest) = buf.get_mut(..len) else {
            debug!("Record {} does not fit {=usize} bytes", tag, buf.len());
            return 0;
        };
        match self.storage.read(tag.address() + HEADER_SIZE, dest) {
            Ok(()) => len,
            Err(_) => {
                warn!("EEPROM payload read failed for {}", tag);
                0
            }
        }
    }

    /// Rewrites header and payload of `tag`, then flushes
    pub fn write_tag(&mut self, tag: Tag, payload: &[u8]) -> Result<(), StoreError<S::Error>> {
        if payload.len() as u32 > tag.capacity() {
            warn!("Record {} of {=usize} bytes overflows its slot", tag, payload.len());
            return Err(StoreError::Overflow);
        }
        let header = RecordHeader::for_payload(tag, payload.len() as u16);
        self.storage
            .write(tag.address(), &u32::from(header).to_le_bytes())
            .map_err(StoreError::Storage)?;
        self.storage
            .write(tag.address() + HEADER_SIZE, payload)
            .map_err(StoreError::Storage)?;
        self.storage.flush().map_err(StoreError::Storage)?;
        debug!("Stored {} with {=usize} bytes", tag, payload.len());
        Ok(())
    }

    /// Writes `data` followed by NULs up to the next multiple of 4 bytes.
    ///
    /// `min_pad` forces that many NULs even when `data` is already aligned.
    fn write_padded(&mut self, tag: Tag, data: &[u8], min_pad: usize) -> Result<(), StoreError<S::Error>> {
        let mut buf = [0u8; 128];
        let len = (data.len() + min_pad + 3) & !3;
        let dest = buf.get_mut(..len).ok_or(StoreError::Overflow)?;
        dest[..data.len()].copy_from_slice(data);
        self.write_tag(tag, dest)
    }

    /// Loads the persisted text, false if there is none
    pub fn load_text(&mut self, text: &mut DisplayText) -> bool {
        let mut buf = [0u8; 128];
        let len = self.read_tag(Tag::Text, &mut buf);
        if len == 0 || buf[0] == 0 {
            return false;
        }
        text.set_base(&buf[..len.min(MAX_TEXT_CHARS)]);
        !text.is_empty()
    }

    /// Stores the text NUL terminated and padded
    pub fn store_text(&mut self, text: &str) -> Result<(), StoreError<S::Error>> {
        self.write_padded(Tag::Text, text.as_bytes(), 1)
    }

    /// Raw speed as sent by the reader
    pub fn load_speed(&mut self) -> Option<u8> {
        let mut buf = [0u8; 4];
        match self.read_tag(Tag::Speed, &mut buf) {
            0 => None,
            _ => Some(buf[0]),
        }
    }

    pub fn store_speed(&mut self, raw: u8) -> Result<(), StoreError<S::Error>> {
        self.write_tag(Tag::Speed, &[raw, 0, 0, 0])
    }

    pub fn load_song(&mut self) -> Option<Song> {
        let mut buf = [0u8; 1024];
        let len = self.read_tag(Tag::Music, &mut buf);
        Song::decode(&buf[..len])
    }

    /// Stores the encoded song padded to 4 bytes
    pub fn store_song(&mut self, song: &Song) -> Result<(), StoreError<S::Error>> {
        let mut buf = [0u8; 1020];
        let len = song.encoded_len();
        let padded = (len + 3) & !3;
        let dest = buf.get_mut(..padded).ok_or(StoreError::Overflow)?;
        dest[..2].copy_from_slice(&song.tempo.to_le_bytes());
        dest[2] = song.notes.len() as u8;
        let (notes, beats) = dest[3..len].split_at_mut(song.notes.len());
        notes.copy_from_slice(&song.notes);
        beats.copy_from_slice(&song.beats);
        self.write_tag(Tag::Music, dest)
    }
}
