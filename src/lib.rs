//! Logic of an NFC powered scrolling LED name tag.
//!
//! The tag harvests its supply from the reader field, scrolls a text over a
//! 5x7 LED matrix, optionally plays a melody, and swaps text, speed and melody
//! with the reader through NDEF messages in the shared NFC buffer. Settings
//! survive in EEPROM between sessions.
//!
//! Hardware access goes through the traits in [`interface`]; the firmware
//! crate implements them for the LPC8N04.
#![no_std]

#[macro_use]
mod fmt;

pub mod app;
pub mod config;
pub mod display;
pub mod exchange;
pub mod font;
pub mod interface;
pub mod link;
pub mod music;
pub mod scan;
pub mod semaphore;
pub mod settings;
pub mod shared;

#[cfg(test)]
mod mock;

pub use app::{App, Boot, Peripherals};
pub use config::{Config, PowerMode};
pub use shared::Shared;
