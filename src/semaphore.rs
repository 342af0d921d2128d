//! Advisory lock over the NFC shared buffer.
//!
//! The first two words of the buffer are one flag per side: word 0 belongs to
//! the firmware, word 1 to the reader. A side raises its own flag only while
//! the other one is down, then checks again that the other flag stayed down.
//! Both sides may fail at once, but they never both succeed.

use crate::interface::SharedMemory;

/// Value of a lowered flag
pub const UNLOCKED: u32 = 0x0000_02FD;
/// Value the firmware writes into its flag while it owns the buffer
pub const FIRMWARE_LOCK: u32 = 0x0001_02FD;
/// Flag written by the firmware
pub const FIRMWARE_WORD: usize = 0;
/// Flag written by the reader
pub const HOST_WORD: usize = 1;

pub struct TagSemaphore {
    own: usize,
    other: usize,
    pattern: u32,
}

impl TagSemaphore {
    /// Firmware side of the handshake
    pub const fn firmware() -> Self {
        Self {
            own: FIRMWARE_WORD,
            other: HOST_WORD,
            pattern: FIRMWARE_LOCK,
        }
    }

    /// Mirrored side, used to emulate the reader
    pub const fn mirrored(pattern: u32) -> Self {
        Self {
            own: HOST_WORD,
            other: FIRMWARE_WORD,
            pattern,
        }
    }

    /// Tries to take the buffer without blocking
    pub fn acquire<M: SharedMemory>(&self, mem: &mut M) -> bool {
        debug_assert!(mem.len_words() > self.own.max(self.other));
        if mem.read_word(self.other) != UNLOCKED {
            trace!("Shared buffer busy");
            return false;
        }
        mem.write_word(self.own, self.pattern);
        if mem.read_word(self.own) == self.pattern && mem.read_word(self.other) == UNLOCKED {
            true
        } else {
            trace!("Lost shared buffer race");
            mem.write_word(self.own, UNLOCKED);
            false
        }
    }

    pub fn release<M: SharedMemory>(&self, mem: &mut M) {
        debug_assert!(mem.len_words() > self.own);
        mem.write_word(self.own, UNLOCKED);
    }
}
