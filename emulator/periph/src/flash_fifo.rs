/*++

Licensed under the Apache-2.0 license.

File Name:

    flash_fifo.rs

Abstract:

    Fixed depth word FIFO used for the flash controller program and read paths.

--*/

use emulator_consts::FLASH_FIFO_DEPTH;
use log::warn;
use std::collections::VecDeque;

/// Value returned when firmware reads an empty FIFO.
pub const FIFO_EMPTY_SENTINEL: u32 = 0xDEAD_BEEF;

pub struct WordFifo {
    name: &'static str,
    words: VecDeque<u32>,
    overflow_warned: bool,
}

impl WordFifo {
    pub const DEPTH: usize = FLASH_FIFO_DEPTH;

    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            words: VecDeque::with_capacity(Self::DEPTH),
            overflow_warned: false,
        }
    }

    /// Appends a word. Pushing past the depth still stores the word; the
    /// first such overflow is reported.
    pub fn push(&mut self, word: u32) {
        if self.is_full() && !self.overflow_warned {
            warn!(
                "{} FIFO overflow: {} words queued, depth is {}",
                self.name,
                self.words.len() + 1,
                Self::DEPTH
            );
            self.overflow_warned = true;
        }
        self.words.push_back(word);
    }

    /// Removes the oldest word, or returns [`FIFO_EMPTY_SENTINEL`] when empty.
    pub fn pop(&mut self) -> u32 {
        match self.words.pop_front() {
            Some(word) => word,
            None => {
                warn!(
                    "{} FIFO underflow, returning 0x{:08x}",
                    self.name, FIFO_EMPTY_SENTINEL
                );
                FIFO_EMPTY_SENTINEL
            }
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.words.len() >= Self::DEPTH
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Empties the FIFO and re-arms the overflow report.
    pub fn reset(&mut self) {
        self.clear();
        self.overflow_warned = false;
    }
}
