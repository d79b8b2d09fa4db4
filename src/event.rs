// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timestamped MIDI event records.

use std::fmt;

/// Device clock time in milliseconds.
pub type Timestamp = i32;

/// A packed MIDI message with its timestamp.
///
/// The message holds status, data1 and data2 in its three low bytes, the same
/// layout PortMidi uses for its event records. Nothing here interprets the
/// bytes beyond packing them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Event {
    pub message: i32,
    pub timestamp: Timestamp,
}

impl Event {
    pub fn new(message: i32, timestamp: Timestamp) -> Self {
        Self { message, timestamp }
    }

    /// Pack three MIDI bytes into a message word.
    pub fn pack(status: u8, data1: u8, data2: u8) -> i32 {
        i32::from(status) | (i32::from(data1) << 8) | (i32::from(data2) << 16)
    }

    /// Build an event from raw MIDI bytes.
    pub fn from_bytes(status: u8, data1: u8, data2: u8, timestamp: Timestamp) -> Self {
        Self::new(Self::pack(status, data1, data2), timestamp)
    }

    pub fn status(&self) -> u8 {
        (self.message & 0xFF) as u8
    }

    pub fn data1(&self) -> u8 {
        ((self.message >> 8) & 0xFF) as u8
    }

    pub fn data2(&self) -> u8 {
        ((self.message >> 16) & 0xFF) as u8
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:>8}] {:02X} {:02X} {:02X}",
            self.timestamp,
            self.status(),
            self.data1(),
            self.data2()
        )
    }
}
