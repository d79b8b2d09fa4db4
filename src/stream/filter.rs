// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Input filters and channel masks.
//!
//! A set bit in a [`Filter`] drops that class of message before it reaches the
//! input buffer. Bit positions follow PortMidi's `PM_FILT_*` constants.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Filter: i32 {
        const SYSEX = 1 << 0x00;
        const MTC = 1 << 0x01;
        const SONG_POSITION = 1 << 0x02;
        const SONG_SELECT = 1 << 0x03;
        const TUNE = 1 << 0x06;
        const CLOCK = 1 << 0x08;
        const TICK = 1 << 0x09;
        const PLAY = (1 << 0x0A) | (1 << 0x0B) | (1 << 0x0C);
        const UNDEFINED = 1 << 0x0D;
        const ACTIVE = 1 << 0x0E;
        const RESET = 1 << 0x0F;
        const NOTE = (1 << 0x18) | (1 << 0x19);
        const POLY_AFTERTOUCH = 1 << 0x1A;
        const CONTROL = 1 << 0x1B;
        const PROGRAM = 1 << 0x1C;
        const CHANNEL_AFTERTOUCH = 1 << 0x1D;
        const PITCHBEND = 1 << 0x1E;

        const AFTERTOUCH = Self::CHANNEL_AFTERTOUCH.bits() | Self::POLY_AFTERTOUCH.bits();
        const SYSTEM_COMMON = Self::MTC.bits()
            | Self::SONG_POSITION.bits()
            | Self::SONG_SELECT.bits()
            | Self::TUNE.bits();
        const REALTIME = Self::ACTIVE.bits()
            | Self::SYSEX.bits()
            | Self::CLOCK.bits()
            | Self::PLAY.bits()
            | Self::UNDEFINED.bits()
            | Self::RESET.bits()
            | Self::TICK.bits();
    }
}

/// Set of MIDI channels (0-15) an input stream accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMask(u16);

impl ChannelMask {
    pub const ALL: ChannelMask = ChannelMask(0xFFFF);
    pub const NONE: ChannelMask = ChannelMask(0);

    /// A mask holding only `channel`. Channels above 15 are ignored.
    pub fn channel(channel: u8) -> Self {
        Self::NONE.with(channel)
    }

    pub fn with(self, channel: u8) -> Self {
        match 1u16.checked_shl(u32::from(channel)) {
            Some(bit) => ChannelMask(self.0 | bit),
            None => self,
        }
    }

    pub fn accepts(self, channel: u8) -> bool {
        channel < 16 && self.0 & (1 << channel) != 0
    }

    pub fn bits(self) -> i32 {
        i32::from(self.0)
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_bits_match_portmidi() {
        assert_eq!(Filter::ACTIVE.bits(), 0x4000);
        assert_eq!(Filter::NOTE.bits(), 0x0300_0000);
        assert_eq!(Filter::REALTIME.bits(), 0xFF01);
    }

    #[test]
    fn test_filter_combination() {
        let mut filter = Filter::CLOCK | Filter::ACTIVE;
        filter |= Filter::SYSEX;
        assert!(filter.contains(Filter::CLOCK));
        assert!(filter.contains(Filter::SYSEX));
        assert!(!filter.contains(Filter::NOTE));

        filter.remove(Filter::CLOCK);
        assert!(!filter.contains(Filter::CLOCK));
        assert!(filter.intersects(Filter::REALTIME));
        assert!(Filter::empty().is_empty());
    }

    #[test]
    fn test_filter_from_native_bits() {
        assert_eq!(Filter::from_bits(0x4000), Some(Filter::ACTIVE));
        assert_eq!(Filter::from_bits(1 << 0x04), None);
        assert_eq!(Filter::from_bits_truncate(0x4000 | (1 << 0x04)), Filter::ACTIVE);
        assert!(Filter::all().contains(Filter::REALTIME | Filter::NOTE | Filter::PITCHBEND));
    }

    #[test]
    fn test_channel_mask() {
        let mask = ChannelMask::channel(0).with(9);
        assert_eq!(mask.bits(), 0x0201);
        assert!(mask.accepts(9));
        assert!(!mask.accepts(1));
        assert_eq!(ChannelMask::channel(16), ChannelMask::NONE);
        assert_eq!(ChannelMask::default(), ChannelMask::ALL);
    }
}
