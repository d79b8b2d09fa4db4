// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Native status code families.
//!
//! Both PortMidi and PortTime report failures as negative integers drawn from
//! a small closed set. Each family is modeled as an enum whose discriminant is
//! the ordinal of the code in its family's known list, plus a trailing
//! `Unknown` member for statuses outside that list.

use std::fmt;

use crate::native::Backend;

/// Text returned for the synthetic `Unknown` member of either family.
pub const UNKNOWN_ERROR_TEXT: &str = "unknown error";

/// A closed family of native status codes.
pub trait ErrorFamily: Copy + Eq + fmt::Debug + 'static {
    /// Family name used in logs and messages.
    const FAMILY: &'static str;

    /// Known native constants, indexed by ordinal.
    const KNOWN: &'static [i32];

    /// Map an ordinal back to its member. Out-of-range ordinals map to `Unknown`.
    fn from_ordinal(ordinal: usize) -> Self;

    /// Position of this member in the family (`KNOWN.len()` for `Unknown`).
    fn ordinal(self) -> usize;

    /// The `Unknown` member.
    fn unknown() -> Self {
        Self::from_ordinal(Self::KNOWN.len())
    }

    /// The native constant this member stands for, `None` for `Unknown`.
    fn native_code(self) -> Option<i32> {
        Self::KNOWN.get(self.ordinal()).copied()
    }

    /// Classify a negative native status.
    fn from_status(status: i32) -> Self {
        Self::KNOWN
            .iter()
            .position(|&code| code == status)
            .map(Self::from_ordinal)
            .unwrap_or_else(Self::unknown)
    }
}

/// Check a native status.
///
/// Non-negative statuses are legitimate return values (counts, booleans) and
/// pass through unchanged. Negative ones are classified within family `F`.
pub fn translate<F: ErrorFamily>(status: i32) -> Result<i32, F> {
    if status >= 0 {
        Ok(status)
    } else {
        Err(F::from_status(status))
    }
}

/// PortMidi (`PmError`) status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    HostError = 0,
    InvalidDeviceId = 1,
    InsufficientMemory = 2,
    BufferTooSmall = 3,
    BufferOverflow = 4,
    BadPtr = 5,
    BadData = 6,
    InternalError = 7,
    BufferMaxSize = 8,
    Unknown = 9,
}

impl DeviceErrorKind {
    const ALL: [DeviceErrorKind; 10] = [
        DeviceErrorKind::HostError,
        DeviceErrorKind::InvalidDeviceId,
        DeviceErrorKind::InsufficientMemory,
        DeviceErrorKind::BufferTooSmall,
        DeviceErrorKind::BufferOverflow,
        DeviceErrorKind::BadPtr,
        DeviceErrorKind::BadData,
        DeviceErrorKind::InternalError,
        DeviceErrorKind::BufferMaxSize,
        DeviceErrorKind::Unknown,
    ];

    /// Every member, in ordinal order.
    pub fn all() -> &'static [DeviceErrorKind] {
        &Self::ALL
    }

    /// Descriptive text from the native library's own table.
    pub fn text<B: Backend>(self, backend: &B) -> String {
        match self.native_code() {
            Some(code) => backend.error_text(code),
            None => UNKNOWN_ERROR_TEXT.to_string(),
        }
    }
}

impl ErrorFamily for DeviceErrorKind {
    const FAMILY: &'static str = "device";

    const KNOWN: &'static [i32] = &[
        -10000, // pmHostError
        -9999,  // pmInvalidDeviceId
        -9998,  // pmInsufficientMemory
        -9997,  // pmBufferTooSmall
        -9996,  // pmBufferOverflow
        -9995,  // pmBadPtr
        -9994,  // pmBadData
        -9993,  // pmInternalError
        -9992,  // pmBufferMaxSize
    ];

    fn from_ordinal(ordinal: usize) -> Self {
        Self::ALL
            .get(ordinal)
            .copied()
            .unwrap_or(DeviceErrorKind::Unknown)
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceErrorKind::HostError => "host error",
            DeviceErrorKind::InvalidDeviceId => "invalid device id",
            DeviceErrorKind::InsufficientMemory => "insufficient memory",
            DeviceErrorKind::BufferTooSmall => "buffer too small",
            DeviceErrorKind::BufferOverflow => "buffer overflow",
            DeviceErrorKind::BadPtr => "bad stream pointer",
            DeviceErrorKind::BadData => "invalid MIDI data",
            DeviceErrorKind::InternalError => "internal error",
            DeviceErrorKind::BufferMaxSize => "buffer cannot be made larger",
            DeviceErrorKind::Unknown => UNKNOWN_ERROR_TEXT,
        };
        f.write_str(name)
    }
}

/// PortTime (`PtError`) status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerErrorKind {
    HostError = 0,
    AlreadyStarted = 1,
    AlreadyStopped = 2,
    InsufficientMemory = 3,
    Unknown = 4,
}

impl TimerErrorKind {
    const ALL: [TimerErrorKind; 5] = [
        TimerErrorKind::HostError,
        TimerErrorKind::AlreadyStarted,
        TimerErrorKind::AlreadyStopped,
        TimerErrorKind::InsufficientMemory,
        TimerErrorKind::Unknown,
    ];

    /// Every member, in ordinal order.
    pub fn all() -> &'static [TimerErrorKind] {
        &Self::ALL
    }

    /// Descriptive text from the native timer's table.
    pub fn text<B: Backend>(self, backend: &B) -> String {
        match self.native_code() {
            Some(code) => backend.timer_error_text(code),
            None => UNKNOWN_ERROR_TEXT.to_string(),
        }
    }
}

impl ErrorFamily for TimerErrorKind {
    const FAMILY: &'static str = "timer";

    const KNOWN: &'static [i32] = &[
        -10000, // ptHostError
        -9999,  // ptAlreadyStarted
        -9998,  // ptAlreadyStopped
        -9997,  // ptInsufficientMemory
    ];

    fn from_ordinal(ordinal: usize) -> Self {
        Self::ALL
            .get(ordinal)
            .copied()
            .unwrap_or(TimerErrorKind::Unknown)
    }

    fn ordinal(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TimerErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerErrorKind::HostError => "host error",
            TimerErrorKind::AlreadyStarted => "timer already started",
            TimerErrorKind::AlreadyStopped => "timer already stopped",
            TimerErrorKind::InsufficientMemory => "insufficient memory",
            TimerErrorKind::Unknown => UNKNOWN_ERROR_TEXT,
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Loopback;

    #[test]
    fn test_non_negative_status_passes_through() {
        assert_eq!(translate::<DeviceErrorKind>(0), Ok(0));
        assert_eq!(translate::<DeviceErrorKind>(17), Ok(17));
        assert_eq!(translate::<TimerErrorKind>(1), Ok(1));
    }

    #[test]
    fn test_known_status_maps_to_ordinal() {
        assert_eq!(
            translate::<DeviceErrorKind>(-9999),
            Err(DeviceErrorKind::InvalidDeviceId)
        );
        assert_eq!(DeviceErrorKind::InvalidDeviceId.ordinal(), 1);
        assert_eq!(
            translate::<TimerErrorKind>(-9998),
            Err(TimerErrorKind::AlreadyStopped)
        );
        assert_eq!(TimerErrorKind::AlreadyStopped.ordinal(), 2);
    }

    #[test]
    fn test_unmatched_status_is_unknown() {
        assert_eq!(translate::<DeviceErrorKind>(-1), Err(DeviceErrorKind::Unknown));
        assert_eq!(translate::<TimerErrorKind>(-42), Err(TimerErrorKind::Unknown));
        assert_eq!(DeviceErrorKind::Unknown.ordinal(), DeviceErrorKind::KNOWN.len());
        assert_eq!(TimerErrorKind::Unknown.ordinal(), TimerErrorKind::KNOWN.len());
    }

    #[test]
    fn test_ordinal_round_trip() {
        for &kind in DeviceErrorKind::all() {
            assert_eq!(DeviceErrorKind::from_ordinal(kind.ordinal()), kind);
        }
        for &kind in TimerErrorKind::all() {
            assert_eq!(TimerErrorKind::from_ordinal(kind.ordinal()), kind);
        }
        assert_eq!(DeviceErrorKind::from_ordinal(99), DeviceErrorKind::Unknown);
    }

    #[test]
    fn test_native_code_recovered_from_ordinal() {
        assert_eq!(DeviceErrorKind::HostError.native_code(), Some(-10000));
        assert_eq!(DeviceErrorKind::BufferMaxSize.native_code(), Some(-9992));
        assert_eq!(DeviceErrorKind::Unknown.native_code(), None);
        assert_eq!(TimerErrorKind::InsufficientMemory.native_code(), Some(-9997));
    }

    #[test]
    fn test_error_text_for_every_ordinal() {
        let backend = Loopback::new();

        for &kind in DeviceErrorKind::all() {
            assert!(!kind.text(&backend).is_empty(), "{:?}", kind);
        }
        for &kind in TimerErrorKind::all() {
            assert!(!kind.text(&backend).is_empty(), "{:?}", kind);
        }

        assert_eq!(DeviceErrorKind::Unknown.text(&backend), UNKNOWN_ERROR_TEXT);
        assert_eq!(TimerErrorKind::Unknown.text(&backend), UNKNOWN_ERROR_TEXT);
    }
}
