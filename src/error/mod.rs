// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Structured failures for device, timer and marshaling calls.
//!
//! Every native status is checked at its call site and turned into an
//! [`Error`] that keeps the family ordinal, so callers can match on it and
//! still ask the native library for descriptive text later.

pub mod codes;

pub use codes::{translate, DeviceErrorKind, ErrorFamily, TimerErrorKind, UNKNOWN_ERROR_TEXT};

use thiserror::Error;

use crate::native::Backend;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the device, stream and timer services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The PortMidi layer reported a failure.
    #[error("MIDI device error: {kind}{}", host_suffix(.host_error))]
    Device {
        kind: DeviceErrorKind,
        /// Host-specific detail, captured when `kind` is `HostError`.
        host_error: Option<String>,
    },

    /// The PortTime layer reported a failure.
    #[error("MIDI timer error: {0}")]
    Timer(TimerErrorKind),

    /// An `offset`/`length` window does not fit the caller's event sequence.
    #[error("event window out of bounds: offset {offset} + length {length} exceeds {available} events")]
    OutOfBounds {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// A system-exclusive payload is not a complete `F0 .. F7` frame.
    #[error("invalid sysex payload: {0}")]
    InvalidSysEx(&'static str),

    /// The stream was already closed.
    #[error("stream is closed")]
    StreamClosed,

    /// The device subsystem is already initialized in this process.
    #[error("MIDI device subsystem is already initialized")]
    AlreadyInitialized,
}

fn host_suffix(host_error: &Option<String>) -> String {
    match host_error {
        Some(text) => format!(" ({})", text),
        None => String::new(),
    }
}

impl Error {
    /// Build a device error, pulling host detail from the backend when the
    /// native layer blamed the host.
    pub(crate) fn device<B: Backend>(backend: &B, kind: DeviceErrorKind) -> Self {
        let host_error = if kind == DeviceErrorKind::HostError {
            let text = backend.host_error_text();
            (!text.is_empty()).then_some(text)
        } else {
            None
        };
        Error::Device { kind, host_error }
    }

    /// A device error without host detail.
    pub(crate) fn device_kind(kind: DeviceErrorKind) -> Self {
        Error::Device {
            kind,
            host_error: None,
        }
    }

    /// The device family member, if this is a device error.
    pub fn device_error(&self) -> Option<DeviceErrorKind> {
        match self {
            Error::Device { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The timer family member, if this is a timer error.
    pub fn timer_error(&self) -> Option<TimerErrorKind> {
        match self {
            Error::Timer(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Ordinal within the error's native family, if it has one.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Error::Device { kind, .. } => Some(kind.ordinal()),
            Error::Timer(kind) => Some(kind.ordinal()),
            _ => None,
        }
    }
}

/// Check a PortMidi status returned by `backend`.
pub(crate) fn check_device<B: Backend>(backend: &B, status: i32) -> Result<i32> {
    translate::<DeviceErrorKind>(status).map_err(|kind| Error::device(backend, kind))
}

/// Check a PortTime status.
pub(crate) fn check_timer(status: i32) -> Result<i32> {
    translate::<TimerErrorKind>(status).map_err(Error::Timer)
}
