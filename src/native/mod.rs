// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Native MIDI library abstraction.
//!
//! This module describes the fixed C-style surface of PortMidi and PortTime
//! as a [`Backend`] trait, so the safe layers above can run against either
//! the real library or the in-process [`Loopback`] devices.
//!
//! Methods mirror the C functions one to one and return raw status integers.
//! Checking those statuses is the caller's job.

pub mod loopback;
#[cfg(feature = "portmidi")]
pub mod portmidi;

pub use loopback::{Loopback, NativeCalls};
#[cfg(feature = "portmidi")]
pub use portmidi::PortMidiLibrary;

use std::fmt;

/// `pmNoError` / `ptNoError`
pub const NO_ERROR: i32 = 0;
/// `pmGotData`: returned by poll when input is waiting
pub const GOT_DATA: i32 = 1;
/// `pmNoDevice`: sentinel for "no default device"
pub const NO_DEVICE: i32 = -1;

pub const HOST_ERROR: i32 = -10000;
pub const INVALID_DEVICE_ID: i32 = -9999;
pub const INSUFFICIENT_MEMORY: i32 = -9998;
pub const BUFFER_TOO_SMALL: i32 = -9997;
pub const BUFFER_OVERFLOW: i32 = -9996;
pub const BAD_PTR: i32 = -9995;
pub const BAD_DATA: i32 = -9994;
pub const INTERNAL_ERROR: i32 = -9993;
pub const BUFFER_MAX_SIZE: i32 = -9992;

pub const PT_HOST_ERROR: i32 = -10000;
pub const PT_ALREADY_STARTED: i32 = -9999;
pub const PT_ALREADY_STOPPED: i32 = -9998;
pub const PT_INSUFFICIENT_MEMORY: i32 = -9997;

/// Buffer size PortMidi substitutes when a caller passes zero.
pub const DEFAULT_BUFFER_SIZE: i32 = 256;

/// One `PmEvent` record as laid out in native memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmEvent {
    pub message: i32,
    pub timestamp: i32,
}

/// Owned copy of a native `PmDeviceInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDeviceInfo {
    pub struct_version: i32,
    pub interf: String,
    pub name: String,
    pub input: bool,
    pub output: bool,
    pub opened: bool,
}

/// The PortMidi + PortTime C API.
///
/// A backend value is a cheap handle onto one native library instance.
/// Clones share that instance, including its clock. Streams are opaque
/// values that are only meaningful to the backend that produced them.
pub trait Backend: Clone {
    /// Opaque native stream pointer.
    type Stream: Copy + fmt::Debug;

    fn initialize(&self) -> i32;
    fn terminate(&self) -> i32;
    /// Whether `initialize` has run without a matching `terminate`.
    fn is_initialized(&self) -> bool;

    fn count_devices(&self) -> i32;
    fn default_input_device_id(&self) -> i32;
    fn default_output_device_id(&self) -> i32;
    /// `None` when the native layer returns a null info pointer.
    fn device_info(&self, id: i32) -> Option<RawDeviceInfo>;

    /// Open an input stream. On success `stream` holds the new handle.
    fn open_input(&self, stream: &mut Option<Self::Stream>, device: i32, buffer_size: i32)
        -> i32;
    /// Open an output stream. On success `stream` holds the new handle.
    fn open_output(
        &self,
        stream: &mut Option<Self::Stream>,
        device: i32,
        buffer_size: i32,
        latency: i32,
    ) -> i32;

    fn set_filter(&self, stream: Self::Stream, filters: i32) -> i32;
    fn set_channel_mask(&self, stream: Self::Stream, mask: i32) -> i32;
    fn abort(&self, stream: Self::Stream) -> i32;
    fn close(&self, stream: Self::Stream) -> i32;
    fn poll(&self, stream: Self::Stream) -> i32;
    /// Fill `buffer` with pending input. Returns the record count or an error.
    fn read(&self, stream: Self::Stream, buffer: &mut [PmEvent]) -> i32;
    fn write(&self, stream: Self::Stream, buffer: &[PmEvent]) -> i32;
    fn write_short(&self, stream: Self::Stream, timestamp: i32, message: i32) -> i32;
    /// `message` runs up to and including the EOX byte.
    fn write_sysex(&self, stream: Self::Stream, timestamp: i32, message: &[u8]) -> i32;

    fn error_text(&self, code: i32) -> String;
    /// Host error detail, cleared once read. Empty if there is none.
    fn host_error_text(&self) -> String;

    fn timer_start(&self, resolution: i32) -> i32;
    fn timer_stop(&self) -> i32;
    fn timer_started(&self) -> bool;
    fn timer_time(&self) -> i32;
    fn timer_sleep(&self, duration: i32);
    fn timer_error_text(&self, code: i32) -> String;
}

/// PortMidi's `Pm_GetErrorText` table.
pub fn portmidi_error_text(code: i32) -> &'static str {
    match code {
        NO_ERROR => "PortMidi: `Success'",
        HOST_ERROR => "PortMidi: `Host error'",
        INVALID_DEVICE_ID => "PortMidi: `Invalid device ID'",
        INSUFFICIENT_MEMORY => "PortMidi: `Insufficient memory'",
        BUFFER_TOO_SMALL => "PortMidi: `Buffer too small'",
        BUFFER_OVERFLOW => "PortMidi: `Buffer overflow'",
        BAD_PTR => "PortMidi: `Bad pointer'",
        BAD_DATA => "PortMidi: `Invalid MIDI message Data'",
        INTERNAL_ERROR => "PortMidi: `Internal PortMidi Error'",
        BUFFER_MAX_SIZE => "PortMidi: `Buffer cannot be made larger'",
        _ => "PortMidi: `Illegal error number'",
    }
}

/// PortTime has no text lookup of its own, so both backends share this table.
pub fn porttime_error_text(code: i32) -> &'static str {
    match code {
        NO_ERROR => "PortTime: success",
        PT_HOST_ERROR => "PortTime: host error",
        PT_ALREADY_STARTED => "PortTime: timer already started",
        PT_ALREADY_STOPPED => "PortTime: timer already stopped",
        PT_INSUFFICIENT_MEMORY => "PortTime: insufficient memory",
        _ => "PortTime: illegal error number",
    }
}
