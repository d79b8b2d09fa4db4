// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Output streams.

use tracing::trace;

use super::buffer::{native_len, EventWindow, ScratchBuffer};
use super::{MidiStream, StreamHandle, StreamState};
use crate::device::{DeviceId, PortMidi};
use crate::error::{Error, Result};
use crate::event::{Event, Timestamp};
use crate::native::Backend;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// An open stream sending events to one output device.
pub struct OutputStream<'a, B: Backend> {
    handle: StreamHandle<'a, B>,
    latency_ms: i32,
}

impl<'a, B: Backend> OutputStream<'a, B> {
    pub(crate) fn open(
        pm: &'a PortMidi<B>,
        id: DeviceId,
        buffer_size: usize,
        latency_ms: i32,
    ) -> Result<Self> {
        let buffer_size = native_len(buffer_size)?;
        let handle = StreamHandle::open(pm, id, |backend, raw| {
            backend.open_output(raw, id.raw(), buffer_size, latency_ms)
        })?;
        Ok(Self { handle, latency_ms })
    }

    /// Scheduling look-ahead this stream was opened with.
    pub fn latency_ms(&self) -> i32 {
        self.latency_ms
    }

    /// Send `length` events starting at `offset`, in order.
    ///
    /// The window is checked before anything reaches the native layer.
    pub fn write(&mut self, events: &[Event], offset: usize, length: usize) -> Result<()> {
        let raw = self.handle.raw()?;
        let window = EventWindow::new(events, offset, length)?;
        native_len(window.len())?;

        let scratch = ScratchBuffer::from_window(window);
        let status = self.handle.backend().write(raw, scratch.as_slice());
        trace!("Wrote {} events to device {}", scratch.len(), self.handle.device());
        self.handle.check(status).map(drop)
    }

    /// Send every event in `events`.
    pub fn write_all(&mut self, events: &[Event]) -> Result<()> {
        self.write(events, 0, events.len())
    }

    /// Send one packed message.
    pub fn write_short(&mut self, timestamp: Timestamp, message: i32) -> Result<()> {
        let raw = self.handle.raw()?;
        let status = self.handle.backend().write_short(raw, timestamp, message);
        self.handle.check(status).map(drop)
    }

    /// Send a complete system-exclusive message, `F0` through `F7`.
    pub fn write_sysex(&mut self, timestamp: Timestamp, payload: &[u8]) -> Result<()> {
        let raw = self.handle.raw()?;
        let payload = validate_sysex(payload)?;
        let status = self.handle.backend().write_sysex(raw, timestamp, payload);
        trace!("Wrote {} sysex bytes to device {}", payload.len(), self.handle.device());
        self.handle.check(status).map(drop)
    }
}

/// The native layer reads sysex up to the first EOX, so the frame must end
/// there and nowhere earlier.
fn validate_sysex(payload: &[u8]) -> Result<&[u8]> {
    match payload {
        [] => Err(Error::InvalidSysEx("empty payload")),
        [first, ..] if *first != SYSEX_START => Err(Error::InvalidSysEx("missing F0 start byte")),
        [.., last] if *last != SYSEX_END => Err(Error::InvalidSysEx("missing F7 end byte")),
        [_, body @ .., _] if body.contains(&SYSEX_END) => {
            Err(Error::InvalidSysEx("F7 before end of payload"))
        }
        _ => Ok(payload),
    }
}

impl<B: Backend> MidiStream for OutputStream<'_, B> {
    fn device_id(&self) -> DeviceId {
        self.handle.device()
    }

    fn state(&self) -> StreamState {
        self.handle.state()
    }

    fn close(&mut self) -> Result<()> {
        self.handle.close()
    }

    fn abort(&mut self) -> Result<()> {
        self.handle.abort()
    }
}
