// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Input streams.

use tracing::trace;

use super::buffer::{native_len, ScratchBuffer};
use super::filter::{ChannelMask, Filter};
use super::{MidiStream, StreamHandle, StreamState};
use crate::device::{DeviceId, PortMidi};
use crate::error::Result;
use crate::event::Event;
use crate::native::{Backend, GOT_DATA};

/// An open stream receiving events from one input device.
pub struct InputStream<'a, B: Backend> {
    handle: StreamHandle<'a, B>,
}

impl<'a, B: Backend> InputStream<'a, B> {
    pub(crate) fn open(pm: &'a PortMidi<B>, id: DeviceId, buffer_size: usize) -> Result<Self> {
        let buffer_size = native_len(buffer_size)?;
        let handle = StreamHandle::open(pm, id, |backend, raw| {
            backend.open_input(raw, id.raw(), buffer_size)
        })?;
        Ok(Self { handle })
    }

    /// Whether input is waiting. Never blocks.
    pub fn poll(&self) -> Result<bool> {
        let raw = self.handle.raw()?;
        let status = self.handle.check(self.handle.backend().poll(raw))?;
        Ok(status == GOT_DATA)
    }

    /// Read up to `length` waiting events, oldest first.
    ///
    /// Returns fewer events than requested (possibly none) when less input is
    /// waiting.
    pub fn read(&mut self, length: usize) -> Result<Vec<Event>> {
        let raw = self.handle.raw()?;
        native_len(length)?;

        let mut scratch = ScratchBuffer::for_read(length);
        let status = self.handle.backend().read(raw, scratch.as_mut_slice());
        let count = self.handle.check(status)? as usize;

        trace!("Read {} of {} events from device {}", count, length, self.handle.device());
        Ok(scratch.into_events(count))
    }

    /// Drop the message classes in `filter` before they reach the buffer.
    pub fn set_filter(&mut self, filter: Filter) -> Result<()> {
        let raw = self.handle.raw()?;
        let status = self.handle.backend().set_filter(raw, filter.bits());
        self.handle.check(status).map(drop)
    }

    /// Accept channel messages only on the channels in `mask`.
    pub fn set_channel_mask(&mut self, mask: ChannelMask) -> Result<()> {
        let raw = self.handle.raw()?;
        let status = self.handle.backend().set_channel_mask(raw, mask.bits());
        self.handle.check(status).map(drop)
    }
}

impl<B: Backend> MidiStream for InputStream<'_, B> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeviceErrorKind, Error};
    use crate::native::Loopback;

    #[test]
    fn test_open_invalid_device() {
        let backend = Loopback::default();
        let pm = PortMidi::initialize(backend.clone()).unwrap();

        let err = pm.open_input(DeviceId(5), 16).err().unwrap();
        assert_eq!(err.device_error(), Some(DeviceErrorKind::InvalidDeviceId));
        // Output device ids are not inputs.
        assert!(pm.open_input(DeviceId(1), 16).is_err());
        assert_eq!(backend.open_streams(), 0);
    }

    #[test]
    fn test_read_empty() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let mut input = pm.open_input(DeviceId(0), 16).unwrap();

        assert!(!input.poll().unwrap());
        assert!(input.read(8).unwrap().is_empty());
    }

    #[test]
    fn test_read_respects_length() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let mut input = pm.open_input(DeviceId(0), 16).unwrap();
        let mut output = pm.open_output(DeviceId(1), 16, 1).unwrap();

        for i in 0..5 {
            output.write_short(i, Event::pack(0x90, 60 + i as u8, 100)).unwrap();
        }

        let first = input.read(3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].data1(), 60);
        assert_eq!(first[2].data1(), 62);

        let rest = input.read(10).unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[1].timestamp, 4);
    }

    #[test]
    fn test_overflow_is_a_device_error() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let mut input = pm.open_input(DeviceId(0), 1).unwrap();
        let mut output = pm.open_output(DeviceId(1), 16, 1).unwrap();

        output.write_short(0, 0x90).unwrap();
        output.write_short(0, 0x80).unwrap();

        let err = input.read(4).unwrap_err();
        assert_eq!(err.device_error(), Some(DeviceErrorKind::BufferOverflow));
        assert_eq!(input.read(4).unwrap().len(), 1);
    }

    #[test]
    fn test_filter_and_channel_mask() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let mut input = pm.open_input(DeviceId(0), 16).unwrap();
        let mut output = pm.open_output(DeviceId(1), 16, 1).unwrap();

        input.set_filter(Filter::CLOCK | Filter::ACTIVE).unwrap();
        input.set_channel_mask(ChannelMask::channel(9)).unwrap();

        output.write_short(0, 0xF8).unwrap();
        output.write_short(0, Event::pack(0x90, 36, 90)).unwrap();
        output.write_short(0, Event::pack(0x99, 36, 90)).unwrap();

        let events = input.read(8).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status(), 0x99);
    }

    #[test]
    fn test_closed_input_rejects_operations() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let mut input = pm.open_input(DeviceId(0), 16).unwrap();

        input.close().unwrap();
        assert!(!input.is_open());
        assert_eq!(input.poll(), Err(Error::StreamClosed));
        assert_eq!(input.read(1), Err(Error::StreamClosed));
        assert_eq!(input.set_filter(Filter::empty()), Err(Error::StreamClosed));
        assert_eq!(input.close(), Ok(()));
    }
}
