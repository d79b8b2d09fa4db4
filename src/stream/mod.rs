// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI device streams.
//!
//! A stream owns exactly one open native stream. It moves from `Open` to
//! `Closed` on an explicit [`MidiStream::close`], or when dropped if the
//! caller never closed it. Once closed, no operation reaches the native
//! resource again.
//!
//! Streams are not synchronized. Use a stream from one thread at a time;
//! distinct streams may be used concurrently if the native library allows it.

pub mod buffer;
pub mod filter;
pub mod input;
pub mod output;

pub use buffer::{EventWindow, ScratchBuffer};
pub use filter::{ChannelMask, Filter};
pub use input::InputStream;
pub use output::OutputStream;

use tracing::{debug, warn};

use crate::device::{DeviceId, PortMidi};
use crate::error::{check_device, DeviceErrorKind, Error, Result};
use crate::native::Backend;

/// Lifecycle of a stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Open,
    Closed,
}

/// Operations shared by input and output streams.
pub trait MidiStream {
    /// Device the stream was opened on.
    fn device_id(&self) -> DeviceId;

    fn state(&self) -> StreamState;

    /// Release the native stream. Closing a closed stream does nothing.
    fn close(&mut self) -> Result<()>;

    /// Discard pending I/O without closing.
    fn abort(&mut self) -> Result<()>;

    fn is_open(&self) -> bool {
        self.state() == StreamState::Open
    }
}

/// Sole owner of one native stream.
pub(crate) struct StreamHandle<'a, B: Backend> {
    pm: &'a PortMidi<B>,
    raw: Option<B::Stream>,
    device: DeviceId,
}

impl<'a, B: Backend> StreamHandle<'a, B> {
    /// Run a native open call and take ownership of what it produced.
    ///
    /// If the open fails after the native layer handed back a stream, that
    /// stream is closed before the error is returned.
    pub(crate) fn open<F>(pm: &'a PortMidi<B>, device: DeviceId, open: F) -> Result<Self>
    where
        F: FnOnce(&B, &mut Option<B::Stream>) -> i32,
    {
        let backend = pm.backend();
        let mut raw = None;
        let status = open(backend, &mut raw);

        if let Err(e) = check_device(backend, status) {
            if let Some(stream) = raw.take() {
                if let Err(close_err) = check_device(backend, backend.close(stream)) {
                    warn!(
                        "Failed to release MIDI device {} after open error: {}",
                        device, close_err
                    );
                }
            }
            debug!("Failed to open MIDI device {}: {}", device, e);
            return Err(e);
        }

        match raw {
            Some(raw) => {
                debug!("Opened MIDI device {}", device);
                Ok(Self {
                    pm,
                    raw: Some(raw),
                    device,
                })
            }
            None => Err(Error::device_kind(DeviceErrorKind::BadPtr)),
        }
    }

    pub(crate) fn backend(&self) -> &'a B {
        self.pm.backend()
    }

    /// The native stream, if still open.
    pub(crate) fn raw(&self) -> Result<B::Stream> {
        self.raw.ok_or(Error::StreamClosed)
    }

    /// Check a status returned by a call on this stream.
    pub(crate) fn check(&self, status: i32) -> Result<i32> {
        check_device(self.backend(), status)
    }

    pub(crate) fn device(&self) -> DeviceId {
        self.device
    }

    pub(crate) fn state(&self) -> StreamState {
        if self.raw.is_some() {
            StreamState::Open
        } else {
            StreamState::Closed
        }
    }

    pub(crate) fn close(&mut self) -> Result<()> {
        match self.raw.take() {
            Some(raw) => {
                let status = self.backend().close(raw);
                debug!("Closed MIDI device {}", self.device);
                self.check(status).map(drop)
            }
            None => Ok(()),
        }
    }

    pub(crate) fn abort(&mut self) -> Result<()> {
        let raw = self.raw()?;
        let status = self.backend().abort(raw);
        self.check(status).map(drop)
    }
}

impl<B: Backend> Drop for StreamHandle<'_, B> {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            warn!("MIDI device {} stream dropped while open, closing", self.device);
            let status = self.backend().close(raw);
            if let Err(e) = self.check(status) {
                warn!("Failed to close MIDI device {}: {}", self.device, e);
            }
        }
    }
}
