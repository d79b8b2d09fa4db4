// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Device enumeration and the device subsystem lifecycle.
//!
//! [`PortMidi`] is the owned service handle for the native device subsystem:
//! constructing it initializes the library and consuming it terminates it.
//! Streams borrow the handle, so the subsystem cannot be torn down while a
//! stream is still alive.

use std::fmt;

use tracing::{debug, warn};

use crate::error::{check_device, DeviceErrorKind, Error, Result};
use crate::native::{Backend, RawDeviceInfo, NO_DEVICE};
use crate::stream::{InputStream, OutputStream};
use crate::timing::Timer;

/// Native device identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub i32);

impl DeviceId {
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl From<i32> for DeviceId {
    fn from(id: i32) -> Self {
        DeviceId(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stream direction a device supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Snapshot of one device's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub struct_version: i32,
    pub interface_name: String,
    pub device_name: String,
    pub supports_input: bool,
    pub supports_output: bool,
    pub is_open: bool,
}

impl DeviceDescriptor {
    pub fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.supports_input,
            Direction::Output => self.supports_output,
        }
    }
}

impl From<RawDeviceInfo> for DeviceDescriptor {
    fn from(info: RawDeviceInfo) -> Self {
        Self {
            struct_version: info.struct_version,
            interface_name: info.interf,
            device_name: info.name,
            supports_input: info.input,
            supports_output: info.output,
            is_open: info.opened,
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match (self.supports_input, self.supports_output) {
            (true, true) => "in/out",
            (true, false) => "in",
            (false, true) => "out",
            (false, false) => "-",
        };
        write!(f, "{} ({}, {})", self.device_name, self.interface_name, direction)?;
        if self.is_open {
            write!(f, " [open]")?;
        }
        Ok(())
    }
}

/// The initialized native device subsystem.
pub struct PortMidi<B: Backend> {
    backend: B,
    active: bool,
}

impl<B: Backend> PortMidi<B> {
    /// Initialize the device subsystem.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if `backend` is already
    /// initialized; PortMidi does not define what a second initialize does.
    pub fn initialize(backend: B) -> Result<Self> {
        if backend.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        check_device(&backend, backend.initialize())?;
        debug!("MIDI device subsystem initialized");
        Ok(Self {
            backend,
            active: true,
        })
    }

    /// Release the device subsystem.
    pub fn terminate(mut self) -> Result<()> {
        self.active = false;
        check_device(&self.backend, self.backend.terminate())?;
        debug!("MIDI device subsystem terminated");
        Ok(())
    }

    /// The native library this service drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of devices, stable until terminate.
    pub fn count_devices(&self) -> Result<usize> {
        let count = check_device(&self.backend, self.backend.count_devices())?;
        Ok(count as usize)
    }

    /// Default input device, `None` if the system has none.
    pub fn default_input_device_id(&self) -> Result<Option<DeviceId>> {
        self.default_device(self.backend.default_input_device_id())
    }

    /// Default output device, `None` if the system has none.
    pub fn default_output_device_id(&self) -> Result<Option<DeviceId>> {
        self.default_device(self.backend.default_output_device_id())
    }

    fn default_device(&self, status: i32) -> Result<Option<DeviceId>> {
        if status == NO_DEVICE {
            return Ok(None);
        }
        check_device(&self.backend, status).map(|id| Some(DeviceId(id)))
    }

    /// Metadata for one device.
    ///
    /// A device the native layer does not know reports `Unknown`.
    pub fn device_info(&self, id: DeviceId) -> Result<DeviceDescriptor> {
        self.backend
            .device_info(id.raw())
            .map(DeviceDescriptor::from)
            .ok_or_else(|| Error::device_kind(DeviceErrorKind::Unknown))
    }

    /// Every device with its identifier.
    pub fn devices(&self) -> Result<Vec<(DeviceId, DeviceDescriptor)>> {
        let count = self.count_devices()?;
        (0..count as i32)
            .map(|id| {
                let id = DeviceId(id);
                self.device_info(id).map(|info| (id, info))
            })
            .collect()
    }

    /// First device supporting `direction` whose name contains `name`,
    /// ignoring case.
    pub fn find_device(&self, name: &str, direction: Direction) -> Result<Option<DeviceId>> {
        let needle = name.to_lowercase();
        Ok(self
            .devices()?
            .into_iter()
            .find(|(_, info)| {
                info.supports(direction) && info.device_name.to_lowercase().contains(&needle)
            })
            .map(|(id, _)| id))
    }

    /// Open an input stream buffering up to `buffer_size` events.
    pub fn open_input(&self, id: DeviceId, buffer_size: usize) -> Result<InputStream<'_, B>> {
        InputStream::open(self, id, buffer_size)
    }

    /// Open an output stream. `latency_ms` of zero ignores event timestamps.
    pub fn open_output(
        &self,
        id: DeviceId,
        buffer_size: usize,
        latency_ms: i32,
    ) -> Result<OutputStream<'_, B>> {
        OutputStream::open(self, id, buffer_size, latency_ms)
    }

    /// Start the timer on this service's clock.
    pub fn start_timer(&self, resolution_ms: u32) -> Result<Timer<B>> {
        Timer::start(self.backend.clone(), resolution_ms)
    }

    /// Descriptive text for a device error, from the native library.
    pub fn error_text(&self, kind: DeviceErrorKind) -> String {
        kind.text(&self.backend)
    }
}

impl<B: Backend> Drop for PortMidi<B> {
    fn drop(&mut self) {
        if self.active {
            warn!("MIDI device subsystem dropped without terminate");
            if let Err(e) = check_device(&self.backend, self.backend.terminate()) {
                warn!("Failed to terminate MIDI device subsystem: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::Loopback;

    #[test]
    fn test_initialize_and_count() {
        let backend = Loopback::new().with_port("A").with_port("B");
        let pm = PortMidi::initialize(backend.clone()).unwrap();
        assert_eq!(pm.count_devices().unwrap(), 4);
        pm.terminate().unwrap();
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_double_initialize_fails() {
        let backend = Loopback::default();
        let _pm = PortMidi::initialize(backend.clone()).unwrap();
        assert!(matches!(
            PortMidi::initialize(backend),
            Err(Error::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_reinitialize_after_terminate() {
        let backend = Loopback::default();
        PortMidi::initialize(backend.clone()).unwrap().terminate().unwrap();
        let pm = PortMidi::initialize(backend).unwrap();
        assert_eq!(pm.count_devices().unwrap(), 2);
    }

    #[test]
    fn test_drop_terminates() {
        let backend = Loopback::default();
        {
            let _pm = PortMidi::initialize(backend.clone()).unwrap();
            assert!(backend.is_initialized());
        }
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_default_devices() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        assert_eq!(pm.default_input_device_id().unwrap(), Some(DeviceId(0)));
        assert_eq!(pm.default_output_device_id().unwrap(), Some(DeviceId(1)));

        let empty = PortMidi::initialize(Loopback::new()).unwrap();
        assert_eq!(empty.default_input_device_id().unwrap(), None);
        assert_eq!(empty.default_output_device_id().unwrap(), None);
    }

    #[test]
    fn test_device_info() {
        let pm = PortMidi::initialize(Loopback::new().with_port("Synth")).unwrap();
        let info = pm.device_info(DeviceId(1)).unwrap();
        assert_eq!(info.device_name, "Synth");
        assert!(info.supports(Direction::Output));
        assert!(!info.supports(Direction::Input));
        assert_eq!(info.to_string(), "Synth (Loopback, out)");
    }

    #[test]
    fn test_missing_device_is_unknown() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        let err = pm.device_info(DeviceId(12)).unwrap_err();
        assert_eq!(err.device_error(), Some(DeviceErrorKind::Unknown));
    }

    #[test]
    fn test_find_device() {
        let backend = Loopback::new().with_port("Keystep").with_port("Drum Machine");
        let pm = PortMidi::initialize(backend).unwrap();

        assert_eq!(
            pm.find_device("drum", Direction::Input).unwrap(),
            Some(DeviceId(2))
        );
        assert_eq!(
            pm.find_device("DRUM", Direction::Output).unwrap(),
            Some(DeviceId(3))
        );
        assert_eq!(pm.find_device("piano", Direction::Output).unwrap(), None);
    }

    #[test]
    fn test_devices_lists_all() {
        let pm = PortMidi::initialize(Loopback::new().with_port("A")).unwrap();
        let devices = pm.devices().unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].0, DeviceId(0));
        assert!(devices[0].1.supports_input);
    }

    #[test]
    fn test_error_text_from_native_table() {
        let pm = PortMidi::initialize(Loopback::default()).unwrap();
        assert_eq!(
            pm.error_text(DeviceErrorKind::InvalidDeviceId),
            "PortMidi: `Invalid device ID'"
        );
        assert_eq!(pm.error_text(DeviceErrorKind::Unknown), "unknown error");
    }
}
