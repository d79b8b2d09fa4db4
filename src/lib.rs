// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Safe bindings to the PortMidi device library and its PortTime clock.
//!
//! The native C API is reached through the [`Backend`] trait. Two layers
//! implement it: [`PortMidiLibrary`] links the system library (feature
//! `portmidi`), and [`Loopback`] provides in-process virtual ports.

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod native;
pub mod stream;
pub mod timing;

pub use config::PortConfig;
pub use device::{DeviceDescriptor, DeviceId, Direction, PortMidi};
pub use error::{DeviceErrorKind, Error, ErrorFamily, Result, TimerErrorKind};
pub use event::{Event, Timestamp};
pub use native::{Backend, Loopback};
#[cfg(feature = "portmidi")]
pub use native::PortMidiLibrary;
pub use stream::{ChannelMask, Filter, InputStream, MidiStream, OutputStream, StreamState};
pub use timing::Timer;
