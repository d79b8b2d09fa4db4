// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Millisecond timer service.
//!
//! Wraps the PortTime clock that timestamps MIDI input and schedules
//! latency-aware output.

pub mod timer;

pub use timer::Timer;
