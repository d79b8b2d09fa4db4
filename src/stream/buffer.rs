// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Event buffer marshaling.
//!
//! Copies events between caller-owned sequences and the flat `PmEvent`
//! arrays the native layer reads and writes. Each scratch buffer lives for
//! exactly one native call.

use crate::error::{DeviceErrorKind, Error, Result};
use crate::event::Event;
use crate::native::PmEvent;

impl From<PmEvent> for Event {
    fn from(raw: PmEvent) -> Self {
        Event::new(raw.message, raw.timestamp)
    }
}

impl From<Event> for PmEvent {
    fn from(event: Event) -> Self {
        PmEvent {
            message: event.message,
            timestamp: event.timestamp,
        }
    }
}

/// A bounds-checked `offset`/`length` window over an event sequence.
#[derive(Debug, Clone, Copy)]
pub struct EventWindow<'a> {
    events: &'a [Event],
}

impl<'a> EventWindow<'a> {
    /// Validate `offset..offset + length` against `events`.
    pub fn new(events: &'a [Event], offset: usize, length: usize) -> Result<Self> {
        let out_of_bounds = || Error::OutOfBounds {
            offset,
            length,
            available: events.len(),
        };
        let end = offset.checked_add(length).ok_or_else(out_of_bounds)?;
        let events = events.get(offset..end).ok_or_else(out_of_bounds)?;
        Ok(Self { events })
    }

    /// The whole sequence.
    pub fn all(events: &'a [Event]) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &'a [Event] {
        self.events
    }
}

/// Native-layout records for a single read or write call.
#[derive(Debug)]
pub struct ScratchBuffer {
    records: Vec<PmEvent>,
}

impl ScratchBuffer {
    /// Zeroed space for `length` incoming records.
    pub fn for_read(length: usize) -> Self {
        Self {
            records: vec![PmEvent::default(); length],
        }
    }

    /// Copy a window out in native layout, preserving order.
    pub fn from_window(window: EventWindow<'_>) -> Self {
        Self {
            records: window.events().iter().copied().map(PmEvent::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn as_slice(&self) -> &[PmEvent] {
        &self.records
    }

    pub fn as_mut_slice(&mut self) -> &mut [PmEvent] {
        &mut self.records
    }

    /// Copy back the first `count` records the native layer filled.
    pub fn into_events(self, count: usize) -> Vec<Event> {
        let count = count.min(self.records.len());
        self.records[..count].iter().copied().map(Event::from).collect()
    }
}

/// Convert a length or size for the native 32-bit interface.
pub(crate) fn native_len(length: usize) -> Result<i32> {
    i32::try_from(length).map_err(|_| Error::device_kind(DeviceErrorKind::BufferMaxSize))
}
