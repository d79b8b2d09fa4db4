// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! In-process virtual MIDI devices.
//!
//! Each loopback port shows up as two devices, an input and an output with the
//! same name. Events written to an output stream are delivered to every input
//! stream open on the matching input device, filtered the way PortMidi
//! filters input. The backend keeps one clock, used both for timestamps and
//! for the timer calls, and speaks PortMidi's status codes throughout.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::{
    porttime_error_text, portmidi_error_text, Backend, PmEvent, RawDeviceInfo, BAD_DATA,
    BAD_PTR, BUFFER_OVERFLOW, DEFAULT_BUFFER_SIZE, GOT_DATA, HOST_ERROR, INVALID_DEVICE_ID,
    NO_DEVICE, NO_ERROR, PT_ALREADY_STARTED, PT_ALREADY_STOPPED,
};

const INTERFACE_NAME: &str = "Loopback";
const DEVICE_INFO_VERSION: i32 = 200;
/// Default input filter applied by PortMidi when a stream opens (active sensing).
const OPEN_FILTERS: i32 = 1 << 0x0E;
const SYSEX_FILTER: i32 = 1 << 0x00;
const ALL_CHANNELS: i32 = 0xFFFF;

/// Per-call counters for the stream functions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NativeCalls {
    pub open: usize,
    pub close: usize,
    pub abort: usize,
    pub poll: usize,
    pub read: usize,
    pub write: usize,
    pub write_short: usize,
    pub write_sysex: usize,
}

impl NativeCalls {
    /// Calls that move data through a stream.
    pub fn stream_io(&self) -> usize {
        self.poll + self.read + self.write + self.write_short + self.write_sysex
    }
}

/// Opaque handle to a loopback stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopbackStream(usize);

struct VirtualDevice {
    name: String,
    port: usize,
    input: bool,
    opened: bool,
}

struct InputQueue {
    events: VecDeque<PmEvent>,
    capacity: usize,
    overflow: bool,
    filters: i32,
    channel_mask: i32,
}

impl InputQueue {
    fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            overflow: false,
            filters: OPEN_FILTERS,
            channel_mask: ALL_CHANNELS,
        }
    }

    fn accepts(&self, message: i32) -> bool {
        let status = message & 0xFF;
        let realtime_filtered =
            (status & 0xF0) == 0xF0 && ((1 << (status & 0x0F)) & self.filters) != 0;
        let status_filtered = ((1i32 << (16 + (status >> 4))) & self.filters) != 0;
        let channel_filtered =
            (status & 0xF0) != 0xF0 && ((1 << (status & 0x0F)) & self.channel_mask) == 0;
        !(realtime_filtered || status_filtered || channel_filtered)
    }

    fn push(&mut self, event: PmEvent) {
        if self.events.len() >= self.capacity {
            self.overflow = true;
        } else {
            self.events.push_back(event);
        }
    }
}

enum StreamKind {
    Input(InputQueue),
    Output { latency: i32 },
}

struct VirtualStream {
    device: usize,
    kind: StreamKind,
}

struct State {
    initialized: bool,
    devices: Vec<VirtualDevice>,
    streams: Vec<Option<VirtualStream>>,
    host_error: Option<String>,
    clock_origin: Instant,
    timer_started: bool,
    calls: NativeCalls,
}

impl State {
    fn fail_host(&mut self, text: &str) -> i32 {
        self.host_error = Some(format!("{}: {}", INTERFACE_NAME, text));
        HOST_ERROR
    }

    fn now(&self) -> i32 {
        clock_ms(self.clock_origin.elapsed())
    }

    fn open(&mut self, device: i32, input: bool, kind: StreamKind) -> Result<LoopbackStream, i32> {
        if !self.initialized {
            return Err(self.fail_host("device subsystem not initialized"));
        }
        let index = usize::try_from(device).map_err(|_| INVALID_DEVICE_ID)?;
        let entry = self.devices.get_mut(index).ok_or(INVALID_DEVICE_ID)?;
        if entry.input != input || entry.opened {
            return Err(INVALID_DEVICE_ID);
        }
        entry.opened = true;

        let stream = VirtualStream { device: index, kind };
        let slot = match self.streams.iter().position(Option::is_none) {
            Some(slot) => {
                self.streams[slot] = Some(stream);
                slot
            }
            None => {
                self.streams.push(Some(stream));
                self.streams.len() - 1
            }
        };
        Ok(LoopbackStream(slot))
    }

    fn stream_mut(&mut self, stream: LoopbackStream) -> Option<&mut VirtualStream> {
        self.streams.get_mut(stream.0).and_then(Option::as_mut)
    }

    fn input_mut(&mut self, stream: LoopbackStream) -> Option<&mut InputQueue> {
        match self.stream_mut(stream) {
            Some(VirtualStream {
                kind: StreamKind::Input(queue),
                ..
            }) => Some(queue),
            _ => None,
        }
    }

    fn output_route(&self, stream: LoopbackStream) -> Option<(usize, i32)> {
        match self.streams.get(stream.0).and_then(Option::as_ref) {
            Some(VirtualStream {
                device,
                kind: StreamKind::Output { latency },
            }) => Some((self.devices[*device].port, *latency)),
            _ => None,
        }
    }

    /// Route events from an output on `port` to every open input on that port.
    fn deliver(&mut self, port: usize, latency: i32, events: &[PmEvent], sysex: bool) {
        let now = self.now();
        let devices = &self.devices;

        for stream in self.streams.iter_mut().flatten() {
            let queue = match &mut stream.kind {
                StreamKind::Input(queue) if devices[stream.device].port == port => queue,
                _ => continue,
            };
            if sysex && (queue.filters & SYSEX_FILTER) != 0 {
                continue;
            }
            for event in events {
                if !sysex && !queue.accepts(event.message) {
                    continue;
                }
                let timestamp = if latency == 0 { now } else { event.timestamp };
                queue.push(PmEvent {
                    message: event.message,
                    timestamp,
                });
            }
        }
    }
}

/// Clock reading in ms. Saturates instead of wrapping negative.
fn clock_ms(elapsed: Duration) -> i32 {
    i32::try_from(elapsed.as_millis()).unwrap_or(i32::MAX)
}

/// A set of virtual loopback ports behind the PortMidi API.
#[derive(Clone)]
pub struct Loopback {
    state: Arc<Mutex<State>>,
}

impl Loopback {
    /// A loopback library with no ports.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                initialized: false,
                devices: Vec::new(),
                streams: Vec::new(),
                host_error: None,
                clock_origin: Instant::now(),
                timer_started: false,
                calls: NativeCalls::default(),
            })),
        }
    }

    /// Add a port: an input device followed by an output device, both called `name`.
    pub fn with_port(self, name: &str) -> Self {
        {
            let mut state = self.lock();
            let port = state.devices.len() / 2;
            for input in [true, false] {
                state.devices.push(VirtualDevice {
                    name: name.to_string(),
                    port,
                    input,
                    opened: false,
                });
            }
        }
        self
    }

    /// Counters for the stream functions called so far.
    pub fn calls(&self) -> NativeCalls {
        self.lock().calls
    }

    /// Number of streams currently open.
    pub fn open_streams(&self) -> usize {
        self.lock().streams.iter().flatten().count()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new().with_port(INTERFACE_NAME)
    }
}

impl Backend for Loopback {
    type Stream = LoopbackStream;

    fn initialize(&self) -> i32 {
        self.lock().initialized = true;
        NO_ERROR
    }

    fn terminate(&self) -> i32 {
        let mut state = self.lock();
        state.streams.clear();
        for device in state.devices.iter_mut() {
            device.opened = false;
        }
        state.initialized = false;
        NO_ERROR
    }

    fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    fn count_devices(&self) -> i32 {
        let mut state = self.lock();
        if !state.initialized {
            return state.fail_host("device subsystem not initialized");
        }
        state.devices.len() as i32
    }

    fn default_input_device_id(&self) -> i32 {
        let mut state = self.lock();
        if !state.initialized {
            return state.fail_host("device subsystem not initialized");
        }
        state
            .devices
            .iter()
            .position(|d| d.input)
            .map_or(NO_DEVICE, |id| id as i32)
    }

    fn default_output_device_id(&self) -> i32 {
        let mut state = self.lock();
        if !state.initialized {
            return state.fail_host("device subsystem not initialized");
        }
        state
            .devices
            .iter()
            .position(|d| !d.input)
            .map_or(NO_DEVICE, |id| id as i32)
    }

    fn device_info(&self, id: i32) -> Option<RawDeviceInfo> {
        let state = self.lock();
        if !state.initialized {
            return None;
        }
        let device = state.devices.get(usize::try_from(id).ok()?)?;
        Some(RawDeviceInfo {
            struct_version: DEVICE_INFO_VERSION,
            interf: INTERFACE_NAME.to_string(),
            name: device.name.clone(),
            input: device.input,
            output: !device.input,
            opened: device.opened,
        })
    }

    fn open_input(
        &self,
        stream: &mut Option<Self::Stream>,
        device: i32,
        buffer_size: i32,
    ) -> i32 {
        let mut state = self.lock();
        state.calls.open += 1;
        let capacity = if buffer_size <= 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            buffer_size
        };
        let queue = InputQueue::new(capacity as usize);
        match state.open(device, true, StreamKind::Input(queue)) {
            Ok(handle) => {
                *stream = Some(handle);
                NO_ERROR
            }
            Err(status) => status,
        }
    }

    fn open_output(
        &self,
        stream: &mut Option<Self::Stream>,
        device: i32,
        _buffer_size: i32,
        latency: i32,
    ) -> i32 {
        let mut state = self.lock();
        state.calls.open += 1;
        let kind = StreamKind::Output {
            latency: latency.max(0),
        };
        match state.open(device, false, kind) {
            Ok(handle) => {
                *stream = Some(handle);
                NO_ERROR
            }
            Err(status) => status,
        }
    }

    fn set_filter(&self, stream: Self::Stream, filters: i32) -> i32 {
        match self.lock().input_mut(stream) {
            Some(queue) => {
                queue.filters = filters;
                NO_ERROR
            }
            None => BAD_PTR,
        }
    }

    fn set_channel_mask(&self, stream: Self::Stream, mask: i32) -> i32 {
        match self.lock().input_mut(stream) {
            Some(queue) => {
                queue.channel_mask = mask;
                NO_ERROR
            }
            None => BAD_PTR,
        }
    }

    fn abort(&self, stream: Self::Stream) -> i32 {
        let mut state = self.lock();
        state.calls.abort += 1;
        match state.stream_mut(stream) {
            Some(VirtualStream {
                kind: StreamKind::Input(queue),
                ..
            }) => {
                queue.events.clear();
                queue.overflow = false;
                NO_ERROR
            }
            // Output is delivered as soon as it is written, nothing is pending.
            Some(_) => NO_ERROR,
            None => BAD_PTR,
        }
    }

    fn close(&self, stream: Self::Stream) -> i32 {
        let mut state = self.lock();
        state.calls.close += 1;
        match state.streams.get_mut(stream.0).and_then(Option::take) {
            Some(closed) => {
                state.devices[closed.device].opened = false;
                NO_ERROR
            }
            None => BAD_PTR,
        }
    }

    fn poll(&self, stream: Self::Stream) -> i32 {
        let mut state = self.lock();
        state.calls.poll += 1;
        match state.input_mut(stream) {
            Some(queue) if queue.overflow => BUFFER_OVERFLOW,
            Some(queue) if !queue.events.is_empty() => GOT_DATA,
            Some(_) => NO_ERROR,
            None => BAD_PTR,
        }
    }

    fn read(&self, stream: Self::Stream, buffer: &mut [PmEvent]) -> i32 {
        let mut state = self.lock();
        state.calls.read += 1;
        let queue = match state.input_mut(stream) {
            Some(queue) => queue,
            None => return BAD_PTR,
        };
        if queue.overflow {
            queue.overflow = false;
            return BUFFER_OVERFLOW;
        }
        let count = buffer.len().min(queue.events.len());
        for (slot, event) in buffer.iter_mut().zip(queue.events.drain(..count)) {
            *slot = event;
        }
        count as i32
    }

    fn write(&self, stream: Self::Stream, buffer: &[PmEvent]) -> i32 {
        let mut state = self.lock();
        state.calls.write += 1;
        match state.output_route(stream) {
            Some((port, latency)) => {
                state.deliver(port, latency, buffer, false);
                NO_ERROR
            }
            None => BAD_PTR,
        }
    }

    fn write_short(&self, stream: Self::Stream, timestamp: i32, message: i32) -> i32 {
        let mut state = self.lock();
        state.calls.write_short += 1;
        match state.output_route(stream) {
            Some((port, latency)) => {
                state.deliver(port, latency, &[PmEvent { message, timestamp }], false);
                NO_ERROR
            }
            None => BAD_PTR,
        }
    }

    fn write_sysex(&self, stream: Self::Stream, timestamp: i32, message: &[u8]) -> i32 {
        let mut state = self.lock();
        state.calls.write_sysex += 1;
        let (port, latency) = match state.output_route(stream) {
            Some(route) => route,
            None => return BAD_PTR,
        };
        let end = match message.iter().position(|&b| b == 0xF7) {
            Some(end) if message.first() == Some(&0xF0) => end,
            _ => return BAD_DATA,
        };

        // Input side packs sysex bytes four to an event, first byte lowest.
        let events: Vec<PmEvent> = message[..=end]
            .chunks(4)
            .map(|chunk| {
                let message = chunk
                    .iter()
                    .enumerate()
                    .fold(0i32, |acc, (i, &b)| acc | (i32::from(b) << (8 * i)));
                PmEvent { message, timestamp }
            })
            .collect();
        state.deliver(port, latency, &events, true);
        NO_ERROR
    }

    fn error_text(&self, code: i32) -> String {
        portmidi_error_text(code).to_string()
    }

    fn host_error_text(&self) -> String {
        self.lock().host_error.take().unwrap_or_default()
    }

    fn timer_start(&self, _resolution: i32) -> i32 {
        let mut state = self.lock();
        if state.timer_started {
            return PT_ALREADY_STARTED;
        }
        state.timer_started = true;
        state.clock_origin = Instant::now();
        NO_ERROR
    }

    fn timer_stop(&self) -> i32 {
        let mut state = self.lock();
        if !state.timer_started {
            return PT_ALREADY_STOPPED;
        }
        state.timer_started = false;
        NO_ERROR
    }

    fn timer_started(&self) -> bool {
        self.lock().timer_started
    }

    fn timer_time(&self) -> i32 {
        self.lock().now()
    }

    fn timer_sleep(&self, duration: i32) {
        thread::sleep(Duration::from_millis(duration.max(0) as u64));
    }

    fn timer_error_text(&self, code: i32) -> String {
        porttime_error_text(code).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_pair(backend: &Loopback, latency: i32) -> (LoopbackStream, LoopbackStream) {
        let mut input = None;
        let mut output = None;
        assert_eq!(backend.open_input(&mut input, 0, 16), NO_ERROR);
        assert_eq!(backend.open_output(&mut output, 1, 16, latency), NO_ERROR);
        (input.unwrap(), output.unwrap())
    }

    #[test]
    fn test_enumeration_requires_initialize() {
        let backend = Loopback::default();
        assert_eq!(backend.count_devices(), HOST_ERROR);
        assert!(backend.host_error_text().contains("not initialized"));
        assert!(backend.device_info(0).is_none());

        backend.initialize();
        assert_eq!(backend.count_devices(), 2);
        assert_eq!(backend.default_input_device_id(), 0);
        assert_eq!(backend.default_output_device_id(), 1);

        backend.terminate();
        assert_eq!(backend.count_devices(), HOST_ERROR);
        assert_eq!(backend.default_output_device_id(), HOST_ERROR);
    }

    #[test]
    fn test_no_default_device() {
        let backend = Loopback::new();
        backend.initialize();
        assert_eq!(backend.count_devices(), 0);
        assert_eq!(backend.default_input_device_id(), NO_DEVICE);
        assert_eq!(backend.default_output_device_id(), NO_DEVICE);
    }

    #[test]
    fn test_device_info() {
        let backend = Loopback::new().with_port("A").with_port("B");
        backend.initialize();

        let info = backend.device_info(3).unwrap();
        assert_eq!(info.name, "B");
        assert_eq!(info.interf, INTERFACE_NAME);
        assert!(info.output);
        assert!(!info.input);
        assert!(!info.opened);
        assert!(backend.device_info(4).is_none());
        assert!(backend.device_info(-1).is_none());
    }

    #[test]
    fn test_open_rejects_bad_devices() {
        let backend = Loopback::default();
        backend.initialize();
        let mut stream = None;

        assert_eq!(backend.open_input(&mut stream, 7, 16), INVALID_DEVICE_ID);
        assert_eq!(backend.open_input(&mut stream, 1, 16), INVALID_DEVICE_ID);
        assert_eq!(backend.open_output(&mut stream, 0, 16, 0), INVALID_DEVICE_ID);
        assert!(stream.is_none());

        assert_eq!(backend.open_input(&mut stream, 0, 16), NO_ERROR);
        let mut second = None;
        assert_eq!(backend.open_input(&mut second, 0, 16), INVALID_DEVICE_ID);
        assert!(backend.device_info(0).unwrap().opened);
    }

    #[test]
    fn test_loopback_delivery_keeps_timestamps_with_latency() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 5);

        let events = [
            PmEvent { message: 0x40_3C_90, timestamp: 10 },
            PmEvent { message: 0x00_3C_80, timestamp: 20 },
        ];
        assert_eq!(backend.write(output, &events), NO_ERROR);
        assert_eq!(backend.poll(input), GOT_DATA);

        let mut buffer = [PmEvent::default(); 8];
        assert_eq!(backend.read(input, &mut buffer), 2);
        assert_eq!(&buffer[..2], &events);
        assert_eq!(backend.poll(input), NO_ERROR);
    }

    #[test]
    fn test_zero_latency_stamps_with_clock() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 0);

        assert_eq!(backend.write_short(output, 99_999, 0x40_3C_90), NO_ERROR);
        let mut buffer = [PmEvent::default(); 1];
        assert_eq!(backend.read(input, &mut buffer), 1);
        assert!(buffer[0].timestamp <= backend.timer_time());
        assert_ne!(buffer[0].timestamp, 99_999);
    }

    #[test]
    fn test_overflow_reported_once() {
        let backend = Loopback::default();
        backend.initialize();
        let mut input = None;
        let mut output = None;
        backend.open_input(&mut input, 0, 2);
        backend.open_output(&mut output, 1, 2, 1);
        let (input, output) = (input.unwrap(), output.unwrap());

        let events = [PmEvent { message: 0x90, timestamp: 0 }; 3];
        backend.write(output, &events);

        assert_eq!(backend.poll(input), BUFFER_OVERFLOW);
        let mut buffer = [PmEvent::default(); 4];
        assert_eq!(backend.read(input, &mut buffer), BUFFER_OVERFLOW);
        assert_eq!(backend.read(input, &mut buffer), 2);
    }

    #[test]
    fn test_filters_and_channel_mask() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 1);

        // Active sensing is filtered by default.
        backend.write_short(output, 0, 0xFE);
        assert_eq!(backend.poll(input), NO_ERROR);

        // Drop note messages.
        backend.set_filter(input, (1 << 0x19) | (1 << 0x18));
        backend.write_short(output, 0, 0x40_3C_90);
        backend.write_short(output, 0, 0x00_07_B0);
        let mut buffer = [PmEvent::default(); 4];
        assert_eq!(backend.read(input, &mut buffer), 1);
        assert_eq!(buffer[0].message, 0x00_07_B0);

        // Only channel 2.
        backend.set_filter(input, 0);
        backend.set_channel_mask(input, 1 << 1);
        backend.write_short(output, 0, 0x00_07_B0);
        backend.write_short(output, 0, 0x00_07_B1);
        assert_eq!(backend.read(input, &mut buffer), 1);
        assert_eq!(buffer[0].message, 0x00_07_B1);

        assert_eq!(backend.set_filter(output, 0), BAD_PTR);
    }

    #[test]
    fn test_sysex_packed_four_bytes_per_event() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 1);

        let payload = [0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7];
        assert_eq!(backend.write_sysex(output, 3, &payload), NO_ERROR);

        let mut buffer = [PmEvent::default(); 4];
        assert_eq!(backend.read(input, &mut buffer), 2);
        assert_eq!(buffer[0].message, 0x06_7F_7E_F0);
        assert_eq!(buffer[1].message, 0x00_00_F7_01);
        assert_eq!(buffer[1].timestamp, 3);

        assert_eq!(backend.write_sysex(output, 0, &[0xF0, 0x01]), BAD_DATA);
    }

    #[test]
    fn test_close_and_stale_handles() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 1);
        assert_eq!(backend.open_streams(), 2);

        assert_eq!(backend.close(input), NO_ERROR);
        assert_eq!(backend.close(input), BAD_PTR);
        assert_eq!(backend.poll(input), BAD_PTR);
        assert!(!backend.device_info(0).unwrap().opened);

        // Writing with no listener is fine.
        assert_eq!(backend.write_short(output, 0, 0x90), NO_ERROR);
        assert_eq!(backend.open_streams(), 1);
        assert_eq!(backend.calls().close, 2);
    }

    #[test]
    fn test_abort_discards_pending_input() {
        let backend = Loopback::default();
        backend.initialize();
        let (input, output) = open_pair(&backend, 1);

        backend.write_short(output, 0, 0x90);
        assert_eq!(backend.abort(input), NO_ERROR);
        assert_eq!(backend.poll(input), NO_ERROR);
        assert_eq!(backend.abort(output), NO_ERROR);
    }

    #[test]
    fn test_clock_saturates() {
        assert_eq!(clock_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(clock_ms(Duration::from_millis(i32::MAX as u64)), i32::MAX);
        // Past the ~24.8 day range of a 32-bit ms clock.
        assert_eq!(clock_ms(Duration::from_secs(30 * 24 * 60 * 60)), i32::MAX);
    }

    #[test]
    fn test_timer_lifecycle() {
        let backend = Loopback::new();
        assert!(!backend.timer_started());
        assert_eq!(backend.timer_stop(), PT_ALREADY_STOPPED);
        assert_eq!(backend.timer_start(1), NO_ERROR);
        assert_eq!(backend.timer_start(1), PT_ALREADY_STARTED);

        let before = backend.timer_time();
        backend.timer_sleep(5);
        assert!(backend.timer_time() >= before + 5);

        assert_eq!(backend.timer_stop(), NO_ERROR);
        assert!(!backend.timer_started());
    }
}
