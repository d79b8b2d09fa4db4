// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! System PortMidi library backend.
//!
//! Raw bindings to `libportmidi`, which also exports the PortTime clock.
//! Streams are opened without a custom time procedure, so PortMidi stamps
//! events with `Pt_Time` and the timer service reads the same clock.

use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicBool, Ordering};

use super::{porttime_error_text, Backend, PmEvent, RawDeviceInfo, BAD_PTR};

mod sys {
    use super::*;

    pub type PmError = c_int;
    pub type PmDeviceID = c_int;
    pub type PmTimestamp = i32;
    pub type PmMessage = i32;
    pub type PtError = c_int;
    pub type PtTimestamp = i32;

    #[repr(C)]
    pub struct PortMidiStream {
        _private: [u8; 0],
    }

    pub type PmTimeProcPtr = Option<unsafe extern "C" fn(time_info: *mut c_void) -> PmTimestamp>;
    pub type PtCallback = Option<unsafe extern "C" fn(timestamp: PtTimestamp, user_data: *mut c_void)>;

    #[repr(C)]
    pub struct PmDeviceInfo {
        pub struct_version: c_int,
        pub interf: *const c_char,
        pub name: *const c_char,
        pub input: c_int,
        pub output: c_int,
        pub opened: c_int,
    }

    /// Size PortMidi documents for host error messages.
    pub const PM_HOST_ERROR_MSG_LEN: usize = 256;

    #[link(name = "portmidi")]
    extern "C" {
        pub fn Pm_Initialize() -> PmError;
        pub fn Pm_Terminate() -> PmError;
        pub fn Pm_GetErrorText(errnum: PmError) -> *const c_char;
        pub fn Pm_GetHostErrorText(msg: *mut c_char, len: c_uint);
        pub fn Pm_CountDevices() -> c_int;
        pub fn Pm_GetDefaultInputDeviceID() -> PmDeviceID;
        pub fn Pm_GetDefaultOutputDeviceID() -> PmDeviceID;
        pub fn Pm_GetDeviceInfo(id: PmDeviceID) -> *const PmDeviceInfo;
        pub fn Pm_OpenInput(
            stream: *mut *mut PortMidiStream,
            input_device: PmDeviceID,
            input_driver_info: *mut c_void,
            buffer_size: i32,
            time_proc: PmTimeProcPtr,
            time_info: *mut c_void,
        ) -> PmError;
        pub fn Pm_OpenOutput(
            stream: *mut *mut PortMidiStream,
            output_device: PmDeviceID,
            output_driver_info: *mut c_void,
            buffer_size: i32,
            time_proc: PmTimeProcPtr,
            time_info: *mut c_void,
            latency: i32,
        ) -> PmError;
        pub fn Pm_SetFilter(stream: *mut PortMidiStream, filters: i32) -> PmError;
        pub fn Pm_SetChannelMask(stream: *mut PortMidiStream, mask: c_int) -> PmError;
        pub fn Pm_Abort(stream: *mut PortMidiStream) -> PmError;
        pub fn Pm_Close(stream: *mut PortMidiStream) -> PmError;
        pub fn Pm_Read(stream: *mut PortMidiStream, buffer: *mut PmEvent, length: i32) -> c_int;
        pub fn Pm_Poll(stream: *mut PortMidiStream) -> PmError;
        pub fn Pm_Write(stream: *mut PortMidiStream, buffer: *const PmEvent, length: i32) -> PmError;
        pub fn Pm_WriteShort(stream: *mut PortMidiStream, when: PmTimestamp, msg: PmMessage) -> PmError;
        pub fn Pm_WriteSysEx(stream: *mut PortMidiStream, when: PmTimestamp, msg: *const u8) -> PmError;

        pub fn Pt_Start(resolution: c_int, callback: PtCallback, user_data: *mut c_void) -> PtError;
        pub fn Pt_Stop() -> PtError;
        pub fn Pt_Started() -> c_int;
        pub fn Pt_Time() -> PtTimestamp;
        pub fn Pt_Sleep(duration: i32);
    }
}

pub use sys::PortMidiStream;

// PortMidi keeps its device table in process globals.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

fn copy_c_string(text: *const c_char) -> String {
    if text.is_null() {
        String::new()
    } else {
        // SAFETY: PortMidi hands out NUL-terminated strings it owns until terminate.
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }
}

/// Track the library state only once the native call has succeeded.
fn record_lifecycle(status: i32, initialized: bool) -> i32 {
    if status >= 0 {
        INITIALIZED.store(initialized, Ordering::SeqCst);
    }
    status
}

/// The process-wide PortMidi library.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortMidiLibrary;

impl PortMidiLibrary {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for PortMidiLibrary {
    type Stream = NonNull<PortMidiStream>;

    fn initialize(&self) -> i32 {
        record_lifecycle(unsafe { sys::Pm_Initialize() }, true)
    }

    fn terminate(&self) -> i32 {
        record_lifecycle(unsafe { sys::Pm_Terminate() }, false)
    }

    fn is_initialized(&self) -> bool {
        INITIALIZED.load(Ordering::SeqCst)
    }

    fn count_devices(&self) -> i32 {
        unsafe { sys::Pm_CountDevices() }
    }

    fn default_input_device_id(&self) -> i32 {
        unsafe { sys::Pm_GetDefaultInputDeviceID() }
    }

    fn default_output_device_id(&self) -> i32 {
        unsafe { sys::Pm_GetDefaultOutputDeviceID() }
    }

    fn device_info(&self, id: i32) -> Option<RawDeviceInfo> {
        let info = unsafe { sys::Pm_GetDeviceInfo(id) };
        // SAFETY: non-null pointers refer to PortMidi's static device table.
        let info = unsafe { info.as_ref() }?;
        Some(RawDeviceInfo {
            struct_version: info.struct_version,
            interf: copy_c_string(info.interf),
            name: copy_c_string(info.name),
            input: info.input != 0,
            output: info.output != 0,
            opened: info.opened != 0,
        })
    }

    fn open_input(
        &self,
        stream: &mut Option<Self::Stream>,
        device: i32,
        buffer_size: i32,
    ) -> i32 {
        let mut raw: *mut PortMidiStream = ptr::null_mut();
        let status = unsafe {
            sys::Pm_OpenInput(
                &mut raw,
                device,
                ptr::null_mut(),
                buffer_size,
                None,
                ptr::null_mut(),
            )
        };
        *stream = NonNull::new(raw);
        status
    }

    fn open_output(
        &self,
        stream: &mut Option<Self::Stream>,
        device: i32,
        buffer_size: i32,
        latency: i32,
    ) -> i32 {
        let mut raw: *mut PortMidiStream = ptr::null_mut();
        let status = unsafe {
            sys::Pm_OpenOutput(
                &mut raw,
                device,
                ptr::null_mut(),
                buffer_size,
                None,
                ptr::null_mut(),
                latency,
            )
        };
        *stream = NonNull::new(raw);
        status
    }

    fn set_filter(&self, stream: Self::Stream, filters: i32) -> i32 {
        unsafe { sys::Pm_SetFilter(stream.as_ptr(), filters) }
    }

    fn set_channel_mask(&self, stream: Self::Stream, mask: i32) -> i32 {
        unsafe { sys::Pm_SetChannelMask(stream.as_ptr(), mask) }
    }

    fn abort(&self, stream: Self::Stream) -> i32 {
        unsafe { sys::Pm_Abort(stream.as_ptr()) }
    }

    fn close(&self, stream: Self::Stream) -> i32 {
        unsafe { sys::Pm_Close(stream.as_ptr()) }
    }

    fn poll(&self, stream: Self::Stream) -> i32 {
        unsafe { sys::Pm_Poll(stream.as_ptr()) }
    }

    fn read(&self, stream: Self::Stream, buffer: &mut [PmEvent]) -> i32 {
        let length = match i32::try_from(buffer.len()) {
            Ok(length) => length,
            Err(_) => return BAD_PTR,
        };
        unsafe { sys::Pm_Read(stream.as_ptr(), buffer.as_mut_ptr(), length) }
    }

    fn write(&self, stream: Self::Stream, buffer: &[PmEvent]) -> i32 {
        let length = match i32::try_from(buffer.len()) {
            Ok(length) => length,
            Err(_) => return BAD_PTR,
        };
        unsafe { sys::Pm_Write(stream.as_ptr(), buffer.as_ptr(), length) }
    }

    fn write_short(&self, stream: Self::Stream, timestamp: i32, message: i32) -> i32 {
        unsafe { sys::Pm_WriteShort(stream.as_ptr(), timestamp, message) }
    }

    fn write_sysex(&self, stream: Self::Stream, timestamp: i32, message: &[u8]) -> i32 {
        // Callers guarantee `message` contains the terminating EOX byte.
        unsafe { sys::Pm_WriteSysEx(stream.as_ptr(), timestamp, message.as_ptr()) }
    }

    fn error_text(&self, code: i32) -> String {
        copy_c_string(unsafe { sys::Pm_GetErrorText(code) })
    }

    fn host_error_text(&self) -> String {
        let mut buffer = [0 as c_char; sys::PM_HOST_ERROR_MSG_LEN];
        unsafe { sys::Pm_GetHostErrorText(buffer.as_mut_ptr(), buffer.len() as c_uint) };
        copy_c_string(buffer.as_ptr())
    }

    fn timer_start(&self, resolution: i32) -> i32 {
        unsafe { sys::Pt_Start(resolution, None, ptr::null_mut()) }
    }

    fn timer_stop(&self) -> i32 {
        unsafe { sys::Pt_Stop() }
    }

    fn timer_started(&self) -> bool {
        unsafe { sys::Pt_Started() != 0 }
    }

    fn timer_time(&self) -> i32 {
        unsafe { sys::Pt_Time() }
    }

    fn timer_sleep(&self, duration: i32) {
        unsafe { sys::Pt_Sleep(duration) }
    }

    fn timer_error_text(&self, code: i32) -> String {
        porttime_error_text(code).to_string()
    }
}
