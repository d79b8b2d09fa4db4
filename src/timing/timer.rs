// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{check_timer, Result, TimerErrorKind};
use crate::event::Timestamp;
use crate::native::Backend;

/// A running PortTime clock.
///
/// Only one clock exists per process; a second `start` while this one runs
/// fails with `AlreadyStarted`. Dropping a running timer stops it.
pub struct Timer<B: Backend> {
    backend: B,
    resolution_ms: u32,
    running: bool,
}

impl<B: Backend> Timer<B> {
    /// Start the clock, ticking every `resolution_ms` milliseconds.
    pub fn start(backend: B, resolution_ms: u32) -> Result<Self> {
        let resolution = i32::try_from(resolution_ms).unwrap_or(i32::MAX);
        check_timer(backend.timer_start(resolution))?;
        debug!("Timer started at {} ms resolution", resolution_ms);
        Ok(Self {
            backend,
            resolution_ms,
            running: true,
        })
    }

    /// Stop the clock.
    pub fn stop(mut self) -> Result<()> {
        self.running = false;
        check_timer(self.backend.timer_stop())?;
        debug!("Timer stopped");
        Ok(())
    }

    /// Milliseconds since the clock started.
    pub fn now(&self) -> Timestamp {
        self.backend.timer_time()
    }

    /// Block the calling thread for at least `duration`.
    pub fn sleep(&self, duration: Duration) {
        let ms = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
        self.backend.timer_sleep(ms);
    }

    /// Whether the native clock is running.
    pub fn is_started(&self) -> bool {
        self.backend.timer_started()
    }

    pub fn resolution_ms(&self) -> u32 {
        self.resolution_ms
    }

    /// Descriptive text for a timer error.
    pub fn error_text(&self, kind: TimerErrorKind) -> String {
        kind.text(&self.backend)
    }
}

impl<B: Backend> Drop for Timer<B> {
    fn drop(&mut self) {
        if self.running && self.backend.timer_started() {
            warn!("Timer dropped while running, stopping");
            if let Err(e) = check_timer(self.backend.timer_stop()) {
                warn!("Failed to stop timer: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::native::Loopback;

    #[test]
    fn test_start_and_stop() {
        let backend = Loopback::new();
        let timer = Timer::start(backend.clone(), 1).unwrap();
        assert!(timer.is_started());
        assert_eq!(timer.resolution_ms(), 1);

        timer.stop().unwrap();
        assert!(!backend.timer_started());
    }

    #[test]
    fn test_second_start_fails() {
        let backend = Loopback::new();
        let _timer = Timer::start(backend.clone(), 1).unwrap();
        assert_eq!(
            Timer::start(backend, 1).err(),
            Some(Error::Timer(TimerErrorKind::AlreadyStarted))
        );
    }

    #[test]
    fn test_stop_after_external_stop() {
        let backend = Loopback::new();
        let timer = Timer::start(backend.clone(), 1).unwrap();
        backend.timer_stop();
        assert_eq!(
            timer.stop(),
            Err(Error::Timer(TimerErrorKind::AlreadyStopped))
        );
    }

    #[test]
    fn test_now_advances_with_sleep() {
        let timer = Timer::start(Loopback::new(), 1).unwrap();
        let before = timer.now();
        timer.sleep(Duration::from_millis(10));
        assert!(timer.now() >= before + 10);
    }

    #[test]
    fn test_drop_stops_clock() {
        let backend = Loopback::new();
        {
            let _timer = Timer::start(backend.clone(), 1).unwrap();
        }
        assert!(!backend.timer_started());
        // The clock can be started again once released.
        Timer::start(backend, 1).unwrap().stop().unwrap();
    }

    #[test]
    fn test_error_text() {
        let timer = Timer::start(Loopback::new(), 1).unwrap();
        assert!(!timer.error_text(TimerErrorKind::AlreadyStarted).is_empty());
        assert_eq!(timer.error_text(TimerErrorKind::Unknown), "unknown error");
    }
}
