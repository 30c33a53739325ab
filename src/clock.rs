//! Wall-clock timing for the frame loop.

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

/// Measures the time between successive [`Clock::delta`] calls.
///
/// The first call starts the clock and returns `0.0`.
pub struct Clock {
    running: bool,
    old_time: f64,
    elapsed: f64,
    #[cfg(not(target_arch = "wasm32"))]
    origin: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            running: false,
            old_time: 0.0,
            elapsed: 0.0,
            #[cfg(not(target_arch = "wasm32"))]
            origin: Instant::now(),
        }
    }

    /// Current time in seconds.
    #[cfg(not(target_arch = "wasm32"))]
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    #[cfg(target_arch = "wasm32")]
    fn now(&self) -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now() / 1000.0)
            .unwrap_or(0.0)
    }

    pub fn start(&mut self) {
        self.old_time = self.now();
        self.elapsed = 0.0;
        self.running = true;
    }

    /// Seconds since the previous call.
    pub fn delta(&mut self) -> f64 {
        if !self.running {
            self.start();
            return 0.0;
        }
        let now = self.now();
        let diff = now - self.old_time;
        self.old_time = now;
        self.elapsed += diff;
        diff
    }

    /// Total seconds accumulated by [`Clock::delta`].
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delta_starts_the_clock() {
        let mut clock = Clock::new();
        assert!(!clock.is_running());
        assert_eq!(clock.delta(), 0.0);
        assert!(clock.is_running());
    }

    #[test]
    fn deltas_accumulate_into_elapsed() {
        let mut clock = Clock::new();
        clock.delta();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let a = clock.delta();
        let b = clock.delta();
        assert!(a > 0.0);
        assert!(b >= 0.0);
        assert!((clock.elapsed() - (a + b)).abs() < 1e-9);
    }
}
