use std::collections::VecDeque;

/// Rolling fps history length.
const HISTORY_LEN: usize = 10;
/// Sampling window in milliseconds.
const WINDOW_MS: f64 = 1000.0;

/// Stats payload carried by a `tick` notification.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct FrameStatsSnapshot {
    /// Frames per second over the last completed window.
    pub fps: u32,
    /// Average milliseconds per frame over the last completed window.
    pub ms: f64,
    /// Sample point (ms since clock origin) that opened the current window.
    pub time: f64,
    /// Frames counted in the current (incomplete) window.
    pub frames: u32,
    /// Up to the last 10 fps samples, oldest first.
    pub stack: Vec<u32>,
}

/// Frame statistics with a 1000 ms sampling window.
///
/// Two states: warming up (no sample point yet) and sampling. fps/ms are
/// recomputed only when a window completes; between windows they are
/// intentionally stale. This amortizes the cost, it is not per-frame data.
#[derive(Debug, Default)]
pub struct FrameStats {
    fps: u32,
    ms: f64,
    time: Option<f64>,
    frames: u32,
    stack: VecDeque<u32>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn ms(&self) -> f64 {
        self.ms
    }

    pub fn history(&self) -> impl Iterator<Item = u32> + '_ {
        self.stack.iter().copied()
    }

    /// Record one rendered frame at `now_ms`.
    ///
    /// The first call only opens the window. Returns a snapshot when a
    /// window just completed, which is the caller's cue to emit `tick`.
    pub fn record_frame(&mut self, now_ms: f64) -> Option<FrameStatsSnapshot> {
        let Some(window_start) = self.time else {
            self.time = Some(now_ms);
            return None;
        };

        self.frames += 1;

        let elapsed = now_ms - window_start;
        if elapsed <= WINDOW_MS {
            return None;
        }

        self.fps = ((f64::from(self.frames) * 1000.0) / elapsed).round() as u32;
        self.ms = elapsed / f64::from(self.frames);
        self.time = Some(now_ms);
        self.frames = 0;

        self.stack.push_back(self.fps);
        if self.stack.len() > HISTORY_LEN {
            self.stack.pop_front();
        }

        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> FrameStatsSnapshot {
        FrameStatsSnapshot {
            fps: self.fps,
            ms: self.ms,
            time: self.time.unwrap_or(0.0),
            frames: self.frames,
            stack: self.stack.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_only_opens_the_window() {
        let mut stats = FrameStats::new();
        assert!(stats.record_frame(0.0).is_none());
        assert_eq!(stats.snapshot().frames, 0);
        assert_eq!(stats.fps(), 0);
    }

    #[test]
    fn evenly_spaced_frames_yield_matching_fps() {
        let mut stats = FrameStats::new();
        stats.record_frame(0.0);

        // 30 frames spread over slightly more than one second.
        let step = 1001.0 / 30.0;
        let mut tick = None;
        for i in 1..=30 {
            tick = stats.record_frame(f64::from(i) * step);
        }
        let snap = tick.expect("window should have completed on the last frame");
        assert_eq!(snap.fps, 30);
        assert!((snap.ms - 1001.0 / 30.0).abs() < 1e-9);
        assert_eq!(snap.stack, vec![30]);
    }

    #[test]
    fn values_are_stale_between_windows() {
        let mut stats = FrameStats::new();
        stats.record_frame(0.0);
        for i in 1..=10 {
            stats.record_frame(f64::from(i) * 101.0);
        }
        let fps = stats.fps();
        assert!(fps > 0);

        // Mid-window frames do not recompute.
        assert!(stats.record_frame(1100.0).is_none());
        assert_eq!(stats.fps(), fps);
    }

    #[test]
    fn history_is_a_ten_entry_fifo() {
        let mut stats = FrameStats::new();
        stats.record_frame(0.0);

        let mut now = 0.0;
        for window in 0u32..11 {
            // `window + 1` frames per window makes each sample distinct.
            let frames = window + 1;
            let step = 1001.0 / f64::from(frames);
            for _ in 0..frames {
                now += step;
                stats.record_frame(now);
            }
        }

        let stack: Vec<u32> = stats.history().collect();
        assert_eq!(stack.len(), 10);
        // The first window's sample (1 fps) was evicted.
        assert_eq!(stack[0], 2);
        assert_eq!(*stack.last().unwrap(), 11);
    }
}
