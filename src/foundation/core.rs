use std::time::Instant;

use crate::foundation::error::{StageError, StageResult};

/// Render surface dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SurfaceSize {
    /// Create a validated size (both dimensions non-zero).
    pub fn new(width: u32, height: u32) -> StageResult<Self> {
        if width == 0 || height == 0 {
            return Err(StageError::config("surface width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    /// Pixel count as `u64` (never overflows for u32 dimensions).
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Per-frame input handed to every display node during compositing.
///
/// `time_secs` is `frame / fps` on the export path and wall-clock driven on
/// the live path.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameContext {
    /// 0-based frame index.
    pub frame: u64,
    /// Timeline position in seconds.
    pub time_secs: f64,
}

impl FrameContext {
    pub fn at(frame: u64, fps: u32) -> Self {
        let time_secs = if fps == 0 {
            0.0
        } else {
            frame as f64 / f64::from(fps)
        };
        Self { frame, time_secs }
    }
}

/// Number of frames in `duration_secs` at `fps`, using floor semantics.
///
/// Zero fps or zero (or negative) duration yields zero frames.
pub fn duration_to_frames_floor(duration_secs: f64, fps: u32) -> u64 {
    (duration_secs * f64::from(fps)).floor().max(0.0) as u64
}

/// Monotonic time source for frame statistics.
///
/// A trait so tests can drive the sampling window deterministically.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin; never decreases.
    fn now_ms(&mut self) -> f64;
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&mut self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_rejects_zero_dimensions() {
        assert!(SurfaceSize::new(0, 480).is_err());
        assert!(SurfaceSize::new(854, 0).is_err());
        assert_eq!(
            SurfaceSize::new(854, 480).unwrap(),
            SurfaceSize {
                width: 854,
                height: 480
            }
        );
    }

    #[test]
    fn duration_to_frames_uses_floor() {
        assert_eq!(duration_to_frames_floor(2.0, 24), 48);
        assert_eq!(duration_to_frames_floor(1.99, 24), 47);
        assert_eq!(duration_to_frames_floor(0.0, 24), 0);
        assert_eq!(duration_to_frames_floor(2.0, 0), 0);
        assert_eq!(duration_to_frames_floor(-1.0, 24), 0);
    }

    #[test]
    fn frame_context_time_tracks_fps() {
        let ctx = FrameContext::at(48, 24);
        assert_eq!(ctx.frame, 48);
        assert!((ctx.time_secs - 2.0).abs() < 1e-12);
        assert_eq!(FrameContext::at(5, 0).time_secs, 0.0);
    }

    #[test]
    fn monotonic_clock_never_decreases() {
        let mut clock = MonotonicClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
