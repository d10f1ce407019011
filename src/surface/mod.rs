//! Pixel surface the stage composites into, plus capture to encoded images.

use std::io::Cursor;

use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{StageError, StageResult};

/// Image encoding requested when capturing the surface.
///
/// Both options are lossless; the encoded bytes carry their own header and
/// framing, which is what lets the export path stream them with no extra
/// delimiters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureFormat {
    #[default]
    Png,
    Bmp,
}

/// Straight-alpha RGBA8 pixel buffer, row-major.
#[derive(Clone, Debug)]
pub struct Framebuffer {
    size: SurfaceSize,
    data: Vec<u8>,
}

impl Framebuffer {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            size,
            data: vec![0u8; (size.area() * 4) as usize],
        }
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Source-over blend `src` (straight alpha) onto the pixel at (x, y).
    pub fn blend_over(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let i = self.offset(x, y);
        let sa = u16::from(src[3]);
        if sa == 0 {
            return;
        }
        if sa == 255 {
            self.data[i..i + 4].copy_from_slice(&src);
            return;
        }
        let inv = 255 - sa;
        let da = u16::from(self.data[i + 3]);
        let out_a = sa + mul_div255(da, inv);
        for ch in 0..3 {
            let s = u16::from(src[ch]);
            let d = u16::from(self.data[i + ch]);
            // Straight-alpha source-over, composited against the (possibly
            // transparent) destination.
            let num = u32::from(s) * u32::from(sa) + u32::from(mul_div255(d, da)) * u32::from(inv);
            let v = if out_a == 0 {
                0
            } else {
                (num / u32::from(out_a)) as u16
            };
            self.data[i + ch] = v.min(255) as u8;
        }
        self.data[i + 3] = out_a.min(255) as u8;
    }

    /// Blend a filled rectangle; coordinates clamp to the buffer.
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, rgba: [u8; 4]) {
        let x1 = x.saturating_add(w).min(self.size.width);
        let y1 = y.saturating_add(h).min(self.size.height);
        for py in y.min(self.size.height)..y1 {
            for px in x.min(self.size.width)..x1 {
                self.blend_over(px, py, rgba);
            }
        }
    }

    /// Encode the buffer to `format`, returning the encoded bytes.
    pub fn encode(&self, format: CaptureFormat) -> StageResult<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.size.width, self.size.height, self.data.clone())
            .ok_or_else(|| StageError::render("framebuffer length does not match dimensions"))?;

        let fmt = match format {
            CaptureFormat::Png => image::ImageFormat::Png,
            CaptureFormat::Bmp => image::ImageFormat::Bmp,
        };

        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, fmt)
            .map_err(|e| StageError::render(format!("image encode failed: {e}")))?;
        Ok(out.into_inner())
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.size.width && y < self.size.height);
        ((u64::from(y) * u64::from(self.size.width) + u64::from(x)) * 4) as usize
    }
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// The render target the stage owns exclusively.
///
/// Exactly one frame is ever in flight: live rendering and export share the
/// same synchronous path, so there are no concurrent writers by construction.
pub trait RenderSurface {
    fn clear(&mut self);
    fn size(&self) -> SurfaceSize;
    fn frame_mut(&mut self) -> &mut Framebuffer;
    fn capture(&self, format: CaptureFormat) -> StageResult<Vec<u8>>;
}

/// In-memory CPU surface.
#[derive(Clone, Debug)]
pub struct CpuSurface {
    frame: Framebuffer,
}

impl CpuSurface {
    pub fn new(size: SurfaceSize) -> Self {
        Self {
            frame: Framebuffer::new(size),
        }
    }
}

impl RenderSurface for CpuSurface {
    fn clear(&mut self) {
        self.frame.clear();
    }

    fn size(&self) -> SurfaceSize {
        self.frame.size()
    }

    fn frame_mut(&mut self) -> &mut Framebuffer {
        &mut self.frame
    }

    fn capture(&self, format: CaptureFormat) -> StageResult<Vec<u8>> {
        self.frame.encode(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(w: u32, h: u32) -> SurfaceSize {
        SurfaceSize::new(w, h).unwrap()
    }

    #[test]
    fn clear_resets_to_transparent_black() {
        let mut fb = Framebuffer::new(size(2, 2));
        fb.fill_rect(0, 0, 2, 2, [10, 20, 30, 255]);
        fb.clear();
        assert!(fb.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn opaque_blend_replaces_pixel() {
        let mut fb = Framebuffer::new(size(1, 1));
        fb.blend_over(0, 0, [1, 2, 3, 255]);
        assert_eq!(fb.pixel(0, 0), [1, 2, 3, 255]);
    }

    #[test]
    fn half_alpha_over_opaque_mixes_channels() {
        let mut fb = Framebuffer::new(size(1, 1));
        fb.blend_over(0, 0, [0, 0, 0, 255]);
        fb.blend_over(0, 0, [255, 0, 0, 128]);
        let [r, g, b, a] = fb.pixel(0, 0);
        assert!(r >= 126 && r <= 130, "r = {r}");
        assert_eq!((g, b, a), (0, 0, 255));
    }

    #[test]
    fn fill_rect_clamps_to_bounds() {
        let mut fb = Framebuffer::new(size(4, 4));
        fb.fill_rect(2, 2, 10, 10, [255, 255, 255, 255]);
        assert_eq!(fb.pixel(3, 3), [255, 255, 255, 255]);
        assert_eq!(fb.pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn fill_rect_handles_extreme_coordinates() {
        let mut fb = Framebuffer::new(size(4, 4));
        // Offsets and extents near u32::MAX must clamp, not overflow.
        fb.fill_rect(u32::MAX, 0, 1, 1, [255, 255, 255, 255]);
        fb.fill_rect(0, u32::MAX, 1, 1, [255, 255, 255, 255]);
        fb.fill_rect(3, 3, u32::MAX, u32::MAX, [255, 255, 255, 255]);
        assert_eq!(fb.pixel(3, 3), [255, 255, 255, 255]);
        assert_eq!(fb.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn png_capture_roundtrips_dimensions() {
        let surface = CpuSurface::new(size(8, 6));
        let bytes = surface.capture(CaptureFormat::Png).unwrap();
        assert!(!bytes.is_empty());
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn bmp_capture_is_non_empty() {
        let surface = CpuSurface::new(size(4, 4));
        let bytes = surface.capture(CaptureFormat::Bmp).unwrap();
        assert!(bytes.len() > 14);
        assert_eq!(&bytes[0..2], b"BM");
    }
}
