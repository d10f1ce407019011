//! Built-in pass programs and the registry that constructs passes by type
//! name.

use std::collections::BTreeMap;

use crate::effects::pass::{EffectPass, PassProgram, UniformMap};
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{StageError, StageResult};
use crate::surface::Framebuffer;

type ProgramBuilder = fn() -> Box<dyn PassProgram>;

/// Maps pass type names to program constructors.
///
/// Requesting an unknown type is a configuration error at the call site; an
/// effect must never silently drop its transform.
pub struct PassRegistry {
    builders: BTreeMap<String, ProgramBuilder>,
}

impl PassRegistry {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in programs.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        reg.register("pixelate", || Box::new(PixelateProgram));
        reg.register("invert", || Box::new(InvertProgram));
        reg
    }

    pub fn register(&mut self, kind: impl Into<String>, builder: ProgramBuilder) {
        self.builders.insert(kind.into(), builder);
    }

    /// Construct a pass of `kind` sized to `size`.
    pub fn build(&self, kind: &str, size: SurfaceSize) -> StageResult<EffectPass> {
        let builder = self.builders.get(kind).ok_or_else(|| {
            StageError::config(format!("unknown effect pass type '{kind}'"))
        })?;
        Ok(EffectPass::new(builder(), size))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.builders.contains_key(kind)
    }
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn uniform_u32(uniforms: &UniformMap, name: &str, default: u32) -> u32 {
    uniforms
        .get(name)
        .and_then(|v| v.as_u64())
        .map(|v| v.min(u64::from(u32::MAX)) as u32)
        .unwrap_or(default)
}

/// Square pixelation: averages blocks of `size` pixels.
pub struct PixelateProgram;

impl PassProgram for PixelateProgram {
    fn kind(&self) -> &str {
        "pixelate"
    }

    fn apply(&self, uniforms: &UniformMap, frame: &mut Framebuffer) -> StageResult<()> {
        let block = uniform_u32(uniforms, "size", 10).clamp(1, 240);
        if block <= 1 {
            return Ok(());
        }

        let SurfaceSize { width, height } = frame.size();
        for by in (0..height).step_by(block as usize) {
            for bx in (0..width).step_by(block as usize) {
                let x1 = (bx + block).min(width);
                let y1 = (by + block).min(height);
                let mut acc = [0u64; 4];
                let mut count = 0u64;
                for y in by..y1 {
                    for x in bx..x1 {
                        let px = frame.pixel(x, y);
                        for ch in 0..4 {
                            acc[ch] += u64::from(px[ch]);
                        }
                        count += 1;
                    }
                }
                let avg = [
                    (acc[0] / count) as u8,
                    (acc[1] / count) as u8,
                    (acc[2] / count) as u8,
                    (acc[3] / count) as u8,
                ];
                let data = frame.data_mut();
                for y in by..y1 {
                    for x in bx..x1 {
                        let i = ((u64::from(y) * u64::from(width) + u64::from(x)) * 4) as usize;
                        data[i..i + 4].copy_from_slice(&avg);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Channel inversion, alpha untouched.
pub struct InvertProgram;

impl PassProgram for InvertProgram {
    fn kind(&self) -> &str {
        "invert"
    }

    fn apply(&self, _uniforms: &UniformMap, frame: &mut Framebuffer) -> StageResult<()> {
        for px in frame.data_mut().chunks_exact_mut(4) {
            px[0] = 255 - px[0];
            px[1] = 255 - px[1];
            px[2] = 255 - px[2];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn size(w: u32, h: u32) -> SurfaceSize {
        SurfaceSize::new(w, h).unwrap()
    }

    #[test]
    fn unknown_type_is_a_config_error() {
        let reg = PassRegistry::with_builtins();
        let err = reg.build("vortex", size(4, 4)).unwrap_err();
        assert!(matches!(err, StageError::Config(_)));
    }

    #[test]
    fn builtin_passes_resolve() {
        let reg = PassRegistry::with_builtins();
        assert!(reg.contains("pixelate"));
        assert!(reg.contains("invert"));
        assert_eq!(reg.build("invert", size(4, 4)).unwrap().kind(), "invert");
    }

    #[test]
    fn invert_flips_channels_and_keeps_alpha() {
        let mut fb = Framebuffer::new(size(1, 1));
        fb.blend_over(0, 0, [10, 20, 30, 255]);
        InvertProgram.apply(&UniformMap::new(), &mut fb).unwrap();
        assert_eq!(fb.pixel(0, 0), [245, 235, 225, 255]);
    }

    #[test]
    fn pixelate_averages_blocks() {
        let mut fb = Framebuffer::new(size(2, 1));
        fb.blend_over(0, 0, [0, 0, 0, 255]);
        fb.blend_over(1, 0, [200, 0, 0, 255]);

        let mut uniforms = UniformMap::new();
        uniforms.insert("size".into(), json!(2));
        PixelateProgram.apply(&uniforms, &mut fb).unwrap();

        assert_eq!(fb.pixel(0, 0), [100, 0, 0, 255]);
        assert_eq!(fb.pixel(1, 0), [100, 0, 0, 255]);
    }

    #[test]
    fn pixelate_block_of_one_is_identity() {
        let mut fb = Framebuffer::new(size(2, 2));
        fb.blend_over(0, 0, [9, 8, 7, 255]);
        let before = fb.data().to_vec();

        let mut uniforms = UniformMap::new();
        uniforms.insert("size".into(), json!(1));
        PixelateProgram.apply(&uniforms, &mut fb).unwrap();
        assert_eq!(fb.data(), &before[..]);
    }
}
