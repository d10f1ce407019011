use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::foundation::core::SurfaceSize;
use crate::foundation::error::StageResult;
use crate::surface::Framebuffer;

/// Named uniform values for one pass, JSON-typed like the property bags that
/// feed them.
pub type UniformMap = BTreeMap<String, Value>;

/// Opaque shader-like transform executed by an [`EffectPass`].
///
/// Concrete programs (pixelation, inversion, ...) live behind this trait; the
/// compositor only cares about the uniform contract.
pub trait PassProgram {
    /// Program kind, matching its registry key.
    fn kind(&self) -> &str;

    /// Transform `frame` in place using the current `uniforms`.
    fn apply(&self, uniforms: &UniformMap, frame: &mut Framebuffer) -> StageResult<()>;
}

/// One post-processing stage: a program plus its uniforms, target size, and
/// enabled flag.
pub struct EffectPass {
    program: Box<dyn PassProgram>,
    uniforms: UniformMap,
    size: SurfaceSize,
    /// Independently toggleable after creation; seeded from the owning
    /// effect's enabled state when the pass is attached.
    pub enabled: bool,
}

impl EffectPass {
    pub fn new(program: Box<dyn PassProgram>, size: SurfaceSize) -> Self {
        let mut pass = Self {
            program,
            uniforms: UniformMap::new(),
            size,
            enabled: true,
        };
        pass.write_resolution();
        pass
    }

    pub fn kind(&self) -> &str {
        self.program.kind()
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    pub fn uniforms(&self) -> &UniformMap {
        &self.uniforms
    }

    /// Merge `values` into the uniform map.
    ///
    /// The `resolution` uniform is owned by [`EffectPass::set_size`] and is
    /// not overwritten through this path.
    pub fn set_uniforms(&mut self, values: &UniformMap) {
        for (name, value) in values {
            if name == "resolution" {
                continue;
            }
            self.uniforms.insert(name.clone(), value.clone());
        }
    }

    /// Resize the pass target. Idempotent; rewrites the `resolution` uniform.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.size.width == width && self.size.height == height {
            return;
        }
        self.size = SurfaceSize { width, height };
        self.write_resolution();
    }

    /// Run the program over `frame`. Callers skip disabled passes entirely.
    pub fn render(&self, frame: &mut Framebuffer) -> StageResult<()> {
        self.program.apply(&self.uniforms, frame)
    }

    fn write_resolution(&mut self) {
        self.uniforms.insert(
            "resolution".to_string(),
            json!([self.size.width, self.size.height]),
        );
    }
}

impl std::fmt::Debug for EffectPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectPass")
            .field("kind", &self.kind())
            .field("size", &self.size)
            .field("enabled", &self.enabled)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::SurfaceSize;

    struct NullProgram;

    impl PassProgram for NullProgram {
        fn kind(&self) -> &str {
            "null"
        }

        fn apply(&self, _uniforms: &UniformMap, _frame: &mut Framebuffer) -> StageResult<()> {
            Ok(())
        }
    }

    fn pass() -> EffectPass {
        EffectPass::new(Box::new(NullProgram), SurfaceSize::new(100, 50).unwrap())
    }

    #[test]
    fn resolution_uniform_tracks_size() {
        let mut p = pass();
        assert_eq!(p.uniforms().get("resolution"), Some(&json!([100, 50])));
        p.set_size(640, 360);
        assert_eq!(p.uniforms().get("resolution"), Some(&json!([640, 360])));
    }

    #[test]
    fn set_size_is_idempotent() {
        let mut p = pass();
        p.set_size(640, 360);
        let before = p.uniforms().clone();
        p.set_size(640, 360);
        assert_eq!(p.uniforms(), &before);
        assert_eq!(p.size(), SurfaceSize::new(640, 360).unwrap());
    }

    #[test]
    fn set_uniforms_merges_but_never_touches_resolution() {
        let mut p = pass();
        let mut values = UniformMap::new();
        values.insert("size".into(), json!(12));
        values.insert("resolution".into(), json!([1, 1]));
        p.set_uniforms(&values);
        assert_eq!(p.uniforms().get("size"), Some(&json!(12)));
        assert_eq!(p.uniforms().get("resolution"), Some(&json!([100, 50])));
    }
}
