use serde_json::Value;

use crate::effects::library::PassRegistry;
use crate::effects::pass::EffectPass;
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{StageError, StageResult};
use crate::graph::node::{Node, NodeId, PropertyBag, merge_properties};
use crate::surface::Framebuffer;

/// A post-processing node in a scene's effect chain.
///
/// The effect owns zero-or-one [`EffectPass`] and mediates between property
/// writes and pass uniforms: writes only mark the effect dirty, and the
/// accumulated state is flushed into the pass once, right before the next
/// render. Cost is bounded to one uniform push per frame no matter how many
/// updates happened in between.
pub struct Effect {
    id: NodeId,
    properties: PropertyBag,
    pass: Option<EffectPass>,
    needs_update: bool,
}

impl Effect {
    /// Create an effect whose pass type is `kind`, with optional extra
    /// properties. Effects start enabled unless `properties` says otherwise.
    pub fn new(kind: impl Into<String>, properties: PropertyBag) -> Self {
        let mut props = properties;
        props.insert("type".to_string(), Value::String(kind.into()));
        props
            .entry("enabled".to_string())
            .or_insert(Value::Bool(true));
        Self {
            id: NodeId::next(),
            properties: props,
            pass: None,
            needs_update: true,
        }
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn enabled(&self) -> bool {
        self.properties
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// The pass type this effect renders with.
    pub fn pass_kind(&self) -> StageResult<&str> {
        self.properties
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| StageError::config("effect has no 'type' property"))
    }

    pub fn pass(&self) -> Option<&EffectPass> {
        self.pass.as_ref()
    }

    pub fn pass_mut(&mut self) -> Option<&mut EffectPass> {
        self.pass.as_mut()
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Merge `updates` into the property bag, returning whether anything
    /// actually changed.
    ///
    /// An `enabled` change propagates to the pass immediately; a `type`
    /// change tears down the old pass and builds a fresh one of the new type,
    /// leaving uniform application to the next render.
    pub fn update(&mut self, updates: &PropertyBag, registry: &PassRegistry) -> StageResult<bool> {
        // Validate a type switch up front so a bad request leaves the effect
        // untouched.
        let new_kind = match updates.get("type") {
            Some(Value::String(kind)) if Some(kind.as_str()) != self.properties.get("type").and_then(Value::as_str) => {
                if !registry.contains(kind) {
                    return Err(StageError::config(format!(
                        "unknown effect pass type '{kind}'"
                    )));
                }
                Some(kind.clone())
            }
            _ => None,
        };

        let changed = merge_properties(&mut self.properties, updates);
        if !changed {
            return Ok(false);
        }
        self.needs_update = true;

        if let Some(kind) = new_kind
            && let Some(old) = self.pass.take()
        {
            let rebuilt = registry.build(&kind, old.size())?;
            self.set_pass(rebuilt);
        }

        if let Some(Value::Bool(enabled)) = updates.get("enabled")
            && let Some(pass) = self.pass.as_mut()
        {
            pass.enabled = *enabled;
        }

        Ok(true)
    }

    /// Attach a pass, seeding its enabled flag from the effect's current
    /// state. Uniforms are pushed lazily on the next [`Effect::sync_pass`].
    pub fn set_pass(&mut self, mut pass: EffectPass) {
        pass.enabled = self.enabled();
        self.pass = Some(pass);
        self.needs_update = true;
    }

    /// Build and attach this effect's pass from `registry` at `size`.
    pub fn build_pass(&mut self, registry: &PassRegistry, size: SurfaceSize) -> StageResult<()> {
        let pass = registry.build(self.pass_kind()?, size)?;
        self.set_pass(pass);
        Ok(())
    }

    /// Drop the pass and its resources, e.g. when the effect leaves a scene.
    pub fn detach_pass(&mut self) {
        self.pass = None;
        self.needs_update = true;
    }

    /// Synchronization point: push dirty properties into pass uniforms once.
    pub fn sync_pass(&mut self) {
        if !self.needs_update {
            return;
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.set_uniforms(&self.properties);
            self.needs_update = false;
        }
    }

    /// Forward a surface resize to the pass. No-op without one; idempotent.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if let Some(pass) = self.pass.as_mut() {
            pass.set_size(width, height);
        }
    }

    /// Flush pending uniforms and run the pass over `frame`.
    ///
    /// Callers are expected to skip disabled effects; a missing pass is a
    /// configuration error surfaced here rather than silently skipped.
    pub fn render(&mut self, frame: &mut Framebuffer) -> StageResult<()> {
        self.sync_pass();
        let Some(pass) = self.pass.as_ref() else {
            return Err(StageError::config(format!(
                "effect {:?} has no pass attached",
                self.id
            )));
        };
        pass.render(frame)
    }
}

impl Node for Effect {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_kind(&self) -> &str {
        "effect"
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("properties", &self.properties)
            .field("has_pass", &self.pass.is_some())
            .field("needs_update", &self.needs_update)
            .finish()
    }
}
