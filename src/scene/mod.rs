//! A scene layers its displays in order, then runs its enabled effect chain
//! over the accumulated frame.

pub mod display;

use serde_json::{Value, json};

use crate::effects::effect::Effect;
use crate::effects::library::PassRegistry;
use crate::foundation::core::{FrameContext, SurfaceSize};
use crate::foundation::error::{StageError, StageResult};
use crate::graph::collection::NodeCollection;
use crate::graph::node::{Node, NodeId, PropertyBag};
use crate::scene::display::{Display, DisplayNode};
use crate::surface::Framebuffer;

// Mirrors the stage's default output size; the stage resizes scenes on add.
const DEFAULT_SIZE: SurfaceSize = SurfaceSize {
    width: 854,
    height: 480,
};

/// One composable layer of the stage.
pub struct Scene {
    id: NodeId,
    properties: PropertyBag,
    displays: NodeCollection<DisplayNode>,
    effects: NodeCollection<Effect>,
    size: SurfaceSize,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        let mut properties = PropertyBag::new();
        properties.insert("name".to_string(), Value::String(name.into()));
        Self {
            id: NodeId::next(),
            properties,
            displays: NodeCollection::new(),
            effects: NodeCollection::new(),
            size: DEFAULT_SIZE,
        }
    }

    pub fn name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn size(&self) -> SurfaceSize {
        self.size
    }

    /// Mount a display at the end of the display chain.
    pub fn add_display(&mut self, display: Box<dyn Display>) -> StageResult<NodeId> {
        let node = DisplayNode::new(display);
        let id = node.id();
        self.displays.add(node)?;
        Ok(id)
    }

    pub fn remove_display(&mut self, id: NodeId) -> Option<DisplayNode> {
        self.displays.remove(id)
    }

    pub fn move_display(&mut self, id: NodeId, delta: isize) -> bool {
        match self.displays.index_of(id) {
            Some(index) => self.displays.swap(index, delta),
            None => false,
        }
    }

    /// Append `effect` to the effect chain, building its pass from
    /// `registry` at the scene's current target size.
    ///
    /// An unknown pass type fails here, before the effect joins the chain.
    pub fn add_effect(&mut self, mut effect: Effect, registry: &PassRegistry) -> StageResult<NodeId> {
        effect.build_pass(registry, self.size)?;
        let id = effect.id();
        self.effects.add(effect)?;
        Ok(id)
    }

    /// Remove an effect, detaching its pass resources.
    pub fn remove_effect(&mut self, id: NodeId) -> Option<Effect> {
        let mut effect = self.effects.remove(id)?;
        effect.detach_pass();
        Some(effect)
    }

    pub fn move_effect(&mut self, id: NodeId, delta: isize) -> bool {
        match self.effects.index_of(id) {
            Some(index) => self.effects.swap(index, delta),
            None => false,
        }
    }

    pub fn effect(&self, id: NodeId) -> Option<&Effect> {
        self.effects.get(id)
    }

    pub fn effect_mut(&mut self, id: NodeId) -> Option<&mut Effect> {
        self.effects.get_mut(id)
    }

    pub fn effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter()
    }

    pub fn display_count(&self) -> usize {
        self.displays.len()
    }

    /// Propagate a new target size to every effect pass. Idempotent.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = SurfaceSize { width, height };
        for effect in self.effects.iter_mut() {
            effect.set_size(width, height);
        }
    }

    /// Compose this scene into `frame`: displays first, in collection order
    /// (later drawn over earlier), then each enabled effect's pass in
    /// collection order. Disabled effects cost nothing.
    pub fn render(&mut self, ctx: &FrameContext, frame: &mut Framebuffer) -> StageResult<()> {
        for display in self.displays.iter() {
            display.render(ctx, frame).map_err(|e| {
                StageError::render(format!(
                    "display '{}' in scene '{}' failed: {e}",
                    display.kind(),
                    self.name()
                ))
            })?;
        }

        for effect in self.effects.iter_mut() {
            if !effect.enabled() {
                continue;
            }
            effect.render(frame)?;
        }

        Ok(())
    }

    /// Serializable snapshot of this scene's structure and properties.
    pub fn snapshot(&self) -> Value {
        json!({
            "name": self.name(),
            "displays": self
                .displays
                .iter()
                .map(|d| json!({ "kind": d.kind() }))
                .collect::<Vec<_>>(),
            "effects": self
                .effects
                .iter()
                .map(|e| json!({ "properties": e.properties() }))
                .collect::<Vec<_>>(),
        })
    }
}

impl Node for Scene {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_kind(&self) -> &str {
        "scene"
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("displays", &self.displays.len())
            .field("effects", &self.effects.len())
            .finish()
    }
}
