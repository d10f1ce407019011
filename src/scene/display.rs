use crate::foundation::core::FrameContext;
use crate::foundation::error::StageResult;
use crate::graph::node::{Node, NodeId};
use crate::surface::Framebuffer;

/// Renderable content capability.
///
/// A display draws its visual contribution for the current frame into the
/// shared framebuffer; it is a side-effect-only collaborator with no opinion
/// about what was drawn before it.
pub trait Display {
    /// Display kind for logs and snapshots.
    fn kind(&self) -> &str;

    fn render(&self, ctx: &FrameContext, frame: &mut Framebuffer) -> StageResult<()>;
}

/// A display mounted in a scene's ordered display chain.
pub struct DisplayNode {
    id: NodeId,
    renderer: Box<dyn Display>,
}

impl DisplayNode {
    pub fn new(renderer: Box<dyn Display>) -> Self {
        Self {
            id: NodeId::next(),
            renderer,
        }
    }

    pub fn render(&self, ctx: &FrameContext, frame: &mut Framebuffer) -> StageResult<()> {
        self.renderer.render(ctx, frame)
    }

    pub fn kind(&self) -> &str {
        self.renderer.kind()
    }
}

impl Node for DisplayNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn node_kind(&self) -> &str {
        self.renderer.kind()
    }
}

impl std::fmt::Debug for DisplayNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayNode")
            .field("id", &self.id)
            .field("kind", &self.renderer.kind())
            .finish()
    }
}

/// Fills a rectangle (or the whole surface) with one straight-alpha color.
#[derive(Clone, Copy, Debug)]
pub struct SolidLayer {
    pub rgba: [u8; 4],
    /// `(x, y, w, h)`; `None` covers the full surface.
    pub rect: Option<(u32, u32, u32, u32)>,
}

impl SolidLayer {
    pub fn full(rgba: [u8; 4]) -> Self {
        Self { rgba, rect: None }
    }

    pub fn rect(rgba: [u8; 4], x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            rgba,
            rect: Some((x, y, w, h)),
        }
    }
}

impl Display for SolidLayer {
    fn kind(&self) -> &str {
        "solid"
    }

    fn render(&self, _ctx: &FrameContext, frame: &mut Framebuffer) -> StageResult<()> {
        let (x, y, w, h) = match self.rect {
            Some(rect) => rect,
            None => {
                let size = frame.size();
                (0, 0, size.width, size.height)
            }
        };
        frame.fill_rect(x, y, w, h, self.rgba);
        Ok(())
    }
}
