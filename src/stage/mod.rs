//! Top-level orchestration: the stage owns the scene graph, the render
//! surface, the clock, and the export entry point.

pub mod stats;

use serde_json::{Value, json};

use crate::effects::library::PassRegistry;
use crate::export::ffmpeg::FfmpegTransport;
use crate::export::pipeline::{ExportOpts, ExportReport, VideoExportPipeline};
use crate::foundation::core::{Clock, FrameContext, MonotonicClock, SurfaceSize};
use crate::foundation::error::StageResult;
use crate::graph::collection::NodeCollection;
use crate::graph::node::{Node, NodeId};
use crate::scene::Scene;
use crate::stage::stats::{FrameStats, FrameStatsSnapshot};
use crate::surface::{CaptureFormat, CpuSurface, RenderSurface};

/// Handle to a registered tick listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListenerId(u64);

type TickListener = Box<dyn FnMut(&FrameStatsSnapshot)>;

/// Top-level compositor.
///
/// Exclusively owns the render surface; live display and export share the
/// same synchronous render path, so no two frames are ever composited
/// concurrently.
pub struct Stage {
    scenes: NodeCollection<Scene>,
    surface: Box<dyn RenderSurface>,
    clock: Box<dyn Clock>,
    stats: FrameStats,
    registry: PassRegistry,
    listeners: Vec<(ListenerId, TickListener)>,
    next_listener: u64,
}

impl Stage {
    pub fn new(surface: Box<dyn RenderSurface>) -> Self {
        Self::with_clock(surface, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(surface: Box<dyn RenderSurface>, clock: Box<dyn Clock>) -> Self {
        Self {
            scenes: NodeCollection::new(),
            surface,
            clock,
            stats: FrameStats::new(),
            registry: PassRegistry::with_builtins(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Stage over an in-memory surface at the default 854x480 output size.
    pub fn with_default_surface() -> Self {
        let size = SurfaceSize {
            width: 854,
            height: 480,
        };
        Self::new(Box::new(CpuSurface::new(size)))
    }

    pub fn size(&self) -> SurfaceSize {
        self.surface.size()
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PassRegistry {
        &mut self.registry
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Append a scene on top of the existing ones, sized to the surface.
    pub fn add_scene(&mut self, mut scene: Scene) -> StageResult<NodeId> {
        let size = self.surface.size();
        scene.set_size(size.width, size.height);
        let id = scene.id();
        self.scenes.add(scene)?;
        Ok(id)
    }

    pub fn remove_scene(&mut self, id: NodeId) -> Option<Scene> {
        self.scenes.remove(id)
    }

    /// Move a scene by `delta` positions in stacking order.
    pub fn move_scene(&mut self, id: NodeId, delta: isize) -> bool {
        match self.scenes.index_of(id) {
            Some(index) => self.scenes.swap(index, delta),
            None => false,
        }
    }

    /// Remove every scene, snapshotting ids first so the live collection is
    /// never mutated while being walked.
    pub fn clear_scenes(&mut self) {
        for id in self.scenes.ids() {
            self.scenes.remove(id);
        }
    }

    pub fn has_scenes(&self) -> bool {
        !self.scenes.is_empty()
    }

    pub fn scene(&self, id: NodeId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn scene_mut(&mut self, id: NodeId) -> Option<&mut Scene> {
        self.scenes.get_mut(id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    /// Register a `tick` listener; ticks fire when a stats sampling window
    /// completes. Subscription has no effect on render correctness.
    pub fn on_tick(&mut self, listener: TickListener) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn off_tick(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Compose one frame: clear the surface, render every scene in stacking
    /// order (later scenes on top), then update frame statistics.
    ///
    /// Synchronous: when this returns the frame is fully composited. A scene
    /// error aborts this frame's composite but leaves the stage consistent
    /// for the next one.
    pub fn render_frame(&mut self, ctx: &FrameContext) -> StageResult<()> {
        self.surface.clear();

        let frame = self.surface.frame_mut();
        for scene in self.scenes.iter_mut() {
            scene.render(ctx, frame)?;
        }

        let now = self.clock.now_ms();
        if let Some(snapshot) = self.stats.record_frame(now) {
            for (_, listener) in self.listeners.iter_mut() {
                listener(&snapshot);
            }
        }

        Ok(())
    }

    /// Render one frame and return it as an encoded image buffer.
    ///
    /// Encoding is synchronous relative to frame completion; the buffer is
    /// never handed out before the frame is done.
    pub fn render_image(&mut self, ctx: &FrameContext, format: CaptureFormat) -> StageResult<Vec<u8>> {
        self.render_frame(ctx)?;
        self.surface.capture(format)
    }

    /// Export `opts.duration_secs` of timeline at `opts.fps` into an MP4.
    ///
    /// `producer` is called once per frame index, in order, and returns the
    /// frame context to composite — the point where callers advance their
    /// scene state. Frames stream into a dedicated ffmpeg subprocess with
    /// backpressure; see [`VideoExportPipeline`] for the protocol.
    #[tracing::instrument(skip(self, producer))]
    pub fn render_video<F>(&mut self, opts: ExportOpts, mut producer: F) -> StageResult<ExportReport>
    where
        F: FnMut(u64, u32) -> FrameContext,
    {
        let transport = FfmpegTransport::spawn(&opts, self.size())?;
        let fps = opts.fps;
        let mut pipeline = VideoExportPipeline::new(transport, opts.total_frames(), opts.out_path);
        pipeline.run(|frame| {
            let ctx = producer(frame, fps);
            self.render_image(&ctx, CaptureFormat::Png)
        })
    }

    /// Serializable snapshot of the whole graph.
    pub fn snapshot(&self) -> Value {
        let size = self.size();
        json!({
            "scenes": self.scenes.iter().map(Scene::snapshot).collect::<Vec<_>>(),
            "options": { "width": size.width, "height": size.height },
        })
    }
}
