//! Stagecraft is a layered audiovisual compositor.
//!
//! A [`Stage`] renders an ordered collection of [`Scene`]s into a shared
//! surface; each scene composites its displays in order and then applies an
//! ordered chain of post-processing [`Effect`]s. Frames can be displayed
//! live, captured as encoded images, or streamed frame-exactly into a system
//! `ffmpeg` subprocess to produce an MP4:
//!
//! - Build a [`Stage`] over a [`CpuSurface`]
//! - Add [`Scene`]s, displays, and effects
//! - Render single frames with [`Stage::render_frame`] / [`Stage::render_image`],
//!   or export with [`Stage::render_video`]
#![forbid(unsafe_code)]

pub mod effects;
pub mod export;
pub mod foundation;
pub mod graph;
pub mod scene;
pub mod stage;
pub mod surface;

pub use crate::effects::effect::Effect;
pub use crate::effects::library::PassRegistry;
pub use crate::effects::pass::{EffectPass, PassProgram, UniformMap};
pub use crate::export::ffmpeg::FfmpegTransport;
pub use crate::export::pipeline::{
    EncoderExit, EncoderTransport, ExportOpts, ExportReport, ExportState, PushOutcome,
    VideoExportPipeline,
};
pub use crate::foundation::core::{Clock, FrameContext, MonotonicClock, SurfaceSize};
pub use crate::foundation::error::{StageError, StageResult};
pub use crate::graph::collection::NodeCollection;
pub use crate::graph::node::{Node, NodeId, PropertyBag};
pub use crate::scene::Scene;
pub use crate::scene::display::{Display, DisplayNode, SolidLayer};
pub use crate::stage::stats::{FrameStats, FrameStatsSnapshot};
pub use crate::stage::{ListenerId, Stage};
pub use crate::surface::{CaptureFormat, CpuSurface, Framebuffer, RenderSurface};
