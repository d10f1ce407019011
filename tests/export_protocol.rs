//! Export protocol over the public API: a stage feeding a mock encoder
//! transport through the pipeline state machine.

use stagecraft::{
    CaptureFormat, EncoderExit, EncoderTransport, ExportOpts, ExportState, FrameContext,
    PushOutcome, Scene, SolidLayer, Stage, StageResult, VideoExportPipeline,
};

/// Records the byte length of every frame it accepts.
#[derive(Default)]
struct CollectingTransport {
    frames: Vec<usize>,
    closed: u32,
    finished: bool,
}

impl EncoderTransport for CollectingTransport {
    fn wait_ready(&mut self) -> StageResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, frame: Vec<u8>) -> StageResult<PushOutcome> {
        self.frames.push(frame.len());
        Ok(PushOutcome::Accepted)
    }

    fn wait_drained(&mut self) -> StageResult<()> {
        Ok(())
    }

    fn close_input(&mut self) -> StageResult<()> {
        self.closed += 1;
        Ok(())
    }

    fn wait_finished(&mut self) -> StageResult<EncoderExit> {
        self.finished = true;
        Ok(EncoderExit {
            success: true,
            code: Some(0),
            detail: String::new(),
        })
    }
}

#[test]
fn stage_streams_rendered_png_frames_through_the_pipeline() {
    let mut stage = Stage::with_default_surface();
    let mut scene = Scene::new("main");
    scene
        .add_display(Box::new(SolidLayer::full([12, 34, 56, 255])))
        .unwrap();
    stage.add_scene(scene).unwrap();

    let opts = ExportOpts::new("unused.mp4", 24, 0.5);
    let total = opts.total_frames();
    assert_eq!(total, 12);

    let mut requested = Vec::new();
    let mut pipeline = VideoExportPipeline::new(CollectingTransport::default(), total, "unused.mp4");
    let report = pipeline
        .run(|frame| {
            requested.push(frame);
            stage.render_image(&FrameContext::at(frame, opts.fps), CaptureFormat::Png)
        })
        .unwrap();

    assert_eq!(report.frames_written, 12);
    assert_eq!(pipeline.state(), ExportState::Closed);
    assert_eq!(requested, (0..12).collect::<Vec<_>>());

    let transport = pipeline.transport();
    assert_eq!(transport.frames.len(), 12);
    assert_eq!(transport.closed, 1);
    assert!(transport.finished);
    // Every pushed buffer is a complete PNG (its framing is the delimiter).
    assert!(transport.frames.iter().all(|len| *len > 8));
}

#[test]
fn zero_duration_export_requests_no_frames() {
    let opts = ExportOpts::new("unused.mp4", 24, 0.0);
    let mut pipeline =
        VideoExportPipeline::new(CollectingTransport::default(), opts.total_frames(), "unused.mp4");

    let mut requested = 0u32;
    let report = pipeline
        .run(|_| {
            requested += 1;
            Ok(Vec::new())
        })
        .unwrap();

    assert_eq!(report.frames_written, 0);
    assert_eq!(requested, 0);
    assert_eq!(pipeline.state(), ExportState::Closed);
    assert!(pipeline.transport().frames.is_empty());
    assert_eq!(pipeline.transport().closed, 1);
}
