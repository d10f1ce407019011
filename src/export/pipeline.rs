use std::path::PathBuf;

use crate::foundation::core::duration_to_frames_floor;
use crate::foundation::error::{StageError, StageResult};

/// Export job parameters.
#[derive(Clone, Debug)]
pub struct ExportOpts {
    /// Output container path (MP4).
    pub out_path: PathBuf,
    /// Declared frame rate of the output stream.
    pub fps: u32,
    /// Timeline duration in seconds.
    pub duration_secs: f64,
    /// Overwrite the output file if it already exists.
    pub overwrite: bool,
}

impl ExportOpts {
    pub fn new(out_path: impl Into<PathBuf>, fps: u32, duration_secs: f64) -> Self {
        Self {
            out_path: out_path.into(),
            fps,
            duration_secs,
            overwrite: true,
        }
    }

    pub fn validate(&self) -> StageResult<()> {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(StageError::validation(
                "export duration must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Total frame count, floor of `duration * fps`.
    ///
    /// Zero fps or zero duration legitimately yields zero frames; the
    /// pipeline then closes the encoder input without producing anything.
    pub fn total_frames(&self) -> u64 {
        duration_to_frames_floor(self.duration_secs, self.fps)
    }
}

/// Result of a completed export job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub frames_written: u64,
    pub out_path: PathBuf,
}

/// Outcome of pushing one frame into the encoder input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Frame delivered; keep going.
    Accepted,
    /// Frame taken but the stream is backpressured; the caller must
    /// [`EncoderTransport::wait_drained`] before producing the next frame.
    Full,
}

/// How the encoder subprocess terminated.
#[derive(Clone, Debug)]
pub struct EncoderExit {
    pub success: bool,
    /// OS exit code when available.
    pub code: Option<i32>,
    /// Trailing diagnostic output, attached to runtime errors.
    pub detail: String,
}

/// Seam between the export loop and the encoder subprocess.
///
/// One transport instance maps to exactly one subprocess; instances are
/// never shared between jobs. Tests drive the pipeline with a mock.
pub trait EncoderTransport {
    /// Block until the subprocess signals readiness on its diagnostic
    /// stream. No frame may be pushed before this returns.
    fn wait_ready(&mut self) -> StageResult<()>;

    /// Deliver one complete encoded image buffer.
    fn push_frame(&mut self, frame: Vec<u8>) -> StageResult<PushOutcome>;

    /// Block until a backpressured frame has been accepted downstream.
    fn wait_drained(&mut self) -> StageResult<()>;

    /// Signal end-of-stream. Idempotent at the transport level; the
    /// pipeline calls it exactly once on the success path.
    fn close_input(&mut self) -> StageResult<()>;

    /// Observe subprocess exit. Called on every path, success or failure,
    /// so the job never leaks the process.
    fn wait_finished(&mut self) -> StageResult<EncoderExit>;
}

/// Export pipeline lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Started,
    Streaming,
    Finalizing,
    Failed,
    Closed,
}

/// Drives one export job: frame production, ordering, backpressure, and
/// subprocess lifecycle.
///
/// Frames are written in strictly increasing index order, none skipped or
/// duplicated, and the input stream is closed exactly once after the last
/// frame. `Closed` and `Failed` are terminal; a pipeline runs at most once.
pub struct VideoExportPipeline<T: EncoderTransport> {
    transport: T,
    state: ExportState,
    frame: u64,
    total_frames: u64,
    out_path: PathBuf,
}

impl<T: EncoderTransport> VideoExportPipeline<T> {
    /// Create a pipeline for a spawned transport.
    pub fn new(transport: T, total_frames: u64, out_path: impl Into<PathBuf>) -> Self {
        Self {
            transport,
            state: ExportState::Idle,
            frame: 0,
            total_frames,
            out_path: out_path.into(),
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Index of the next frame to produce.
    pub fn next_frame(&self) -> u64 {
        self.frame
    }

    /// Run the job to completion.
    ///
    /// `producer` is called with each frame index in order and returns the
    /// encoded image buffer for that frame. On any failure the subprocess
    /// exit is still observed and logged before the error is returned.
    pub fn run<F>(&mut self, mut producer: F) -> StageResult<ExportReport>
    where
        F: FnMut(u64) -> StageResult<Vec<u8>>,
    {
        if self.state != ExportState::Idle {
            return Err(StageError::validation(
                "export pipeline instances are single-use",
            ));
        }
        self.state = ExportState::Started;
        tracing::info!(
            frames = self.total_frames,
            out = %self.out_path.display(),
            "starting video export"
        );

        match self.stream_frames(&mut producer) {
            Ok(()) => {
                self.state = ExportState::Finalizing;
                let exit = match self.transport.wait_finished() {
                    Ok(exit) => exit,
                    Err(e) => {
                        self.state = ExportState::Failed;
                        return Err(e);
                    }
                };
                if !exit.success {
                    self.state = ExportState::Failed;
                    tracing::warn!(code = ?exit.code, "encoder exited abnormally");
                    return Err(StageError::encoder_runtime(format!(
                        "encoder exited with {:?}: {}",
                        exit.code,
                        exit.detail.trim()
                    )));
                }
                self.state = ExportState::Closed;
                tracing::info!(frames = self.frame, "video export complete");
                Ok(ExportReport {
                    frames_written: self.frame,
                    out_path: self.out_path.clone(),
                })
            }
            Err(e) => {
                self.state = ExportState::Failed;
                // The subprocess still gets to exit, and its exit is
                // observed and logged before the job is declared dead.
                let _ = self.transport.close_input();
                match self.transport.wait_finished() {
                    Ok(exit) => {
                        tracing::warn!(code = ?exit.code, "encoder exit observed after failure")
                    }
                    Err(we) => tracing::warn!(error = %we, "could not observe encoder exit"),
                }
                Err(e)
            }
        }
    }

    fn stream_frames<F>(&mut self, producer: &mut F) -> StageResult<()>
    where
        F: FnMut(u64) -> StageResult<Vec<u8>>,
    {
        self.transport.wait_ready()?;
        self.state = ExportState::Streaming;

        while self.frame < self.total_frames {
            let buffer = producer(self.frame)?;
            match self.transport.push_frame(buffer)? {
                PushOutcome::Accepted => {}
                PushOutcome::Full => self.transport.wait_drained()?,
            }
            self.frame += 1;
        }

        // End-of-stream instead of another frame; with zero total frames
        // this happens immediately, without waiting on any frame callback.
        self.transport.close_input()
    }
}
