use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, channel, sync_channel};
use std::thread::JoinHandle;

use crate::export::pipeline::{EncoderExit, EncoderTransport, ExportOpts, PushOutcome};
use crate::foundation::core::SurfaceSize;
use crate::foundation::error::{StageError, StageResult};

/// Bounded frame queue between the export loop and the stdin writer thread.
/// Once it fills, backpressure reaches the render loop as `PushOutcome::Full`.
const FRAME_CHANNEL_CAPACITY: usize = 4;
/// Diagnostic lines kept for error reporting.
const DIAG_TAIL_LEN: usize = 8;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> StageResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn validate_size(size: SurfaceSize) -> StageResult<()> {
    if !size.width.is_multiple_of(2) || !size.height.is_multiple_of(2) {
        // yuv420p output requires even dimensions.
        return Err(StageError::config(
            "export width/height must be even (required for yuv420p mp4 output)",
        ));
    }
    Ok(())
}

/// Encoder invocation: sequential PNG image stream on stdin, H.264 yuv420p
/// MP4 out.
fn ffmpeg_args(opts: &ExportOpts) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    args.push(if opts.overwrite { "-y" } else { "-n" }.to_string());
    args.extend(
        [
            "-f",
            "image2pipe",
            "-vcodec",
            "png",
            "-r",
            &opts.fps.to_string(),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
            "-f",
            "mp4",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(opts.out_path.display().to_string());
    args
}

enum DiagEvent {
    Line(String),
    Eof,
}

/// [`EncoderTransport`] over a system `ffmpeg` subprocess.
///
/// stdin is fed by a dedicated writer thread behind a bounded channel, so OS
/// pipe backpressure propagates to the export loop without unbounded
/// queueing. stderr is the diagnostic stream: its first output is the
/// readiness signal, every line is logged, and the tail is attached to
/// runtime errors.
pub struct FfmpegTransport {
    child: Option<Child>,
    sender: Option<SyncSender<Vec<u8>>>,
    pending: Option<Vec<u8>>,
    writer: Option<JoinHandle<std::io::Result<()>>>,
    diag_rx: Receiver<DiagEvent>,
    diag_thread: Option<JoinHandle<()>>,
    diag_tail: VecDeque<String>,
    diag_eof: bool,
    ready: bool,
}

impl FfmpegTransport {
    /// Validate `opts` against `size` and spawn the encoder subprocess.
    pub fn spawn(opts: &ExportOpts, size: SurfaceSize) -> StageResult<Self> {
        opts.validate()?;
        validate_size(size)?;
        ensure_parent_dir(&opts.out_path)?;

        if !opts.overwrite && opts.out_path.exists() {
            return Err(StageError::validation(format!(
                "output file '{}' already exists",
                opts.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(StageError::spawn_encoder(
                "ffmpeg was not found on PATH, but is required for MP4 export",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.args(ffmpeg_args(opts))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| StageError::spawn_encoder(format!("failed to spawn ffmpeg: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StageError::spawn_encoder("failed to open ffmpeg stdin (unexpected)"))?;
        let stderr = child.stderr.take().ok_or_else(|| {
            StageError::spawn_encoder("failed to open ffmpeg stderr (unexpected)")
        })?;

        let (frame_tx, frame_rx) = sync_channel::<Vec<u8>>(FRAME_CHANNEL_CAPACITY);
        let writer = std::thread::spawn(move || -> std::io::Result<()> {
            while let Ok(frame) = frame_rx.recv() {
                stdin.write_all(&frame)?;
            }
            // Sender dropped: stdin drops here, signalling end-of-stream.
            Ok(())
        });

        let (diag_tx, diag_rx) = channel::<DiagEvent>();
        let diag_thread = std::thread::spawn(move || {
            let reader = BufReader::new(stderr);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                tracing::debug!(target: "stagecraft::encoder", "{line}");
                if diag_tx.send(DiagEvent::Line(line)).is_err() {
                    return;
                }
            }
            let _ = diag_tx.send(DiagEvent::Eof);
        });

        Ok(Self {
            child: Some(child),
            sender: Some(frame_tx),
            pending: None,
            writer: Some(writer),
            diag_rx,
            diag_thread: Some(diag_thread),
            diag_tail: VecDeque::new(),
            diag_eof: false,
            ready: false,
        })
    }

    fn push_tail(&mut self, line: String) {
        self.diag_tail.push_back(line);
        if self.diag_tail.len() > DIAG_TAIL_LEN {
            self.diag_tail.pop_front();
        }
    }

    /// The writer thread has hung up; join it to surface the write error.
    fn writer_error(&mut self) -> StageError {
        match self.writer.take().map(|h| h.join()) {
            Some(Ok(Err(e))) => {
                StageError::stream_write(format!("failed to write frame to encoder stdin: {e}"))
            }
            Some(Err(_)) => StageError::stream_write("encoder writer thread panicked"),
            _ => StageError::stream_write("encoder input stream closed unexpectedly"),
        }
    }
}

impl EncoderTransport for FfmpegTransport {
    fn wait_ready(&mut self) -> StageResult<()> {
        if self.ready {
            return Ok(());
        }
        // First diagnostic output means the subprocess is up and listening.
        // Immediate EOF also unblocks; the exit classification happens in
        // wait_finished.
        match self.diag_rx.recv() {
            Ok(DiagEvent::Line(line)) => self.push_tail(line),
            Ok(DiagEvent::Eof) => self.diag_eof = true,
            Err(_) => {
                return Err(StageError::encoder_runtime(
                    "encoder diagnostic stream closed before readiness",
                ));
            }
        }
        self.ready = true;
        Ok(())
    }

    fn push_frame(&mut self, frame: Vec<u8>) -> StageResult<PushOutcome> {
        if self.pending.is_some() {
            return Err(StageError::stream_write(
                "frame pushed while a previous frame awaits drain",
            ));
        }
        let Some(sender) = self.sender.as_ref() else {
            return Err(StageError::stream_write("frame pushed after close"));
        };
        match sender.try_send(frame) {
            Ok(()) => Ok(PushOutcome::Accepted),
            Err(TrySendError::Full(frame)) => {
                self.pending = Some(frame);
                Ok(PushOutcome::Full)
            }
            Err(TrySendError::Disconnected(_)) => Err(self.writer_error()),
        }
    }

    fn wait_drained(&mut self) -> StageResult<()> {
        let Some(frame) = self.pending.take() else {
            return Ok(());
        };
        let Some(sender) = self.sender.as_ref() else {
            return Err(StageError::stream_write("drain requested after close"));
        };
        sender.send(frame).map_err(|_| self.writer_error())
    }

    fn close_input(&mut self) -> StageResult<()> {
        if self.pending.is_some() {
            return Err(StageError::stream_write(
                "input closed with a frame still awaiting drain",
            ));
        }
        // Dropping the sender lets the writer drain the queue, then drop
        // stdin, which is the encoder's end-of-stream signal.
        self.sender.take();
        Ok(())
    }

    fn wait_finished(&mut self) -> StageResult<EncoderExit> {
        self.sender.take();

        let write_result = match self.writer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| StageError::stream_write("encoder writer thread panicked"))?,
            None => Ok(()),
        };

        let mut child = self
            .child
            .take()
            .ok_or_else(|| StageError::validation("encoder transport already finished"))?;
        let status = child
            .wait()
            .map_err(|e| StageError::encoder_runtime(format!("failed to wait for ffmpeg: {e}")))?;

        while !self.diag_eof {
            match self.diag_rx.recv() {
                Ok(DiagEvent::Line(line)) => self.push_tail(line),
                Ok(DiagEvent::Eof) | Err(_) => self.diag_eof = true,
            }
        }
        if let Some(handle) = self.diag_thread.take() {
            let _ = handle.join();
        }

        let mut detail: String = self
            .diag_tail
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        if let Err(e) = &write_result {
            if !detail.is_empty() {
                detail.push('\n');
            }
            detail.push_str(&format!("frame write: {e}"));
        }

        let success = status.success() && write_result.is_ok();
        if success {
            tracing::info!(code = ?status.code(), "encoder exited");
        } else {
            tracing::warn!(code = ?status.code(), "encoder exited abnormally");
        }

        Ok(EncoderExit {
            success,
            code: status.code(),
            detail,
        })
    }
}

impl Drop for FfmpegTransport {
    fn drop(&mut self) {
        // A dropped transport must not orphan the subprocess: close its
        // input and observe the exit.
        self.sender.take();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
        if let Some(handle) = self.diag_thread.take() {
            let _ = handle.join();
        }
    }
}
