//! Frame-exact video export: the pipeline state machine and the ffmpeg
//! subprocess transport it drives.

pub mod ffmpeg;
pub mod pipeline;
