//! Frame ingestion sources.
//!
//! This module provides the sources a session can read frames from:
//! - `CameraSource`: local V4L2 devices (feature `ingest-v4l2`), with a
//!   synthetic `stub://` backend for tests and dry runs
//! - `ImageSequenceSource`: offline replay of a directory of image files
//!
//! A source owns its device handle and releases it when dropped, on every
//! exit path. `next_frame` is the session's only blocking point;
//! `Ok(None)` signals exhaustion and `Err` a read failure - the session
//! treats both as the end of the stream. Every frame a source hands out
//! is an owned buffer: nothing is aliased across reads.

pub mod camera;
pub mod file;

pub use camera::{CameraConfig, CameraSource};
pub use file::ImageSequenceSource;

use anyhow::Result;

use crate::frame::Frame;
use crate::FrameSize;

/// A connected stream of frames with stable dimensions.
pub trait FrameSource {
    /// Dimensions of every frame this source will produce, known once the
    /// source is connected and constant for the session.
    fn frame_size(&self) -> FrameSize;

    /// Read the next frame. `Ok(None)` means the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
