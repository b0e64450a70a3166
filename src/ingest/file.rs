//! Image-sequence frame source.
//!
//! Replays a directory of image files (sorted by file name) as a frame
//! stream: one frame per file, exhaustion at the end of the list. Every
//! image must decode to the dimensions of the first one, since a
//! session's frame size is fixed once established.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::Frame;
use crate::FrameSize;

/// Offline frame source backed by a directory of image files.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    frame_size: FrameSize,
}

impl ImageSequenceSource {
    /// List the image files under `dir` (sorted by name) and probe the
    /// first one for the stream's frame size.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let first = files
            .first()
            .ok_or_else(|| anyhow!("no image files in {}", dir.display()))?;
        let probe = decode_rgb(first)?;
        let frame_size = FrameSize::new(probe.width(), probe.height());

        log::info!(
            "ImageSequenceSource: {} frames in {} ({}x{})",
            files.len(),
            dir.display(),
            frame_size.width,
            frame_size.height
        );

        Ok(Self {
            files,
            next: 0,
            frame_size,
        })
    }

    /// Number of frames remaining.
    pub fn remaining(&self) -> usize {
        self.files.len() - self.next
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;

        let img = decode_rgb(path)?;
        if img.width() != self.frame_size.width || img.height() != self.frame_size.height {
            return Err(anyhow!(
                "frame {} is {}x{}, expected {}x{}",
                path.display(),
                img.width(),
                img.height(),
                self.frame_size.width,
                self.frame_size.height
            ));
        }

        let (width, height) = (img.width(), img.height());
        Frame::from_rgb24(img.into_raw(), width, height).map(Some)
    }
}

fn decode_rgb(path: &Path) -> Result<image::RgbImage> {
    let img = image::open(path).with_context(|| format!("decode image {}", path.display()))?;
    Ok(img.to_rgb8())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
