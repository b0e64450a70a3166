//! Tracking session orchestration.
//!
//! A session runs the frame-lockstep pipeline: crop, split, detect per
//! tracked channel, accumulate, normalize, dispatch. All fatal validation
//! happens in `new`, before the first frame is read; once running, the
//! only way out is source exhaustion (or a read failure), which ends the
//! session gracefully with the trajectories collected so far.
//!
//! The state machine is realized through ownership: `new` is Idle, `run`
//! consumes the session and is Running, and the returned `Trajectories`
//! is the terminal Stopped state.

use anyhow::Result;

use crate::config::TrackerConfig;
use crate::detect::detect;
use crate::dispatch::PositionSink;
use crate::frame::Roi;
use crate::ingest::FrameSource;
use crate::normalize::normalize;
use crate::trajectory::Trajectories;
use crate::{Channel, FrameSize, Position};

/// One tracking session over a connected frame source.
pub struct TrackerSession<S, K> {
    source: S,
    sink: K,
    channels: Vec<(Channel, u8)>,
    roi: Option<Roi>,
    pixel_coords: bool,
    frame_size: FrameSize,
}

impl<S: FrameSource, K: PositionSink> TrackerSession<S, K> {
    /// Validate the configuration against the connected source and build
    /// a session.
    ///
    /// Fails before any frame is read if the ROI does not fit the
    /// source's frames. The configuration itself must already have passed
    /// `TrackerConfig::validate`.
    pub fn new(config: &TrackerConfig, source: S, sink: K) -> Result<Self> {
        let source_size = source.frame_size();
        if let Some(roi) = &config.roi {
            roi.validate_within(source_size)?;
        }
        let frame_size = config.roi.map(|r| r.size()).unwrap_or(source_size);

        Ok(Self {
            source,
            sink,
            channels: config.tracked_channels(),
            roi: config.roi,
            pixel_coords: config.pixel_coords,
            frame_size,
        })
    }

    /// Frame size as seen by the detector (post-crop).
    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    /// Run the session to exhaustion and return the per-channel
    /// trajectories.
    pub fn run(mut self) -> Trajectories {
        let mut trajectories = Trajectories::new();
        let mut positions: Vec<(Channel, Position)> = Vec::with_capacity(self.channels.len());
        let mut frames = 0u64;

        loop {
            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log::warn!("TrackerSession: frame read failed, stopping: {:#}", err);
                    break;
                }
            };

            let frame = match &self.roi {
                Some(roi) => frame.crop(roi),
                None => frame,
            };
            let planes = frame.split();

            positions.clear();
            for &(channel, threshold) in &self.channels {
                let position = detect(planes.plane(channel), threshold);
                trajectories.record(channel, position);
                positions.push((channel, position));
            }

            for &(channel, position) in &positions {
                let sent = normalize(position, self.frame_size, self.pixel_coords);
                self.sink.send(channel, sent, self.frame_size);
            }

            frames += 1;
        }

        log::info!("TrackerSession: stopped after {} frames", frames);
        trajectories
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
