//! Camera frame source.
//!
//! `stub://` device paths select a synthetic backend that renders one
//! moving bright square per channel (deterministic in the frame index),
//! available without any feature flag - tests and dry runs use it. Real
//! device paths require the `ingest-v4l2` feature and capture RGB24
//! frames via libv4l.
//!
//! The device handle lives inside the source and is released when the
//! source is dropped, on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(not(feature = "ingest-v4l2"))]
use anyhow::anyhow;
use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;
use crate::{Channel, FrameSize};

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0"); `stub://` selects the synthetic
    /// backend.
    pub device: String,
    /// Target frame rate (frames per second).
    pub frame_rate: u32,
    /// Preferred capture resolution; the device may pick the closest
    /// match it supports.
    pub resolution: Option<(u32, u32)>,
    /// Stop after this many frames (synthetic backend only; real devices
    /// run until stopped).
    pub frame_budget: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            frame_rate: 60,
            resolution: None,
            frame_budget: None,
        }
    }
}

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
    stop: Arc<AtomicBool>,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    /// Open the configured device.
    pub fn open(config: CameraConfig) -> Result<Self> {
        let backend = if config.device.starts_with("stub://") {
            CameraBackend::Synthetic(SyntheticCamera::new(config))
        } else {
            #[cfg(feature = "ingest-v4l2")]
            {
                CameraBackend::Device(DeviceCamera::open(&config)?)
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(anyhow!(
                    "device {} needs the ingest-v4l2 feature (stub:// works without it)",
                    config.device
                ));
            }
        };
        Ok(Self {
            backend,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle that makes the source report exhaustion on the next read.
    ///
    /// This is the early-stop path: a signal handler flips the flag and
    /// the session observes a normal end of stream instead of being
    /// interrupted mid-frame.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }
}

impl FrameSource for CameraSource {
    fn frame_size(&self) -> FrameSize {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.frame_size(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.frame_size(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and dry runs
// ----------------------------------------------------------------------------

const SYNTHETIC_DEFAULT_SIZE: (u32, u32) = (640, 480);
const SQUARE_SIZE: u32 = 10;

struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_budget: Option<u64>,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        let (width, height) = config.resolution.unwrap_or(SYNTHETIC_DEFAULT_SIZE);
        log::info!(
            "CameraSource: connected to {} ({}x{}, synthetic)",
            config.device,
            width,
            height
        );
        Self {
            width,
            height,
            frame_budget: config.frame_budget,
            frame_count: 0,
        }
    }

    fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(budget) = self.frame_budget {
            if self.frame_count >= budget {
                return Ok(None);
            }
        }
        let frame = self.render();
        self.frame_count += 1;
        Ok(Some(frame))
    }

    /// Top-left corner of one channel's square for the current frame.
    /// Purely a function of (dimensions, channel, frame_count).
    fn square_origin(&self, channel: Channel) -> (u32, u32) {
        let span_x = self.width.saturating_sub(SQUARE_SIZE).max(1) as u64;
        let span_y = self.height.saturating_sub(SQUARE_SIZE).max(1) as u64;
        let seed = channel.index() as u64;
        let x = (seed * 17 + self.frame_count * 3) % span_x;
        let y = (seed * 29 + self.frame_count * 2) % span_y;
        (x as u32, y as u32)
    }

    /// One bright square per channel on a black background, drifting with
    /// the frame index.
    fn render(&self) -> Frame {
        let origins: Vec<(Channel, (u32, u32))> = Channel::ALL
            .iter()
            .map(|&c| (c, self.square_origin(c)))
            .collect();

        Frame::from_fn(self.width, self.height, |x, y| {
            let mut px = [0u8; 3];
            for &(channel, (ox, oy)) in &origins {
                if x >= ox && x < ox + SQUARE_SIZE && y >= oy && y < oy + SQUARE_SIZE {
                    px[channel.index()] = 255;
                }
            }
            px
        })
    }
}

// ----------------------------------------------------------------------------
// Production V4L2 camera
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
use device::DeviceCamera;

#[cfg(feature = "ingest-v4l2")]
mod device {
    use anyhow::{anyhow, Context, Result};
    use ouroboros::self_referencing;

    use super::CameraConfig;
    use crate::frame::Frame;
    use crate::FrameSize;

    pub(super) struct DeviceCamera {
        state: DeviceCameraState,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct DeviceCameraState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl DeviceCamera {
        pub(super) fn open(config: &CameraConfig) -> Result<Self> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let mut device = v4l::Device::with_path(&config.device)
                .with_context(|| format!("open v4l2 device {}", config.device))?;
            let mut format = device.format().context("read v4l2 format")?;
            if let Some((width, height)) = config.resolution {
                format.width = width;
                format.height = height;
            }
            format.fourcc = v4l::FourCC::new(b"RGB3");

            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!(
                        "CameraSource: failed to set format on {}: {}",
                        config.device,
                        err
                    );
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };

            if config.frame_rate > 0 {
                let params = v4l::video::capture::Parameters::with_fps(config.frame_rate);
                if let Err(err) = device.set_params(&params) {
                    log::warn!(
                        "CameraSource: failed to set fps on {}: {}",
                        config.device,
                        err
                    );
                }
            }

            let state = DeviceCameraStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;

            log::info!(
                "CameraSource: connected to {} ({}x{})",
                config.device,
                format.width,
                format.height
            );

            Ok(Self {
                state,
                active_width: format.width,
                active_height: format.height,
            })
        }

        pub(super) fn frame_size(&self) -> FrameSize {
            FrameSize::new(self.active_width, self.active_height)
        }

        pub(super) fn next_frame(&mut self) -> Result<Option<Frame>> {
            use v4l::io::traits::CaptureStream;

            let expected =
                (self.active_width as usize) * (self.active_height as usize) * 3;
            let (buf, _meta) = self
                .state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            let data = buf
                .get(..expected)
                .ok_or_else(|| {
                    anyhow!("short v4l2 frame: got {} bytes, need {}", buf.len(), expected)
                })?
                .to_vec();

            Frame::from_rgb24(data, self.active_width, self.active_height).map(Some)
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            frame_rate: 60,
            resolution: Some((64, 48)),
            frame_budget: Some(3),
        }
    }

    #[test]
    fn synthetic_camera_produces_sized_frames() {
        let mut source = CameraSource::open(stub_config()).unwrap();
        assert_eq!(source.frame_size(), FrameSize::new(64, 48));

        let frame = source.next_frame().unwrap().expect("first frame");
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
    }

    #[test]
    fn synthetic_camera_respects_frame_budget() {
        let mut source = CameraSource::open(stub_config()).unwrap();
        for _ in 0..3 {
            assert!(source.next_frame().unwrap().is_some());
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn synthetic_camera_is_deterministic() {
        let mut a = CameraSource::open(stub_config()).unwrap();
        let mut b = CameraSource::open(stub_config()).unwrap();

        for _ in 0..3 {
            let fa = a.next_frame().unwrap().unwrap();
            let fb = b.next_frame().unwrap().unwrap();
            for y in 0..fa.height() {
                for x in 0..fa.width() {
                    for channel in Channel::ALL {
                        assert_eq!(fa.sample(channel, x, y), fb.sample(channel, x, y));
                    }
                }
            }
        }
    }

    #[test]
    fn synthetic_frames_have_one_square_per_channel() {
        let mut source = CameraSource::open(stub_config()).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        let planes = frame.split();

        for channel in Channel::ALL {
            let plane = planes.plane(channel);
            let bright = (0..frame.height())
                .flat_map(|y| (0..frame.width()).map(move |x| (x, y)))
                .filter(|&(x, y)| plane.intensity(x, y) > 128)
                .count();
            assert_eq!(bright as u32, SQUARE_SIZE * SQUARE_SIZE);
        }
    }

    #[test]
    fn stop_flag_ends_the_stream() {
        let mut source = CameraSource::open(stub_config()).unwrap();
        assert!(source.next_frame().unwrap().is_some());

        source.stop_flag().store(true, Ordering::Relaxed);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_devices_need_the_feature() {
        let config = CameraConfig {
            device: "/dev/video0".to_string(),
            ..CameraConfig::default()
        };
        assert!(CameraSource::open(config).is_err());
    }
}
