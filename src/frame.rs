//! Frame container and geometry.
//!
//! - `Frame`: interleaved RGB24 pixels plus dimensions.
//! - `Roi`: crop rectangle, validated once at session start.
//! - `Plane`: one scalar intensity per pixel, produced by the channel
//!   split.
//!
//! Cropping and splitting are pure: they copy out of the source frame and
//! never alias its buffer, so each loop iteration exclusively owns the
//! frame it read.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::{Channel, FrameSize};

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Interleaved RGB24 frame (3 bytes per pixel, row-major).
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    /// Wrap an interleaved RGB24 buffer.
    ///
    /// Fails if the buffer length does not match the dimensions.
    pub fn from_rgb24(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Build a frame by evaluating `pixel(x, y) -> [r, g, b]` at every
    /// coordinate. Used by the synthetic camera and by tests.
    pub fn from_fn(width: u32, height: u32, pixel: impl Fn(u32, u32) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&pixel(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// Intensity of one channel at (x, y).
    pub fn sample(&self, channel: Channel, x: u32, y: u32) -> u8 {
        let idx = ((y * self.width + x) as usize) * 3 + channel.index();
        self.data[idx]
    }

    /// Copy out the `[top..bottom, left..right]` sub-rectangle.
    ///
    /// The ROI must already have been validated against this frame's
    /// dimensions (`Roi::validate_within`); the session does that once at
    /// start, not per frame.
    pub fn crop(&self, roi: &Roi) -> Frame {
        let width = roi.right - roi.left;
        let height = roi.bottom - roi.top;
        let row_bytes = (width as usize) * 3;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for y in roi.top..roi.bottom {
            let start = ((y * self.width + roi.left) as usize) * 3;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Frame {
            data,
            width,
            height,
        }
    }

    /// Split into the three single-channel intensity planes.
    pub fn split(&self) -> ColorPlanes {
        let pixels = (self.width as usize) * (self.height as usize);
        let mut red = Vec::with_capacity(pixels);
        let mut green = Vec::with_capacity(pixels);
        let mut blue = Vec::with_capacity(pixels);
        for px in self.data.chunks_exact(3) {
            red.push(px[0]);
            green.push(px[1]);
            blue.push(px[2]);
        }
        ColorPlanes {
            planes: [
                Plane::from_raw(red, self.width, self.height),
                Plane::from_raw(green, self.width, self.height),
                Plane::from_raw(blue, self.width, self.height),
            ],
        }
    }
}

// ----------------------------------------------------------------------------
// Plane
// ----------------------------------------------------------------------------

/// Single-channel intensity plane.
#[derive(Clone, Debug)]
pub struct Plane {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Plane {
    /// Wrap a row-major intensity buffer.
    ///
    /// Fails if the buffer length does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize) * (height as usize);
        if data.len() != expected {
            return Err(anyhow!(
                "plane length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self::from_raw(data, width, height))
    }

    fn from_raw(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn intensity(&self, x: u32, y: u32) -> u8 {
        self.data[(y * self.width + x) as usize]
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }
}

/// The three planes of a split frame, keyed by `Channel`.
#[derive(Clone, Debug)]
pub struct ColorPlanes {
    planes: [Plane; 3],
}

impl ColorPlanes {
    pub fn plane(&self, channel: Channel) -> &Plane {
        &self.planes[channel.index()]
    }
}

// ----------------------------------------------------------------------------
// Roi
// ----------------------------------------------------------------------------

/// Crop rectangle in pixel coordinates, `[top..bottom) x [left..right)`.
///
/// Immutable once configured. The shape invariant (`top < bottom`,
/// `left < right`) is checked at configuration time; the bounds check
/// against the source frame size runs once at session start.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Roi {
    pub top: u32,
    pub left: u32,
    pub bottom: u32,
    pub right: u32,
}

impl Roi {
    pub fn new(top: u32, left: u32, bottom: u32, right: u32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    /// Dimensions of the cropped region.
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.right - self.left, self.bottom - self.top)
    }

    /// Shape check, independent of any frame.
    pub fn validate_shape(&self) -> Result<()> {
        if self.top >= self.bottom || self.left >= self.right {
            return Err(anyhow!(
                "ROI must satisfy top < bottom and left < right, got (top={}, left={}, bottom={}, right={})",
                self.top,
                self.left,
                self.bottom,
                self.right
            ));
        }
        Ok(())
    }

    /// Bounds check against the source frame size. Run once at session
    /// start; cropping assumes it passed.
    pub fn validate_within(&self, size: FrameSize) -> Result<()> {
        self.validate_shape()?;
        if self.bottom > size.height || self.right > size.width {
            return Err(anyhow!(
                "ROI (top={}, left={}, bottom={}, right={}) exceeds frame bounds {}x{}",
                self.top,
                self.left,
                self.bottom,
                self.right,
                size.width,
                size.height
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        // Every pixel gets a distinct (r, g, b) derived from its coordinates.
        Frame::from_fn(width, height, |x, y| {
            [(y * width + x) as u8, x as u8, y as u8]
        })
    }

    #[test]
    fn from_rgb24_rejects_length_mismatch() {
        assert!(Frame::from_rgb24(vec![0u8; 11], 2, 2).is_err());
        assert!(Frame::from_rgb24(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn crop_yields_matching_slice() {
        let frame = gradient_frame(8, 6);
        let roi = Roi::new(1, 2, 4, 7);
        roi.validate_within(frame.size()).unwrap();

        let cropped = frame.crop(&roi);
        assert_eq!(cropped.width(), 5);
        assert_eq!(cropped.height(), 3);

        for y in 0..cropped.height() {
            for x in 0..cropped.width() {
                for channel in Channel::ALL {
                    assert_eq!(
                        cropped.sample(channel, x, y),
                        frame.sample(channel, x + roi.left, y + roi.top),
                        "mismatch at ({}, {})",
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn split_separates_channels() {
        let frame = gradient_frame(4, 3);
        let planes = frame.split();

        for y in 0..3 {
            for x in 0..4 {
                for channel in Channel::ALL {
                    assert_eq!(
                        planes.plane(channel).intensity(x, y),
                        frame.sample(channel, x, y)
                    );
                }
            }
        }
    }

    #[test]
    fn split_planes_keep_frame_dimensions() {
        let frame = gradient_frame(7, 5);
        let planes = frame.split();
        for channel in Channel::ALL {
            assert_eq!(planes.plane(channel).width(), 7);
            assert_eq!(planes.plane(channel).height(), 5);
        }
    }

    #[test]
    fn roi_shape_validation() {
        assert!(Roi::new(0, 0, 10, 10).validate_shape().is_ok());
        assert!(Roi::new(10, 0, 10, 10).validate_shape().is_err());
        assert!(Roi::new(0, 10, 10, 10).validate_shape().is_err());
        assert!(Roi::new(5, 0, 4, 10).validate_shape().is_err());
    }

    #[test]
    fn roi_bounds_validation() {
        let size = FrameSize::new(100, 100);
        assert!(Roi::new(20, 20, 30, 30).validate_within(size).is_ok());
        assert!(Roi::new(0, 0, 100, 100).validate_within(size).is_ok());
        assert!(Roi::new(0, 0, 101, 100).validate_within(size).is_err());
        assert!(Roi::new(0, 0, 100, 101).validate_within(size).is_err());
    }

    #[test]
    fn roi_size_matches_crop() {
        let roi = Roi::new(20, 20, 30, 30);
        assert_eq!(roi.size(), FrameSize::new(10, 10));
    }
}
