//! Position normalization for dispatch.
//!
//! Converts a detected pixel position into the configured output
//! convention: unit-interval fractions of the frame size, or raw pixel
//! floats. The `NOT_FOUND` sentinel is never scaled - dividing -1 by the
//! frame size would turn "no detection" into a small negative fraction a
//! listener could mistake for a real position.

use crate::{FrameSize, Position};

/// A position as sent to listeners. Always paired with the frame size at
/// the message-preparation boundary, so a listener can reconstruct pixel
/// coordinates if it wants them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPosition {
    pub x: f32,
    pub y: f32,
}

/// Convert `position` for dispatch.
///
/// Pixel mode and the sentinel pass through as plain float casts;
/// otherwise the result is `(x / width, y / height)` in `[0, 1]`.
pub fn normalize(
    position: Position,
    frame_size: FrameSize,
    pixel_coords: bool,
) -> NormalizedPosition {
    if pixel_coords || !position.is_found() {
        return NormalizedPosition {
            x: position.x as f32,
            y: position.y as f32,
        };
    }
    NormalizedPosition {
        x: position.x as f32 / frame_size.width as f32,
        y: position.y as f32 / frame_size.height as f32,
    }
}
