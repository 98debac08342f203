//! Camera-event detection
//!
//! The alternate camera view is recognised by a handful of sample points
//! that take known colours only while that view is on screen.

use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::pixels::colour_matches;
use crate::state::GameState;

/// A pixel position and the colour it shows during a camera event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub x: u32,
    pub y: u32,
    pub rgb: [u8; 3],
}

#[derive(Debug, Clone)]
pub struct CameraDetector {
    points: Vec<SamplePoint>,
    tolerance: u8,
}

impl CameraDetector {
    pub fn new(points: Vec<SamplePoint>, tolerance: u8) -> Self {
        Self { points, tolerance }
    }

    pub fn is_enabled(&self) -> bool {
        !self.points.is_empty()
    }

    /// Whether every sample point matches; points outside the region never match
    pub fn in_camera(&self, region: &RgbImage) -> bool {
        self.is_enabled()
            && self.points.iter().all(|p| {
                region
                    .get_pixel_checked(p.x, p.y)
                    .is_some_and(|pixel| colour_matches(pixel, p.rgb, self.tolerance))
            })
    }

    /// Update the camera flag, counting and stamping entry edges.
    ///
    /// Returns true on the frame the camera view appears.
    pub fn update(&self, region: &RgbImage, state: &mut GameState, now: Instant) -> bool {
        let in_camera = self.in_camera(region);
        let entered = in_camera && !state.in_camera;
        state.in_camera = in_camera;

        if entered {
            state.last_camera_at = Some(now);
            if state.counting_enabled {
                state.camera_count += 1;
            }
            log::debug!("Camera event (count {})", state.camera_count);
        }
        entered
    }
}
