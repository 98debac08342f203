//! Frame sources
//!
//! A capture source owns the current frame and hands out named regions of
//! it. Regions are cropped lazily and cached until the next `capture()`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use image::imageops;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplitError};

/// Named screen areas the perception pipeline looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// Progress counter digits
    Progress,
    /// Life meter, used with `Progress` to detect fades
    Life,
    /// Area that goes black last during a fade-out
    FadeOut,
    /// Area that stays white longest during a fade-in
    FadeIn,
    /// Area compared against reset templates
    Reset,
    /// Area holding the camera sample points
    Camera,
    /// The whole frame
    Game,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Progress => "progress",
            Region::Life => "life",
            Region::FadeOut => "fade_out",
            Region::FadeIn => "fade_in",
            Region::Reset => "reset",
            Region::Camera => "camera",
            Region::Game => "game",
        };
        write!(f, "{}", name)
    }
}

/// Pixel rectangle within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Whether the rectangle lies entirely inside a `width` x `height` frame
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.x.checked_add(self.width).is_some_and(|right| right <= width)
            && self.y.checked_add(self.height).is_some_and(|bottom| bottom <= height)
    }
}

/// Backend producing game frames
pub trait CaptureSource {
    /// Grab the next frame; fails when the source is gone
    fn capture(&mut self) -> Result<()>;

    /// Pixels of a region of the current frame
    fn region(&mut self, region: Region) -> Result<&RgbImage>;

    /// Rectangle of a region, `None` if the region is not configured
    fn region_rect(&self, region: Region) -> Option<Rect>;

    /// Sequence number of the current frame
    fn frame_index(&self) -> u64;
}

/// Replays a directory of PNG frames in lexical order
pub struct FrameDirectoryCapture {
    frames: Vec<PathBuf>,
    regions: HashMap<Region, Rect>,
    position: usize,
    current: Option<RgbImage>,
    cache: HashMap<Region, RgbImage>,
}

impl FrameDirectoryCapture {
    pub fn open<P: AsRef<Path>>(dir: P, regions: HashMap<Region, Rect>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir)
            .map_err(|e| SplitError::Capture(format!("Cannot read frame directory {}: {}", dir.display(), e)))?;

        let mut frames = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(SplitError::Capture(format!("No PNG frames in {}", dir.display())));
        }
        log::info!("Replaying {} frames from {}", frames.len(), dir.display());

        Ok(Self {
            frames,
            regions,
            position: 0,
            current: None,
            cache: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn crop(&self, region: Region) -> Result<RgbImage> {
        let frame = self
            .current
            .as_ref()
            .ok_or_else(|| SplitError::Capture("No frame captured yet".to_string()))?;

        let rect = match region {
            Region::Game => Rect::new(0, 0, frame.width(), frame.height()),
            _ => self
                .regions
                .get(&region)
                .copied()
                .ok_or_else(|| SplitError::Capture(format!("Region '{}' is not configured", region)))?,
        };

        if !rect.fits(frame.width(), frame.height()) {
            return Err(SplitError::Capture(format!(
                "Region '{}' {:?} lies outside the {}x{} frame",
                region,
                rect,
                frame.width(),
                frame.height()
            )));
        }
        Ok(imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}

impl CaptureSource for FrameDirectoryCapture {
    fn capture(&mut self) -> Result<()> {
        let path = self
            .frames
            .get(self.position)
            .ok_or_else(|| SplitError::Capture("End of recorded frames".to_string()))?;

        let frame = image::open(path)
            .map_err(|e| SplitError::Capture(format!("Cannot decode frame {}: {}", path.display(), e)))?
            .to_rgb8();

        self.current = Some(frame);
        self.cache.clear();
        self.position += 1;
        Ok(())
    }

    fn region(&mut self, region: Region) -> Result<&RgbImage> {
        if !self.cache.contains_key(&region) {
            let image = self.crop(region)?;
            self.cache.insert(region, image);
        }
        self.cache
            .get(&region)
            .ok_or_else(|| SplitError::Capture(format!("Region '{}' unavailable", region)))
    }

    fn region_rect(&self, region: Region) -> Option<Rect> {
        match region {
            Region::Game => self
                .current
                .as_ref()
                .map(|frame| Rect::new(0, 0, frame.width(), frame.height())),
            _ => self.regions.get(&region).copied(),
        }
    }

    fn frame_index(&self) -> u64 {
        self.position.saturating_sub(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use tempfile::TempDir;

    fn write_frame(dir: &Path, name: &str, value: u8) {
        RgbImage::from_pixel(8, 6, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    fn regions() -> HashMap<Region, Rect> {
        HashMap::from([(Region::Progress, Rect::new(2, 2, 4, 2)), (Region::Reset, Rect::new(6, 4, 4, 4))])
    }

    #[test]
    fn test_rect_fits() {
        assert!(Rect::new(0, 0, 8, 6).fits(8, 6));
        assert!(!Rect::new(1, 0, 8, 6).fits(8, 6));
        assert!(!Rect::new(u32::MAX, 0, 2, 1).fits(8, 6));
    }

    #[test]
    fn test_replays_frames_in_order() {
        let temp = TempDir::new().unwrap();
        write_frame(temp.path(), "002.png", 200);
        write_frame(temp.path(), "001.png", 10);
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();

        let mut capture = FrameDirectoryCapture::open(temp.path(), regions()).unwrap();
        assert_eq!(capture.len(), 2);

        capture.capture().unwrap();
        assert_eq!(capture.frame_index(), 0);
        let progress = capture.region(Region::Progress).unwrap();
        assert_eq!(progress.dimensions(), (4, 2));
        assert_eq!(progress.get_pixel(0, 0), &Rgb([10, 10, 10]));

        capture.capture().unwrap();
        assert_eq!(capture.region(Region::Progress).unwrap().get_pixel(0, 0), &Rgb([200, 200, 200]));

        let err = capture.capture().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_region_outside_frame_is_capture_error() {
        let temp = TempDir::new().unwrap();
        write_frame(temp.path(), "001.png", 0);
        let mut capture = FrameDirectoryCapture::open(temp.path(), regions()).unwrap();
        capture.capture().unwrap();

        let err = capture.region(Region::Reset).unwrap_err();
        assert!(matches!(err, SplitError::Capture(_)));
        assert!(capture.region(Region::Camera).is_err());
        assert_eq!(capture.region(Region::Game).unwrap().dimensions(), (8, 6));
    }

    #[test]
    fn test_empty_directory_rejected() {
        let temp = TempDir::new().unwrap();
        assert!(FrameDirectoryCapture::open(temp.path(), regions()).is_err());
    }
}
