//! Perception pipeline
//!
//! Extracts regions from the current frame and classifies them: fade status
//! and camera events from colour predicates, reset screens from template
//! matching, and progress from the external model.

mod camera;
mod capture;
mod fade;
mod model;
pub mod pixels;

use std::path::Path;
use std::time::{Duration, Instant};

use image::RgbImage;
use image::imageops::{self, FilterType};

pub use camera::{CameraDetector, SamplePoint};
pub use capture::{CaptureSource, FrameDirectoryCapture, Rect, Region};
pub use fade::{FadeDetector, FadeFrame};
pub use model::{FrameInput, ProgressModel, RecordedPredictions};

use crate::error::Result;
use crate::state::{GameState, Prediction};

/// Colour thresholds used by the region predicates
#[derive(Debug, Clone)]
pub struct PerceptionConfig {
    pub black: f64,
    pub black_proportion: f64,
    pub white: f64,
    pub white_proportion: f64,
    /// Maximum normalised difference for a reset template match
    pub reset_match: f64,
    pub fade_min_dwell: Duration,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            black: 0.1,
            black_proportion: 0.9,
            white: 0.8,
            white_proportion: 0.99,
            reset_match: 0.02,
            fade_min_dwell: Duration::from_millis(100),
        }
    }
}

pub struct Perception {
    config: PerceptionConfig,
    fade: FadeDetector,
    camera: CameraDetector,
    reset_templates: Vec<RgbImage>,
}

impl Perception {
    pub fn new(config: PerceptionConfig, camera: CameraDetector) -> Self {
        let fade = FadeDetector::new(config.fade_min_dwell);
        Self {
            config,
            fade,
            camera,
            reset_templates: Vec::new(),
        }
    }

    /// Images of the reset screen to look for in the reset region
    pub fn with_reset_templates(mut self, templates: Vec<RgbImage>) -> Self {
        self.reset_templates = templates;
        self
    }

    /// Load reset templates from image files
    pub fn load_reset_templates<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RgbImage>> {
        paths
            .iter()
            .map(|path| -> Result<RgbImage> { Ok(image::open(path.as_ref())?.to_rgb8()) })
            .collect()
    }

    /// Analyse the current frame and publish fade, camera and reset state.
    ///
    /// Returns the classifier reading, if predictions are enabled and the
    /// model produced one. Model failures are logged and dropped; capture
    /// failures propagate.
    pub fn analyze(
        &mut self,
        capture: &mut dyn CaptureSource,
        model: &mut dyn ProgressModel,
        state: &mut GameState,
        now: Instant,
    ) -> Result<Option<Prediction>> {
        let frame = self.fade_frame(capture)?;
        self.fade.update(frame, state, now);

        if self.camera.is_enabled() && capture.region_rect(Region::Camera).is_some() {
            let region = capture.region(Region::Camera)?;
            self.camera.update(region, state, now);
        }

        state.reset_detected = self.reset_visible(capture)?;

        state.last_sample = None;
        if !state.predictions_enabled {
            return Ok(None);
        }

        let index = capture.frame_index();
        let image = capture.region(Region::Progress)?;
        match model.predict(FrameInput { index, image }) {
            Ok(prediction) => Ok(Some(prediction)),
            Err(e) => {
                log::warn!("Dropping sample for frame {}: {}", index, e);
                Ok(None)
            }
        }
    }

    fn fade_frame(&self, capture: &mut dyn CaptureSource) -> Result<FadeFrame> {
        let c = &self.config;
        let black = |image: &RgbImage| pixels::is_black(image, c.black, c.black_proportion);
        let white = |image: &RgbImage| pixels::is_white(image, c.white, c.white_proportion);

        let progress_black = black(capture.region(Region::Progress)?);
        let progress_white = white(capture.region(Region::Progress)?);
        let life_black = black(capture.region(Region::Life)?);
        let life_white = white(capture.region(Region::Life)?);

        let out_primary = progress_black && life_black;
        let in_primary = progress_white && life_white;

        let out_secondary = out_primary && black(capture.region(Region::FadeOut)?);
        let in_secondary = in_primary && !white(capture.region(Region::FadeIn)?);

        Ok(FadeFrame {
            out_primary,
            out_secondary,
            in_primary,
            in_secondary,
        })
    }

    fn reset_visible(&mut self, capture: &mut dyn CaptureSource) -> Result<bool> {
        if self.reset_templates.is_empty() || capture.region_rect(Region::Reset).is_none() {
            return Ok(false);
        }
        let region = capture.region(Region::Reset)?;
        self.fit_reset_templates(region.dimensions());
        Ok(self.reset_templates.iter().any(|template| {
            pixels::normalized_difference(region, template).is_some_and(|d| d < self.config.reset_match)
        }))
    }

    /// Scale reset templates to the reset region; a no-op once they match
    fn fit_reset_templates(&mut self, (width, height): (u32, u32)) {
        if width == 0 || height == 0 {
            return;
        }
        for template in &mut self.reset_templates {
            if template.dimensions() != (width, height) {
                log::debug!(
                    "Resizing reset template from {:?} to {}x{}",
                    template.dimensions(),
                    width,
                    height
                );
                *template = imageops::resize(&*template, width, height, FilterType::Triangle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SplitError;
    use crate::state::FadeStatus;
    use image::Rgb;
    use std::collections::HashMap;

    /// Capture source whose every region is one flat colour per frame
    struct FlatCapture {
        values: HashMap<Region, u8>,
        index: u64,
        cache: HashMap<Region, RgbImage>,
    }

    impl FlatCapture {
        fn new(value: u8) -> Self {
            let values = [Region::Progress, Region::Life, Region::FadeOut, Region::FadeIn, Region::Reset]
                .into_iter()
                .map(|r| (r, value))
                .collect();
            Self {
                values,
                index: 0,
                cache: HashMap::new(),
            }
        }
    }

    impl CaptureSource for FlatCapture {
        fn capture(&mut self) -> Result<()> {
            self.index += 1;
            self.cache.clear();
            Ok(())
        }

        fn region(&mut self, region: Region) -> Result<&RgbImage> {
            let value = *self
                .values
                .get(&region)
                .ok_or_else(|| SplitError::Capture(format!("no {}", region)))?;
            Ok(&*self
                .cache
                .entry(region)
                .or_insert_with(|| RgbImage::from_pixel(4, 4, Rgb([value, value, value]))))
        }

        fn region_rect(&self, region: Region) -> Option<Rect> {
            self.values.get(&region).map(|_| Rect::new(0, 0, 4, 4))
        }

        fn frame_index(&self) -> u64 {
            self.index
        }
    }

    struct FailingModel;

    impl ProgressModel for FailingModel {
        fn predict(&mut self, _input: FrameInput<'_>) -> Result<Prediction> {
            Err(SplitError::Model("malformed".to_string()))
        }
    }

    struct FixedModel(Prediction);

    impl ProgressModel for FixedModel {
        fn predict(&mut self, _input: FrameInput<'_>) -> Result<Prediction> {
            Ok(self.0)
        }
    }

    fn perception() -> Perception {
        Perception::new(
            PerceptionConfig {
                fade_min_dwell: Duration::ZERO,
                ..PerceptionConfig::default()
            },
            CameraDetector::new(Vec::new(), 25),
        )
    }

    #[test]
    fn test_black_frame_starts_fade_out() {
        let mut perception = perception();
        let mut capture = FlatCapture::new(0);
        let mut state = GameState::new(0, 8, 10.0);
        let mut model = FixedModel(Prediction::new(0, 0.9));

        let sample = perception
            .analyze(&mut capture, &mut model, &mut state, Instant::now())
            .unwrap();
        assert_eq!(state.fade_status, FadeStatus::FadeOutPartial);
        assert_eq!(sample, Some(Prediction::new(0, 0.9)));
    }

    #[test]
    fn test_model_failure_drops_sample_but_fades_still_run() {
        let mut perception = perception();
        let mut capture = FlatCapture::new(255);
        let mut state = GameState::new(0, 8, 10.0);

        let sample = perception
            .analyze(&mut capture, &mut FailingModel, &mut state, Instant::now())
            .unwrap();
        assert_eq!(sample, None);
        assert_eq!(state.fade_status, FadeStatus::FadeInPartial);
    }

    #[test]
    fn test_predictions_disabled_skips_model() {
        let mut perception = perception();
        let mut capture = FlatCapture::new(128);
        let mut state = GameState::new(0, 8, 10.0);
        state.predictions_enabled = false;

        let sample = perception
            .analyze(&mut capture, &mut FixedModel(Prediction::new(3, 1.0)), &mut state, Instant::now())
            .unwrap();
        assert_eq!(sample, None);
        assert_eq!(state.fade_status, FadeStatus::NoFade);
    }

    #[test]
    fn test_missing_region_is_capture_error() {
        let mut perception = perception();
        let mut capture = FlatCapture::new(0);
        capture.values.remove(&Region::Life);
        let mut state = GameState::new(0, 8, 10.0);

        let err = perception
            .analyze(&mut capture, &mut FailingModel, &mut state, Instant::now())
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_reset_template_match() {
        let mut perception = perception().with_reset_templates(vec![RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]))]);
        let mut capture = FlatCapture::new(130);
        let mut state = GameState::new(0, 8, 10.0);

        perception
            .analyze(&mut capture, &mut FailingModel, &mut state, Instant::now())
            .unwrap();
        assert!(state.reset_detected);
    }

    #[test]
    fn test_reset_template_scaled_to_region() {
        let mut perception = perception().with_reset_templates(vec![RgbImage::from_pixel(8, 8, Rgb([128, 128, 128]))]);
        let mut capture = FlatCapture::new(130);
        let mut state = GameState::new(0, 8, 10.0);

        for _ in 0..2 {
            capture.capture().unwrap();
            perception
                .analyze(&mut capture, &mut FailingModel, &mut state, Instant::now())
                .unwrap();
            assert!(state.reset_detected);
        }
        assert_eq!(perception.reset_templates[0].dimensions(), (4, 4));
    }
}
