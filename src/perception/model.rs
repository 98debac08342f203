//! Progress classifier interface

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use image::RgbImage;

use crate::error::{Result, SplitError};
use crate::state::Prediction;

/// Input handed to the classifier for one frame
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub index: u64,
    pub image: &'a RgbImage,
}

/// Opaque classifier mapping the progress region to a class and confidence
pub trait ProgressModel {
    /// Classify one frame. An error means "no sample this frame".
    fn predict(&mut self, input: FrameInput<'_>) -> Result<Prediction>;
}

/// Classifier replay from a YAML map of frame index to prediction.
///
/// Frames without an entry repeat the closest earlier entry.
#[derive(Debug, Clone, Default)]
pub struct RecordedPredictions {
    predictions: BTreeMap<u64, Prediction>,
}

impl RecordedPredictions {
    pub fn new(predictions: BTreeMap<u64, Prediction>) -> Self {
        Self { predictions }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let predictions: BTreeMap<u64, Prediction> = serde_yaml::from_str(&content)?;
        log::info!("Loaded {} recorded predictions from {}", predictions.len(), path.display());
        Ok(Self::new(predictions))
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

impl ProgressModel for RecordedPredictions {
    fn predict(&mut self, input: FrameInput<'_>) -> Result<Prediction> {
        self.predictions
            .range(..=input.index)
            .next_back()
            .map(|(_, prediction)| *prediction)
            .ok_or_else(|| SplitError::Model(format!("No recorded prediction at or before frame {}", input.index)))
    }
}
