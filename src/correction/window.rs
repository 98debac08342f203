//! Rolling window of admitted classifier samples

use std::collections::VecDeque;

use crate::state::Prediction;

#[derive(Debug, Clone)]
pub struct PredictionWindow {
    samples: VecDeque<Prediction>,
    capacity: usize,
}

impl PredictionWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, dropping the oldest once full
    pub fn push(&mut self, sample: Prediction) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The two most recent samples, oldest first
    pub fn last_two(&self) -> Vec<Prediction> {
        self.samples.iter().skip(self.samples.len().saturating_sub(2)).copied().collect()
    }

    /// Number of samples of `class`
    pub fn count(&self, class: u32) -> usize {
        self.samples.iter().filter(|s| s.class == class).count()
    }

    /// Mean confidence over samples of `class`
    pub fn mean_confidence(&self, class: u32) -> Option<f64> {
        let confidences: Vec<f64> = self
            .samples
            .iter()
            .filter(|s| s.class == class)
            .map(|s| s.confidence)
            .collect();
        if confidences.is_empty() {
            return None;
        }
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prediction> {
        self.samples.iter()
    }
}
