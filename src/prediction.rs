// Bytes-to-species pipeline shared by the HTTP server and the CLI
use candle::{Device, D};
use serde::Serialize;

use crate::config::ModelConfig;
use crate::error::{PredictionError, StartupError};
use crate::labels::ClassLabels;
use crate::models::ClassifierModel;
use crate::preprocess::ImagePreprocessor;

/// One classified image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    /// Softmax probability scaled to a percentage in [0, 100]
    pub confidence: f64,
}

pub struct PredictionService {
    preprocessor: ImagePreprocessor,
    model: ClassifierModel,
    labels: ClassLabels,
}

impl PredictionService {
    pub fn new(
        preprocessor: ImagePreprocessor,
        model: ClassifierModel,
        labels: ClassLabels,
    ) -> Result<Self, StartupError> {
        if model.num_classes() != labels.len() {
            return Err(StartupError::ClassCountMismatch {
                expected: model.num_classes(),
                found: labels.len(),
            });
        }
        Ok(Self {
            preprocessor,
            model,
            labels,
        })
    }

    /// Loads the class names and then a classifier head sized to match them.
    /// Never exits the process; the caller decides what a failure means.
    pub fn initialize(config: &ModelConfig) -> Result<Self, StartupError> {
        let (weights_path, labels_path) = config.resolve_paths()?;

        let labels = ClassLabels::load(&labels_path)?;
        if let Some(expected) = config.num_classes {
            if expected != labels.len() {
                return Err(StartupError::ClassCountMismatch {
                    expected,
                    found: labels.len(),
                });
            }
        }

        let device = Device::Cpu;
        let model = ClassifierModel::load(&weights_path, labels.len(), device.clone())?;
        Self::new(ImagePreprocessor::new(device), model, labels)
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// Full softmax distribution over the classes, in label order.
    pub fn probabilities(&self, image_bytes: &[u8]) -> Result<Vec<f32>, PredictionError> {
        let input = self.preprocessor.preprocess(image_bytes)?;
        let scores = self.model.infer(&input)?;
        let probabilities = candle_nn::ops::softmax(&scores, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;

        if probabilities.len() != self.labels.len() {
            return Err(PredictionError::OutputMismatch {
                outputs: probabilities.len(),
                labels: self.labels.len(),
            });
        }
        Ok(probabilities)
    }

    pub fn predict(&self, image_bytes: &[u8]) -> Result<Prediction, PredictionError> {
        let probabilities = self.probabilities(image_bytes)?;
        let (class_index, probability) =
            argmax(&probabilities).ok_or(PredictionError::OutputMismatch {
                outputs: 0,
                labels: self.labels.len(),
            })?;
        Ok(self.prediction(class_index, probability))
    }

    /// The `k` most likely classes, highest first; ties keep label order.
    pub fn top_k(&self, probabilities: &[f32], k: usize) -> Vec<Prediction> {
        let mut indexed: Vec<(usize, f32)> = probabilities
            .iter()
            .copied()
            .take(self.labels.len())
            .enumerate()
            .collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed
            .into_iter()
            .take(k)
            .map(|(index, probability)| self.prediction(index, probability))
            .collect()
    }

    fn prediction(&self, class_index: usize, probability: f32) -> Prediction {
        // callers only pass indices below labels.len()
        let label = self.labels.get(class_index).unwrap_or_default().to_string();
        Prediction {
            class_index,
            label,
            confidence: (f64::from(probability) * 100.0).clamp(0.0, 100.0),
        }
    }
}

/// Index and value of the largest element; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((index, value)),
        }
    }
    best
}
